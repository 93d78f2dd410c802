use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const SLOW_DELAY: Duration = Duration::from_millis(300);

/// Small hyper backend with a handful of fixed routes:
///
/// - `/counter`: 201, `x-counter` header, `{"counter":n}` body
/// - `/dump`: echoes method, url and headers as JSON, `x-server: dumping-server`
/// - `/echo`: echoes the request body
/// - `/redirect`: 302 to `/counter`
/// - `/slow`: answers after [`SLOW_DELAY`]
pub struct StubBackend {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl StubBackend {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let counter = counter.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        route(req, n)
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Ok(Self { addr, hits, task })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Stops accepting new connections.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn route(req: Request<Incoming>, n: usize) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let response = match path.as_str() {
        "/counter" => Response::builder()
            .status(StatusCode::CREATED)
            .header("content-type", "application/json")
            .header("x-counter", n.to_string())
            .body(Full::new(Bytes::from(format!("{{\"counter\":{n}}}")))),
        "/dump" => {
            let headers: BTreeMap<String, String> = req
                .headers()
                .iter()
                .map(|(k, v)| {
                    (
                        k.as_str().to_string(),
                        String::from_utf8_lossy(v.as_bytes()).into_owned(),
                    )
                })
                .collect();
            let dump = serde_json::json!({
                "method": req.method().as_str(),
                "url": req.uri().to_string(),
                "headers": headers,
            });
            Response::builder()
                .header("content-type", "application/json")
                .header("x-server", "dumping-server")
                .body(Full::new(Bytes::from(dump.to_string())))
        }
        "/echo" => {
            let body = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(_) => Bytes::new(),
            };
            Response::builder()
                .header("content-type", "text/plain")
                .body(Full::new(body))
        }
        "/slow" => {
            tokio::time::sleep(SLOW_DELAY).await;
            Response::builder()
                .header("content-type", "text/plain")
                .body(Full::new(Bytes::from_static(b"finally done")))
        }
        "/redirect" => Response::builder()
            .status(StatusCode::FOUND)
            .header("location", "/counter")
            .body(Full::new(Bytes::new())),
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from_static(b"not found"))),
    };

    Ok(response.unwrap_or_else(|_| Response::new(Full::new(Bytes::new()))))
}
