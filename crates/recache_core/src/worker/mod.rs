//! Per-connection HTTP/1.1 handler.
//!
//! Serves requests on one client connection until the client goes away or
//! the proxy shuts down; each request goes through the [`Coordinator`].

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use anyhow::Context;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

mod pipeline;

pub use pipeline::Coordinator;

/// Entry point for a "logical worker" that handles a single connection.
///
/// On shutdown the connection finishes its in-flight request and is then
/// closed; idle keep-alive connections close right away.
#[instrument(skip(stream, coordinator, shutdown))]
pub(crate) async fn handle_connection(
    stream: TcpStream,
    client_addr: SocketAddr,
    coordinator: Arc<Coordinator>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    debug!(target: "recache::worker", "Handling new client connection");

    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<Incoming>| {
        let coordinator = coordinator.clone();
        async move { Ok::<_, Infallible>(coordinator.handle(req).await) }
    });

    let conn = http1::Builder::new()
        .keep_alive(true)
        .serve_connection(io, service);
    let mut conn = std::pin::pin!(conn);
    let mut draining = false;

    loop {
        tokio::select! {
            res = conn.as_mut() => {
                res.context("HTTP/1 connection error")?;
                break;
            }
            _ = shutdown.cancelled(), if !draining => {
                debug!(target: "recache::worker", "Shutdown requested; draining connection");
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }

    debug!(target: "recache::worker", "Finished handling connection");
    Ok(())
}
