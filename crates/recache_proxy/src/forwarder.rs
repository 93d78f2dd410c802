use std::path::Path;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Uri, header};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use recache_http::headers::strip_hop_by_hop;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::{TlsConnector, rustls::ServerName};
use tracing::{debug, instrument};

use crate::{ForwardError, Target, TargetScheme, build_tls_connector};

/// Complete backend response, body fully buffered.
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Issues one outbound request per call over a fresh connection.
///
/// Redirects are returned as-is and nothing is retried.
#[derive(Clone)]
pub struct Forwarder {
    tls: TlsConnector,
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder").finish_non_exhaustive()
    }
}

impl Forwarder {
    pub fn new(tls: TlsConnector) -> Self {
        Self { tls }
    }

    /// Forwarder trusting the Mozilla roots plus an optional extra CA bundle.
    pub fn with_ca_file(extra_ca_file: Option<&Path>) -> Result<Self, ForwardError> {
        Ok(Self::new(build_tls_connector(extra_ca_file)?))
    }

    #[instrument(skip(self, headers, body), fields(%method, %uri, body_len = body.len()))]
    pub async fn forward(
        &self,
        method: Method,
        uri: &Uri,
        mut headers: HeaderMap,
        body: Bytes,
    ) -> Result<ForwardedResponse, ForwardError> {
        let target = Target::from_uri(uri)?;

        strip_hop_by_hop(&mut headers);
        if !headers.contains_key(header::HOST) {
            let host = HeaderValue::from_str(&target.authority)
                .map_err(|e| ForwardError::InvalidTarget(format!("bad host: {e}")))?;
            headers.insert(header::HOST, host);
        }

        let mut request = Request::builder()
            .method(method)
            .uri(target.path_and_query.as_str())
            .body(Full::new(body))?;
        *request.headers_mut() = headers;

        let addr = target.socket_addr();
        debug!(target: "recache::proxy", upstream = %addr, "Connecting to backend");
        let tcp = TcpStream::connect(addr.as_str())
            .await
            .map_err(|source| ForwardError::Connect { addr, source })?;
        let _ = tcp.set_nodelay(true);

        let response = match target.scheme {
            TargetScheme::Http => send_over(tcp, request).await?,
            TargetScheme::Https => {
                let server_name = ServerName::try_from(target.host.as_str()).map_err(|e| {
                    ForwardError::InvalidTarget(format!("invalid TLS server name: {e}"))
                })?;
                let tls = self
                    .tls
                    .connect(server_name, tcp)
                    .await
                    .map_err(ForwardError::Tls)?;
                send_over(tls, request).await?
            }
        };

        debug!(
            target: "recache::proxy",
            status = %response.status,
            body_len = response.body.len(),
            "Backend response received"
        );
        Ok(response)
    }
}

/// Runs a single HTTP/1.1 exchange over an established stream.
async fn send_over<S>(
    stream: S,
    request: Request<Full<Bytes>>,
) -> Result<ForwardedResponse, ForwardError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(ForwardError::Handshake)?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(target: "recache::proxy", error = ?e, "Backend connection closed with error");
        }
    });

    let response = sender
        .send_request(request)
        .await
        .map_err(ForwardError::Http)?;
    let (parts, body) = response.into_parts();
    let body = body.collect().await.map_err(ForwardError::Body)?.to_bytes();

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);

    Ok(ForwardedResponse {
        status: parts.status,
        headers,
        body,
    })
}
