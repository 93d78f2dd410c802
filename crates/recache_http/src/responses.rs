use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Response, StatusCode, header};
use http_body_util::Full;

use crate::ProxyBody;

/// Generic helper: response with the given status, headers and body.
pub fn build_response(status: StatusCode, headers: HeaderMap, body: Bytes) -> Response<ProxyBody> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Empty-bodied status response.
pub fn status_only(status: StatusCode) -> Response<ProxyBody> {
    build_response(status, HeaderMap::new(), Bytes::new())
}

/// Answer to CONNECT: tunneling is not supported, and the connection is
/// closed after the response is written.
pub fn connect_not_implemented() -> Response<ProxyBody> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    build_response(StatusCode::NOT_IMPLEMENTED, headers, Bytes::new())
}
