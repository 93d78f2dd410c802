use std::net::Ipv4Addr;

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A response read off the wire until EOF.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Writes `request` verbatim to the proxy and reads until the proxy closes
/// the connection.
pub async fn send_raw(proxy_port: u16, request: &str) -> Result<RawResponse> {
    let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, proxy_port)).await?;
    stream.write_all(request.as_bytes()).await?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await?;
    parse_response(&raw)
}

/// Absolute-form GET through the proxy, closing the connection afterwards.
pub async fn proxy_get(proxy_port: u16, url: &str, extra_headers: &[(&str, &str)]) -> Result<RawResponse> {
    let uri: http::Uri = url.parse()?;
    let host = uri.authority().context("url has no authority")?.as_str();
    let mut request = format!("GET {url} HTTP/1.1\r\nHost: {host}\r\n");
    for (name, value) in extra_headers {
        request.push_str(&format!("{name}: {value}\r\n"));
    }
    request.push_str("Connection: close\r\n\r\n");
    send_raw(proxy_port, &request).await
}

fn parse_response(raw: &[u8]) -> Result<RawResponse> {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| anyhow!("incomplete response: {:?}", String::from_utf8_lossy(raw)))?;
    let head = std::str::from_utf8(&raw[..split])?;
    let body = raw[split + 4..].to_vec();

    let mut lines = head.split("\r\n");
    let status_line = lines.next().context("missing status line")?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .context("missing status code")?
        .parse()?;

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    Ok(RawResponse {
        status,
        headers,
        body,
    })
}
