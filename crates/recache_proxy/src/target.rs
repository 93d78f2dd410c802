use http::Uri;
use http::uri::Scheme;

use crate::ForwardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetScheme {
    Http,
    Https,
}

/// Backend address extracted from an absolute-form request URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: TargetScheme,
    /// Host without IPv6 brackets, suitable for connecting and SNI.
    pub host: String,
    pub port: u16,
    /// `host[:port]` as written in the URI (userinfo dropped), used for the
    /// `Host` header.
    pub authority: String,
    /// Origin-form request target sent to the backend.
    pub path_and_query: String,
}

impl Target {
    pub fn from_uri(uri: &Uri) -> Result<Self, ForwardError> {
        let scheme = match uri.scheme() {
            Some(s) if *s == Scheme::HTTP => TargetScheme::Http,
            Some(s) if *s == Scheme::HTTPS => TargetScheme::Https,
            Some(s) => {
                return Err(ForwardError::InvalidTarget(format!(
                    "unsupported scheme '{s}' in {uri}"
                )));
            }
            None => {
                return Err(ForwardError::InvalidTarget(format!(
                    "request target '{uri}' is not an absolute URI"
                )));
            }
        };

        let authority = uri
            .authority()
            .ok_or_else(|| ForwardError::InvalidTarget(format!("missing host in {uri}")))?;

        let host_header = match authority.port() {
            Some(port) => format!("{}:{}", authority.host(), port),
            None => authority.host().to_string(),
        };

        let host = authority
            .host()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        if host.is_empty() {
            return Err(ForwardError::InvalidTarget(format!("missing host in {uri}")));
        }

        let port = authority.port_u16().unwrap_or(match scheme {
            TargetScheme::Http => 80,
            TargetScheme::Https => 443,
        });

        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/")
            .to_string();

        Ok(Self {
            scheme,
            host,
            port,
            authority: host_header,
            path_and_query,
        })
    }

    pub fn socket_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
