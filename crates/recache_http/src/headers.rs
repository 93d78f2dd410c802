//! Hop-by-hop header handling.
//!
//! These fields describe a single connection and must not travel through a
//! proxy, neither towards the backend nor into a recorded response.
//! `content-length` is end-to-end and kept: bodies are buffered whole, so it
//! still matches when the message is written again.

use std::collections::HashSet;

use http::{HeaderMap, HeaderName, header};

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Removes hop-by-hop fields and the fields named in `Connection`.
///
/// A `content-length` sent alongside `transfer-encoding` never described the
/// decoded body, so it goes as well.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let connection_tokens = collect_connection_tokens(headers);
    if headers.contains_key(header::TRANSFER_ENCODING) {
        headers.remove(header::CONTENT_LENGTH);
    }

    for name in HOP_BY_HOP {
        headers.remove(*name);
    }

    for token in connection_tokens {
        if let Ok(name) = HeaderName::from_bytes(token.as_bytes()) {
            headers.remove(name);
        }
    }
}

fn collect_connection_tokens(headers: &HeaderMap) -> HashSet<String> {
    let mut tokens = HashSet::new();
    for name in [header::CONNECTION.as_str(), "proxy-connection"] {
        for value in headers.get_all(name) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            tokens.extend(split_header_tokens(value));
        }
    }
    tokens
}

fn split_header_tokens(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split(',').filter_map(|token| {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(
                trimmed
                    .trim_matches(|c| c == '"' || c == '\'')
                    .to_ascii_lowercase(),
            )
        }
    })
}
