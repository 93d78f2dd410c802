//! Forwarder: replays an inbound proxy request against the backend named in
//! its absolute URI and hands back the complete response.

mod error;
mod forwarder;
mod target;
mod tls;

pub use error::ForwardError;
pub use forwarder::{ForwardedResponse, Forwarder};
pub use target::{Target, TargetScheme};
pub use tls::build_tls_connector;
