mod options;
mod validation;

pub use options::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TTL_MS, OptionsError, ProxyOptions};
pub use validation::{ConfigReport, validate};
