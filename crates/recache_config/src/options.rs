use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::validation::{ConfigReport, validate};

/// One day, in milliseconds.
pub const DEFAULT_TTL_MS: u64 = 24 * 60 * 60 * 1000;
pub const DEFAULT_PORT: u16 = 0;
pub const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Required option missing: \"cache_path\"")]
    MissingCachePath,

    #[error("invalid proxy options:\n{0}")]
    Invalid(String),

    #[error("cannot load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

// =======================================================
// PROXY OPTIONS + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyOptions {
    /// Directory where recorded responses are kept.
    pub cache_path: PathBuf,
    /// How long a recording stays fresh, in milliseconds.
    pub ttl: u64,
    /// Listen port; 0 lets the OS pick a free one.
    pub port: u16,
    /// Bind address of the listener.
    pub host: String,
    /// Extra PEM trust anchors for https backends.
    pub upstream_ca_file: Option<PathBuf>,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::new(),
            ttl: DEFAULT_TTL_MS,
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.into(),
            upstream_ca_file: None,
        }
    }
}

impl ProxyOptions {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl.as_millis().min(u128::from(u64::MAX)) as u64;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_upstream_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.upstream_ca_file = Some(path.into());
        self
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn upstream_ca_file(&self) -> Option<&Path> {
        self.upstream_ca_file.as_deref()
    }

    /// Layers an optional TOML file and `RECACHE_*` environment variables
    /// over the defaults.
    pub fn from_file(file_name: &str) -> Result<Self, OptionsError> {
        let built = config::Config::builder()
            .add_source(config::File::new(file_name, config::FileFormat::Toml).required(false))
            .add_source(
                config::Environment::with_prefix("RECACHE")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()?;

        Ok(built.try_deserialize()?)
    }

    /// Validate the options and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    /// Fails on the first class of problems that make the options unusable.
    pub fn ensure_valid(&self) -> Result<ConfigReport, OptionsError> {
        if self.cache_path.as_os_str().is_empty() {
            return Err(OptionsError::MissingCachePath);
        }
        let report = self.validate();
        if report.has_errors() {
            return Err(OptionsError::Invalid(report.format()));
        }
        Ok(report)
    }

    pub fn log(&self) {
        info!(
            target: "recache::config",
            cache_path = %self.cache_path.display(),
            ttl_ms = self.ttl,
            port = self.port,
            host = %self.host,
            upstream_ca_file = ?self.upstream_ca_file,
            "Proxy options"
        );
    }
}
