use std::path::PathBuf;

use clap::Parser;
use recache_config::ProxyOptions;

#[derive(Debug, Clone, Parser)]
#[command(name = "recache", about = "Recording HTTP forward proxy")]
pub struct Cli {
    /// TOML configuration file (defaults to ./recache.toml if present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory where recorded responses are stored.
    #[arg(long)]
    pub cache_path: Option<PathBuf>,

    /// Freshness window of a recording, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub ttl: Option<u64>,

    /// Listen port; 0 picks a free one.
    #[arg(long)]
    pub port: Option<u16>,

    /// Bind address.
    #[arg(long, value_name = "ADDR")]
    pub host: Option<String>,

    /// Extra PEM trust anchors for https backends.
    #[arg(long, value_name = "PEM")]
    pub upstream_ca_file: Option<PathBuf>,
}

impl Cli {
    pub fn config_file(&self) -> String {
        self.config
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recache.toml".to_string())
    }

    /// Flags given on the command line win over file and environment values.
    pub fn apply(self, options: &mut ProxyOptions) {
        if let Some(cache_path) = self.cache_path {
            options.cache_path = cache_path;
        }
        if let Some(ttl) = self.ttl {
            options.ttl = ttl;
        }
        if let Some(port) = self.port {
            options.port = port;
        }
        if let Some(host) = self.host {
            options.host = host;
        }
        if let Some(ca) = self.upstream_ca_file {
            options.upstream_ca_file = Some(ca);
        }
    }
}
