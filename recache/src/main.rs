mod cli;

use clap::Parser;
use recache_config::ProxyOptions;
use recache_core::CachingProxy;
use tracing::{info, warn};
use utils::init_tracing;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config_file = cli.config_file();

    let mut options = match ProxyOptions::from_file(&config_file) {
        Ok(options) => options,
        Err(e) => {
            warn!(
                target: "recache::master",
                file = %config_file,
                error = %e,
                "Cannot read configuration; continuing with defaults"
            );
            ProxyOptions::default()
        }
    };
    cli.apply(&mut options);
    options.log();

    let mut proxy = CachingProxy::new(options)?;
    proxy.start().await?;
    println!("{}", proxy.url());

    tokio::signal::ctrl_c().await?;
    info!(target: "recache::master", "Ctrl-C received");
    proxy.stop().await;

    Ok(())
}
