//! Media transfer receiver
//!
//! Listens on TCP and UDP and files every received upload by extension.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, Level};

use media_transfer::config::TransferConfig;
use media_transfer::service::TransferServer;
use media_transfer::utils::logging;

/// Receive media files over TCP or UDP
#[derive(Parser)]
#[command(name = "media-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path; defaults are used when it does not exist
    #[arg(short, long, default_value = "media-transfer.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", TransferConfig::example_config());
        return Ok(());
    }

    let mut config = TransferConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.apply_env();
    if cli.verbose {
        config.logging.log_level = Level::DEBUG;
    }

    logging::init(&config.logging)?;
    config.validate_strict()?;

    let server = TransferServer::bind(&config).await?;
    info!(
        tcp = %server.tcp_addr()?,
        udp = %server.udp_addr()?,
        root = %config.storage.root.display(),
        "media-server ready"
    );

    server.run().await?;
    Ok(())
}
