//! Media transfer sender
//!
//! Sends one file to a media-server and reports the verdict.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;

use media_transfer::config::{TransferConfig, TransportKind};
use media_transfer::service::TransferClient;
use media_transfer::utils::logging;

/// Send a media file over TCP or UDP
#[derive(Parser)]
#[command(name = "media-send")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File to send
    file: PathBuf,

    /// Receiver IP address or "localhost"
    #[arg(long)]
    ip: Option<String>,

    /// Receiver port
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// Transport: tcp or udp
    #[arg(short, long)]
    transport: Option<TransportKind>,

    /// Payload bytes per datagram (udp only)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Configuration file path; defaults are used when it does not exist
    #[arg(short, long, default_value = "media-transfer.toml")]
    config: PathBuf,
}

fn check_host(host: &str) -> anyhow::Result<()> {
    if host == "localhost" || host.parse::<IpAddr>().is_ok() {
        Ok(())
    } else {
        bail!("'{host}' is not an IP address or 'localhost'")
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = TransferConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.logging.log_level = tracing::Level::WARN;
    logging::init(&config.logging)?;

    if let Some(ip) = cli.ip {
        config.client.host = ip;
    }
    if let Some(port) = cli.port {
        config.client.port = port;
    }
    if let Some(transport) = cli.transport {
        config.client.transport = transport;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.transport.chunk_size = chunk_size;
    }

    check_host(&config.client.host)?;
    if !cli.file.is_file() {
        bail!("{} does not exist or is not a file", cli.file.display());
    }
    config.validate_strict()?;

    let client = TransferClient::from_config(&config);
    let report = client
        .send_file(&cli.file)
        .await
        .with_context(|| format!("sending {} to {}", cli.file.display(), client.address()))?;

    match report.chunks {
        Some(chunks) => println!(
            "Sent {} ({} bytes, {} chunks) over {}: stored by receiver",
            report.file_name, report.bytes, chunks, report.transport
        ),
        None => println!(
            "Sent {} ({} bytes) over {}: stored by receiver",
            report.file_name, report.bytes, report.transport
        ),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_host() {
        assert!(check_host("localhost").is_ok());
        assert!(check_host("10.0.0.7").is_ok());
        assert!(check_host("::1").is_ok());
        assert!(check_host("example.com").is_err());
    }
}
