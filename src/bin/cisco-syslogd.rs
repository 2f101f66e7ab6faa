use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use cisco_syslog::{
    AppConfig, Collector, DecodeErrorRecord, EventSinks, IngestedRecord, WatchRule,
};

/// Events buffered between the collector and each consumer.
const CHANNEL_CAPACITY: usize = 4096;

#[derive(Parser)]
#[command(name = "cisco-syslogd", about = "Receive Cisco syslog over UDP and print it as JSON lines")]
struct Cli {
    /// TOML configuration file, layered over the built-in defaults.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Listen port, overrides the configuration.
    #[arg(long, short)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(port) = cli.port {
        config.collector.port = port;
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    let (messages, message_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (errors, error_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let handle = Collector::new(config.collector.clone(), EventSinks { messages, errors })
        .start()
        .context("starting collector")?;

    let printer = tokio::spawn(print_messages(message_rx, config.watch));
    let logger = tokio::spawn(log_errors(error_rx));

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");

    // Stopping drops the collector's senders once the last dispatch is done,
    // which ends both consumers.
    handle.stop().await;
    printer.await.context("message consumer")??;
    logger.await.context("error consumer")?;

    Ok(())
}

async fn print_messages(
    mut rx: mpsc::Receiver<IngestedRecord>,
    watch: Vec<WatchRule>,
) -> anyhow::Result<()> {
    let stdout = std::io::stdout();

    while let Some(record) = rx.recv().await {
        if let Some(message_type) = &record.payload.header.message_type {
            for rule in watch.iter().filter(|rule| rule.matches(message_type)) {
                tracing::info!(
                    sender = %record.sender,
                    facility = %rule.facility,
                    mnemonic = %rule.mnemonic,
                    body = %record.payload.body,
                    "watched message received"
                );
            }
        }

        let mut out = stdout.lock();
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n")?;
        out.flush()?;
    }

    Ok(())
}

async fn log_errors(mut rx: mpsc::Receiver<DecodeErrorRecord>) {
    while let Some(record) = rx.recv().await {
        tracing::warn!(
            sender = %record.sender,
            reason = %record.reason,
            payload = %record.lossy_text(),
            "dropped undecodable datagram"
        );
    }
}
