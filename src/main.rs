//! Binary protocol event receiver.
//!
//! Accepts events from remote agents over a length-prefixed binary protocol,
//! on a plaintext TCP port and a TLS port, and forwards them downstream.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────────┐
//!                      │                 BINARY RECEIVER                    │
//!                      │                                                    │
//!   Agent (TCP/TLS)    │  ┌──────────┐   ┌────────────┐   ┌────────────┐   │
//!   ───────────────────┼─▶│   net    │──▶│  protocol  │──▶│  dispatch  │   │
//!                      │  │ acceptor │   │   frames   │   │ login/out/ │   │
//!                      │  │   pool   │   │            │   │  publish   │   │
//!                      │  └──────────┘   └────────────┘   └─────┬──────┘   │
//!                      │                                         │          │
//!                      │                                         ▼          │
//!   Ack / Error        │  ┌──────────┐                    ┌────────────┐   │
//!   ◀──────────────────┼──│ response │◀───────────────────│  backend   │───┼──▶ event
//!                      │  │ encoding │                    │ sessions + │   │    pipeline
//!                      │  └──────────┘                    │  pipeline  │   │
//!                      │                                  └────────────┘   │
//!                      └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use binary_receiver::backend::{ChannelPipeline, InMemorySessionBackend};
use binary_receiver::config::{load_config, ReceiverConfig};
use binary_receiver::lifecycle::signals::wait_for_signal;
use binary_receiver::observability::{logging, metrics};
use binary_receiver::{BinaryReceiver, Dispatcher};

#[derive(Parser)]
#[command(name = "binary-receiver")]
#[command(about = "Binary transport event receiver", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ReceiverConfig::default(),
    };

    logging::init_logging(
        cli.log_level
            .as_deref()
            .unwrap_or(&config.observability.log_level),
    );

    tracing::info!("binary-receiver v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        tcp_port = config.tcp.port,
        tcp_pool_size = config.tcp.pool_size,
        tls_enabled = config.tls.enabled,
        tls_port = config.tls.port,
        tls_pool_size = config.tls.pool_size,
        users = config.auth.users.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let sessions = InMemorySessionBackend::from_config(&config.auth);
    let (pipeline, mut batches) = ChannelPipeline::new(sessions.clone());

    // Downstream stage: log what arrives.
    tokio::spawn(async move {
        while let Some(batch) = batches.recv().await {
            metrics::record_events(batch.events.len());
            for event in &batch.events {
                tracing::debug!(
                    username = %batch.username,
                    stream_id = %event.stream_id,
                    timestamp = event.timestamp,
                    attributes_len = event.attributes.len(),
                    "Event received"
                );
            }
        }
    });

    let dispatcher = Dispatcher::new(Arc::new(sessions), Arc::new(pipeline));
    let mut receiver = BinaryReceiver::new(config, dispatcher);
    receiver.start().await?;

    let signal = wait_for_signal().await?;
    tracing::info!(signal, "Shutdown signal received");

    receiver.stop();
    tracing::info!("Shutdown complete");
    Ok(())
}
