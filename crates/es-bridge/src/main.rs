//! ES Bridge CLI
//!
//! Reads newline-delimited JSON events (`{"kind": "...", "payload": {...}}`)
//! from stdin and dispatches them to Elasticsearch.

use clap::Parser;
use es_bridge::{Dispatch, ElasticsearchSink, Router, Submission};
use es_bridge_core::prelude::*;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "es-bridge")]
#[command(about = "Dispatches telemetry events to Elasticsearch")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "ES_BRIDGE_CONFIG")]
    config: Option<String>,

    /// Elasticsearch hosts (comma-separated)
    #[arg(long, env = "ES_HOSTS")]
    es_hosts: Option<String>,

    /// Elasticsearch API generation (7 or 8)
    #[arg(long, env = "ES_API_GENERATION")]
    api_generation: Option<String>,

    /// Log submission failures
    #[arg(long, env = "PRINT_ERRORS")]
    print_errors: bool,

    /// Normalize and shape events without writing them
    #[arg(long)]
    dry_run: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = BridgeConfig::load(args.config.as_deref())?;
    if let Some(ref hosts) = args.es_hosts {
        config.elasticsearch.hosts = hosts.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Some(ref generation) = args.api_generation {
        config.backend.api_generation = generation.parse()?;
    }
    if let Some(ref level) = args.log_level {
        config.observability.log_level = level.clone();
    }
    config.print_errors |= args.print_errors;

    // Initialize tracing; stdout is left alone, events come in on stdin
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.log_format == "pretty" {
        tracing_subscriber::registry()
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting es-bridge");

    let sink: Arc<dyn DocumentSink> = if args.dry_run {
        info!("Dry run, documents are discarded");
        Arc::new(MemorySink::discarding())
    } else {
        let sink = ElasticsearchSink::new(config.elasticsearch.clone())?;
        if let Err(e) = sink.health_check().await {
            warn!(error = %e, "Elasticsearch is not reachable yet, continuing");
        }
        Arc::new(sink)
    };

    let router = Router::builder()
        .events(config.event_config()?)
        .api_generation(config.backend.api_generation)
        .sink(sink)
        .print_errors(config.print_errors)
        .build()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight: Vec<Submission> = Vec::new();
    let (mut received, mut submitted, mut skipped) = (0u64, 0u64, 0u64);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "Failed to read stdin");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                let event = match Event::from_json_line(&line) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "Skipping malformed event line");
                        continue;
                    }
                };

                received += 1;
                match router.handle_event(&event) {
                    Dispatch::Submitted(submission) => {
                        submitted += 1;
                        in_flight.push(submission);
                    }
                    Dispatch::Skipped(_) => skipped += 1,
                }
                in_flight.retain(|s| !s.is_finished());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    // Let in-flight submissions finish before exiting
    futures::future::join_all(in_flight.into_iter().map(Submission::completed)).await;

    info!(received, submitted, skipped, "es-bridge stopped");
    Ok(())
}
