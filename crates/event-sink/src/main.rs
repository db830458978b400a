//! Event sink binary entry point.
//!
//! Reads JSON-lines event records from stdin and delivers them through the
//! sink, standing in for the host pipeline. Each line is a JSON object; an
//! optional `"topic"` string field selects the topic (default `"main"`) and
//! the remaining fields form the event envelope.

use anyhow::Context;
use clap::Parser;
use event_sink::{Event, EventSink, SinkConfig};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Event sink: buffered, batched, compressed event delivery over HTTP.
#[derive(Parser, Debug)]
#[command(name = "event-sink")]
#[command(about = "Deliver JSON-lines events from stdin to an HTTP ingestion endpoint")]
struct Args {
    /// Ingestion endpoint URL.
    #[arg(long, env = "EVENT_SINK_ENDPOINT")]
    endpoint: String,

    /// API token for the bearer Authorization header.
    #[arg(long, env = "EVENT_SINK_TOKEN")]
    token: String,

    /// Extra header to send with every request, as 'Name: value'. Repeatable.
    #[arg(long = "header")]
    headers: Vec<String>,

    /// Only deliver events published under these topics. Repeatable;
    /// omitting it delivers every topic.
    #[arg(long = "topic")]
    topics: Vec<String>,

    /// Maximum events per batch.
    #[arg(long, default_value = "100")]
    max_batch_events: usize,

    /// Maximum uncompressed batch size in bytes.
    #[arg(long, default_value = "1048576")]
    max_batch_bytes: usize,

    /// Flush an open batch after this many seconds.
    #[arg(long, default_value = "5.0")]
    flush_interval_secs: f64,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Retry attempts after the initial delivery attempt.
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Exponential backoff base; the nth retry waits base^n seconds.
    #[arg(long, default_value = "2.0")]
    backoff_base: f64,

    /// Ceiling on a single backoff wait, in seconds.
    #[arg(long, default_value = "60")]
    backoff_max_secs: u64,

    /// Disable gzip compression of batch payloads.
    #[arg(long)]
    no_gzip: bool,

    /// Gzip compression level (1-9).
    #[arg(long, default_value = "6")]
    gzip_level: u32,

    /// Bounded event queue capacity.
    #[arg(long, default_value = "10000")]
    queue_capacity: usize,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "EVENT_SINK_LOG", default_value = "info")]
    log_level: String,
}

fn build_config(args: &Args) -> anyhow::Result<SinkConfig> {
    let mut config = SinkConfig::new(&args.endpoint, &args.token);
    config.max_batch_events = args.max_batch_events;
    config.max_batch_bytes = args.max_batch_bytes;
    config.flush_interval = Duration::from_secs_f64(args.flush_interval_secs);
    config.request_timeout = Duration::from_secs(args.timeout_secs);
    config.max_retries = args.max_retries;
    config.backoff_base = args.backoff_base;
    config.backoff_max = Duration::from_secs(args.backoff_max_secs);
    config.gzip = !args.no_gzip;
    config.gzip_level = args.gzip_level;
    config.queue_capacity = args.queue_capacity;
    if !args.topics.is_empty() {
        config.topics = Some(args.topics.clone());
    }
    for raw in &args.headers {
        let header = SinkConfig::parse_header(raw).with_context(|| format!("--header {raw}"))?;
        config.custom_headers.push(header);
    }
    Ok(config)
}

/// Parse one stdin line into an event: topic from the `"topic"` field,
/// everything else as the envelope.
fn parse_line(line: &str) -> anyhow::Result<Event> {
    let value: serde_json::Value =
        serde_json::from_str(line).context("line is not valid JSON")?;
    let mut data = match value {
        serde_json::Value::Object(map) => map,
        other => anyhow::bail!("expected a JSON object, got {other}"),
    };
    let topic = match data.remove("topic") {
        Some(serde_json::Value::String(topic)) => topic,
        Some(other) => anyhow::bail!("topic must be a string, got {other}"),
        None => "main".to_string(),
    };
    Ok(Event::new(topic, data))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone())),
        )
        .init();

    let config = build_config(&args)?;
    info!(
        endpoint = %config.endpoint,
        max_batch_events = config.max_batch_events,
        max_batch_bytes = config.max_batch_bytes,
        gzip = config.gzip,
        "configuration loaded"
    );

    let sink = EventSink::start(config).context("failed to start event sink")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match parse_line(line) {
                        Ok(event) => {
                            sink.enqueue(event);
                        }
                        Err(e) => warn!(error = %e, "skipping malformed input line"),
                    }
                }
                None => {
                    info!("stdin closed, draining");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal, draining");
                break;
            }
        }
    }

    sink.shutdown().await;
    let dropped = sink.dropped_events();
    if dropped > 0 {
        warn!(dropped, "events were dropped at the queue boundary");
    }
    Ok(())
}
