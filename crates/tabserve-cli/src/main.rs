//! TabServe replay driver (tabserve-replay)
//!
//! Drives a tabular query server from a JSON-lines event script, standing in
//! for the pipeline that would normally deliver window boundaries, input
//! batches and query envelopes. Every emitted result is printed on its own
//! line on stdout; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! tabserve-replay --config server.toml --events session.jsonl
//! cat session.jsonl | tabserve-replay --config server.toml --events -
//! ```
//!
//! # Environment Variables
//!
//! - `TABSERVE_CONFIG`: config file path when `--config` is not given
//! - `RUST_LOG`: Log level (default: info)

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value as JsonValue;
use tabserve_server::{JsonRowConverter, ServerConfig, TabularServer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod replay;

#[derive(Parser)]
#[command(name = "tabserve-replay")]
#[command(about = "Replay a pipeline event script against a tabular query server", long_about = None)]
struct Cli {
    /// Server config file (TOML)
    #[arg(short, long, env = "TABSERVE_CONFIG")]
    config: PathBuf,

    /// Event script (JSON lines), or `-` for stdin
    #[arg(short, long, default_value = "-")]
    events: String,

    /// Print server statistics as JSON to stderr when done
    #[arg(long)]
    stats: bool,
}

fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let config = ServerConfig::load(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    let mut server: TabularServer<JsonValue> =
        TabularServer::setup(&config, JsonRowConverter).context("failed to set up server")?;

    let script: Box<dyn BufRead> = if cli.events == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&cli.events)
            .with_context(|| format!("failed to open event script {}", cli.events))?;
        Box::new(BufReader::new(file))
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut write_error: Option<io::Error> = None;
    let mut sink = |message: String| {
        if write_error.is_none() {
            if let Err(e) = writeln!(out, "{}", message) {
                write_error = Some(e);
            }
        }
    };

    let summary = replay::replay(script, &mut server, &mut sink)?;
    if let Some(e) = write_error {
        return Err(e).context("failed to write results");
    }

    info!(
        events = summary.events,
        windows = summary.windows,
        rejected_batches = summary.rejected_batches,
        pending_queries = server.pending_queries(),
        "Replay finished"
    );

    if cli.stats {
        let stats = serde_json::json!({
            "server": server.stats(),
            "queue": server.queue_stats(),
        });
        eprintln!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}
