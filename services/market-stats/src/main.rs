use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use market_stats::config::PipelineConfig;
use market_stats::pipeline::Pipeline;
use market_stats::source::{capture_payloads, parse_documents};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "market-stats")]
#[command(about = "Flatten market snapshots and compute 7-observation rolling statistics")]
struct Cli {
    /// Input file with raw documents (JSON array or JSON Lines); stdin when omitted
    input: Option<PathBuf>,

    /// Treat the input as bare provider payloads and capture them now
    #[arg(long)]
    capture: bool,

    /// Process coin partitions in parallel
    #[arg(long)]
    parallel: bool,

    /// Succeed on an empty batch instead of failing
    #[arg(long)]
    allow_empty: bool,

    /// Pretty-print the enriched records
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = PipelineConfig::from_env()?;
    if cli.parallel {
        config.aggregator.parallel = true;
    }
    if cli.allow_empty {
        config.ingestion.reject_empty_batch = false;
    }

    let raw = read_input(cli.input.as_ref())?;
    let documents = if cli.capture {
        let payloads: Vec<Value> = serde_json::from_str(&raw).context("parsing provider payloads")?;
        capture_payloads(payloads)
    } else {
        parse_documents(&raw)?
    };

    tracing::info!(documents = documents.len(), "Starting market-stats batch");

    let pipeline = Pipeline::new(config);
    let output = pipeline.run_batch(documents)?;

    for rejection in &output.rejections {
        tracing::warn!(position = rejection.position, error = %rejection.error, "Document rejected");
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.pretty {
        serde_json::to_writer_pretty(&mut out, &output.records)?;
    } else {
        serde_json::to_writer(&mut out, &output.records)?;
    }
    writeln!(out)?;

    tracing::info!(report = %serde_json::to_string(&output.report)?, "Batch report");
    Ok(())
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display())),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            Ok(buf)
        }
    }
}
