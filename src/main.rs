mod actors;
mod broker;
mod config;
mod engine;
mod ledger;
mod models;
mod review;
mod storage;
mod types;

use std::io::{stderr, stdout, BufWriter, Write};
use std::process::exit;
use std::time::Instant;

use anyhow::Result;
use tracing::info;
use tracing::level_filters::LevelFilter;

use crate::config::GatewayConfig;
use crate::engine::{AccountSummary, BatchRunner};
use crate::types::format_money;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: payment-gateway [input].csv [log_level:optional] > [output].csv");
        eprintln!("Script columns: type,account,invoice,amount,status");
        eprintln!("Row types: open, adjust, submit, republish, review, query");
        eprintln!("Available log levels: error, warn, info, debug, trace (default: LOG_LEVEL or error)");
        exit(1);
    }

    let path = &args[1];
    let log_level = args.get(2).cloned()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .map_or(LevelFilter::ERROR, |level| parse_log_level(&level));

    setup_logging(log_level);

    let config = GatewayConfig::from_env()?;
    let runner = BatchRunner::new(config);

    let timer = Instant::now();
    let summaries = runner.run(path).await?;
    let duration = timer.elapsed();

    info!("Replayed [{path}] for [{}] accounts in {duration:?}", summaries.len());

    write_results_to_stdout(&summaries)?;

    Ok(())
}

fn parse_log_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or_else(|_| {
        eprintln!("Unknown log level [{level}], logging errors only");
        LevelFilter::ERROR
    })
}

/// Logs go to stderr; stdout carries the balance report.
fn setup_logging(level: LevelFilter) {
    tracing_subscriber::fmt()
        .with_writer(stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn write_results_to_stdout(summaries: &[AccountSummary]) -> Result<()> {
    let mut output = BufWriter::new(stdout().lock());

    writeln!(output, "account,balance,pending")?;

    for summary in summaries {
        writeln!(output, "{},{},{}", summary.name, format_money(summary.balance), summary.pending)?;
    }

    output.flush()?;

    Ok(())
}
