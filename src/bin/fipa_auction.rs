// bin/fipa_auction.rs - Run one procurement auction
//
//! Runs a buyer and its sellers in one process and prints who won.
//!
//! # Usage
//!
//! ```bash
//! fipa-auction
//! fipa-auction --seller A=2500 --seller B=2500 --json
//! fipa-auction --config auction.toml --log-level debug
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};

use fipa_auction::config::{AuctionConfig, SellerConfig};
use fipa_auction::observability::{init_metrics, init_tracing, MetricsConfig, TracingConfig, TracingFormat};
use fipa_auction::protocol::SellerOutcome;
use fipa_auction::runner::{AuctionReport, AuctionRunner, RunnerError, SellerReport};

/// One-round procurement auction
#[derive(Parser, Debug)]
#[command(name = "fipa-auction")]
#[command(author = "SavageS")]
#[command(version)]
#[command(about = "Run a one-round FIPA procurement auction", long_about = None)]
struct Args {
    /// Config file path (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Item description sent with the call for proposals
    #[arg(long)]
    item: Option<String>,

    /// Seller as NAME=PRICE (repeatable, replaces the configured roster).
    /// PRICE may be `none` or negative for no stock.
    #[arg(short, long = "seller", value_name = "NAME=PRICE")]
    sellers: Vec<SellerConfig>,

    /// Give up when not every seller replied within this long
    #[arg(long)]
    reply_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format (pretty, compact, json)
    #[arg(long, default_value = "pretty")]
    log_format: TracingFormat,

    /// Enable the Prometheus metrics endpoint
    #[arg(long)]
    metrics: bool,

    /// Metrics listen address
    #[arg(long, default_value = "0.0.0.0:9090")]
    metrics_addr: SocketAddr,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(TracingConfig::for_level(&args.log_level, args.log_format));

    if args.metrics {
        match init_metrics(MetricsConfig {
            listen_addr: args.metrics_addr,
        }) {
            Ok(()) => info!(addr = %args.metrics_addr, "Metrics endpoint started"),
            Err(e) => warn!(error = %e, "Failed to initialize metrics"),
        }
    }

    let mut config = AuctionConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(item) = args.item {
        config.item = item;
    }
    if !args.sellers.is_empty() {
        config.sellers = args.sellers;
    }
    if args.reply_timeout_ms.is_some() {
        config.reply_timeout_ms = args.reply_timeout_ms;
    }

    let report = match AuctionRunner::new(config)?.run().await {
        Ok(report) => report,
        Err(RunnerError::Buyer { source, sellers }) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&sellers)?);
            } else {
                println!("{} {}", "Auction aborted:".bold().red(), source);
                print_sellers(&sellers);
            }
            return Err(source).context("buyer did not finish the round");
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &AuctionReport) {
    println!("{} {}", "Auction:".bold(), report.item);
    println!("  {} {}", "Buyer:".bold(), report.buyer);
    print_sellers(&report.sellers);

    match &report.outcome.winner {
        Some(winner) => println!(
            "{} {} at {}",
            "Winner:".bold().green(),
            winner.seller,
            winner.price
        ),
        None => println!("{}", "No winner: every seller refused".bold().yellow()),
    }
}

fn print_sellers(sellers: &[SellerReport]) {
    for seller in sellers {
        let line = match (&seller.outcome, &seller.error) {
            (Some(SellerOutcome::Won { price }), _) => format!("won at {price}").green(),
            (Some(SellerOutcome::Lost { price }), _) => format!("lost at {price}").yellow(),
            (Some(SellerOutcome::Refused { reason }), _) => format!("refused: {reason}").dimmed(),
            (None, Some(error)) => format!("unfinished: {error}").red(),
            (None, None) => "unfinished".red(),
        };
        println!("  {:<12} {}", seller.seller.to_string(), line);
    }
}
