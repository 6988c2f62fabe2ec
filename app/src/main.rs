// In app/src/main.rs

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use core_types::{BarTime, SymbolId};
use engine::task::SymbolReport;
use engine::{Engine, EngineSettings, RunReport, Stores};
use tracing_subscriber::prelude::*;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "Incremental moving-average and RSI signal pipeline.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Processes every unprocessed bar of all (or the given) symbols to end of stream.
    Run {
        /// Restricts the run to these symbol ids. May be repeated.
        #[arg(short, long = "symbol")]
        symbols: Vec<i64>,
    },

    /// Prints the indicator snapshot stored for one bar as JSON.
    Snapshot {
        #[arg(short, long)]
        symbol: i64,

        /// Bar date in YYYY-MM-DD format.
        #[arg(long)]
        date: String,

        /// Bar time in HH:MM:SS format.
        #[arg(long)]
        time: String,
    },

    /// Prints the recorded trades of a symbol with their profit/loss.
    Trades {
        #[arg(short, long)]
        symbol: i64,
    },

    /// Drops a symbol's checkpoint so the next run replays it from the first bar.
    Reset {
        #[arg(short, long)]
        symbol: i64,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = app_config::load_settings().context("failed to load settings")?;

    let level = settings
        .app
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::filter::Targets::new()
            .with_target("sqlx::query", tracing::Level::WARN) // Disable sqlx query debug logs
            .with_default(level),
    );
    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::info!(environment = %settings.app.environment, "Starting indicator pipeline");

    let db = database::connect(&settings.database)
        .await
        .context("failed to connect to the database")?;
    let engine = Engine::new(EngineSettings::from(&settings), Stores::shared(db))?;

    match cli.command {
        Commands::Run { symbols } => {
            let symbols = (!symbols.is_empty()).then(|| symbols.into_iter().map(SymbolId).collect());
            let report = engine.run(symbols).await?;
            print_run_report(&report);
        }
        Commands::Snapshot { symbol, date, time } => {
            let as_of = parse_bar_time(&date, &time)?;
            match engine.snapshot(SymbolId(symbol), as_of).await? {
                Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
                None => anyhow::bail!("no snapshot for symbol {symbol} at {as_of}"),
            }
        }
        Commands::Trades { symbol } => {
            let (trades, summary) = engine.trades(SymbolId(symbol)).await?;
            println!("{:<12} {:<10} {:<6} {:>14} {:>14}", "DATE", "TIME", "ACTION", "PRICE", "P/L");
            for trade in &trades {
                let profit_loss = trade
                    .profit_loss
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<12} {:<10} {:<6} {:>14} {:>14}",
                    trade.at.date.to_string(),
                    trade.at.time.to_string(),
                    trade.kind.as_str(),
                    trade.price.to_string(),
                    profit_loss
                );
            }
            print_summary(&summary);
        }
        Commands::Reset { symbol } => {
            engine.reset(SymbolId(symbol)).await?;
        }
    }

    tracing::info!("Indicator pipeline has finished successfully.");

    Ok(())
}

fn parse_bar_time(date: &str, time: &str) -> Result<BarTime> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{date}', expected YYYY-MM-DD"))?;
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .with_context(|| format!("invalid time '{time}', expected HH:MM:SS"))?;
    Ok(BarTime::new(date, time))
}

fn print_run_report(report: &RunReport) {
    println!("\n--- Run Report ---");
    println!(
        "{:<8} {:>10} {:>10} {:>9} {:>8}  STATUS",
        "SYMBOL", "PROCESSED", "DUPLICATE", "REJECTED", "SIGNALS"
    );
    for symbol in &report.symbols {
        println!(
            "{:<8} {:>10} {:>10} {:>9} {:>8}  {}",
            symbol.symbol.to_string(),
            symbol.bars_processed,
            symbol.duplicates,
            symbol.rejected,
            symbol.signals.len(),
            status(symbol)
        );
    }
    for (symbol, error) in &report.failed {
        println!("{:<8} failed: {}", symbol.to_string(), error);
    }
    println!(
        "Snapshots saved: {}, trades recorded: {}, write failures: {}",
        report.writer.snapshots_saved, report.writer.trades_recorded, report.writer.failures
    );
    println!("------------------\n");
}

fn status(report: &SymbolReport) -> String {
    match (&report.halted, report.replayed_after_corrupt_state) {
        (Some(reason), _) => format!("halted: {reason}"),
        (None, true) => "replayed after corrupt checkpoint".to_string(),
        (None, false) => "ok".to_string(),
    }
}

fn print_summary(summary: &analytics::TradeSummary) {
    println!("\n--- Trade Summary ---");
    println!("Total Trades:      {}", summary.total_trades);
    println!("Closed Trades:     {}", summary.closed_trades);
    println!("Winning / Losing:  {} / {}", summary.winning_trades, summary.losing_trades);
    println!("Win Rate:          {}%", summary.win_rate);
    println!("Gross Profit:      {}", summary.gross_profit);
    println!("Gross Loss:        {}", summary.gross_loss);
    println!("Net Profit/Loss:   {}", summary.net_profit_loss);
    println!("---------------------\n");
}
