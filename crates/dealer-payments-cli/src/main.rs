mod commands;
mod input;
mod output;
mod telemetry;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::Value;
use std::process;

use commands::bulk::BulkArgs;
use commands::quote::{FinanceArgs, LeaseArgs};
use commands::rates::BestRateArgs;
use commands::DealerOptions;

/// Dealership finance and lease payment estimates
#[derive(Parser)]
#[command(
    name = "dpay",
    version,
    about = "Dealership finance and lease payment estimates",
    long_about = "Estimate advertised monthly finance and lease payments for dealer \
                  inventory with decimal precision. Resolves manufacturer rates with \
                  dealer fallbacks, applies incentives, fees and tax, and renders \
                  the advertising disclaimer."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log filter when DPAY_LOG is unset (e.g. warn, debug, dealer_payments_core=trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(flatten)]
    dealer: DealerOptions,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate a finance payment for one vehicle
    Finance(FinanceArgs),
    /// Estimate a lease payment for one vehicle
    Lease(LeaseArgs),
    /// Calculate every vehicle in an inventory file
    Bulk(BulkArgs),
    /// Look up the best manufacturer rate for a model line
    BestRate(BestRateArgs),
    /// Calculate an inventory file and write the CSV export
    Export(BulkArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init(&cli.log_level) {
        eprintln!("{}: {}", "error".red().bold(), e);
        process::exit(1);
    }

    let result: Result<Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Finance(args) => commands::quote::run_finance(args, &cli.dealer),
        Commands::Lease(args) => commands::quote::run_lease(args, &cli.dealer),
        Commands::Bulk(args) => commands::bulk::run_bulk(args, &cli.dealer),
        Commands::BestRate(args) => commands::rates::run_best_rate(args, &cli.dealer),
        Commands::Export(args) => commands::bulk::run_export(args, &cli.dealer).map(|()| Value::Null),
        Commands::Version => {
            println!("dpay {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(Value::Null) => process::exit(0),
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
