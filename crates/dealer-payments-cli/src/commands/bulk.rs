use std::io;
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use dealer_payments_core::batch::{write_csv, BatchSummary};
use dealer_payments_core::calculators::{CalculationRequest, FinanceParams, LeaseParams};
use dealer_payments_core::rates::cache::{JsonFileRateFeed, RateCache, RateFeed, StaticRateFeed};
use dealer_payments_core::service::{PaymentService, StaticInventory};
use dealer_payments_core::{with_metadata, Vehicle};

use super::{elapsed_us, DealerOptions, TierArg};
use crate::input;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum CalcArg {
    #[default]
    Finance,
    Lease,
}

/// Arguments for pricing a whole inventory file
#[derive(Args)]
pub struct BulkArgs {
    /// Path to a JSON array of vehicles
    #[arg(long)]
    pub input: Option<String>,

    /// Calculation to run for every vehicle
    #[arg(long = "type", value_enum, default_value_t = CalcArg::Finance)]
    pub calc_type: CalcArg,

    /// Term in months for every vehicle
    #[arg(long)]
    pub term: Option<u32>,

    /// Down payment for every vehicle; dealer policy when omitted
    #[arg(long)]
    pub down_payment: Option<Decimal>,

    /// Credit tier (finance only)
    #[arg(long, value_enum)]
    pub credit_tier: Option<TierArg>,

    /// Annual mileage allowance (lease only)
    #[arg(long)]
    pub annual_miles: Option<u32>,
}

impl BulkArgs {
    fn request(&self) -> CalculationRequest {
        match self.calc_type {
            CalcArg::Finance => CalculationRequest::Finance(FinanceParams {
                term: self.term,
                down_payment: self.down_payment,
                credit_tier: self.credit_tier.map(Into::into),
                ..Default::default()
            }),
            CalcArg::Lease => CalculationRequest::Lease(LeaseParams {
                term: self.term,
                down_payment: self.down_payment,
                annual_miles: self.annual_miles,
                ..Default::default()
            }),
        }
    }
}

pub fn run_bulk(args: BulkArgs, opts: &DealerOptions) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let request = args.request();
    let summary = price_inventory(&args, &request, opts)?;

    let warnings = match summary.failed {
        0 => Vec::new(),
        n => vec![format!("{n} of {} vehicles could not be calculated", summary.total)],
    };
    let output = with_metadata(
        "Independent per-vehicle calculation over a single manufacturer rate snapshot",
        &request,
        warnings,
        elapsed_us(start),
        summary,
    );
    Ok(serde_json::to_value(output)?)
}

/// Price the inventory and write the dealer CSV export to stdout.
pub fn run_export(args: BulkArgs, opts: &DealerOptions) -> Result<(), Box<dyn std::error::Error>> {
    let request = args.request();
    let summary = price_inventory(&args, &request, opts)?;
    write_csv(&summary, io::stdout().lock())?;
    Ok(())
}

fn price_inventory(
    args: &BulkArgs,
    request: &CalculationRequest,
    opts: &DealerOptions,
) -> Result<BatchSummary, Box<dyn std::error::Error>> {
    let vehicles: Vec<Vehicle> = input::read_input(args.input.as_deref(), "bulk calculation")?;
    let settings = opts.load_settings()?;

    let feed: Arc<dyn RateFeed> = match &opts.rates {
        Some(path) => Arc::new(JsonFileRateFeed::new(path)),
        None => Arc::new(StaticRateFeed::sample()),
    };
    let service = PaymentService::new(
        Arc::new(StaticInventory::new(vehicles)),
        Arc::new(RateCache::new(feed)),
        Arc::new(settings),
    )
    .with_as_of(opts.pricing_date());

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let summary = runtime.block_on(service.calculate_bulk(request))?;
    Ok(summary)
}
