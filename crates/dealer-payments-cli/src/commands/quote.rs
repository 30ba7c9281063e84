use std::time::Instant;

use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use dealer_payments_core::calculators::{calculate_finance, calculate_lease, CalculationContext, FinanceParams, LeaseParams};
use dealer_payments_core::{with_metadata, Vehicle};

use super::{elapsed_us, DealerOptions, TierArg};
use crate::input;

/// `{"vehicle": {...}, "params": {...}}`; params may be omitted.
#[derive(Debug, Deserialize)]
struct FinanceQuote {
    vehicle: Vehicle,
    #[serde(default)]
    params: FinanceParams,
}

#[derive(Debug, Deserialize)]
struct LeaseQuote {
    vehicle: Vehicle,
    #[serde(default)]
    params: LeaseParams,
}

/// Arguments for a single finance estimate
#[derive(Args)]
pub struct FinanceArgs {
    /// Path to JSON input file with the vehicle and optional params
    #[arg(long)]
    pub input: Option<String>,

    /// Loan term in months (overrides params.term)
    #[arg(long)]
    pub term: Option<u32>,

    /// Cash down payment
    #[arg(long)]
    pub down_payment: Option<Decimal>,

    /// Trade-in value
    #[arg(long)]
    pub trade_value: Option<Decimal>,

    /// Buyer credit tier
    #[arg(long, value_enum)]
    pub credit_tier: Option<TierArg>,

    /// Leave incentives out of the sale price
    #[arg(long)]
    pub no_incentives: bool,
}

/// Arguments for a single lease estimate
#[derive(Args)]
pub struct LeaseArgs {
    /// Path to JSON input file with the vehicle and optional params
    #[arg(long)]
    pub input: Option<String>,

    /// Lease term in months (overrides params.term)
    #[arg(long)]
    pub term: Option<u32>,

    /// Cash down payment (capitalized cost reduction)
    #[arg(long)]
    pub down_payment: Option<Decimal>,

    /// Annual mileage allowance
    #[arg(long)]
    pub annual_miles: Option<u32>,

    /// Leave incentives out of the capitalized cost reduction
    #[arg(long)]
    pub no_incentives: bool,
}

pub fn run_finance(args: FinanceArgs, opts: &DealerOptions) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut quote: FinanceQuote = input::read_input(args.input.as_deref(), "finance")?;
    let params = &mut quote.params;
    if args.term.is_some() {
        params.term = args.term;
    }
    if args.down_payment.is_some() {
        params.down_payment = args.down_payment;
    }
    if let Some(trade) = args.trade_value {
        params.trade_value = trade;
    }
    if let Some(tier) = args.credit_tier {
        params.credit_tier = Some(tier.into());
    }
    if args.no_incentives {
        params.include_incentives = false;
    }

    let settings = opts.load_settings()?;
    let records = opts.rate_records()?;
    let ctx = CalculationContext::new(&settings, &records, opts.pricing_date());
    let result = calculate_finance(&ctx, &quote.vehicle, &quote.params)?;

    let output = with_metadata(
        "Level monthly payment amortizing the amount financed at the resolved APR",
        &quote.params,
        result.warnings.clone(),
        elapsed_us(start),
        result,
    );
    Ok(serde_json::to_value(output)?)
}

pub fn run_lease(args: LeaseArgs, opts: &DealerOptions) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut quote: LeaseQuote = input::read_input(args.input.as_deref(), "lease")?;
    let params = &mut quote.params;
    if args.term.is_some() {
        params.term = args.term;
    }
    if args.down_payment.is_some() {
        params.down_payment = args.down_payment;
    }
    if args.annual_miles.is_some() {
        params.annual_miles = args.annual_miles;
    }
    if args.no_incentives {
        params.include_incentives = false;
    }

    let settings = opts.load_settings()?;
    let records = opts.rate_records()?;
    let ctx = CalculationContext::new(&settings, &records, opts.pricing_date());
    let result = calculate_lease(&ctx, &quote.vehicle, &quote.params)?;

    let output = with_metadata(
        "Depreciation plus rent charge on the adjusted capitalized cost, taxed per dealer method",
        &quote.params,
        result.warnings.clone(),
        elapsed_us(start),
        result,
    );
    Ok(serde_json::to_value(output)?)
}
