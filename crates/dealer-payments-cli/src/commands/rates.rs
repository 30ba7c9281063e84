use std::time::Instant;

use clap::Args;
use serde::Serialize;
use serde_json::Value;

use dealer_payments_core::amortization::apr_to_money_factor;
use dealer_payments_core::rates::{find_best_rate, rates_for_model, ManufacturerRateRecord, RateMatch};
use dealer_payments_core::{with_metadata, MoneyFactor, VehicleBuild};

use super::{elapsed_us, DealerOptions};

/// Arguments for a manufacturer rate lookup
#[derive(Args)]
pub struct BestRateArgs {
    /// Model year
    #[arg(long)]
    pub year: i32,

    /// Make, e.g. Ford
    #[arg(long)]
    pub make: String,

    /// Model, e.g. Escape
    #[arg(long)]
    pub model: String,

    /// Trim, used to prefer trim-specific offers
    #[arg(long, default_value = "")]
    pub trim: String,

    /// Requested term in months
    #[arg(long, default_value_t = 60)]
    pub term: u32,

    /// Also list every offer on file for the model line
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct BestRateOutput {
    vehicle: String,
    term: u32,
    found: bool,
    #[serde(flatten)]
    best: Option<RateMatch>,
    /// Lease equivalent of the offer APR
    #[serde(skip_serializing_if = "Option::is_none")]
    money_factor: Option<MoneyFactor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    offers: Vec<ManufacturerRateRecord>,
}

pub fn run_best_rate(args: BestRateArgs, opts: &DealerOptions) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let records = opts.rate_records()?;
    let build = VehicleBuild {
        year: args.year,
        make: args.make,
        model: args.model,
        trim: args.trim,
        ..Default::default()
    };
    let as_of = opts.pricing_date();

    let best = find_best_rate(&records, &build, args.term, as_of);
    let offers = if args.all {
        rates_for_model(&records, build.year, &build.make, &build.model)
            .into_iter()
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    let mut warnings = Vec::new();
    if best.is_none() {
        warnings.push(format!(
            "No manufacturer offer for {} {} {} at {} months on {}; dealer fallback rates apply",
            build.year, build.make, build.model, args.term, as_of
        ));
    }
    let output = BestRateOutput {
        vehicle: format!("{} {} {} {}", build.year, build.make, build.model, build.trim)
            .trim_end()
            .to_string(),
        term: args.term,
        found: best.is_some(),
        money_factor: best.as_ref().map(|b| apr_to_money_factor(b.rate)),
        best,
        offers,
    };

    let assumptions = serde_json::json!({
        "as_of": as_of,
        "records_loaded": records.len(),
    });
    Ok(serde_json::to_value(with_metadata(
        "Lowest qualifying manufacturer APR, trim-specific offers first",
        &assumptions,
        warnings,
        elapsed_us(start),
        output,
    ))?)
}
