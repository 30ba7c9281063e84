use std::time::Instant;

use chrono::{Local, NaiveDate};
use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use dealer_payments_core::batch::{run_batch, to_csv_string, BatchSummary};
use dealer_payments_core::calculators::{
    calculate_finance as finance, calculate_lease as lease, CalculationContext, CalculationRequest, FinanceParams,
    LeaseParams,
};
use dealer_payments_core::rates::{find_best_rate as best_rate, sample_records, ManufacturerRateRecord};
use dealer_payments_core::settings::DealerSettings;
use dealer_payments_core::{with_metadata, Vehicle, VehicleBuild};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn elapsed_us(start: Instant) -> u64 {
    start.elapsed().as_micros() as u64
}

// ---------------------------------------------------------------------------
// Request documents
// ---------------------------------------------------------------------------

/// Dealer snapshot carried by every request under `"dealer"`. Omitted
/// settings fall back to the built-in dealer, omitted rates to the sample
/// offers, and an omitted date to today.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DealerContext {
    settings: DealerSettings,
    rates: Option<Vec<ManufacturerRateRecord>>,
    as_of: Option<NaiveDate>,
}

impl DealerContext {
    fn resolve(self) -> NapiResult<(DealerSettings, Vec<ManufacturerRateRecord>, NaiveDate)> {
        self.settings.validate().map_err(to_napi_error)?;
        let as_of = self.as_of.unwrap_or_else(|| Local::now().date_naive());
        Ok((self.settings, self.rates.unwrap_or_else(sample_records), as_of))
    }
}

#[derive(Debug, Deserialize)]
struct FinanceRequest {
    #[serde(default)]
    dealer: DealerContext,
    vehicle: Vehicle,
    #[serde(default)]
    params: FinanceParams,
}

#[derive(Debug, Deserialize)]
struct LeaseRequest {
    #[serde(default)]
    dealer: DealerContext,
    vehicle: Vehicle,
    #[serde(default)]
    params: LeaseParams,
}

#[derive(Debug, Deserialize)]
struct BulkRequest {
    #[serde(default)]
    dealer: DealerContext,
    vehicles: Vec<Vehicle>,
    /// `{"type": "finance" | "lease", ...params}`
    #[serde(default)]
    request: CalculationRequest,
}

#[derive(Debug, Deserialize)]
struct BestRateRequest {
    #[serde(default)]
    dealer: DealerContext,
    build: VehicleBuild,
    term: u32,
}

fn parse<T: for<'de> Deserialize<'de>>(input_json: &str) -> NapiResult<T> {
    serde_json::from_str(input_json).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Single vehicle
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_finance(input_json: String) -> NapiResult<String> {
    let start = Instant::now();
    let input: FinanceRequest = parse(&input_json)?;
    let (settings, rates, as_of) = input.dealer.resolve()?;
    let ctx = CalculationContext::new(&settings, &rates, as_of);
    let result = finance(&ctx, &input.vehicle, &input.params).map_err(to_napi_error)?;
    let output = with_metadata(
        "Level monthly payment amortizing the amount financed at the resolved APR",
        &input.params,
        result.warnings.clone(),
        elapsed_us(start),
        result,
    );
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_lease(input_json: String) -> NapiResult<String> {
    let start = Instant::now();
    let input: LeaseRequest = parse(&input_json)?;
    let (settings, rates, as_of) = input.dealer.resolve()?;
    let ctx = CalculationContext::new(&settings, &rates, as_of);
    let result = lease(&ctx, &input.vehicle, &input.params).map_err(to_napi_error)?;
    let output = with_metadata(
        "Depreciation plus rent charge on the adjusted capitalized cost, taxed per dealer method",
        &input.params,
        result.warnings.clone(),
        elapsed_us(start),
        result,
    );
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

fn bulk_summary(input_json: &str) -> NapiResult<(BatchSummary, CalculationRequest)> {
    let input: BulkRequest = parse(input_json)?;
    let (settings, rates, as_of) = input.dealer.resolve()?;
    let ctx = CalculationContext::new(&settings, &rates, as_of);
    Ok((run_batch(&ctx, &input.vehicles, &input.request), input.request))
}

#[napi]
pub fn calculate_bulk(input_json: String) -> NapiResult<String> {
    let start = Instant::now();
    let (summary, request) = bulk_summary(&input_json)?;
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
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Same input as `calculate_bulk`; returns the dealer CSV export.
#[napi]
pub fn export_bulk_csv(input_json: String) -> NapiResult<String> {
    let (summary, _) = bulk_summary(&input_json)?;
    to_csv_string(&summary).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Rates
// ---------------------------------------------------------------------------

/// Best manufacturer offer as JSON, or `null` when nothing qualifies.
#[napi]
pub fn find_best_rate(input_json: String) -> NapiResult<String> {
    let input: BestRateRequest = parse(&input_json)?;
    let (_, rates, as_of) = input.dealer.resolve()?;
    let best = best_rate(&rates, &input.build, input.term, as_of);
    serde_json::to_string(&best).map_err(to_napi_error)
}
