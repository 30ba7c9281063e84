use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::calculators::{calculate, CalculationContext, CalculationRequest};
use crate::pricing::rounding::round_whole;
use crate::types::{CalculationType, Money, PaymentResult, Vehicle};
use crate::EngineResult;

/// Outcome for one vehicle in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub vin: String,
    pub stock_number: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_at_signing: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculation: Option<PaymentResult>,
}

impl BatchItemResult {
    /// Capture a calculation outcome. Errors become a failed row.
    pub fn from_outcome(vehicle: &Vehicle, outcome: EngineResult<PaymentResult>) -> Self {
        match outcome {
            Ok(result) => BatchItemResult {
                vin: vehicle.vin.clone(),
                stock_number: vehicle.stock_no.clone(),
                success: true,
                payment: Some(result.payment),
                total_at_signing: Some(result.total_at_signing),
                error: None,
                calculation: Some(result),
            },
            Err(e) => {
                warn!(vin = %vehicle.vin, error = %e, "batch calculation failed");
                Self::failed(vehicle, e.to_string())
            }
        }
    }

    pub fn failed(vehicle: &Vehicle, error: impl Into<String>) -> Self {
        BatchItemResult {
            vin: vehicle.vin.clone(),
            stock_number: vehicle.stock_no.clone(),
            success: false,
            payment: None,
            total_at_signing: None,
            error: Some(error.into()),
            calculation: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    #[serde(rename = "type")]
    pub calculation_type: CalculationType,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Mean of the positive successful payments, rounded to a whole unit
    pub average_payment: Money,
    pub results: Vec<BatchItemResult>,
}

/// Calculate every vehicle independently. A failure is recorded on its row
/// and never stops the rest of the batch.
pub fn run_batch(ctx: &CalculationContext<'_>, vehicles: &[Vehicle], request: &CalculationRequest) -> BatchSummary {
    let results = vehicles
        .iter()
        .map(|v| BatchItemResult::from_outcome(v, calculate(ctx, v, request)))
        .collect();
    summarize(request.calculation_type(), results)
}

/// Aggregate per-vehicle outcomes into a summary.
///
/// Vehicles that priced to zero (no usable price) count as successful but are
/// left out of the average.
pub fn summarize(calculation_type: CalculationType, results: Vec<BatchItemResult>) -> BatchSummary {
    let successful = results.iter().filter(|r| r.success).count();
    let priced: Vec<Money> = results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| r.payment)
        .filter(|p| *p > Decimal::ZERO)
        .collect();
    let average_payment = if priced.is_empty() {
        Decimal::ZERO
    } else {
        round_whole(priced.iter().copied().sum::<Money>() / Decimal::from(priced.len()))
    };

    BatchSummary {
        calculation_type,
        total: results.len(),
        successful,
        failed: results.len() - successful,
        average_payment,
        results,
    }
}
