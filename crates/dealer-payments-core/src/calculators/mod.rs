//! Finance and lease calculators.
//!
//! Both calculators are pure functions of a [`CalculationContext`], a vehicle
//! and per-call parameters. Nothing is retained between calls: which rate was
//! used and where it came from travel back in the [`PaymentResult`].

pub mod finance;
pub mod lease;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;
use crate::pricing::disclaimer::PRICE_UNAVAILABLE;
use crate::pricing::incentives::{override_incentives, sum_incentives, validate_incentives};
use crate::pricing::rounding::{round_payment, RoundingMethod};
use crate::rates::records::ManufacturerRateRecord;
use crate::settings::DealerSettings;
use crate::types::{
    CalculationType, CreditTier, Money, PaymentBreakdown, PaymentResult, TermMonths, Vehicle, MAX_AMOUNT,
};
use crate::EngineResult;

pub use finance::calculate_finance;
pub use lease::calculate_lease;

pub const DEFAULT_FINANCE_TERM: TermMonths = 72;
pub const DEFAULT_LEASE_TERM: TermMonths = 36;
pub const DEFAULT_ANNUAL_MILES: u32 = 12_000;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Everything a calculation reads besides the vehicle: the dealer snapshot,
/// the manufacturer records in effect, and the pricing date.
#[derive(Debug, Clone, Copy)]
pub struct CalculationContext<'a> {
    pub settings: &'a DealerSettings,
    pub rates: &'a [ManufacturerRateRecord],
    pub as_of: NaiveDate,
}

impl<'a> CalculationContext<'a> {
    pub fn new(settings: &'a DealerSettings, rates: &'a [ManufacturerRateRecord], as_of: NaiveDate) -> Self {
        Self { settings, rates, as_of }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceParams {
    /// Resolved from the dealer down-payment policy when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down_payment: Option<Money>,
    pub trade_value: Money,
    /// Model override term, else 72
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<TermMonths>,
    /// Dealer default tier when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_tier: Option<CreditTier>,
    pub include_incentives: bool,
}

impl Default for FinanceParams {
    fn default() -> Self {
        Self {
            down_payment: None,
            trade_value: Decimal::ZERO,
            term: None,
            credit_tier: None,
            include_incentives: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down_payment: Option<Money>,
    /// Model override term, else 36
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<TermMonths>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_miles: Option<u32>,
    pub include_incentives: bool,
}

impl Default for LeaseParams {
    fn default() -> Self {
        Self {
            down_payment: None,
            term: None,
            annual_miles: None,
            include_incentives: true,
        }
    }
}

/// A calculation type together with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CalculationRequest {
    Finance(FinanceParams),
    Lease(LeaseParams),
}

impl CalculationRequest {
    pub fn calculation_type(&self) -> CalculationType {
        match self {
            CalculationRequest::Finance(_) => CalculationType::Finance,
            CalculationRequest::Lease(_) => CalculationType::Lease,
        }
    }
}

impl Default for CalculationRequest {
    fn default() -> Self {
        CalculationRequest::Finance(FinanceParams::default())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run the calculator selected by `request`.
pub fn calculate(
    ctx: &CalculationContext<'_>,
    vehicle: &Vehicle,
    request: &CalculationRequest,
) -> EngineResult<PaymentResult> {
    match request {
        CalculationRequest::Finance(params) => calculate_finance(ctx, vehicle, params),
        CalculationRequest::Lease(params) => calculate_lease(ctx, vehicle, params),
    }
}

// ---------------------------------------------------------------------------
// Shared steps
// ---------------------------------------------------------------------------

/// Rejects malformed vehicle data. Missing prices are not malformed.
pub(crate) fn validate_vehicle(vehicle: &Vehicle) -> EngineResult<()> {
    validate_amount("price", vehicle.price)?;
    validate_amount("msrp", vehicle.msrp)?;
    validate_incentives(&vehicle.eligible_incentives)
}

pub(crate) fn validate_term(term: TermMonths) -> EngineResult<()> {
    if term == 0 {
        return Err(PaymentError::invalid("term", "Term must be at least one month"));
    }
    Ok(())
}

/// Amounts must lie in `0..=MAX_AMOUNT`.
pub(crate) fn validate_amount(field: &str, amount: Option<Money>) -> EngineResult<()> {
    match amount {
        Some(a) if a < Decimal::ZERO => Err(PaymentError::invalid(field, "Must be non-negative")),
        Some(a) if a > MAX_AMOUNT => Err(PaymentError::invalid(field, format!("Must not exceed {MAX_AMOUNT}"))),
        _ => Ok(()),
    }
}

/// Vehicle incentives plus those contributed by an active model override.
pub(crate) fn applicable_incentives(
    settings: &DealerSettings,
    vehicle: &Vehicle,
    calculation: CalculationType,
) -> EngineResult<Money> {
    let from_vehicle = sum_incentives(&vehicle.eligible_incentives, calculation);
    let from_override = match settings.active_override(&vehicle.build) {
        Some(ovr) => {
            let extra = override_incentives(ovr, calculation);
            validate_incentives(&extra)?;
            sum_incentives(&extra, calculation)
        }
        None => Decimal::ZERO,
    };
    checked_sum("incentives", [from_vehicle, from_override])
}

/// Adds amounts, reporting `Overflow` for `context` instead of panicking.
pub(crate) fn checked_sum<I>(context: &str, amounts: I) -> EngineResult<Money>
where
    I: IntoIterator<Item = Money>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
        .ok_or_else(|| PaymentError::overflow(context))
}

pub(crate) fn checked_product(context: &str, a: Decimal, b: Decimal) -> EngineResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| PaymentError::overflow(context))
}

/// Advertised payment for a raw monthly figure. Payments above `MAX_AMOUNT`
/// only come out of runaway dealer settings and are refused.
pub(crate) fn advertised_payment(raw: Money, method: RoundingMethod) -> EngineResult<Money> {
    if raw > MAX_AMOUNT {
        return Err(PaymentError::overflow("monthly payment"));
    }
    Ok(round_payment(raw, method))
}

/// Zero-payment result for a vehicle without a usable price.
pub(crate) fn unpriced_result(calculation: CalculationType, term: TermMonths, annual_miles: Option<u32>) -> PaymentResult {
    PaymentResult {
        calculation_type: calculation,
        payment: Decimal::ZERO,
        term,
        apr: (calculation == CalculationType::Finance).then_some(Decimal::ZERO),
        money_factor: None,
        annual_miles,
        total_at_signing: Decimal::ZERO,
        amount_financed: (calculation == CalculationType::Finance).then_some(Decimal::ZERO),
        residual_value: (calculation == CalculationType::Lease).then_some(Decimal::ZERO),
        total_price: Some(Decimal::ZERO),
        incentives_saved: Decimal::ZERO,
        disclaimer: PRICE_UNAVAILABLE.to_string(),
        has_manufacturer_rate: false,
        rate_source: None,
        breakdown: PaymentBreakdown::default(),
        warnings: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tagged_by_type() {
        let req: CalculationRequest = serde_json::from_str(r#"{ "type": "lease", "term": 39 }"#).unwrap();
        match req {
            CalculationRequest::Lease(p) => {
                assert_eq!(p.term, Some(39));
                assert!(p.include_incentives);
            }
            other => panic!("expected lease, got {other:?}"),
        }
        let req: CalculationRequest = serde_json::from_str(r#"{ "type": "finance" }"#).unwrap();
        assert_eq!(req.calculation_type(), CalculationType::Finance);
    }

    #[test]
    fn test_negative_price_is_malformed() {
        let v = Vehicle {
            vin: "BAD".into(),
            price: Some(Decimal::NEGATIVE_ONE),
            ..Default::default()
        };
        assert!(validate_vehicle(&v).is_err());
        assert!(validate_vehicle(&Vehicle::default()).is_ok());
    }

    #[test]
    fn test_price_above_ceiling_is_malformed() {
        let v = Vehicle {
            vin: "HUGE".into(),
            msrp: Some(Decimal::MAX),
            ..Default::default()
        };
        let err = validate_vehicle(&v).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidInput { ref field, .. } if field == "msrp"));
    }

    #[test]
    fn test_checked_sum_reports_overflow() {
        assert_eq!(checked_sum("fees", [Decimal::ONE, Decimal::from(2)]).unwrap(), Decimal::from(3));
        let err = checked_sum("fees", [Decimal::MAX, Decimal::ONE]).unwrap_err();
        assert!(matches!(err, PaymentError::Overflow { ref context } if context == "fees"));
    }

    #[test]
    fn test_unpriced_result_shape() {
        let r = unpriced_result(CalculationType::Lease, 36, Some(12_000));
        assert_eq!(r.payment, Decimal::ZERO);
        assert_eq!(r.disclaimer, PRICE_UNAVAILABLE);
        assert!(r.apr.is_none());
        assert_eq!(r.residual_value, Some(Decimal::ZERO));
    }
}
