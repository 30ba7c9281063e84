use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use super::{
    advertised_payment, applicable_incentives, checked_product, checked_sum, unpriced_result,
    validate_amount, validate_term, validate_vehicle, CalculationContext, LeaseParams, DEFAULT_ANNUAL_MILES,
    DEFAULT_LEASE_TERM,
};
use crate::error::PaymentError;
use crate::pricing::disclaimer::LeaseDisclaimer;
use crate::pricing::down_payment::resolve_down_payment;
use crate::pricing::rounding::{round_cents, round_whole};
use crate::rates::fallback::{resolve_money_factor, resolve_residual_percent, RateLookup};
use crate::settings::LeaseTaxMethod;
use crate::types::{CalculationType, Money, MoneyFactor, PaymentBreakdown, PaymentResult, Rate, TermMonths, Vehicle};
use crate::EngineResult;

/// Monthly depreciation and rent charge on an adjusted capitalized cost.
#[derive(Debug, Clone, Copy)]
struct LeaseCharges {
    depreciation: Money,
    finance_charge: Money,
    base_payment: Money,
    /// Depreciation plus rent charge came out negative
    floored: bool,
}

fn lease_charges(
    adjusted_cap_cost: Money,
    residual: Money,
    money_factor: MoneyFactor,
    term: TermMonths,
) -> EngineResult<LeaseCharges> {
    let depreciable = adjusted_cap_cost
        .checked_sub(residual)
        .ok_or_else(|| PaymentError::overflow("depreciation"))?;
    let depreciation = depreciable / Decimal::from(term);
    let rent_base = checked_sum("rent charge base", [adjusted_cap_cost, residual])?;
    let finance_charge = checked_product("rent charge", rent_base, money_factor)?;
    let charges = checked_sum("base payment", [depreciation, finance_charge])?;
    Ok(LeaseCharges {
        depreciation,
        finance_charge,
        base_payment: charges.max(Decimal::ZERO),
        floored: charges < Decimal::ZERO,
    })
}

/// How lease tax lands on the payment.
#[derive(Debug, Clone, Copy, Default)]
struct LeaseTax {
    /// Added to each monthly payment
    monthly: Money,
    /// Collected at signing
    upfront: Money,
    /// Rolled into the adjusted capitalized cost
    capitalized: Money,
}

impl LeaseTax {
    fn total(&self, term: TermMonths) -> EngineResult<Money> {
        let monthly = checked_product("lease tax", self.monthly, Decimal::from(term))?;
        checked_sum("lease tax", [monthly, self.upfront, self.capitalized])
    }
}

/// Estimated monthly lease payment for a vehicle.
///
/// Gross cap cost is the selling figure plus acquisition fee; down payment
/// and incentives reduce it. The residual is taken on the MSRP, or the
/// selling price when the MSRP is missing.
pub fn calculate_lease(
    ctx: &CalculationContext<'_>,
    vehicle: &Vehicle,
    params: &LeaseParams,
) -> EngineResult<PaymentResult> {
    let settings = ctx.settings;
    let lease = &settings.lease;
    let fees = &settings.fees;

    validate_vehicle(vehicle)?;

    let lease_override = settings
        .active_override(&vehicle.build)
        .and_then(|o| o.lease_override.as_ref());
    let term = params
        .term
        .or_else(|| lease_override.and_then(|l| l.term))
        .unwrap_or(DEFAULT_LEASE_TERM);
    validate_term(term)?;
    let annual_miles = params.annual_miles.unwrap_or(DEFAULT_ANNUAL_MILES);

    let down_payment = params.down_payment.unwrap_or_else(|| {
        resolve_down_payment(lease.down_payment.as_ref(), lease.default_down_payment, vehicle)
    });
    validate_amount("down_payment", Some(down_payment))?;

    let selling_price = vehicle.basis_price(lease.pricing_basis);
    if selling_price <= Decimal::ZERO {
        debug!(vin = %vehicle.vin, "no usable price, returning zero lease payment");
        return Ok(unpriced_result(CalculationType::Lease, term, Some(annual_miles)));
    }

    let incentives = if params.include_incentives {
        applicable_incentives(settings, vehicle, CalculationType::Lease)?
    } else {
        Decimal::ZERO
    };

    // Residual and money factor
    let residual_percent = resolve_residual_percent(settings, &vehicle.build, term);
    let residual_value =
        checked_product("residual value", vehicle.sticker_price(), residual_percent.value)? / dec!(100);
    let lookup = RateLookup {
        settings,
        records: ctx.rates,
        build: &vehicle.build,
        term,
        as_of: ctx.as_of,
    };
    let money_factor = resolve_money_factor(&lookup);

    // Capitalized cost
    let gross_cap_cost = checked_sum("gross capitalized cost", [selling_price, lease.acquisition_fee])?;
    let cap_cost_reduction = checked_sum("capitalized cost reduction", [down_payment, incentives])?;
    let mut adjusted_cap_cost = gross_cap_cost - cap_cost_reduction;

    let tax_rate = fees
        .combined_tax_rate()
        .ok_or_else(|| PaymentError::overflow("combined tax rate"))?;
    let mut charges = lease_charges(adjusted_cap_cost, residual_value, money_factor.value, term)?;
    let tax = match lease.tax_method {
        LeaseTaxMethod::Monthly => LeaseTax {
            monthly: checked_product("monthly lease tax", charges.base_payment, tax_rate)?,
            ..Default::default()
        },
        LeaseTaxMethod::Upfront => LeaseTax {
            upfront: over_term(charges.base_payment, tax_rate, term)?,
            ..Default::default()
        },
        LeaseTaxMethod::Capitalized => {
            let capitalized = over_term(charges.base_payment, tax_rate, term)?;
            adjusted_cap_cost = checked_sum("adjusted capitalized cost", [adjusted_cap_cost, capitalized])?;
            charges = lease_charges(adjusted_cap_cost, residual_value, money_factor.value, term)?;
            LeaseTax {
                capitalized,
                ..Default::default()
            }
        }
    };

    let mut warnings = Vec::new();
    if charges.floored {
        warnings.push("Capitalized cost reduction exceeds the lease charges; base payment floored at zero".to_string());
    }

    let raw_payment = checked_sum("lease payment", [charges.base_payment, tax.monthly])?;
    let payment = advertised_payment(raw_payment, settings.display.rounding_method)?;

    let signing_fees = checked_sum("signing fees", [fees.doc_fee, fees.electronic_filing])?;
    let total_at_signing = checked_sum("total at signing", [down_payment, payment, signing_fees, tax.upfront])?;
    let payments_over_term = checked_product("total lease cost", payment, Decimal::from(term))?;
    let total_lease_cost = checked_sum("total lease cost", [payments_over_term, down_payment, tax.upfront])?;
    let total_tax = tax.total(term)?;

    let disclaimer = LeaseDisclaimer {
        payment,
        term,
        annual_miles,
        down_payment,
        signing_fees,
        signing_tax: tax.upfront,
        total_at_signing,
        total_lease_cost,
        disposition_fee: lease.disposition_fee,
        excess_mileage_charge: lease.excess_mileage_charge,
        as_of: ctx.as_of,
    }
    .render();

    debug!(
        vin = %vehicle.vin,
        %payment,
        money_factor = %money_factor.value,
        residual_percent = %residual_percent.value,
        source = ?money_factor.source,
        "lease payment calculated"
    );

    Ok(PaymentResult {
        calculation_type: CalculationType::Lease,
        payment,
        term,
        apr: None,
        money_factor: Some(money_factor.value),
        annual_miles: Some(annual_miles),
        total_at_signing: round_whole(total_at_signing),
        amount_financed: None,
        residual_value: Some(round_whole(residual_value)),
        total_price: Some(round_whole(total_lease_cost)),
        incentives_saved: round_whole(incentives),
        disclaimer,
        has_manufacturer_rate: money_factor.is_manufacturer(),
        rate_source: Some(money_factor.source),
        breakdown: PaymentBreakdown {
            vehicle_price: round_whole(selling_price),
            incentives: round_whole(incentives),
            sale_price: round_whole(selling_price - incentives),
            doc_fee: round_whole(fees.doc_fee),
            electronic_filing: round_whole(fees.electronic_filing),
            sales_tax: round_whole(total_tax),
            total_amount: round_whole(total_lease_cost),
            down_payment: round_whole(down_payment),
            payment_before_rounding: round_cents(raw_payment),
            acquisition_fee: Some(round_whole(lease.acquisition_fee)),
            capitalized_cost: Some(round_whole(adjusted_cap_cost)),
            residual_value: Some(round_whole(residual_value)),
            depreciation: Some(round_whole(charges.depreciation)),
            finance_charge: Some(round_whole(charges.finance_charge)),
            ..Default::default()
        },
        warnings,
    })
}

fn over_term(base_payment: Money, tax_rate: Rate, term: TermMonths) -> EngineResult<Money> {
    let monthly = checked_product("lease tax", base_payment, tax_rate)?;
    checked_product("lease tax", monthly, Decimal::from(term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::disclaimer::PRICE_UNAVAILABLE;
    use crate::rates::records::sample_records;
    use crate::settings::{CustomFee, DealerSettings, LeaseOverride, ModelKey, ModelOverride};
    use crate::types::{PricingBasis, RateSource, VehicleBuild};
    use chrono::NaiveDate;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 10).unwrap()
    }

    fn vehicle(make: &str, model: &str, price: Money, msrp: Money) -> Vehicle {
        Vehicle {
            vin: "5FNYG1H40SB000001".into(),
            stock_no: "H2507".into(),
            price: Some(price),
            msrp: Some(msrp),
            build: VehicleBuild {
                year: 2025,
                make: make.into(),
                model: model.into(),
                trim: "EX".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Selling-price basis, 60% residual via override, 0.00175 money factor.
    fn reference_settings() -> DealerSettings {
        let mut settings = DealerSettings::default();
        settings.lease.pricing_basis = PricingBasis::Selling;
        settings.model_overrides.push(ModelOverride {
            id: "ref".into(),
            key: ModelKey {
                year: 2025,
                make: "Ford".into(),
                model: "Edge".into(),
                trim: None,
            },
            active: true,
            finance_override: None,
            lease_override: Some(LeaseOverride {
                residual_percentage: Some(dec!(60)),
                money_factor: Some(dec!(0.00175)),
                ..Default::default()
            }),
            incentives: None,
            notes: None,
        });
        settings
    }

    fn params(down: Money, term: TermMonths) -> LeaseParams {
        LeaseParams {
            down_payment: Some(down),
            term: Some(term),
            ..Default::default()
        }
    }

    #[test]
    fn test_reference_example() {
        let settings = reference_settings();
        let ctx = CalculationContext::new(&settings, &[], as_of());
        let v = vehicle("Ford", "Edge", dec!(28500), dec!(30000));
        let result = calculate_lease(&ctx, &v, &params(dec!(2500), 36)).unwrap();

        let b = &result.breakdown;
        assert_eq!(b.capitalized_cost, Some(dec!(26595)));
        assert_eq!(b.residual_value, Some(dec!(18000)));
        assert_eq!(b.depreciation, Some(dec!(239)));
        assert_eq!(b.finance_charge, Some(dec!(78)));
        // base 316.79125 plus 7.375% monthly tax
        let expected = dec!(316.79125) * dec!(1.07375);
        assert_eq!(b.payment_before_rounding, round_cents(expected));
        assert_eq!(result.payment, dec!(340));
        assert_eq!(result.money_factor, Some(dec!(0.00175)));
        assert_eq!(result.rate_source, Some(RateSource::ModelOverride));
        // 2500 down + 340 first payment + 125 doc + 100 filing
        assert_eq!(result.total_at_signing, dec!(3065));
        assert_eq!(result.total_price, Some(dec!(14740)));
    }

    #[test]
    fn test_disclaimer_contents() {
        let settings = reference_settings();
        let ctx = CalculationContext::new(&settings, &[], as_of());
        let v = vehicle("Ford", "Edge", dec!(28500), dec!(30000));
        let result = calculate_lease(&ctx, &v, &params(dec!(2500), 36)).unwrap();
        assert!(result.disclaimer.contains("$340/mo for 36 months with 12,000 miles/year"));
        assert!(result.disclaimer.contains("Total cost to lessee is $14,740"));
        assert!(result.disclaimer.ends_with("9/30/2025."));
    }

    #[test]
    fn test_honda_tables_and_msrp_basis() {
        let settings = DealerSettings::default();
        let ctx = CalculationContext::new(&settings, &[], as_of());
        let v = vehicle("Honda", "Civic", dec!(27000), dec!(28000));
        let result = calculate_lease(&ctx, &v, &LeaseParams::default()).unwrap();
        assert_eq!(result.term, 36);
        assert_eq!(result.money_factor, Some(dec!(0.00110)));
        // civic 36-month residual is 68% of MSRP
        assert_eq!(result.residual_value, Some(dec!(19040)));
        assert_eq!(result.breakdown.vehicle_price, dec!(28000));
        assert_eq!(result.breakdown.down_payment, dec!(2500));
        assert_eq!(result.rate_source, Some(RateSource::MakeTable));
    }

    #[test]
    fn test_manufacturer_rate_converted() {
        let settings = DealerSettings::default();
        let records = sample_records();
        let ctx = CalculationContext::new(&settings, &records, as_of());
        let v = vehicle("Ford", "Escape", dec!(31000), dec!(32500));
        let result = calculate_lease(&ctx, &v, &params(dec!(2000), 36)).unwrap();
        assert!(result.has_manufacturer_rate);
        assert_eq!(result.money_factor, Some(dec!(2.9) / dec!(2400)));
    }

    #[test]
    fn test_upfront_tax_collected_at_signing() {
        let mut settings = reference_settings();
        settings.lease.tax_method = LeaseTaxMethod::Upfront;
        let ctx = CalculationContext::new(&settings, &[], as_of());
        let v = vehicle("Ford", "Edge", dec!(28500), dec!(30000));
        let result = calculate_lease(&ctx, &v, &params(dec!(2500), 36)).unwrap();
        // base 316.79 rounds to 315; tax over the term is 841.08
        assert_eq!(result.payment, dec!(315));
        assert_eq!(result.breakdown.sales_tax, dec!(841));
        assert_eq!(result.total_at_signing, dec!(3881));
    }

    #[test]
    fn test_capitalized_tax_raises_payment() {
        let mut settings = reference_settings();
        settings.lease.tax_method = LeaseTaxMethod::Capitalized;
        let ctx = CalculationContext::new(&settings, &[], as_of());
        let v = vehicle("Ford", "Edge", dec!(28500), dec!(30000));
        let result = calculate_lease(&ctx, &v, &params(dec!(2500), 36)).unwrap();
        assert!(result.breakdown.payment_before_rounding > dec!(316.79));
        assert_eq!(result.breakdown.capitalized_cost, Some(dec!(27436)));
    }

    #[test]
    fn test_unpriced_lease() {
        let settings = DealerSettings::default();
        let ctx = CalculationContext::new(&settings, &[], as_of());
        let mut v = vehicle("Honda", "Civic", Decimal::ZERO, Decimal::ZERO);
        v.msrp = None;
        let result = calculate_lease(&ctx, &v, &LeaseParams::default()).unwrap();
        assert_eq!(result.payment, Decimal::ZERO);
        assert_eq!(result.disclaimer, PRICE_UNAVAILABLE);
        assert_eq!(result.annual_miles, Some(12_000));
    }

    #[test]
    fn test_large_reduction_floors_payment() {
        let settings = reference_settings();
        let ctx = CalculationContext::new(&settings, &[], as_of());
        let v = vehicle("Ford", "Edge", dec!(28500), dec!(30000));
        let result = calculate_lease(&ctx, &v, &params(dec!(29000), 36)).unwrap();
        assert_eq!(result.payment, Decimal::ZERO);
        assert_eq!(result.warnings.len(), 1);
    }
    #[test]
    fn test_custom_fees_stay_out_of_cap_cost() {
        let mut settings = reference_settings();
        settings.fees.custom_fees.push(CustomFee {
            name: "Window Etch".into(),
            amount: dec!(1000),
            taxable: true,
        });
        let ctx = CalculationContext::new(&settings, &[], as_of());
        let v = vehicle("Ford", "Edge", dec!(28500), dec!(30000));
        let result = calculate_lease(&ctx, &v, &params(dec!(2500), 36)).unwrap();
        assert_eq!(result.breakdown.capitalized_cost, Some(dec!(26595)));
        assert_eq!(result.payment, dec!(340));
    }

    #[test]
    fn test_runaway_acquisition_fee_is_an_overflow_error() {
        let mut settings = reference_settings();
        settings.lease.acquisition_fee = Decimal::MAX;
        let ctx = CalculationContext::new(&settings, &[], as_of());
        let v = vehicle("Ford", "Edge", dec!(28500), dec!(30000));
        let err = calculate_lease(&ctx, &v, &params(dec!(2500), 36)).unwrap_err();
        assert!(matches!(err, PaymentError::Overflow { ref context } if context == "gross capitalized cost"));
    }

    #[test]
    fn test_oversized_msrp_rejected() {
        let settings = reference_settings();
        let ctx = CalculationContext::new(&settings, &[], as_of());
        let v = vehicle("Ford", "Edge", dec!(28500), Decimal::MAX);
        let err = calculate_lease(&ctx, &v, &params(dec!(2500), 36)).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidInput { ref field, .. } if field == "msrp"));
    }
}
