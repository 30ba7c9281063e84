use rust_decimal::Decimal;
use tracing::debug;

use super::{
    advertised_payment, applicable_incentives, checked_product, checked_sum, unpriced_result,
    validate_amount, validate_term, validate_vehicle, CalculationContext, FinanceParams, DEFAULT_FINANCE_TERM,
};
use crate::amortization::level_payment;
use crate::error::PaymentError;
use crate::pricing::disclaimer::FinanceDisclaimer;
use crate::pricing::down_payment::resolve_down_payment;
use crate::pricing::rounding::{round_cents, round_whole};
use crate::rates::fallback::{resolve_apr, RateLookup};
use crate::types::{CalculationType, PaymentBreakdown, PaymentResult, Vehicle};
use crate::EngineResult;

/// Estimated monthly finance payment for a vehicle.
///
/// Price → incentives → fees → tax → amount financed → APR → level payment.
/// A vehicle without a usable price yields a zero-payment result rather
/// than an error.
pub fn calculate_finance(
    ctx: &CalculationContext<'_>,
    vehicle: &Vehicle,
    params: &FinanceParams,
) -> EngineResult<PaymentResult> {
    let settings = ctx.settings;
    let finance = &settings.finance;
    let fees = &settings.fees;

    validate_vehicle(vehicle)?;
    validate_amount("trade_value", Some(params.trade_value))?;

    let finance_override = settings
        .active_override(&vehicle.build)
        .and_then(|o| o.finance_override.as_ref());
    let term = params
        .term
        .or_else(|| finance_override.and_then(|f| f.term))
        .unwrap_or(DEFAULT_FINANCE_TERM);
    validate_term(term)?;
    let tier = params.credit_tier.unwrap_or(finance.default_credit_tier);

    let down_payment = params.down_payment.unwrap_or_else(|| {
        resolve_down_payment(finance.down_payment.as_ref(), finance.default_down_payment, vehicle)
    });
    validate_amount("down_payment", Some(down_payment))?;

    let vehicle_price = vehicle.basis_price(finance.pricing_basis);
    if vehicle_price <= Decimal::ZERO {
        debug!(vin = %vehicle.vin, "no usable price, returning zero finance payment");
        return Ok(unpriced_result(CalculationType::Finance, term, None));
    }

    // Sale price, fees and tax
    let incentives = if params.include_incentives {
        applicable_incentives(settings, vehicle, CalculationType::Finance)?
    } else {
        Decimal::ZERO
    };
    let sale_price = vehicle_price - incentives;
    let custom_fees = fees
        .custom_fee_total()
        .ok_or_else(|| PaymentError::overflow("custom fees"))?;
    let taxable_amount = checked_sum(
        "taxable amount",
        [sale_price, fees.doc_fee, fees.electronic_filing, custom_fees],
    )?;
    let tax_rate = fees
        .combined_tax_rate()
        .ok_or_else(|| PaymentError::overflow("combined tax rate"))?;
    let sales_tax = checked_product("sales tax", taxable_amount, tax_rate)?;
    let total_amount = checked_sum("total amount", [taxable_amount, sales_tax])?;

    let mut warnings = Vec::new();
    let mut amount_financed = total_amount - down_payment - params.trade_value;
    if amount_financed < Decimal::ZERO {
        warnings.push("Down payment and trade value exceed the total amount; nothing is financed".to_string());
        amount_financed = Decimal::ZERO;
    }

    // Rate and payment
    let lookup = RateLookup {
        settings,
        records: ctx.rates,
        build: &vehicle.build,
        term,
        as_of: ctx.as_of,
    };
    let apr = resolve_apr(&lookup, tier);
    let raw_payment = level_payment(amount_financed, apr.value, term)?;
    let payment = advertised_payment(raw_payment, settings.display.rounding_method)?;

    let signing_tax = checked_product("signing tax", finance.signing_tax_share, sales_tax)?;
    let total_at_signing = checked_sum("total at signing", [down_payment, fees.doc_fee, signing_tax])?;

    let disclaimer = match &apr.manufacturer {
        Some(offer) if !offer.disclaimer.trim().is_empty() => offer.disclaimer.clone(),
        offer => FinanceDisclaimer {
            payment,
            term,
            apr: apr.value,
            down_payment,
            total_at_signing,
            program_name: offer.as_ref().and_then(|o| o.program_name.as_deref()),
            as_of: ctx.as_of,
        }
        .render(),
    };

    debug!(
        vin = %vehicle.vin,
        %payment,
        apr = %apr.value,
        source = ?apr.source,
        "finance payment calculated"
    );

    Ok(PaymentResult {
        calculation_type: CalculationType::Finance,
        payment,
        term,
        apr: Some(apr.value),
        money_factor: None,
        annual_miles: None,
        total_at_signing: round_whole(total_at_signing),
        amount_financed: Some(round_whole(amount_financed)),
        residual_value: None,
        total_price: Some(round_whole(total_amount)),
        incentives_saved: round_whole(incentives),
        disclaimer,
        has_manufacturer_rate: apr.is_manufacturer(),
        rate_source: Some(apr.source),
        breakdown: PaymentBreakdown {
            vehicle_price: round_whole(vehicle_price),
            incentives: round_whole(incentives),
            sale_price: round_whole(sale_price),
            doc_fee: round_whole(fees.doc_fee),
            electronic_filing: round_whole(fees.electronic_filing),
            custom_fees: round_whole(custom_fees),
            sales_tax: round_whole(sales_tax),
            total_amount: round_whole(total_amount),
            down_payment: round_whole(down_payment),
            payment_before_rounding: round_cents(raw_payment),
            trade_value: Some(round_whole(params.trade_value)),
            amount_financed: Some(round_whole(amount_financed)),
            ..Default::default()
        },
        warnings,
    })
}
