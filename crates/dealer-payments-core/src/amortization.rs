use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::PaymentError;
use crate::types::{Money, MoneyFactor, Percent, Rate, TermMonths};
use crate::EngineResult;

const MONTHS_PER_YEAR: Decimal = dec!(12);
const MONEY_FACTOR_DIVISOR: Decimal = dec!(2400);

/// Monthly periodic rate for an APR expressed in percent
pub fn monthly_rate(apr: Percent) -> Rate {
    apr / dec!(100) / MONTHS_PER_YEAR
}

/// Lease money factor equivalent of an APR (APR / 2400)
pub fn apr_to_money_factor(apr: Percent) -> MoneyFactor {
    apr / MONEY_FACTOR_DIVISOR
}

/// APR equivalent of a lease money factor
pub fn money_factor_to_apr(money_factor: MoneyFactor) -> Percent {
    money_factor * MONEY_FACTOR_DIVISOR
}

/// Level monthly payment that fully amortizes `principal` over `term` months.
///
/// `P * r(1+r)^n / ((1+r)^n - 1)` for a nonzero monthly rate, `P / n` otherwise.
pub fn level_payment(principal: Money, apr: Percent, term: TermMonths) -> EngineResult<Money> {
    if term == 0 {
        return Err(PaymentError::InvalidInput {
            field: "term".into(),
            reason: "Number of months must be > 0".into(),
        });
    }
    if apr < Decimal::ZERO {
        return Err(PaymentError::InvalidInput {
            field: "apr".into(),
            reason: "APR must be non-negative".into(),
        });
    }

    let n = Decimal::from(term);
    let r = monthly_rate(apr);
    if r.is_zero() {
        return Ok(principal / n);
    }

    let factor = (Decimal::ONE + r)
        .checked_powi(i64::from(term))
        .ok_or_else(|| PaymentError::Overflow {
            context: format!("(1 + r)^{term} in level payment"),
        })?;
    let denominator = factor - Decimal::ONE;
    if denominator.is_zero() {
        return Err(PaymentError::DivisionByZero {
            context: "level payment annuity factor".into(),
        });
    }

    r.checked_mul(factor)
        .and_then(|rf| principal.checked_mul(rf))
        .and_then(|numerator| numerator.checked_div(denominator))
        .ok_or_else(|| PaymentError::Overflow {
            context: "level payment numerator".into(),
        })
}
