use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::rounding::round_whole;
use crate::settings::{DownPaymentConfig, DownPaymentKind};
use crate::types::{Money, PricingBasis, Vehicle};

/// Concrete down payment for a vehicle.
///
/// A percentage policy is taken of the MSRP (selling price when MSRP is
/// missing) or of the selling price, and rounded to a whole unit. With no
/// policy the flat dealer default applies. Never negative.
pub fn resolve_down_payment(config: Option<&DownPaymentConfig>, default: Money, vehicle: &Vehicle) -> Money {
    let amount = match config {
        None => default,
        Some(cfg) => match cfg.kind {
            DownPaymentKind::Fixed => cfg.value,
            DownPaymentKind::Percentage => {
                let basis = match cfg.based_on {
                    PricingBasis::Msrp => vehicle.sticker_price(),
                    PricingBasis::Selling => vehicle.selling_price(),
                };
                round_whole(basis * cfg.value / dec!(100))
            }
        },
    };
    amount.max(Decimal::ZERO)
}
