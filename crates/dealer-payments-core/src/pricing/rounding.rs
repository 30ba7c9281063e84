use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Granularity of the advertised monthly payment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingMethod {
    #[serde(rename = "nearest1")]
    Nearest1,
    #[default]
    #[serde(rename = "nearest5")]
    Nearest5,
    #[serde(rename = "nearest10")]
    Nearest10,
}

impl RoundingMethod {
    pub fn step(self) -> Decimal {
        match self {
            RoundingMethod::Nearest1 => Decimal::ONE,
            RoundingMethod::Nearest5 => dec!(5),
            RoundingMethod::Nearest10 => dec!(10),
        }
    }
}

/// Round half-up to a whole currency unit.
pub fn round_whole(amount: Money) -> Money {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Round half-up to the cent.
pub fn round_cents(amount: Money) -> Money {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a final monthly payment to the display granularity. Only the
/// advertised payment goes through here; intermediate amounts stay exact.
pub fn round_payment(amount: Money, method: RoundingMethod) -> Money {
    let step = method.step();
    round_whole(amount / step) * step
}
