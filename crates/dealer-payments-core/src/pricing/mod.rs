pub mod disclaimer;
pub mod down_payment;
pub mod incentives;
pub mod rounding;

pub use disclaimer::{FinanceDisclaimer, LeaseDisclaimer, PRICE_UNAVAILABLE};
pub use down_payment::resolve_down_payment;
pub use incentives::{override_incentives, sum_incentives};
pub use rounding::{round_payment, RoundingMethod};
