pub mod fallback;
pub mod matching;
pub mod records;

#[cfg(feature = "service")]
pub mod cache;

pub use fallback::{resolve_apr, resolve_money_factor, resolve_residual_percent, RateLookup, ResolvedRate};
pub use matching::{find_best_rate, rates_for_model};
pub use records::{sample_records, ManufacturerRateRecord, RateMatch};
