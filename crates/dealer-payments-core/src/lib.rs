pub mod amortization;
pub mod error;
pub mod pricing;
pub mod rates;
pub mod settings;
pub mod types;

#[cfg(feature = "calculators")]
pub mod calculators;

#[cfg(feature = "batch")]
pub mod batch;

#[cfg(feature = "service")]
pub mod service;

pub use error::PaymentError;
pub use types::*;

/// Standard result type for all engine operations.
pub type EngineResult<T> = Result<T, PaymentError>;
