pub mod bulk;
pub mod quote;
pub mod rates;

use chrono::{Local, NaiveDate};
use clap::{Args, ValueEnum};
use dealer_payments_core::rates::{sample_records, ManufacturerRateRecord};
use dealer_payments_core::settings::DealerSettings;
use dealer_payments_core::CreditTier;

use crate::input;

/// Dealer context shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct DealerOptions {
    /// Dealer settings file (.yaml, .yml or .json); built-in defaults when omitted
    #[arg(long, global = true)]
    pub settings: Option<String>,

    /// Pricing date as YYYY-MM-DD; today when omitted
    #[arg(long, global = true)]
    pub as_of: Option<NaiveDate>,

    /// JSON array of manufacturer rate records; sample offers when omitted
    #[arg(long, global = true)]
    pub rates: Option<String>,
}

impl DealerOptions {
    pub fn load_settings(&self) -> Result<DealerSettings, Box<dyn std::error::Error>> {
        input::settings::load_settings(self.settings.as_deref())
    }

    pub fn pricing_date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Manufacturer records for a one-off calculation.
    pub fn rate_records(&self) -> Result<Vec<ManufacturerRateRecord>, Box<dyn std::error::Error>> {
        match &self.rates {
            Some(path) => input::file::read_json(path),
            None => Ok(sample_records()),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TierArg {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl From<TierArg> for CreditTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Excellent => CreditTier::Excellent,
            TierArg::Good => CreditTier::Good,
            TierArg::Fair => CreditTier::Fair,
            TierArg::Poor => CreditTier::Poor,
        }
    }
}

pub(crate) fn elapsed_us(start: std::time::Instant) -> u64 {
    start.elapsed().as_micros() as u64
}
