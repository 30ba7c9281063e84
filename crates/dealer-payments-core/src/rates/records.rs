//! Manufacturer incentive-rate records as delivered by the feed collaborator,
//! already decoded into a flat list.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{IncentiveType, Percent, TermMonths};

/// One manufacturer offer row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturerRateRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub year: String,
    pub make: String,
    pub model: String,
    /// Empty means the offer covers every trim
    #[serde(default)]
    pub trim: String,
    pub incentive_type: IncentiveType,
    /// APR in percent, string-encoded as in the feed
    pub rate: String,
    /// Maximum eligible term unless the headline states a range
    pub term: TermMonths,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<NaiveDate>,
    pub valid_through: NaiveDate,
    #[serde(default)]
    pub offer_headline: String,
    #[serde(default)]
    pub disclaimer: String,
    #[serde(default)]
    pub program_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
}

impl ManufacturerRateRecord {
    /// The numeric APR, or `None` when the feed value is not a number.
    pub fn parsed_rate(&self) -> Option<Percent> {
        Decimal::from_str(self.rate.trim()).ok()
    }

    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        date <= self.valid_through
    }
}

/// The manufacturer offer selected for a vehicle and term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateMatch {
    pub rate: Percent,
    pub term: TermMonths,
    pub disclaimer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
    pub expiration_date: String,
}

impl RateMatch {
    pub(crate) fn from_record(record: &ManufacturerRateRecord, rate: Percent) -> Self {
        let program_name = Some(record.program_name.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        RateMatch {
            rate,
            term: record.term,
            disclaimer: record.disclaimer.clone(),
            program_name,
            expiration_date: record
                .expiration_date
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| record.valid_through.to_string()),
        }
    }
}

/// Static offers served when the feed cannot be reached and nothing is cached.
pub fn sample_records() -> Vec<ManufacturerRateRecord> {
    let through = NaiveDate::from_ymd_opt(2025, 9, 30).unwrap_or_default();
    let ford_program = |program: &str| {
        format!(
            "Program #{program}: Not all buyers will qualify. Ford Credit limited-term APR financing. \
             Take new retail delivery from dealer stock by 09/30/2025. See dealer for \
             qualifications and complete details."
        )
    };
    let special_apr = |model: &str, rate: &str, term: TermMonths| ManufacturerRateRecord {
        id: None,
        year: "2025".into(),
        make: "Ford".into(),
        model: model.into(),
        trim: String::new(),
        incentive_type: IncentiveType::Finance,
        rate: rate.into(),
        term,
        valid_from: NaiveDate::from_ymd_opt(2025, 1, 1),
        valid_through: through,
        offer_headline: format!("{rate}% APR for up to {term} Months"),
        disclaimer: format!(
            "{rate}% APR for up to {term} months on select 2025 Ford {model} models. \
             Not all buyers will qualify for Ford Credit financing."
        ),
        program_name: "Ford Credit Special APR".into(),
        expiration_date: Some("2025-09-30".into()),
    };
    let public_offer = |model: &str, rate: &str, term: TermMonths, program: &str, from: NaiveDate| {
        ManufacturerRateRecord {
            id: None,
            year: "2025".into(),
            make: "Ford".into(),
            model: model.into(),
            trim: String::new(),
            incentive_type: IncentiveType::Finance,
            rate: rate.into(),
            term,
            valid_from: Some(from),
            valid_through: through,
            offer_headline: "Public Offers".into(),
            disclaimer: ford_program(program),
            program_name: String::new(),
            expiration_date: Some("09/30/2025".into()),
        }
    };
    let july = NaiveDate::from_ymd_opt(2025, 7, 8).unwrap_or_default();
    let september = NaiveDate::from_ymd_opt(2025, 9, 9).unwrap_or_default();

    vec![
        public_offer("F-150 F-150", "1.9", 48, "21420", september),
        public_offer("Mustang", "3.9", 36, "21420", july),
        public_offer("Transit Chassis", "6.9", 48, "21440", july),
        special_apr("Explorer", "3.9", 60),
        special_apr("Escape", "2.9", 60),
        special_apr("Bronco", "5.9", 72),
        special_apr("Edge", "3.9", 60),
    ]
}
