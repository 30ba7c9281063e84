//! Manufacturer rate matching.
//!
//! Feed records are keyed loosely: model names are repeated or hyphenated
//! differently from inventory ("F-150 F-150" vs "F150"), trims may be blank,
//! and the eligible term is either a maximum or a range spelled out in the
//! offer headline ("1.9% APR 24-48 MOS"). Matching is therefore fuzzy on
//! model and term and strict on year, make, validity and incentive type.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use super::records::{ManufacturerRateRecord, RateMatch};
use crate::types::{IncentiveType, TermMonths, VehicleBuild};

static TERM_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)-(\d+)\s*MOS").expect("term range pattern is valid"));

static TERM_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*MOS").expect("term mention pattern is valid"));

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lowest manufacturer finance rate for a vehicle and term, if any record
/// qualifies on `as_of`.
///
/// Records whose trim matches are preferred; when none do, the trim constraint
/// is dropped. Ties on rate keep feed order.
pub fn find_best_rate(
    records: &[ManufacturerRateRecord],
    build: &VehicleBuild,
    term: TermMonths,
    as_of: NaiveDate,
) -> Option<RateMatch> {
    if records.is_empty() {
        debug!("no manufacturer rates loaded");
        return None;
    }

    let best = lowest_rate(records, build, term, as_of, true).or_else(|| {
        debug!(
            year = build.year,
            make = %build.make,
            model = %build.model,
            "no trim-level manufacturer match, retrying on model only"
        );
        lowest_rate(records, build, term, as_of, false)
    });

    match &best {
        Some(m) => debug!(rate = %m.rate, term = m.term, "manufacturer rate found"),
        None => debug!(
            year = build.year,
            make = %build.make,
            model = %build.model,
            term,
            "no manufacturer rate for vehicle"
        ),
    }
    best
}

/// Every record for a model line regardless of term, validity or type.
pub fn rates_for_model<'a>(
    records: &'a [ManufacturerRateRecord],
    year: i32,
    make: &str,
    model: &str,
) -> Vec<&'a ManufacturerRateRecord> {
    let year = year.to_string();
    records
        .iter()
        .filter(|r| r.year == year && r.make.eq_ignore_ascii_case(make) && is_model_match(&r.model, model))
        .collect()
}

/// Fuzzy model comparison between a feed record and an inventory model.
pub fn is_model_match(record_model: &str, vehicle_model: &str) -> bool {
    let record_lower = record_model.trim().to_lowercase();
    let vehicle_lower = vehicle_model.trim().to_lowercase();
    if record_lower.is_empty() || vehicle_lower.is_empty() {
        return false;
    }

    let record_token = record_lower.split_whitespace().next().unwrap_or_default();
    let vehicle_token = vehicle_lower.split_whitespace().next().unwrap_or_default();
    if record_token == vehicle_token {
        return true;
    }

    let record_norm = normalize_model(&record_lower);
    let vehicle_norm = normalize_model(&vehicle_lower);
    record_norm == vehicle_norm
        || record_norm.contains(&vehicle_norm)
        || vehicle_norm.contains(&record_norm)
        || normalize_model(record_token) == normalize_model(vehicle_token)
}

/// Whether `requested` falls under a record's term.
///
/// Exact term, then any `<min>-<max> MOS` range or explicit `<n> MOS` in the
/// headline, then the record term read as a maximum.
pub fn is_term_in_range(requested: TermMonths, record_term: TermMonths, headline: &str) -> bool {
    if requested == record_term {
        return true;
    }

    if !headline.is_empty() {
        let in_stated_range = TERM_RANGE.captures_iter(headline).any(|caps| {
            match (caps[1].parse::<TermMonths>(), caps[2].parse::<TermMonths>()) {
                (Ok(min), Ok(max)) => (min..=max).contains(&requested),
                _ => false,
            }
        });
        if in_stated_range {
            return true;
        }

        let mentioned = TERM_MENTION
            .captures_iter(headline)
            .any(|caps| caps[1].parse::<TermMonths>() == Ok(requested));
        if mentioned {
            return true;
        }
    }

    requested <= record_term
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lowest_rate(
    records: &[ManufacturerRateRecord],
    build: &VehicleBuild,
    term: TermMonths,
    as_of: NaiveDate,
    consider_trim: bool,
) -> Option<RateMatch> {
    let year = build.year.to_string();
    let mut best: Option<(&ManufacturerRateRecord, rust_decimal::Decimal)> = None;

    for record in records {
        if !qualifies(record, build, &year, term, as_of, consider_trim) {
            continue;
        }
        let Some(rate) = record.parsed_rate() else {
            debug!(model = %record.model, rate = %record.rate, "skipping record with non-numeric rate");
            continue;
        };
        if best.map_or(true, |(_, lowest)| rate < lowest) {
            best = Some((record, rate));
        }
    }

    best.map(|(record, rate)| RateMatch::from_record(record, rate))
}

fn qualifies(
    record: &ManufacturerRateRecord,
    build: &VehicleBuild,
    year: &str,
    term: TermMonths,
    as_of: NaiveDate,
    consider_trim: bool,
) -> bool {
    record.incentive_type == IncentiveType::Finance
        && record.year == year
        && record.make.eq_ignore_ascii_case(&build.make)
        && is_model_match(&record.model, &build.model)
        && (!consider_trim || is_trim_match(&record.trim, &build.trim))
        && record.is_valid_on(as_of)
        && is_term_in_range(term, record.term, &record.offer_headline)
}

fn is_trim_match(record_trim: &str, vehicle_trim: &str) -> bool {
    let record_trim = record_trim.trim().to_lowercase();
    if record_trim.is_empty() {
        return true;
    }
    let vehicle_trim = vehicle_trim.to_lowercase();
    vehicle_trim == record_trim || vehicle_trim.contains(&record_trim)
}

fn normalize_model(model: &str) -> String {
    model.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect()
}
