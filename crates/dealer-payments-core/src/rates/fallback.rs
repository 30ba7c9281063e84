//! Precedence chains for APR, money factor and residual percentage.
//!
//! Each chain is one function that walks its layers in a fixed order and
//! always ends on a dealer default, so resolution cannot come back empty.
//!
//! | Kind | Order |
//! |---|---|
//! | APR | pinned override, manufacturer, override, model table, dealer tier table |
//! | Money factor | pinned override, manufacturer APR / 2400, override, make table, term table, default |
//! | Residual % | override, model table, make rule, term table, flat default |
//!
//! "Pinned" means the override sets `override_manufacturer_rate`. Turning off
//! `finance.use_manufacturer_rates` removes the manufacturer layer from the APR
//! chain only; lease money factors still derive from manufacturer offers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::matching::find_best_rate;
use super::records::{ManufacturerRateRecord, RateMatch};
use crate::amortization::apr_to_money_factor;
use crate::settings::{DealerSettings, ModelTierRates};
use crate::types::{CreditTier, RateSource, TermMonths, VehicleBuild};

/// A resolved rate with the layer it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub value: Decimal,
    pub source: RateSource,
    /// The manufacturer offer, when `source` is `Manufacturer`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<RateMatch>,
}

impl ResolvedRate {
    fn from(value: Decimal, source: RateSource) -> Self {
        ResolvedRate {
            value,
            source,
            manufacturer: None,
        }
    }

    fn manufacturer(value: Decimal, offer: RateMatch) -> Self {
        ResolvedRate {
            value,
            source: RateSource::Manufacturer,
            manufacturer: Some(offer),
        }
    }

    pub fn is_manufacturer(&self) -> bool {
        self.source == RateSource::Manufacturer
    }
}

/// Inputs shared by every chain.
#[derive(Debug, Clone, Copy)]
pub struct RateLookup<'a> {
    pub settings: &'a DealerSettings,
    pub records: &'a [ManufacturerRateRecord],
    pub build: &'a VehicleBuild,
    pub term: TermMonths,
    pub as_of: NaiveDate,
}

impl RateLookup<'_> {
    fn manufacturer_offer(&self) -> Option<RateMatch> {
        find_best_rate(self.records, self.build, self.term, self.as_of)
    }
}

// ---------------------------------------------------------------------------
// APR
// ---------------------------------------------------------------------------

/// Finance APR (percent) for a credit tier.
pub fn resolve_apr(lookup: &RateLookup<'_>, tier: CreditTier) -> ResolvedRate {
    let settings = lookup.settings;
    let finance_override = settings
        .active_override(lookup.build)
        .and_then(|o| o.finance_override.as_ref());
    let override_rate = finance_override.and_then(|f| f.rate);

    if let (Some(rate), Some(true)) = (override_rate, finance_override.map(|f| f.override_manufacturer_rate)) {
        debug!(%rate, "APR pinned by model override");
        return ResolvedRate::from(rate, RateSource::ModelOverride);
    }

    let offer = settings
        .finance
        .use_manufacturer_rates
        .then(|| lookup.manufacturer_offer())
        .flatten();
    if let Some(offer) = offer {
        return ResolvedRate::manufacturer(offer.rate, offer);
    }

    if let Some(rate) = override_rate {
        debug!(%rate, "APR from model override");
        return ResolvedRate::from(rate, RateSource::ModelOverride);
    }

    if let Some(entry) = model_tier_entry(&settings.finance.fallback_rates.by_model, lookup.build) {
        return ResolvedRate::from(entry.rates.get(tier), RateSource::ModelTable);
    }

    let (table, custom) = settings.dealer_tier_rates();
    let source = if custom {
        RateSource::DealerCustom
    } else {
        RateSource::DealerDefault
    };
    ResolvedRate::from(table.get(tier), source)
}

fn model_tier_entry<'a>(entries: &'a [ModelTierRates], build: &VehicleBuild) -> Option<&'a ModelTierRates> {
    let mut matching = entries.iter().filter(|e| e.key.matches(build));
    let first = matching.next()?;
    if first.key.has_trim() {
        return Some(first);
    }
    matching.find(|e| e.key.has_trim()).or(Some(first))
}

// ---------------------------------------------------------------------------
// Money factor
// ---------------------------------------------------------------------------

/// Lease money factor for the lookup's term.
pub fn resolve_money_factor(lookup: &RateLookup<'_>) -> ResolvedRate {
    let settings = lookup.settings;
    let lease_override = settings
        .active_override(lookup.build)
        .and_then(|o| o.lease_override.as_ref());
    let override_mf = lease_override.and_then(|l| l.money_factor);

    if let (Some(mf), Some(true)) = (override_mf, lease_override.map(|l| l.override_manufacturer_rate)) {
        debug!(money_factor = %mf, "money factor pinned by model override");
        return ResolvedRate::from(mf, RateSource::ModelOverride);
    }

    if let Some(offer) = lookup.manufacturer_offer().filter(|o| o.rate > Decimal::ZERO) {
        return ResolvedRate::manufacturer(apr_to_money_factor(offer.rate), offer);
    }

    if let Some(mf) = override_mf {
        return ResolvedRate::from(mf, RateSource::ModelOverride);
    }

    let tables = &settings.lease.money_factors;
    let make_table = tables
        .by_make
        .iter()
        .find(|t| t.make.eq_ignore_ascii_case(&lookup.build.make));
    if let Some(table) = make_table {
        let mf = table.by_term.get(&lookup.term).copied().unwrap_or(table.default);
        return ResolvedRate::from(mf, RateSource::MakeTable);
    }

    match tables.by_term.get(&lookup.term) {
        Some(mf) => ResolvedRate::from(*mf, RateSource::TermTable),
        None => ResolvedRate::from(tables.default, RateSource::DealerDefault),
    }
}

// ---------------------------------------------------------------------------
// Residual
// ---------------------------------------------------------------------------

/// Residual percentage (0-100) of the sticker price at lease end.
pub fn resolve_residual_percent(settings: &DealerSettings, build: &VehicleBuild, term: TermMonths) -> ResolvedRate {
    let override_pct = settings
        .active_override(build)
        .and_then(|o| o.lease_override.as_ref())
        .and_then(|l| l.residual_percentage);
    if let Some(pct) = override_pct {
        return ResolvedRate::from(pct, RateSource::ModelOverride);
    }

    let tables = &settings.lease.residuals;
    let model_pct = tables
        .by_model
        .iter()
        .filter(|m| m.key.matches(build))
        .find_map(|m| m.by_term.get(&term).copied().or(m.default));
    if let Some(pct) = model_pct {
        return ResolvedRate::from(pct, RateSource::ModelTable);
    }

    if let Some(rule) = tables.by_make.iter().find(|r| r.matches(build)) {
        let pct = rule.by_term.get(&term).copied().unwrap_or(rule.default);
        return ResolvedRate::from(pct, RateSource::MakeTable);
    }

    match tables.by_term.get(&term) {
        Some(pct) => ResolvedRate::from(*pct, RateSource::TermTable),
        None => ResolvedRate::from(tables.default_percent, RateSource::DealerDefault),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::records::sample_records;
    use crate::settings::{FinanceOverride, LeaseOverride, ModelKey, ModelOverride, ModelResiduals, TierRates};
    use proptest::prelude::{prop_assert, proptest};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn build(year: i32, make: &str, model: &str) -> VehicleBuild {
        VehicleBuild {
            year,
            make: make.into(),
            model: model.into(),
            trim: "XLT".into(),
            ..Default::default()
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
    }

    fn key(make: &str, model: &str) -> ModelKey {
        ModelKey {
            year: 2025,
            make: make.into(),
            model: model.into(),
            trim: None,
        }
    }

    fn with_override(finance: Option<FinanceOverride>, lease: Option<LeaseOverride>) -> DealerSettings {
        DealerSettings {
            model_overrides: vec![ModelOverride {
                id: "explorer".into(),
                key: key("Ford", "Explorer"),
                active: true,
                finance_override: finance,
                lease_override: lease,
                incentives: None,
                notes: None,
            }],
            ..Default::default()
        }
    }

    fn lookup<'a>(
        settings: &'a DealerSettings,
        records: &'a [ManufacturerRateRecord],
        build: &'a VehicleBuild,
        term: TermMonths,
    ) -> RateLookup<'a> {
        RateLookup {
            settings,
            records,
            build,
            term,
            as_of: as_of(),
        }
    }

    #[test]
    fn test_manufacturer_rate_preferred() {
        let settings = DealerSettings::default();
        let records = sample_records();
        let b = build(2025, "Ford", "Explorer");
        let r = resolve_apr(&lookup(&settings, &records, &b, 60), CreditTier::Good);
        assert_eq!(r.value, dec!(3.9));
        assert!(r.is_manufacturer());
        assert!(r.manufacturer.is_some());
    }

    #[test]
    fn test_unpinned_override_sits_below_manufacturer() {
        let settings = with_override(
            Some(FinanceOverride {
                rate: Some(dec!(1.9)),
                ..Default::default()
            }),
            None,
        );
        let records = sample_records();
        let b = build(2025, "Ford", "Explorer");
        assert_eq!(resolve_apr(&lookup(&settings, &records, &b, 60), CreditTier::Good).value, dec!(3.9));

        let none: Vec<ManufacturerRateRecord> = Vec::new();
        let r = resolve_apr(&lookup(&settings, &none, &b, 60), CreditTier::Good);
        assert_eq!((r.value, r.source), (dec!(1.9), RateSource::ModelOverride));
    }

    #[test]
    fn test_pinned_override_beats_manufacturer() {
        let settings = with_override(
            Some(FinanceOverride {
                rate: Some(dec!(4.49)),
                override_manufacturer_rate: true,
                ..Default::default()
            }),
            None,
        );
        let records = sample_records();
        let b = build(2025, "Ford", "Explorer");
        let r = resolve_apr(&lookup(&settings, &records, &b, 60), CreditTier::Good);
        assert_eq!((r.value, r.source), (dec!(4.49), RateSource::ModelOverride));
    }

    #[test]
    fn test_model_table_then_dealer_default() {
        let mut settings = DealerSettings::default();
        settings.finance.fallback_rates.by_model.push(ModelTierRates {
            key: key("Honda", "Civic"),
            rates: TierRates {
                excellent: dec!(2.99),
                good: dec!(3.99),
                fair: dec!(7.99),
                poor: dec!(11.99),
            },
        });
        let records = sample_records();

        let civic = build(2025, "Honda", "Civic");
        let r = resolve_apr(&lookup(&settings, &records, &civic, 60), CreditTier::Fair);
        assert_eq!((r.value, r.source), (dec!(7.99), RateSource::ModelTable));

        let accord = build(2025, "Honda", "Accord");
        let r = resolve_apr(&lookup(&settings, &records, &accord, 60), CreditTier::Poor);
        assert_eq!((r.value, r.source), (dec!(13.99), RateSource::DealerDefault));
    }

    #[test]
    fn test_custom_rates_when_manufacturer_disabled() {
        let mut settings = DealerSettings::default();
        settings.finance.use_manufacturer_rates = false;
        let records = sample_records();
        let b = build(2025, "Ford", "Explorer");
        let r = resolve_apr(&lookup(&settings, &records, &b, 60), CreditTier::Excellent);
        assert_eq!((r.value, r.source), (dec!(4.99), RateSource::DealerCustom));
    }

    #[test]
    fn test_money_factor_from_manufacturer_apr() {
        let settings = DealerSettings::default();
        let records = sample_records();
        let b = build(2025, "Ford", "Explorer");
        let r = resolve_money_factor(&lookup(&settings, &records, &b, 36));
        assert_eq!(r.value, dec!(3.9) / dec!(2400));
        assert!(r.is_manufacturer());
    }

    #[test]
    fn test_money_factor_ignores_finance_manufacturer_switch() {
        let mut settings = DealerSettings::default();
        settings.finance.use_manufacturer_rates = false;
        let records = sample_records();
        let b = build(2025, "Ford", "Explorer");
        let r = resolve_money_factor(&lookup(&settings, &records, &b, 36));
        assert_eq!(r.value, dec!(3.9) / dec!(2400));
        assert_eq!(r.source, RateSource::Manufacturer);
    }

    #[test]
    fn test_money_factor_tables() {
        let settings = DealerSettings::default();
        let none: Vec<ManufacturerRateRecord> = Vec::new();

        let civic = build(2025, "Honda", "Civic");
        let r = resolve_money_factor(&lookup(&settings, &none, &civic, 36));
        assert_eq!((r.value, r.source), (dec!(0.00110), RateSource::MakeTable));
        let r = resolve_money_factor(&lookup(&settings, &none, &civic, 60));
        assert_eq!((r.value, r.source), (dec!(0.00125), RateSource::MakeTable));

        let escape = build(2025, "Ford", "Escape");
        let r = resolve_money_factor(&lookup(&settings, &none, &escape, 39));
        assert_eq!((r.value, r.source), (dec!(0.00185), RateSource::TermTable));
        let r = resolve_money_factor(&lookup(&settings, &none, &escape, 30));
        assert_eq!((r.value, r.source), (dec!(0.00175), RateSource::DealerDefault));
    }

    #[test]
    fn test_money_factor_override() {
        let settings = with_override(
            None,
            Some(LeaseOverride {
                money_factor: Some(dec!(0.00090)),
                override_manufacturer_rate: true,
                ..Default::default()
            }),
        );
        let records = sample_records();
        let b = build(2025, "Ford", "Explorer");
        let r = resolve_money_factor(&lookup(&settings, &records, &b, 36));
        assert_eq!((r.value, r.source), (dec!(0.00090), RateSource::ModelOverride));
    }

    #[test]
    fn test_residual_chain() {
        let mut settings = DealerSettings::default();
        settings.lease.residuals.by_model.push(ModelResiduals {
            key: key("Ford", "Bronco"),
            by_term: BTreeMap::from([(36, dec!(66))]),
            default: None,
        });

        let bronco = build(2025, "Ford", "Bronco");
        let r = resolve_residual_percent(&settings, &bronco, 36);
        assert_eq!((r.value, r.source), (dec!(66), RateSource::ModelTable));
        // no entry for the term and no model default: drops to the term table
        let r = resolve_residual_percent(&settings, &bronco, 24);
        assert_eq!((r.value, r.source), (dec!(60), RateSource::TermTable));

        let crv = build(2025, "Honda", "CR-V");
        let r = resolve_residual_percent(&settings, &crv, 36);
        assert_eq!((r.value, r.source), (dec!(66), RateSource::MakeTable));
        let civic = build(2025, "Honda", "Civic");
        assert_eq!(resolve_residual_percent(&settings, &civic, 24).value, dec!(72));
        let pilot = build(2025, "Honda", "Pilot");
        assert_eq!(resolve_residual_percent(&settings, &pilot, 30).value, dec!(60));

        let edge = build(2025, "Ford", "Edge");
        let r = resolve_residual_percent(&settings, &edge, 30);
        assert_eq!((r.value, r.source), (dec!(50), RateSource::DealerDefault));
    }

    #[test]
    fn test_residual_override() {
        let settings = with_override(
            None,
            Some(LeaseOverride {
                residual_percentage: Some(dec!(61)),
                ..Default::default()
            }),
        );
        let r = resolve_residual_percent(&settings, &build(2025, "Ford", "Explorer"), 36);
        assert_eq!((r.value, r.source), (dec!(61), RateSource::ModelOverride));
    }

    proptest! {
        #[test]
        fn prop_every_tier_resolves_to_a_rate(
            year in 2015i32..2030,
            term in 1u32..100,
            tier_idx in 0usize..4,
            manufacturer in proptest::bool::ANY,
        ) {
            let mut settings = DealerSettings::default();
            settings.finance.use_manufacturer_rates = manufacturer;
            let records = sample_records();
            let b = build(year, "Ford", "Escape");
            let r = resolve_apr(&lookup(&settings, &records, &b, term), CreditTier::ALL[tier_idx]);
            prop_assert!(r.value >= Decimal::ZERO);
            prop_assert!(r.is_manufacturer() == r.manufacturer.is_some());
        }
    }
}
