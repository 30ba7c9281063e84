//! Dealer configuration snapshot.
//!
//! Every struct deserializes with `#[serde(default)]`, so a partial settings
//! document is layered over the reference dealer configuration field by field.
//! Model overrides live alongside the policy sections and are looked up with
//! [`DealerSettings::active_override`].

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;
use crate::pricing::rounding::RoundingMethod;
use crate::types::{CreditTier, Money, MoneyFactor, Percent, PricingBasis, Rate, TermMonths, VehicleBuild};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Shared building blocks
// ---------------------------------------------------------------------------

/// One APR per credit tier. All four tiers are required, so a lookup always
/// yields a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierRates {
    pub excellent: Percent,
    pub good: Percent,
    pub fair: Percent,
    pub poor: Percent,
}

impl TierRates {
    pub fn get(&self, tier: CreditTier) -> Percent {
        match tier {
            CreditTier::Excellent => self.excellent,
            CreditTier::Good => self.good,
            CreditTier::Fair => self.fair,
            CreditTier::Poor => self.poor,
        }
    }

    fn values(&self) -> [Percent; 4] {
        [self.excellent, self.good, self.fair, self.poor]
    }
}

/// Identifies a model line; an absent or empty trim matches every trim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelKey {
    pub year: i32,
    pub make: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<String>,
}

impl ModelKey {
    pub fn matches(&self, build: &VehicleBuild) -> bool {
        self.year == build.year
            && self.make.eq_ignore_ascii_case(&build.make)
            && self.model.eq_ignore_ascii_case(&build.model)
            && self.trim_matches(build)
    }

    pub fn has_trim(&self) -> bool {
        self.trim.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    fn trim_matches(&self, build: &VehicleBuild) -> bool {
        match self.trim.as_deref() {
            None => true,
            Some(t) if t.trim().is_empty() => true,
            Some(t) => t.eq_ignore_ascii_case(&build.trim),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownPaymentKind {
    #[default]
    Fixed,
    Percentage,
}

/// Down payment policy: a flat amount or a percentage of MSRP / selling price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownPaymentConfig {
    #[serde(rename = "type")]
    pub kind: DownPaymentKind,
    pub value: Decimal,
    #[serde(default)]
    pub based_on: PricingBasis,
}

// ---------------------------------------------------------------------------
// Finance policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTierRates {
    #[serde(flatten)]
    pub key: ModelKey,
    pub rates: TierRates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackRates {
    pub by_model: Vec<ModelTierRates>,
    pub default: TierRates,
}

impl Default for FallbackRates {
    fn default() -> Self {
        Self {
            by_model: Vec::new(),
            default: TierRates {
                excellent: dec!(5.99),
                good: dec!(6.99),
                fair: dec!(9.99),
                poor: dec!(13.99),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceSettings {
    pub default_terms: Vec<TermMonths>,
    pub default_down_payment: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down_payment: Option<DownPaymentConfig>,
    pub default_credit_tier: CreditTier,
    pub use_manufacturer_rates: bool,
    pub pricing_basis: PricingBasis,
    /// Dealer tier table used instead of `fallback_rates.default` when
    /// manufacturer rates are switched off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_rates: Option<TierRates>,
    pub fallback_rates: FallbackRates,
    /// Share of sales tax collected at signing. Placeholder convention pending
    /// dealer confirmation.
    pub signing_tax_share: Rate,
}

impl Default for FinanceSettings {
    fn default() -> Self {
        Self {
            default_terms: vec![36, 48, 60, 72, 84],
            default_down_payment: Decimal::ZERO,
            down_payment: None,
            default_credit_tier: CreditTier::Good,
            use_manufacturer_rates: true,
            pricing_basis: PricingBasis::Selling,
            custom_rates: Some(TierRates {
                excellent: dec!(4.99),
                good: dec!(6.99),
                fair: dec!(9.99),
                poor: dec!(14.99),
            }),
            fallback_rates: FallbackRates::default(),
            signing_tax_share: dec!(0.10),
        }
    }
}

// ---------------------------------------------------------------------------
// Lease policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseTaxMethod {
    /// Tax charged on each monthly payment
    #[default]
    Monthly,
    /// Tax on the sum of base payments, collected at signing
    Upfront,
    /// Tax on the sum of base payments, rolled into the capitalized cost
    Capitalized,
}

/// Money factors for one make, keyed by term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakeMoneyFactors {
    pub make: String,
    #[serde(default)]
    pub by_term: BTreeMap<TermMonths, MoneyFactor>,
    pub default: MoneyFactor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoneyFactorTables {
    pub by_make: Vec<MakeMoneyFactors>,
    pub by_term: BTreeMap<TermMonths, MoneyFactor>,
    pub default: MoneyFactor,
}

impl Default for MoneyFactorTables {
    fn default() -> Self {
        Self {
            by_make: vec![MakeMoneyFactors {
                make: "Honda".into(),
                by_term: BTreeMap::from([
                    (24, dec!(0.00100)),
                    (36, dec!(0.00110)),
                    (39, dec!(0.00125)),
                    (48, dec!(0.00140)),
                ]),
                default: dec!(0.00125),
            }],
            by_term: BTreeMap::from([
                (24, dec!(0.00150)),
                (36, dec!(0.00175)),
                (39, dec!(0.00185)),
                (48, dec!(0.00200)),
            ]),
            default: dec!(0.00175),
        }
    }
}

/// Residual percentages for an exact model line. The key is nested rather
/// than flattened so the term-keyed map keeps integer keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResiduals {
    pub key: ModelKey,
    pub by_term: BTreeMap<TermMonths, Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Percent>,
}

/// Residual percentages for a make, optionally narrowed to models whose name
/// contains `model_contains`. Rules are tried in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakeResidualRule {
    pub make: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_contains: Option<Vec<String>>,
    #[serde(default)]
    pub by_term: BTreeMap<TermMonths, Percent>,
    pub default: Percent,
}

impl MakeResidualRule {
    pub fn matches(&self, build: &VehicleBuild) -> bool {
        if !self.make.eq_ignore_ascii_case(&build.make) {
            return false;
        }
        match &self.model_contains {
            None => true,
            Some(needles) => {
                let model = build.model.to_lowercase();
                needles.iter().any(|n| model.contains(&n.to_lowercase()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidualTables {
    pub by_model: Vec<ModelResiduals>,
    pub by_make: Vec<MakeResidualRule>,
    pub by_term: BTreeMap<TermMonths, Percent>,
    /// Flat dealer percentage when no table has an entry
    pub default_percent: Percent,
}

impl Default for ResidualTables {
    fn default() -> Self {
        Self {
            by_model: Vec::new(),
            by_make: vec![
                honda_rule(
                    &["civic"],
                    [(24, dec!(72)), (36, dec!(68)), (39, dec!(65)), (48, dec!(60))],
                    dec!(65),
                ),
                honda_rule(
                    &["hr-v", "cr-v"],
                    [(24, dec!(70)), (36, dec!(66)), (39, dec!(63)), (48, dec!(58))],
                    dec!(63),
                ),
                honda_rule(
                    &[],
                    [(24, dec!(68)), (36, dec!(64)), (39, dec!(61)), (48, dec!(56))],
                    dec!(60),
                ),
            ],
            by_term: BTreeMap::from([
                (24, dec!(60)),
                (36, dec!(55)),
                (39, dec!(52)),
                (48, dec!(48)),
            ]),
            default_percent: dec!(50),
        }
    }
}

fn honda_rule(
    model_contains: &[&str],
    by_term: [(TermMonths, Percent); 4],
    default: Percent,
) -> MakeResidualRule {
    MakeResidualRule {
        make: "Honda".into(),
        model_contains: (!model_contains.is_empty())
            .then(|| model_contains.iter().map(|m| m.to_string()).collect()),
        by_term: BTreeMap::from(by_term),
        default,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseSettings {
    pub default_terms: Vec<TermMonths>,
    pub default_mileage: Vec<u32>,
    pub default_down_payment: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down_payment: Option<DownPaymentConfig>,
    pub pricing_basis: PricingBasis,
    pub acquisition_fee: Money,
    pub disposition_fee: Money,
    /// Per mile over the annual allowance
    pub excess_mileage_charge: Money,
    pub tax_method: LeaseTaxMethod,
    pub money_factors: MoneyFactorTables,
    pub residuals: ResidualTables,
}

impl Default for LeaseSettings {
    fn default() -> Self {
        Self {
            default_terms: vec![24, 36, 39, 48],
            default_mileage: vec![10_000, 12_000, 15_000],
            default_down_payment: dec!(2500),
            down_payment: None,
            pricing_basis: PricingBasis::Msrp,
            acquisition_fee: dec!(595),
            disposition_fee: dec!(350),
            excess_mileage_charge: dec!(0.20),
            tax_method: LeaseTaxMethod::Monthly,
            money_factors: MoneyFactorTables::default(),
            residuals: ResidualTables::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fees, display
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFee {
    pub name: String,
    pub amount: Money,
    /// Kept from the dealer's fee sheet for display. Finance taxes every
    /// custom fee regardless.
    #[serde(default = "default_true")]
    pub taxable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSettings {
    pub doc_fee: Money,
    pub electronic_filing: Money,
    pub state_tax_rate: Rate,
    pub county_tax_rate: Rate,
    pub custom_fees: Vec<CustomFee>,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            doc_fee: dec!(125),
            electronic_filing: dec!(100),
            state_tax_rate: dec!(0.06875),
            county_tax_rate: dec!(0.005),
            custom_fees: Vec::new(),
        }
    }
}

impl FeeSettings {
    /// State plus county rate; `None` if the configured rates overflow.
    pub fn combined_tax_rate(&self) -> Option<Rate> {
        self.state_tax_rate.checked_add(self.county_tax_rate)
    }

    /// Sum of the dealer add-on fees; `None` on overflow.
    pub fn custom_fee_total(&self) -> Option<Money> {
        self.custom_fees
            .iter()
            .try_fold(Decimal::ZERO, |total, fee| total.checked_add(fee.amount))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub rounding_method: RoundingMethod,
}

// ---------------------------------------------------------------------------
// Model overrides
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<TermMonths>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus_cash: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_discount: Option<Money>,
    /// When set, `rate` wins over a matching manufacturer rate.
    pub override_manufacturer_rate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub money_factor: Option<MoneyFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residual_percentage: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<TermMonths>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus_cash: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_discount: Option<Money>,
    /// When set, `money_factor` wins over a manufacturer-derived money factor.
    pub override_manufacturer_rate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideIncentives {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_back: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dealer_cash: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loyalty_bonus: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_in_bonus: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stackable: Option<bool>,
}

/// Administrator-maintained adjustments for one model line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOverride {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub key: ModelKey,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finance_override: Option<FinanceOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_override: Option<LeaseOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incentives: Option<OverrideIncentives>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DealerSettings {
    pub dealer_id: String,
    pub dealer_name: String,
    pub finance: FinanceSettings,
    pub lease: LeaseSettings,
    pub fees: FeeSettings,
    pub display: DisplaySettings,
    pub model_overrides: Vec<ModelOverride>,
}

impl Default for DealerSettings {
    fn default() -> Self {
        Self {
            dealer_id: "inver-grove-honda".into(),
            dealer_name: "Inver Grove Honda".into(),
            finance: FinanceSettings::default(),
            lease: LeaseSettings::default(),
            fees: FeeSettings::default(),
            display: DisplaySettings::default(),
            model_overrides: Vec::new(),
        }
    }
}

impl DealerSettings {
    /// The active override for a vehicle. A trim-specific override beats a
    /// model-wide one.
    pub fn active_override(&self, build: &VehicleBuild) -> Option<&ModelOverride> {
        let mut candidates = self
            .model_overrides
            .iter()
            .filter(|o| o.active && o.key.matches(build));
        let first = candidates.next()?;
        if first.key.has_trim() {
            return Some(first);
        }
        candidates.find(|o| o.key.has_trim()).or(Some(first))
    }

    /// Dealer tier table for the last step of the APR chain.
    pub fn dealer_tier_rates(&self) -> (&TierRates, bool) {
        match (&self.finance.custom_rates, self.finance.use_manufacturer_rates) {
            (Some(custom), false) => (custom, true),
            _ => (&self.finance.fallback_rates.default, false),
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        let fees = &self.fees;
        if fees.state_tax_rate < Decimal::ZERO || fees.county_tax_rate < Decimal::ZERO {
            return Err(PaymentError::invalid("fees.tax_rate", "Tax rates must be non-negative"));
        }
        if fees.doc_fee < Decimal::ZERO || fees.electronic_filing < Decimal::ZERO {
            return Err(PaymentError::invalid("fees", "Dealer fees must be non-negative"));
        }
        if fees.custom_fees.iter().any(|f| f.amount < Decimal::ZERO) {
            return Err(PaymentError::invalid("fees.custom_fees", "Custom fees must be non-negative"));
        }
        let default_rates = &self.finance.fallback_rates.default;
        if default_rates.values().iter().any(|r| *r < Decimal::ZERO) {
            return Err(PaymentError::invalid(
                "finance.fallback_rates.default",
                "Default APRs must be non-negative",
            ));
        }
        let share = self.finance.signing_tax_share;
        if share < Decimal::ZERO || share > Decimal::ONE {
            return Err(PaymentError::invalid(
                "finance.signing_tax_share",
                "Signing tax share must be between 0 and 1",
            ));
        }
        if self.lease.money_factors.default <= Decimal::ZERO {
            return Err(PaymentError::invalid(
                "lease.money_factors.default",
                "Default money factor must be positive",
            ));
        }
        let pct = self.lease.residuals.default_percent;
        if pct <= Decimal::ZERO || pct >= dec!(100) {
            return Err(PaymentError::invalid(
                "lease.residuals.default_percent",
                "Default residual must be between 0 and 100 percent",
            ));
        }
        if self.lease.acquisition_fee < Decimal::ZERO {
            return Err(PaymentError::invalid(
                "lease.acquisition_fee",
                "Acquisition fee must be non-negative",
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(year: i32, make: &str, model: &str, trim: &str) -> VehicleBuild {
        VehicleBuild {
            year,
            make: make.into(),
            model: model.into(),
            trim: trim.into(),
            ..Default::default()
        }
    }

    fn model_override(trim: Option<&str>, rate: Decimal) -> ModelOverride {
        ModelOverride {
            id: format!("ovr-{rate}"),
            key: ModelKey {
                year: 2025,
                make: "Honda".into(),
                model: "Civic".into(),
                trim: trim.map(str::to_string),
            },
            active: true,
            finance_override: Some(FinanceOverride {
                rate: Some(rate),
                ..Default::default()
            }),
            lease_override: None,
            incentives: None,
            notes: None,
        }
    }

    #[test]
    fn test_defaults_validate() {
        DealerSettings::default().validate().unwrap();
    }

    #[test]
    fn test_partial_document_layers_over_defaults() {
        let json = r#"{ "fees": { "doc_fee": "250" }, "finance": { "use_manufacturer_rates": false } }"#;
        let settings: DealerSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.fees.doc_fee, dec!(250));
        assert_eq!(settings.fees.electronic_filing, dec!(100));
        assert!(!settings.finance.use_manufacturer_rates);
        assert_eq!(settings.lease.acquisition_fee, dec!(595));
    }

    #[test]
    fn test_term_keyed_tables_deserialize() {
        let json = r#"{ "lease": { "residuals": { "by_term": { "36": 58 }, "default_percent": 52 } } }"#;
        let settings: DealerSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.lease.residuals.by_term.get(&36), Some(&dec!(58)));
        assert_eq!(settings.lease.residuals.default_percent, dec!(52));
    }

    #[test]
    fn test_trim_specific_override_wins() {
        let settings = DealerSettings {
            model_overrides: vec![model_override(None, dec!(3.9)), model_override(Some("Sport"), dec!(1.9))],
            ..Default::default()
        };
        let sport = settings.active_override(&build(2025, "honda", "civic", "Sport")).unwrap();
        assert_eq!(sport.finance_override.as_ref().unwrap().rate, Some(dec!(1.9)));
        let lx = settings.active_override(&build(2025, "Honda", "Civic", "LX")).unwrap();
        assert_eq!(lx.finance_override.as_ref().unwrap().rate, Some(dec!(3.9)));
    }

    #[test]
    fn test_inactive_override_ignored() {
        let mut ovr = model_override(None, dec!(3.9));
        ovr.active = false;
        let settings = DealerSettings {
            model_overrides: vec![ovr],
            ..Default::default()
        };
        assert!(settings.active_override(&build(2025, "Honda", "Civic", "LX")).is_none());
    }

    #[test]
    fn test_custom_rates_only_without_manufacturer_rates() {
        let mut settings = DealerSettings::default();
        let (table, custom) = settings.dealer_tier_rates();
        assert!(!custom);
        assert_eq!(table.get(CreditTier::Poor), dec!(13.99));

        settings.finance.use_manufacturer_rates = false;
        let (table, custom) = settings.dealer_tier_rates();
        assert!(custom);
        assert_eq!(table.get(CreditTier::Poor), dec!(14.99));
    }

    #[test]
    fn test_negative_tax_rejected() {
        let mut settings = DealerSettings::default();
        settings.fees.county_tax_rate = dec!(-0.01);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_custom_fee_total() {
        let fees = FeeSettings {
            custom_fees: vec![
                CustomFee { name: "Tire".into(), amount: dec!(10), taxable: true },
                CustomFee { name: "Plate".into(), amount: dec!(45), taxable: false },
            ],
            ..Default::default()
        };
        assert_eq!(fees.custom_fee_total(), Some(dec!(55)));
    }
}
