use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Fractions (0.06875 = 6.875%). Used for tax rates and shares.
pub type Rate = Decimal;

/// Percent-denominated values (6.99 = 6.99% APR, 60 = 60% residual).
pub type Percent = Decimal;

/// Lease money factor (APR / 2400).
pub type MoneyFactor = Decimal;

/// Loan or lease length in months
pub type TermMonths = u32;

/// Ceiling for vehicle prices, incentives and deal amounts. Anything larger
/// is a data-entry error.
pub const MAX_AMOUNT: Money = dec!(1000000000);

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationType {
    Finance,
    Lease,
}

impl CalculationType {
    pub fn as_str(self) -> &'static str {
        match self {
            CalculationType::Finance => "finance",
            CalculationType::Lease => "lease",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncentiveType {
    Finance,
    Lease,
    Cash,
}

impl IncentiveType {
    /// Cash incentives apply to every calculation type.
    pub fn applies_to(self, calculation: CalculationType) -> bool {
        match self {
            IncentiveType::Cash => true,
            IncentiveType::Finance => calculation == CalculationType::Finance,
            IncentiveType::Lease => calculation == CalculationType::Lease,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditTier {
    Excellent,
    #[default]
    Good,
    Fair,
    Poor,
}

impl CreditTier {
    pub const ALL: [CreditTier; 4] = [
        CreditTier::Excellent,
        CreditTier::Good,
        CreditTier::Fair,
        CreditTier::Poor,
    ];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryType {
    #[default]
    New,
    Used,
    Demo,
}

/// Which sticker figure a calculation starts from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingBasis {
    Msrp,
    #[default]
    Selling,
}

/// Where a resolved APR, money factor or residual came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Manufacturer,
    ModelOverride,
    ModelTable,
    MakeTable,
    TermTable,
    DealerCustom,
    DealerDefault,
}

// ---------------------------------------------------------------------------
// Inventory records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleBuild {
    pub year: i32,
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub trim: String,
    #[serde(default)]
    pub body_style: String,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub transmission: String,
    #[serde(default)]
    pub drivetrain: String,
    #[serde(default)]
    pub exterior_color: String,
    #[serde(default)]
    pub interior_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incentive {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: IncentiveType,
    #[serde(default)]
    pub name: String,
    pub amount: Money,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stackable: Option<bool>,
}

impl Incentive {
    /// Incentives are stackable unless explicitly marked otherwise.
    pub fn is_stackable(&self) -> bool {
        self.stackable != Some(false)
    }
}

/// A unit of dealer inventory, as normalized by the inventory collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vehicle {
    pub vin: String,
    #[serde(default)]
    pub stock_no: String,
    #[serde(default)]
    pub inventory_type: InventoryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msrp: Option<Money>,
    /// Days on market
    #[serde(default)]
    pub dom: u32,
    pub build: VehicleBuild,
    #[serde(default, alias = "eligibleIncentives")]
    pub eligible_incentives: Vec<Incentive>,
}

impl Vehicle {
    /// Advertised selling price, falling back to MSRP when no price is listed.
    pub fn selling_price(&self) -> Money {
        positive(self.price)
            .or_else(|| positive(self.msrp))
            .unwrap_or(Decimal::ZERO)
    }

    /// MSRP, falling back to the selling price when no MSRP is listed.
    pub fn sticker_price(&self) -> Money {
        positive(self.msrp)
            .or_else(|| positive(self.price))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn basis_price(&self, basis: PricingBasis) -> Money {
        match basis {
            PricingBasis::Msrp => self.msrp.unwrap_or(Decimal::ZERO),
            PricingBasis::Selling => self.selling_price(),
        }
    }

    pub fn description(&self) -> String {
        format!(
            "{} {} {} {}",
            self.build.year, self.build.make, self.build.model, self.build.trim
        )
        .trim_end()
        .to_string()
    }
}

fn positive(value: Option<Money>) -> Option<Money> {
    value.filter(|v| *v > Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Calculation output
// ---------------------------------------------------------------------------

/// Intermediate amounts behind a payment. Money is rounded to whole units;
/// deductions (incentives, down payment, trade) are reported as positive values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentBreakdown {
    pub vehicle_price: Money,
    pub incentives: Money,
    pub sale_price: Money,
    pub doc_fee: Money,
    pub electronic_filing: Money,
    #[serde(default)]
    pub custom_fees: Money,
    pub sales_tax: Money,
    pub total_amount: Money,
    pub down_payment: Money,
    /// Monthly payment before the display rounding policy, to the cent
    pub payment_before_rounding: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_value: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_financed: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquisition_fee: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capitalized_cost: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residual_value: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depreciation: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finance_charge: Option<Money>,
}

/// A computed finance or lease offer for one vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    #[serde(rename = "type")]
    pub calculation_type: CalculationType,
    pub payment: Money,
    pub term: TermMonths,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apr: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub money_factor: Option<MoneyFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_miles: Option<u32>,
    pub total_at_signing: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_financed: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residual_value: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_price: Option<Money>,
    pub incentives_saved: Money,
    pub disclaimer: String,
    pub has_manufacturer_rate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_source: Option<RateSource>,
    pub breakdown: PaymentBreakdown,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Output envelope
// ---------------------------------------------------------------------------

/// Envelope used by the CLI and bindings around a computed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Wrap a result with its methodology, inputs and timing.
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
