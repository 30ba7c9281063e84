//! Advertising disclaimers for computed offers.
//!
//! The wording follows the dealer's published templates. Every amount is shown
//! in whole dollars with thousands separators; the program expiration is the
//! last day of the month the estimate was produced in, written `M/D/YYYY`.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use super::rounding::round_whole;
use crate::types::{Money, Percent, TermMonths};

/// Disclaimer for a vehicle without a usable price.
pub const PRICE_UNAVAILABLE: &str = "Price information not available";

const FEES_EXCLUDED: &str = "Except as otherwise expressly provided, excludes sales tax, title, registration and other fees.";

#[derive(Debug, Clone)]
pub struct FinanceDisclaimer<'a> {
    pub payment: Money,
    pub term: TermMonths,
    pub apr: Percent,
    pub down_payment: Money,
    pub total_at_signing: Money,
    pub program_name: Option<&'a str>,
    pub as_of: NaiveDate,
}

impl FinanceDisclaimer<'_> {
    pub fn render(&self) -> String {
        let mut text = format!(
            "*Estimated monthly payment of {}/mo based on {} months at {}% APR",
            dollars(self.payment),
            self.term,
            self.apr.normalize()
        );
        if self.down_payment > Decimal::ZERO {
            text.push_str(&format!(
                " with {} down payment. {} total due at signing. ",
                dollars(self.down_payment),
                dollars(self.total_at_signing)
            ));
        } else {
            text.push_str(" with $0 down. ");
        }
        text.push_str(FEES_EXCLUDED);
        text.push_str(" Actual monthly payments will vary. Does not represent a financing offer or guarantee of credit. ");
        if let Some(program) = self.program_name.filter(|p| !p.trim().is_empty()) {
            text.push_str(&format!("Based on {}. ", program.trim()));
        }
        text.push_str(&format!(
            "Not all buyers will qualify; higher financing rates apply for buyers with lower credit ratings. \
             Payment estimate based on financing programs in effect through {}.",
            short_date(month_end(self.as_of))
        ));
        text
    }
}

#[derive(Debug, Clone)]
pub struct LeaseDisclaimer {
    pub payment: Money,
    pub term: TermMonths,
    pub annual_miles: u32,
    pub down_payment: Money,
    /// Doc and filing fees collected at signing
    pub signing_fees: Money,
    /// Upfront lease tax collected at signing, if any
    pub signing_tax: Money,
    pub total_at_signing: Money,
    pub total_lease_cost: Money,
    pub disposition_fee: Money,
    pub excess_mileage_charge: Money,
    pub as_of: NaiveDate,
}

impl LeaseDisclaimer {
    pub fn render(&self) -> String {
        let mut signing = format!(
            "{} total due at lease signing includes {} down payment, first month payment of {}, {} in dealer fees",
            dollars(self.total_at_signing),
            dollars(self.down_payment),
            dollars(self.payment),
            dollars(self.signing_fees)
        );
        if self.signing_tax > Decimal::ZERO {
            signing.push_str(&format!(", {} in lease taxes", dollars(self.signing_tax)));
        }
        signing.push_str(" and $0 security deposit.");

        let mut text = format!(
            "*Estimated monthly lease payment of {}/mo for {} months with {} miles/year. {} \
             Total cost to lessee is {} over the lease term. {} \
             Lessee is responsible for vehicle maintenance, insurance, repairs and charges for excess wear and tear. ",
            dollars(self.payment),
            self.term,
            group_thousands(&self.annual_miles.to_string()),
            signing,
            dollars(self.total_lease_cost),
            FEES_EXCLUDED
        );
        if self.disposition_fee > Decimal::ZERO {
            text.push_str(&format!(
                "A {} disposition fee is due at lease end. ",
                dollars(self.disposition_fee)
            ));
        }
        if self.excess_mileage_charge > Decimal::ZERO {
            text.push_str(&format!(
                "Excess mileage charges of ${:.2}/mile may apply. ",
                self.excess_mileage_charge
            ));
        } else {
            text.push_str("Excess mileage charges may apply. ");
        }
        text.push_str(&format!(
            "Actual monthly payments will vary. \
             Not all lessees may qualify; higher lease rates apply for lessees with lower credit ratings. \
             Payment estimate based on lease programs in effect through {}.",
            short_date(month_end(self.as_of))
        ));
        text
    }
}

/// Last calendar day of `date`'s month.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}

/// `M/D/YYYY` without zero padding.
pub fn short_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}

/// Whole-dollar amount with thousands separators, e.g. `$33,675`.
pub fn dollars(amount: Money) -> String {
    let whole = round_whole(amount);
    let digits = whole.abs().trunc().to_string();
    let sign = if whole < Decimal::ZERO { "-" } else { "" };
    format!("{sign}${}", group_thousands(&digits))
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_end() {
        assert_eq!(month_end(date(2025, 2, 10)), date(2025, 2, 28));
        assert_eq!(month_end(date(2024, 2, 1)), date(2024, 2, 29));
        assert_eq!(month_end(date(2025, 12, 31)), date(2025, 12, 31));
        assert_eq!(short_date(month_end(date(2025, 9, 3))), "9/30/2025");
    }

    #[test]
    fn test_dollars() {
        assert_eq!(dollars(dec!(665)), "$665");
        assert_eq!(dollars(dec!(33674.6)), "$33,675");
        assert_eq!(dollars(dec!(1234567)), "$1,234,567");
        assert_eq!(dollars(Decimal::ZERO), "$0");
        assert_eq!(dollars(dec!(-2500)), "-$2,500");
    }

    #[test]
    fn test_finance_with_down_and_program() {
        let text = FinanceDisclaimer {
            payment: dec!(665),
            term: 60,
            apr: dec!(6.990),
            down_payment: dec!(2000),
            total_at_signing: dec!(2370),
            program_name: Some("Ford Credit Special APR"),
            as_of: date(2025, 9, 3),
        }
        .render();
        assert!(text.starts_with("*Estimated monthly payment of $665/mo based on 60 months at 6.99% APR with $2,000 down payment. $2,370 total due at signing."));
        assert!(text.contains("Based on Ford Credit Special APR. "));
        assert!(text.ends_with("in effect through 9/30/2025."));
    }

    #[test]
    fn test_finance_zero_down_wording() {
        let text = FinanceDisclaimer {
            payment: dec!(580),
            term: 72,
            apr: dec!(5.99),
            down_payment: Decimal::ZERO,
            total_at_signing: dec!(370),
            program_name: None,
            as_of: date(2025, 1, 15),
        }
        .render();
        assert!(text.contains("at 5.99% APR with $0 down. Except"));
        assert!(!text.contains("total due at signing"));
        assert!(!text.contains("Based on"));
    }

    #[test]
    fn test_lease_text() {
        let text = LeaseDisclaimer {
            payment: dec!(340),
            term: 36,
            annual_miles: 12_000,
            down_payment: dec!(2500),
            signing_fees: dec!(225),
            signing_tax: Decimal::ZERO,
            total_at_signing: dec!(3065),
            total_lease_cost: dec!(14740),
            disposition_fee: dec!(350),
            excess_mileage_charge: dec!(0.2),
            as_of: date(2025, 6, 2),
        }
        .render();
        assert!(text.starts_with("*Estimated monthly lease payment of $340/mo for 36 months with 12,000 miles/year."));
        assert!(text.contains("$3,065 total due at lease signing includes $2,500 down payment, first month payment of $340, $225 in dealer fees and $0 security deposit."));
        assert!(text.contains("Total cost to lessee is $14,740 over the lease term."));
        assert!(text.contains("A $350 disposition fee is due at lease end."));
        assert!(text.contains("Excess mileage charges of $0.20/mile may apply."));
        assert!(text.ends_with("lease programs in effect through 6/30/2025."));
    }
}
