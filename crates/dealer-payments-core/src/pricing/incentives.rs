use rust_decimal::Decimal;

use crate::error::PaymentError;
use crate::settings::ModelOverride;
use crate::types::{CalculationType, Incentive, IncentiveType, Money, MAX_AMOUNT};
use crate::EngineResult;

/// Total of the incentives that apply to a calculation: same type or cash,
/// and not marked non-stackable.
pub fn sum_incentives(incentives: &[Incentive], calculation: CalculationType) -> Money {
    incentives
        .iter()
        .filter(|i| i.kind.applies_to(calculation) && i.is_stackable())
        .map(|i| i.amount)
        .sum()
}

/// Incentives contributed by a model override for one calculation type.
///
/// Cash-back, dealer cash, loyalty and trade-in bonuses become cash
/// incentives sharing the override's stackable flag. The bonus cash and
/// additional discount of the matching finance or lease override become
/// incentives of that type.
pub fn override_incentives(ovr: &ModelOverride, calculation: CalculationType) -> Vec<Incentive> {
    let mut out = Vec::new();

    if let Some(extra) = &ovr.incentives {
        let cash = [
            ("cash-back", "Cash Back", extra.cash_back),
            ("dealer-cash", "Dealer Cash", extra.dealer_cash),
            ("loyalty-bonus", "Loyalty Bonus", extra.loyalty_bonus),
            ("trade-in-bonus", "Trade-In Bonus", extra.trade_in_bonus),
        ];
        for (id, name, amount) in cash {
            if let Some(amount) = amount.filter(|a| !a.is_zero()) {
                out.push(incentive(&ovr.id, id, name, IncentiveType::Cash, amount, extra.stackable));
            }
        }
    }

    let (kind, bonus, discount) = match calculation {
        CalculationType::Finance => {
            let f = ovr.finance_override.as_ref();
            (IncentiveType::Finance, f.and_then(|f| f.bonus_cash), f.and_then(|f| f.additional_discount))
        }
        CalculationType::Lease => {
            let l = ovr.lease_override.as_ref();
            (IncentiveType::Lease, l.and_then(|l| l.bonus_cash), l.and_then(|l| l.additional_discount))
        }
    };
    if let Some(amount) = bonus.filter(|a| !a.is_zero()) {
        out.push(incentive(&ovr.id, "bonus-cash", "Bonus Cash", kind, amount, None));
    }
    if let Some(amount) = discount.filter(|a| !a.is_zero()) {
        out.push(incentive(&ovr.id, "additional-discount", "Additional Discount", kind, amount, None));
    }
    out
}

/// Rejects negative or implausibly large incentive amounts.
pub fn validate_incentives(incentives: &[Incentive]) -> EngineResult<()> {
    for incentive in incentives {
        if incentive.amount < Decimal::ZERO {
            return Err(PaymentError::invalid(
                "eligible_incentives",
                format!("Incentive '{}' has a negative amount", display_name(incentive)),
            ));
        }
        if incentive.amount > MAX_AMOUNT {
            return Err(PaymentError::invalid(
                "eligible_incentives",
                format!("Incentive '{}' exceeds {MAX_AMOUNT}", display_name(incentive)),
            ));
        }
    }
    Ok(())
}

fn display_name(incentive: &Incentive) -> &str {
    if incentive.name.is_empty() {
        &incentive.id
    } else {
        &incentive.name
    }
}

fn incentive(
    override_id: &str,
    id: &str,
    name: &str,
    kind: IncentiveType,
    amount: Money,
    stackable: Option<bool>,
) -> Incentive {
    Incentive {
        id: format!("{override_id}:{id}"),
        kind,
        name: name.to_string(),
        amount,
        requirements: Vec::new(),
        stackable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{FinanceOverride, ModelKey, OverrideIncentives};
    use rust_decimal_macros::dec;

    fn inc(kind: IncentiveType, amount: Money, stackable: Option<bool>) -> Incentive {
        Incentive {
            id: String::new(),
            kind,
            name: String::new(),
            amount,
            requirements: Vec::new(),
            stackable,
        }
    }

    #[test]
    fn test_sum_filters_type_and_stackable() {
        let list = vec![
            inc(IncentiveType::Cash, dec!(1000), None),
            inc(IncentiveType::Finance, dec!(500), Some(true)),
            inc(IncentiveType::Lease, dec!(750), None),
            inc(IncentiveType::Cash, dec!(2000), Some(false)),
        ];
        assert_eq!(sum_incentives(&list, CalculationType::Finance), dec!(1500));
        assert_eq!(sum_incentives(&list, CalculationType::Lease), dec!(1750));
        assert_eq!(sum_incentives(&[], CalculationType::Lease), Decimal::ZERO);
    }

    #[test]
    fn test_override_incentives() {
        let ovr = ModelOverride {
            id: "civic-25".into(),
            key: ModelKey::default(),
            active: true,
            finance_override: Some(FinanceOverride {
                bonus_cash: Some(dec!(500)),
                ..Default::default()
            }),
            lease_override: None,
            incentives: Some(OverrideIncentives {
                dealer_cash: Some(dec!(1000)),
                loyalty_bonus: Some(dec!(0)),
                stackable: Some(false),
                ..Default::default()
            }),
            notes: None,
        };

        let finance = override_incentives(&ovr, CalculationType::Finance);
        assert_eq!(finance.len(), 2);
        // dealer cash is non-stackable, so only bonus cash counts
        assert_eq!(sum_incentives(&finance, CalculationType::Finance), dec!(500));

        let lease = override_incentives(&ovr, CalculationType::Lease);
        assert_eq!(lease.len(), 1);
        assert_eq!(lease[0].id, "civic-25:dealer-cash");
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut bad = inc(IncentiveType::Cash, dec!(-100), None);
        bad.name = "Conquest".into();
        let err = validate_incentives(&[bad]).unwrap_err();
        assert!(err.to_string().contains("Conquest"));
    }

    #[test]
    fn test_oversized_amount_rejected() {
        let ok = inc(IncentiveType::Cash, MAX_AMOUNT, None);
        assert!(validate_incentives(&[ok]).is_ok());
        let huge = inc(IncentiveType::Cash, Decimal::MAX, None);
        assert!(validate_incentives(&[huge]).is_err());
    }
}
