use chrono::NaiveDate;
use dealer_payments_core::batch::{run_batch, to_csv_string};
use dealer_payments_core::calculators::{CalculationContext, CalculationRequest, FinanceParams, LeaseParams};
use dealer_payments_core::rates::sample_records;
use dealer_payments_core::settings::DealerSettings;
use dealer_payments_core::{CalculationType, Incentive, IncentiveType, Vehicle, VehicleBuild};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Fixtures
// ===========================================================================

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 10).unwrap()
}

fn vehicle(vin: &str, make: &str, model: &str, price: Option<Decimal>) -> Vehicle {
    Vehicle {
        vin: vin.into(),
        stock_no: format!("S{}", &vin[vin.len() - 3..]),
        price,
        msrp: price.map(|p| p + dec!(1500)),
        build: VehicleBuild {
            year: 2025,
            make: make.into(),
            model: model.into(),
            trim: "Base".into(),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn lot() -> Vec<Vehicle> {
    let mut broken = vehicle("1FMCU9G60SUA00002", "Ford", "Escape", Some(dec!(31000)));
    broken.eligible_incentives.push(Incentive {
        id: "bad".into(),
        kind: IncentiveType::Cash,
        name: "Misentered Rebate".into(),
        amount: dec!(-500),
        requirements: Vec::new(),
        stackable: None,
    });

    vec![
        vehicle("1FMCU9G60SUA00001", "Ford", "Escape", Some(dec!(31000))),
        broken,
        vehicle("1HGCY1F30SA000003", "Honda", "Accord", None),
        vehicle("1HGCY1F30SA000004", "Honda", "Accord", Some(dec!(29500))),
    ]
}

// ===========================================================================
// Finance batch
// ===========================================================================

#[test]
fn test_mixed_lot_finance() {
    let settings = DealerSettings::default();
    let records = sample_records();
    let ctx = CalculationContext::new(&settings, &records, as_of());
    let request = CalculationRequest::Finance(FinanceParams {
        term: Some(60),
        down_payment: Some(dec!(2000)),
        ..Default::default()
    });

    let summary = run_batch(&ctx, &lot(), &request);

    assert_eq!(summary.calculation_type, CalculationType::Finance);
    assert_eq!((summary.total, summary.successful, summary.failed), (4, 3, 1));

    let escape = summary.results[0].calculation.as_ref().unwrap();
    assert_eq!(escape.apr, Some(dec!(2.9)));

    let broken = &summary.results[1];
    assert!(!broken.success);
    assert!(broken.error.as_deref().unwrap().contains("Misentered Rebate"));

    // unpriced Accord succeeds at zero and stays out of the average
    let unpriced = &summary.results[2];
    assert!(unpriced.success);
    assert_eq!(unpriced.payment, Some(Decimal::ZERO));

    let a = summary.results[0].payment.unwrap();
    let b = summary.results[3].payment.unwrap();
    let expected = ((a + b) / dec!(2)).round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    assert_eq!(summary.average_payment, expected);
}

#[test]
fn test_lease_batch_from_json_request() {
    let settings = DealerSettings::default();
    let ctx = CalculationContext::new(&settings, &[], as_of());
    let request: CalculationRequest = serde_json::from_str(r#"{ "type": "lease", "term": 24 }"#).unwrap();

    let summary = run_batch(&ctx, &lot(), &request);
    assert_eq!(summary.calculation_type, CalculationType::Lease);
    for row in summary.results.iter().filter(|r| r.success) {
        assert_eq!(row.calculation.as_ref().unwrap().term, 24);
    }

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["type"], "lease");
    assert_eq!(json["failed"], 1);
}

#[test]
fn test_absurd_price_fails_only_its_row() {
    let settings = DealerSettings::default();
    let records = sample_records();
    let ctx = CalculationContext::new(&settings, &records, as_of());
    let mut huge = vehicle("1FMCU9G60SUA00009", "Ford", "Escape", Some(dec!(31000)));
    huge.price = Some(Decimal::MAX);
    let vehicles = vec![vehicle("1FMCU9G60SUA00001", "Ford", "Escape", Some(dec!(30000))), huge];

    let summary = run_batch(&ctx, &vehicles, &CalculationRequest::default());

    assert_eq!((summary.total, summary.successful, summary.failed), (2, 1, 1));
    assert!(summary.results[0].success);
    assert!(summary.results[1].error.as_deref().unwrap().contains("price"));
    assert_eq!(summary.average_payment, summary.results[0].payment.unwrap());
}

#[test]
fn test_runaway_settings_fail_rows_not_the_batch() {
    let mut settings = DealerSettings::default();
    settings.lease.money_factors.by_make.clear();
    settings.lease.money_factors.default = Decimal::MAX;
    let ctx = CalculationContext::new(&settings, &[], as_of());
    let request = CalculationRequest::Lease(LeaseParams {
        term: Some(30),
        ..Default::default()
    });

    let summary = run_batch(&ctx, &lot(), &request);

    // priced vehicles overflow, the unpriced Accord still succeeds at zero
    assert_eq!((summary.total, summary.successful, summary.failed), (4, 1, 3));
    assert!(summary.results[0].error.as_deref().unwrap().contains("overflow"));
    assert_eq!(summary.average_payment, Decimal::ZERO);
}

// ===========================================================================
// Export
// ===========================================================================

#[test]
fn test_csv_export_has_row_per_vehicle() {
    let settings = DealerSettings::default();
    let ctx = CalculationContext::new(&settings, &[], as_of());
    let summary = run_batch(&ctx, &lot(), &CalculationRequest::default());

    let csv = to_csv_string(&summary).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "VIN,Stock Number,Status,Monthly Payment,Due at Signing,Error");
    assert!(lines[2].starts_with("1FMCU9G60SUA00002,S002,Failed,,,"));
    assert!(lines[3].starts_with("1HGCY1F30SA000003,S003,Success,0,0,"));
}
