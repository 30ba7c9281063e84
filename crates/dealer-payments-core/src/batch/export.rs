use std::io;

use super::runner::BatchSummary;
use crate::error::PaymentError;
use crate::EngineResult;

pub const CSV_HEADER: [&str; 6] = [
    "VIN",
    "Stock Number",
    "Status",
    "Monthly Payment",
    "Due at Signing",
    "Error",
];

/// Write one CSV row per vehicle, header first. Failed rows carry empty
/// payment columns and the error text.
pub fn write_csv<W: io::Write>(summary: &BatchSummary, writer: W) -> EngineResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;

    for row in &summary.results {
        let status = if row.success { "Success" } else { "Failed" };
        let payment = row.payment.map(|p| p.to_string()).unwrap_or_default();
        let signing = row.total_at_signing.map(|t| t.to_string()).unwrap_or_default();
        wtr.write_record([
            row.vin.as_str(),
            row.stock_number.as_str(),
            status,
            payment.as_str(),
            signing.as_str(),
            row.error.as_deref().unwrap_or_default(),
        ])?;
    }

    wtr.flush()
        .map_err(|e| PaymentError::SerializationError(format!("CSV flush failed: {e}")))
}

pub fn to_csv_string(summary: &BatchSummary) -> EngineResult<String> {
    let mut buf = Vec::new();
    write_csv(summary, &mut buf)?;
    String::from_utf8(buf).map_err(|e| PaymentError::SerializationError(e.to_string()))
}
