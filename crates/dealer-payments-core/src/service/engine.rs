//! Payment service over injected inventory, rate cache and settings.
//!
//! The service is the async edge of the engine: it looks vehicles up, makes
//! sure manufacturer rates are loaded for their makes, then hands a snapshot
//! to the synchronous calculators.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::inventory::{Inventory, InventoryError};
use crate::batch::runner::{summarize, BatchItemResult, BatchSummary};
use crate::calculators::{calculate, CalculationContext, CalculationRequest};
use crate::error::PaymentError;
use crate::rates::cache::RateCache;
use crate::rates::records::ManufacturerRateRecord;
use crate::settings::DealerSettings;
use crate::types::{CalculationType, PaymentResult, Vehicle};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Vehicle not found: {vin}")]
    VehicleNotFound { vin: String },

    #[error("Calculation failed for {vin}: {source}")]
    Calculation {
        vin: String,
        #[source]
        source: PaymentError,
    },

    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

/// A single-vehicle calculation together with the vehicle it was run for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatedPayment {
    pub vehicle: Vehicle,
    pub calculation: PaymentResult,
}

pub struct PaymentService {
    inventory: Arc<dyn Inventory>,
    rates: Arc<RateCache>,
    settings: Arc<DealerSettings>,
    /// Fixed pricing date; today when unset
    as_of: Option<NaiveDate>,
}

impl PaymentService {
    pub fn new(inventory: Arc<dyn Inventory>, rates: Arc<RateCache>, settings: Arc<DealerSettings>) -> Self {
        Self {
            inventory,
            rates,
            settings,
            as_of: None,
        }
    }

    /// Price as of a fixed date instead of today.
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn settings(&self) -> &DealerSettings {
        &self.settings
    }

    fn pricing_date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Look a vehicle up by VIN and calculate it.
    pub async fn calculate_payment(
        &self,
        vin: &str,
        request: &CalculationRequest,
    ) -> Result<CalculatedPayment, ServiceError> {
        let vehicle = self
            .inventory
            .find_by_vin(vin)
            .await?
            .ok_or_else(|| ServiceError::VehicleNotFound { vin: vin.to_string() })?;
        let calculation = self.calculate_vehicle(&vehicle, request).await?;
        Ok(CalculatedPayment { vehicle, calculation })
    }

    /// Calculate a vehicle supplied by the caller.
    pub async fn calculate_vehicle(
        &self,
        vehicle: &Vehicle,
        request: &CalculationRequest,
    ) -> Result<PaymentResult, ServiceError> {
        let records = self.load_rates([vehicle.build.make.as_str()], request).await;
        let ctx = CalculationContext::new(&self.settings, &records, self.pricing_date());
        calculate(&ctx, vehicle, request).map_err(|source| ServiceError::Calculation {
            vin: vehicle.vin.clone(),
            source,
        })
    }

    /// Calculate the whole inventory. Only an inventory failure fails the call;
    /// per-vehicle failures land on their rows.
    pub async fn calculate_bulk(&self, request: &CalculationRequest) -> Result<BatchSummary, ServiceError> {
        let vehicles = self.inventory.vehicles().await?;
        Ok(self.calculate_vehicles(&vehicles, request).await)
    }

    /// Fan one calculation out per vehicle over a single rate snapshot.
    pub async fn calculate_vehicles(&self, vehicles: &[Vehicle], request: &CalculationRequest) -> BatchSummary {
        let makes: BTreeSet<String> = vehicles
            .iter()
            .map(|v| v.build.make.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        let records = self.load_rates(&makes, request).await;
        let as_of = self.pricing_date();
        let settings: &DealerSettings = &self.settings;
        let records: &[ManufacturerRateRecord] = &records;

        let tasks = vehicles.iter().map(|vehicle| async move {
            let ctx = CalculationContext::new(settings, records, as_of);
            BatchItemResult::from_outcome(vehicle, calculate(&ctx, vehicle, request))
        });
        let results = join_all(tasks).await;

        let summary = summarize(request.calculation_type(), results);
        tracing::info!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            average_payment = %summary.average_payment,
            "bulk calculation finished"
        );
        summary
    }

    async fn load_rates<I, S>(&self, makes: I, request: &CalculationRequest) -> Vec<ManufacturerRateRecord>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // Lease money factors read manufacturer offers regardless of the finance switch
        let is_finance = request.calculation_type() == CalculationType::Finance;
        if is_finance && !self.settings.finance.use_manufacturer_rates {
            return Vec::new();
        }
        self.rates.rates_for_makes(makes).await
    }
}

impl std::fmt::Debug for PaymentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentService")
            .field("dealer_id", &self.settings.dealer_id)
            .field("as_of", &self.as_of)
            .finish_non_exhaustive()
    }
}
