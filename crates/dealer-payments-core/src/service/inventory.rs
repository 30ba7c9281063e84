use async_trait::async_trait;
use thiserror::Error;

use crate::types::Vehicle;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Inventory unavailable: {0}")]
    Unavailable(String),

    #[error("Inventory parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Source of normalized dealer inventory.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn vehicles(&self) -> Result<Vec<Vehicle>, InventoryError>;

    /// Case-insensitive VIN lookup. `Ok(None)` when the VIN is not stocked.
    async fn find_by_vin(&self, vin: &str) -> Result<Option<Vehicle>, InventoryError> {
        let vin = vin.trim();
        Ok(self
            .vehicles()
            .await?
            .into_iter()
            .find(|v| v.vin.eq_ignore_ascii_case(vin)))
    }
}

/// Inventory held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    vehicles: Vec<Vehicle>,
}

impl StaticInventory {
    pub fn new(vehicles: Vec<Vehicle>) -> Self {
        Self { vehicles }
    }

    /// Parse a JSON array of vehicles.
    pub fn from_json(json: &str) -> Result<Self, InventoryError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

#[async_trait]
impl Inventory for StaticInventory {
    async fn vehicles(&self) -> Result<Vec<Vehicle>, InventoryError> {
        Ok(self.vehicles.clone())
    }
}
