pub mod engine;
pub mod inventory;

pub use engine::{CalculatedPayment, PaymentService, ServiceError};
pub use inventory::{Inventory, InventoryError, StaticInventory};
