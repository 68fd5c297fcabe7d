//! Warehouse catalog: medication items, consumption history, suppliers.

mod types;

pub use types::{ConsumptionSample, MedicationItem, Supplier, SupplierStatus};
