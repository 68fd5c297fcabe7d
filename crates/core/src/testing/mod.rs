//! Testing utilities and mock implementations.
//!
//! Provides a mock advisory client and shared fixtures so the pipeline
//! can be exercised end to end without network access.

mod mock_advisory;

pub use mock_advisory::MockAdvisory;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::NaiveDate;

    use crate::catalog::{ConsumptionSample, MedicationItem, Supplier, SupplierStatus};

    /// A medication item with reasonable defaults.
    pub fn medication_item(id: &str, name: &str) -> MedicationItem {
        MedicationItem::new(id, name)
            .with_category("antibiotic")
            .with_pack_size(30)
            .with_stock_levels(40, 50, 20)
            .with_avg_daily_consumption(10.0)
            .with_supplier("sup-1", 0.45)
    }

    /// A flat consumption history: `days` samples of `per_day` units.
    pub fn flat_history(days: u32, per_day: f64) -> Vec<ConsumptionSample> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        (0..days)
            .map(|d| ConsumptionSample::new(start + chrono::Duration::days(d as i64), per_day))
            .collect()
    }

    /// A nominal-status supplier.
    pub fn nominal_supplier(id: &str, name: &str, lead_time_days: f64) -> Supplier {
        Supplier::new(id, name)
            .with_status(SupplierStatus::Nominal)
            .with_lead_time(lead_time_days)
    }

    /// The standard two-supplier panel used across tests.
    pub fn supplier_panel() -> Vec<Supplier> {
        vec![
            nominal_supplier("sup-1", "Alpha Pharma", 3.0),
            nominal_supplier("sup-2", "Beta Med", 6.0),
        ]
    }
}
