//! Warehouse catalog data types.
//!
//! These are the immutable inputs to a generation run: the medication
//! items being replenished, their consumption history, and the suppliers
//! that can fulfil orders. They are snapshots provided by the caller;
//! the pipeline never mutates them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A medication item eligible for replenishment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationItem {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Therapeutic category (e.g. "antibiotic", "chronic cardiovascular").
    /// Drives the adjustment stage's rule table.
    pub category: String,
    /// Minimum orderable multiple. Always >= 1.
    pub pack_size: u32,
    /// Units currently on hand.
    pub current_stock: u32,
    /// Stock level that triggers replenishment.
    pub reorder_point: u32,
    /// Buffer stock kept on top of the reorder point.
    pub safety_stock: u32,
    /// Hard storage ceiling. None = unconstrained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stock: Option<u32>,
    /// Catalog-level average daily consumption, used when no history exists.
    pub avg_daily_consumption: f64,
    /// The supplier with a negotiated rate for this item.
    pub primary_supplier_id: String,
    /// Negotiated unit price.
    pub unit_price: f64,
}

impl MedicationItem {
    /// Create an item with neutral defaults; adjust via the `with_*` builders.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: String::new(),
            pack_size: 1,
            current_stock: 0,
            reorder_point: 0,
            safety_stock: 0,
            max_stock: None,
            avg_daily_consumption: 0.0,
            primary_supplier_id: String::new(),
            unit_price: 0.0,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_pack_size(mut self, pack_size: u32) -> Self {
        self.pack_size = pack_size.max(1);
        self
    }

    pub fn with_stock_levels(mut self, current: u32, reorder_point: u32, safety: u32) -> Self {
        self.current_stock = current;
        self.reorder_point = reorder_point;
        self.safety_stock = safety;
        self
    }

    pub fn with_max_stock(mut self, max_stock: u32) -> Self {
        self.max_stock = Some(max_stock);
        self
    }

    pub fn with_avg_daily_consumption(mut self, avg: f64) -> Self {
        self.avg_daily_consumption = avg;
        self
    }

    pub fn with_supplier(mut self, supplier_id: impl Into<String>, unit_price: f64) -> Self {
        self.primary_supplier_id = supplier_id.into();
        self.unit_price = unit_price;
        self
    }
}

/// One observed consumption data point.
///
/// Histories are ordered most-recent-last, one sample per day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConsumptionSample {
    /// Day the consumption was recorded.
    pub date: NaiveDate,
    /// Units consumed that day.
    pub quantity: f64,
}

impl ConsumptionSample {
    pub fn new(date: NaiveDate, quantity: f64) -> Self {
        Self { date, quantity }
    }
}

/// Operational status of a supplier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SupplierStatus {
    /// Operating normally.
    Nominal,
    /// Known supply shortage; deliveries degraded.
    Shortage,
    /// No recent status information.
    #[default]
    Unknown,
}

impl SupplierStatus {
    /// Scoring contribution used by the allocation stage.
    pub fn score(&self) -> f64 {
        match self {
            SupplierStatus::Nominal => 1.0,
            SupplierStatus::Shortage => 0.5,
            SupplierStatus::Unknown => 0.0,
        }
    }
}

/// A supplier that can fulfil purchase orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Supplier {
    /// Unique identifier.
    pub id: String,
    /// Display name, also matched against advisory supplier preferences.
    pub name: String,
    /// Operational status.
    #[serde(default)]
    pub status: SupplierStatus,
    /// Average days between order placement and delivery.
    pub avg_lead_time_days: f64,
}

impl Supplier {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: SupplierStatus::Unknown,
            avg_lead_time_days: 0.0,
        }
    }

    pub fn with_status(mut self, status: SupplierStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_lead_time(mut self, days: f64) -> Self {
        self.avg_lead_time_days = days;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_builder() {
        let item = MedicationItem::new("med-1", "Amoxicillin 500mg")
            .with_category("antibiotic")
            .with_pack_size(30)
            .with_stock_levels(40, 50, 20)
            .with_max_stock(600)
            .with_avg_daily_consumption(10.0)
            .with_supplier("sup-1", 0.45);

        assert_eq!(item.id, "med-1");
        assert_eq!(item.pack_size, 30);
        assert_eq!(item.current_stock, 40);
        assert_eq!(item.max_stock, Some(600));
        assert_eq!(item.primary_supplier_id, "sup-1");
    }

    #[test]
    fn test_pack_size_never_zero() {
        let item = MedicationItem::new("med-1", "Test").with_pack_size(0);
        assert_eq!(item.pack_size, 1);
    }

    #[test]
    fn test_supplier_status_score() {
        assert_eq!(SupplierStatus::Nominal.score(), 1.0);
        assert_eq!(SupplierStatus::Shortage.score(), 0.5);
        assert_eq!(SupplierStatus::Unknown.score(), 0.0);
    }

    #[test]
    fn test_supplier_status_serialization() {
        let json = serde_json::to_string(&SupplierStatus::Shortage).unwrap();
        assert_eq!(json, "\"shortage\"");

        let parsed: SupplierStatus = serde_json::from_str("\"nominal\"").unwrap();
        assert_eq!(parsed, SupplierStatus::Nominal);
    }

    #[test]
    fn test_item_serialization_skips_absent_max_stock() {
        let item = MedicationItem::new("med-1", "Test");
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("max_stock"));

        let parsed: MedicationItem = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, item);
    }
}
