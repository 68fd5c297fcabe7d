//! restock-core: replenishment purchase-order planning for medication
//! warehouses.
//!
//! A generation run passes a shared [`session::PipelineState`] through
//! three ordered stages (demand forecast, contextual adjustment,
//! supplier allocation) plus a finalize step, orchestrated by
//! [`pipeline::PlanGenerator`] with an overall timeout, progress
//! reporting, reasoning traces, and a TTL response cache. Each stage may
//! consult an external advisory service ([`advisory`]) and degrades
//! deterministically when it is unavailable.

pub mod advisory;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod session;
pub mod stages;
pub mod testing;

pub use catalog::{ConsumptionSample, MedicationItem, Supplier, SupplierStatus};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use pipeline::{
    GenerationRequest, GenerationResponse, GeneratorConfig, OrderLine, PlanGenerator,
};
pub use session::{ProgressHandle, ProgressUpdate, RunStatus, StageName};
