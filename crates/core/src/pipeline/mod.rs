//! The generation pipeline: orchestration, caching, and the response.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use restock_core::pipeline::{GeneratorConfig, GenerationRequest, PlanGenerator};
//! use restock_core::stages::{AdjustmentConfig, AllocationConfig, ForecastConfig};
//!
//! let generator = PlanGenerator::new(
//!     GeneratorConfig::default(),
//!     ForecastConfig::default(),
//!     AdjustmentConfig::default(),
//!     AllocationConfig::default(),
//! );
//!
//! let request = GenerationRequest::new(items, suppliers).with_history(history);
//! let response = generator.generate(request, None, Duration::from_secs(60)).await;
//! assert_eq!(response.status.status_type(), "completed");
//! ```

mod cache;
mod config;
mod generator;
mod types;

pub use cache::ResponseCache;
pub use config::GeneratorConfig;
pub use generator::PlanGenerator;
pub use types::{
    GenerationError, GenerationRequest, GenerationResponse, OrderLine, ResponseMetadata,
    StageSummary,
};
