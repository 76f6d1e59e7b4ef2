//! Type definitions for the sleep disorder pipeline

pub mod prediction;
pub mod record;

pub use prediction::{HealthStatus, PredictionResult};
pub use record::RawRecord;
