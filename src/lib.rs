//! Sleep Disorder Classification Pipeline Library
//!
//! Turns a raw patient-observation record into a calibrated sleep disorder
//! prediction: derived features, categorical encoding, scaling, multi-model
//! tree-ensemble scoring and temperature calibration.

pub mod artifacts;
pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod producer;
pub mod types;

pub use artifacts::ArtifactBundle;
pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{ErrorResponse, PipelineError, PipelineResult};
pub use feature_extractor::FeatureExtractor;
pub use models::inference::InferenceEngine;
pub use pipeline::{Prediction, SleepPipeline};
pub use producer::ReplyProducer;
pub use types::{HealthStatus, PredictionResult, RawRecord};
