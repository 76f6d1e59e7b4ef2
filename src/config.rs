//! Configuration management for the sleep disorder pipeline

use crate::preprocessing::SchemaProfile;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "SLEEP_PIPELINE_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub artifacts: ArtifactsConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Request/reply subject for predictions
    pub predict_subject: String,
    /// Request/reply subject for readiness checks
    pub health_subject: String,
}

/// Serialization format of a model artifact
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// ONNX graph run through ONNX Runtime
    Onnx,
    /// Native JSON tree ensemble
    Trees,
}

impl ModelFormat {
    /// Guess the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("onnx") => Some(ModelFormat::Onnx),
            Some("json") => Some(ModelFormat::Trees),
            _ => None,
        }
    }
}

/// One classifier of the ensemble
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    /// File name inside the artifact directory
    pub file: String,
    /// Inferred from the file extension when absent
    #[serde(default)]
    pub format: Option<ModelFormat>,
    /// Schema the model was trained with
    #[serde(default)]
    pub profile: SchemaProfile,
    /// Source of the secondary confidence. Exactly one model sets this.
    #[serde(default)]
    pub reference: bool,
}

/// Artifact bundle location and layout
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory holding every artifact file
    pub dir: String,
    #[serde(default = "default_scaler_file")]
    pub scaler_file: String,
    #[serde(default = "default_encoders_file")]
    pub encoders_file: String,
    #[serde(default = "default_target_encoder_file")]
    pub target_encoder_file: String,
    #[serde(default = "default_feature_order_file")]
    pub feature_order_file: String,
    #[serde(default = "default_calibration_file")]
    pub calibration_file: String,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    pub models: Vec<ModelSpec>,
}

fn default_scaler_file() -> String {
    "scaler.json".to_string()
}

fn default_encoders_file() -> String {
    "encoders.json".to_string()
}

fn default_target_encoder_file() -> String {
    "target_encoder.json".to_string()
}

fn default_feature_order_file() -> String {
    "feature_order.json".to_string()
}

fn default_calibration_file() -> String {
    "calibration.json".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

impl ArtifactsConfig {
    /// Layout with default file names and the given models.
    pub fn new(dir: impl Into<String>, models: Vec<ModelSpec>) -> Self {
        Self {
            dir: dir.into(),
            scaler_file: default_scaler_file(),
            encoders_file: default_encoders_file(),
            target_encoder_file: default_target_encoder_file(),
            feature_order_file: default_feature_order_file(),
            calibration_file: default_calibration_file(),
            onnx_threads: default_onnx_threads(),
            models,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of requests processed concurrently
    pub workers: usize,
    /// Seconds between metrics summaries (0 disables the reporter)
    pub metrics_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `$SLEEP_PIPELINE_CONFIG` or `config/config.toml`
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config/config.toml".to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path. `SLEEP__`-prefixed
    /// environment variables override file values, e.g.
    /// `SLEEP__NATS__URL=nats://broker:4222`.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("SLEEP").prefix_separator("__").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                predict_subject: "sleep.predict".to_string(),
                health_subject: "sleep.health".to_string(),
            },
            artifacts: ArtifactsConfig::new(
                "models",
                vec![
                    ModelSpec {
                        name: "random_forest".to_string(),
                        file: "rf_model.onnx".to_string(),
                        format: Some(ModelFormat::Onnx),
                        profile: SchemaProfile::Full,
                        reference: true,
                    },
                    ModelSpec {
                        name: "xgboost".to_string(),
                        file: "xgb_model.onnx".to_string(),
                        format: Some(ModelFormat::Onnx),
                        profile: SchemaProfile::Full,
                        reference: false,
                    },
                ],
            ),
            pipeline: PipelineConfig {
                workers: 4,
                metrics_interval_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
