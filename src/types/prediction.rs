//! Response payloads returned to requesters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Advisory attached to every prediction
pub const CONFIDENCE_NOTE: &str =
    "Ensemble confidence is temperature-scaled and should be used as primary.";

/// Calibrated class prediction for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// One of the target encoder's class labels
    pub predicted_class: String,

    /// Calibrated ensemble probability of `predicted_class`, percent, 2 decimals
    pub ensemble_confidence: f64,

    /// Calibrated reference-model top probability, percent, 2 decimals
    pub rf_confidence: f64,

    pub confidence_note: String,
}

impl PredictionResult {
    /// Build a result from probabilities in `[0, 1]`.
    pub fn new(predicted_class: String, ensemble_probability: f64, reference_probability: f64) -> Self {
        Self {
            predicted_class,
            ensemble_confidence: as_percentage(ensemble_probability),
            rf_confidence: as_percentage(reference_probability),
            confidence_note: CONFIDENCE_NOTE.to_string(),
        }
    }
}

/// `0.96731` -> `96.73`
pub fn as_percentage(probability: f64) -> f64 {
    (probability * 100.0 * 100.0).round() / 100.0
}

/// Readiness report for operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// Model name -> "loaded" / "not loaded"
    pub model_status: BTreeMap<String, String>,
    pub loaded_at: DateTime<Utc>,
}
