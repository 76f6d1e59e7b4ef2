//! Temperature scaling of class-probability distributions

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Probabilities are clipped to `[PROBABILITY_FLOOR, 1]` before taking logs.
pub const PROBABILITY_FLOOR: f64 = 1e-12;

/// Calibration temperatures fitted offline. One per distribution, never
/// interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperatures {
    /// Applied to the reference model's raw distribution
    pub reference: f64,
    /// Applied to the averaged ensemble distribution
    pub ensemble: f64,
}

impl Temperatures {
    pub fn validate(&self) -> PipelineResult<()> {
        for (name, t) in [("reference", self.reference), ("ensemble", self.ensemble)] {
            if !t.is_finite() || t <= 0.0 {
                return Err(PipelineError::config(format!(
                    "{} temperature must be a positive number, got {}",
                    name, t
                )));
            }
        }
        Ok(())
    }
}

/// Numerically stable softmax: the max logit is subtracted before `exp`.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

/// Rescale a probability distribution with temperature `t`:
/// clip, log, divide by `t`, softmax.
///
/// `t > 1` flattens the distribution, `t < 1` sharpens it; arg-max is
/// unchanged.
///
/// Entries stay strictly positive only while `ln(PROBABILITY_FLOOR) / t`
/// (about `-27.6 / t`) is within `exp` range. Below roughly `t = 0.04` a
/// floored class can underflow to exactly 0; the output still sums to 1.
pub fn temperature_scale(probabilities: &[f64], t: f64) -> Vec<f64> {
    let logits: Vec<f64> = probabilities
        .iter()
        .map(|p| p.clamp(PROBABILITY_FLOOR, 1.0).ln() / t)
        .collect();
    softmax(&logits)
}
