//! Fitted standardization transform

use crate::error::{PipelineError, PipelineResult};
use crate::feature_extractor::{FeatureFrame, FeatureValue};
use serde::Deserialize;

/// `(x - mean) / scale` over a fixed, named column subset.
///
/// Mirrors a fitted standard scaler: `feature_names`, `mean` and `scale` are
/// index-aligned. A zero scale marks a constant training column and is
/// treated as 1.0.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(feature_names: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> PipelineResult<Self> {
        let scaler = Self {
            feature_names,
            mean,
            scale,
        };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Check the fitted parameters are usable.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.feature_names.is_empty() {
            return Err(PipelineError::config("scaler has no features"));
        }
        if self.mean.len() != self.feature_names.len() || self.scale.len() != self.feature_names.len() {
            return Err(PipelineError::config(format!(
                "scaler shape mismatch: {} names, {} means, {} scales",
                self.feature_names.len(),
                self.mean.len(),
                self.scale.len()
            )));
        }
        if let Some(i) = self
            .mean
            .iter()
            .chain(self.scale.iter())
            .position(|v| !v.is_finite())
        {
            let name = &self.feature_names[i % self.feature_names.len()];
            return Err(PipelineError::config(format!(
                "scaler parameter for '{}' is not finite",
                name
            )));
        }
        Ok(())
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn scales(&self, column: &str) -> bool {
        self.feature_names.iter().any(|n| n == column)
    }

    /// Standardize the fitted columns of `frame` in place.
    ///
    /// All fitted columns must be present and numeric, otherwise nothing is
    /// touched and a preprocessing error names the offending columns.
    pub fn transform(&self, frame: &mut FeatureFrame) -> PipelineResult<()> {
        let missing: Vec<&str> = self
            .feature_names
            .iter()
            .filter(|name| !frame.contains(name))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::preprocessing(format!(
                "scaler expects columns {:?} which are not available (have {:?})",
                missing,
                frame.names()
            )));
        }

        let mut scaled = Vec::with_capacity(self.feature_names.len());
        for ((name, mean), scale) in self.feature_names.iter().zip(&self.mean).zip(&self.scale) {
            let value = frame.numeric(name)?;
            let scale = if *scale == 0.0 { 1.0 } else { *scale };
            scaled.push((name, (value - mean) / scale));
        }

        for (name, value) in scaled {
            frame.set(name, FeatureValue::Numeric(value));
        }

        Ok(())
    }
}
