//! Final feature vector assembly in canonical column order

use crate::error::{PipelineError, PipelineResult};
use crate::feature_extractor::{is_known_column, FeatureFrame, PASSTHROUGH_COLUMNS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Input schema a classifier was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaProfile {
    /// Every canonical column, including the unscaled pass-through tail.
    #[default]
    Full,
    /// Canonical columns before the pass-through tail (models trained before
    /// the engineered indices were added).
    Truncated,
}

/// Orders frame columns into the canonical feature vector.
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    feature_order: Vec<String>,
    truncated_width: usize,
}

impl FeatureAssembler {
    /// Validate the canonical order: known columns only, no duplicates, and
    /// the pass-through columns occupy exactly the tail.
    pub fn new(feature_order: Vec<String>) -> PipelineResult<Self> {
        if feature_order.is_empty() {
            return Err(PipelineError::config("feature order is empty"));
        }

        let mut seen = HashSet::new();
        for name in &feature_order {
            if !is_known_column(name) {
                return Err(PipelineError::config(format!(
                    "feature order names unknown column '{}'",
                    name
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::config(format!(
                    "feature order lists '{}' twice",
                    name
                )));
            }
        }

        let passthrough_count = feature_order
            .iter()
            .filter(|n| PASSTHROUGH_COLUMNS.contains(&n.as_str()))
            .count();
        let truncated_width = feature_order.len() - passthrough_count;
        if feature_order[truncated_width..]
            .iter()
            .any(|n| !PASSTHROUGH_COLUMNS.contains(&n.as_str()))
        {
            return Err(PipelineError::config(format!(
                "pass-through columns {:?} must be the last columns of the feature order",
                PASSTHROUGH_COLUMNS
            )));
        }

        Ok(Self {
            feature_order,
            truncated_width,
        })
    }

    pub fn feature_order(&self) -> &[String] {
        &self.feature_order
    }

    /// Input width of a model trained with `profile`.
    pub fn width(&self, profile: SchemaProfile) -> usize {
        match profile {
            SchemaProfile::Full => self.feature_order.len(),
            SchemaProfile::Truncated => self.truncated_width,
        }
    }

    /// Select the canonical columns from a fully encoded and scaled frame.
    pub fn assemble(&self, frame: &FeatureFrame) -> PipelineResult<AssembledFeatures> {
        let mut columns = Vec::with_capacity(self.feature_order.len());
        let mut values = Vec::with_capacity(self.feature_order.len());

        for name in &self.feature_order {
            let value = frame.numeric(name)?;
            columns.push(name.clone());
            values.push(value as f32);
        }

        if columns != self.feature_order {
            return Err(PipelineError::preprocessing(format!(
                "Column mismatch: got {:?}, expected {:?}",
                columns, self.feature_order
            )));
        }

        Ok(AssembledFeatures {
            columns,
            values,
            truncated_width: self.truncated_width,
        })
    }
}

/// One assembled row, viewable per schema profile.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledFeatures {
    columns: Vec<String>,
    values: Vec<f32>,
    truncated_width: usize,
}

impl AssembledFeatures {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Feature row for a model trained with `profile`.
    pub fn for_profile(&self, profile: SchemaProfile) -> &[f32] {
        match profile {
            SchemaProfile::Full => &self.values,
            SchemaProfile::Truncated => &self.values[..self.truncated_width],
        }
    }

    pub fn columns_for_profile(&self, profile: SchemaProfile) -> &[String] {
        match profile {
            SchemaProfile::Full => &self.columns,
            SchemaProfile::Truncated => &self.columns[..self.truncated_width],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::{FeatureValue, DEFAULT_FEATURE_ORDER};

    fn default_order() -> Vec<String> {
        DEFAULT_FEATURE_ORDER.iter().map(|c| c.to_string()).collect()
    }

    fn numeric_frame() -> FeatureFrame {
        // Deliberately not in canonical order
        let mut frame = FeatureFrame::new();
        for (i, name) in DEFAULT_FEATURE_ORDER.iter().rev().enumerate() {
            frame.set(name, FeatureValue::Numeric(i as f64));
        }
        frame
    }

    #[test]
    fn test_assembled_order_matches_canonical() {
        let assembler = FeatureAssembler::new(default_order()).unwrap();
        let assembled = assembler.assemble(&numeric_frame()).unwrap();

        assert_eq!(assembled.columns().to_vec(), default_order());
        // Last canonical column was inserted first
        assert_eq!(assembled.for_profile(SchemaProfile::Full)[13], 0.0);
        assert_eq!(assembled.for_profile(SchemaProfile::Full)[0], 13.0);
    }

    #[test]
    fn test_truncated_profile_is_prefix() {
        let assembler = FeatureAssembler::new(default_order()).unwrap();
        let assembled = assembler.assemble(&numeric_frame()).unwrap();

        assert_eq!(assembler.width(SchemaProfile::Full), 14);
        assert_eq!(assembler.width(SchemaProfile::Truncated), 13);

        let full = assembled.for_profile(SchemaProfile::Full);
        let truncated = assembled.for_profile(SchemaProfile::Truncated);
        assert_eq!(truncated, &full[..13]);
        assert!(!assembled
            .columns_for_profile(SchemaProfile::Truncated)
            .iter()
            .any(|c| c == "Stress_Sleep_Index"));
    }

    #[test]
    fn test_categorical_leftover_is_preprocessing_error() {
        let assembler = FeatureAssembler::new(default_order()).unwrap();
        let mut frame = numeric_frame();
        frame.set("Gender", FeatureValue::Categorical("Female".to_string()));

        let err = assembler.assemble(&frame).unwrap_err();
        assert!(matches!(err, PipelineError::Preprocessing(_)));
    }

    #[test]
    fn test_passthrough_must_be_tail() {
        let mut order = default_order();
        order.swap(12, 13);

        let err = FeatureAssembler::new(order).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_unknown_and_duplicate_columns_rejected() {
        let mut order = default_order();
        order.insert(0, "Blood Oxygen".to_string());
        assert!(FeatureAssembler::new(order).is_err());

        let mut order = default_order();
        order.insert(0, "Age".to_string());
        assert!(FeatureAssembler::new(order).is_err());
    }
}
