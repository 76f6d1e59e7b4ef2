//! Label encoders for categorical columns and the target class

use crate::error::{PipelineError, PipelineResult};
use crate::feature_extractor::{FeatureFrame, FeatureValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Code substituted for categories the encoder never saw during fitting
pub const UNSEEN_CATEGORY_CODE: usize = 0;

/// Fitted label encoder: class string <-> position in `classes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn transform(&self, value: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == value)
    }

    pub fn inverse_transform(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Record of an unseen category that was collapsed onto
/// [`UNSEEN_CATEGORY_CODE`]. Kept so callers can observe the substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingFallback {
    pub column: String,
    pub value: String,
    pub substituted_code: usize,
}

/// On-disk layout of `encoders.json`
#[derive(Debug, Clone, Deserialize)]
pub struct EncodersArtifact {
    pub categorical_columns: Vec<String>,
    pub encoders: BTreeMap<String, LabelEncoder>,
}

/// Replaces categorical frame columns with integer codes.
#[derive(Debug, Clone)]
pub struct CategoricalEncoder {
    columns: Vec<String>,
    encoders: BTreeMap<String, LabelEncoder>,
}

impl CategoricalEncoder {
    /// Every configured column needs its own fitted encoder.
    pub fn new(
        columns: Vec<String>,
        encoders: BTreeMap<String, LabelEncoder>,
    ) -> PipelineResult<Self> {
        for column in &columns {
            match encoders.get(column) {
                None => {
                    return Err(PipelineError::config(format!(
                        "no encoder for categorical column '{}'",
                        column
                    )))
                }
                Some(encoder) if encoder.is_empty() => {
                    return Err(PipelineError::config(format!(
                        "encoder for column '{}' has no classes",
                        column
                    )))
                }
                Some(_) => {}
            }
        }

        Ok(Self { columns, encoders })
    }

    pub fn from_artifact(artifact: EncodersArtifact) -> PipelineResult<Self> {
        Self::new(artifact.categorical_columns, artifact.encoders)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Encode configured columns in place.
    ///
    /// Columns absent from the frame are skipped. Values the encoder does not
    /// know are replaced by code 0 and reported in the returned list; the
    /// request carries on.
    pub fn encode(&self, frame: &mut FeatureFrame) -> PipelineResult<Vec<EncodingFallback>> {
        let mut fallbacks = Vec::new();

        for column in &self.columns {
            let value = match frame.get(column) {
                Some(FeatureValue::Categorical(value)) => value.clone(),
                Some(FeatureValue::Numeric(_)) => {
                    return Err(PipelineError::preprocessing(format!(
                        "categorical column '{}' holds a numeric value",
                        column
                    )))
                }
                None => continue,
            };

            let encoder = self.encoders.get(column).ok_or_else(|| {
                PipelineError::config(format!("no encoder for categorical column '{}'", column))
            })?;

            let code = match encoder.transform(&value) {
                Some(code) => code,
                None => {
                    warn!(
                        column = %column,
                        value = %value,
                        code = UNSEEN_CATEGORY_CODE,
                        "Unseen category, substituting fallback code"
                    );
                    fallbacks.push(EncodingFallback {
                        column: column.clone(),
                        value,
                        substituted_code: UNSEEN_CATEGORY_CODE,
                    });
                    UNSEEN_CATEGORY_CODE
                }
            };

            frame.set(column, FeatureValue::Numeric(code as f64));
        }

        Ok(fallbacks)
    }
}
