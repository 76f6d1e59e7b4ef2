//! Encoding, scaling and assembly of extracted feature frames

pub mod assembler;
pub mod encoder;
pub mod scaler;

pub use assembler::{AssembledFeatures, FeatureAssembler, SchemaProfile};
pub use encoder::{CategoricalEncoder, EncodingFallback, LabelEncoder};
pub use scaler::StandardScaler;

use crate::error::{PipelineError, PipelineResult};
use crate::feature_extractor::{FeatureFrame, CATEGORICAL_COLUMNS, PASSTHROUGH_COLUMNS};

/// Output of [`Preprocessor::run`]
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub features: AssembledFeatures,
    pub fallbacks: Vec<EncodingFallback>,
}

/// Fitted transforms applied between feature derivation and scoring:
/// encode categories, standardize the scaled subset, assemble.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    encoder: CategoricalEncoder,
    scaler: StandardScaler,
    assembler: FeatureAssembler,
}

impl Preprocessor {
    /// Cross-check the three transforms against each other.
    pub fn new(
        encoder: CategoricalEncoder,
        scaler: StandardScaler,
        assembler: FeatureAssembler,
    ) -> PipelineResult<Self> {
        let order = assembler.feature_order();

        for name in scaler.feature_names() {
            if PASSTHROUGH_COLUMNS.contains(&name.as_str()) {
                return Err(PipelineError::config(format!(
                    "'{}' must reach the models unscaled but the scaler was fitted on it",
                    name
                )));
            }
            if !order.contains(name) {
                return Err(PipelineError::config(format!(
                    "scaler column '{}' is not in the feature order",
                    name
                )));
            }
        }

        for column in encoder.columns() {
            if !CATEGORICAL_COLUMNS.contains(&column.as_str()) {
                return Err(PipelineError::config(format!(
                    "encoder column '{}' is not categorical (expected one of {:?})",
                    column, CATEGORICAL_COLUMNS
                )));
            }
            if !order.contains(column) {
                return Err(PipelineError::config(format!(
                    "categorical column '{}' is not in the feature order",
                    column
                )));
            }
        }

        Ok(Self {
            encoder,
            scaler,
            assembler,
        })
    }

    pub fn assembler(&self) -> &FeatureAssembler {
        &self.assembler
    }

    pub fn encoder(&self) -> &CategoricalEncoder {
        &self.encoder
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Consume an extracted frame and produce the model input row.
    pub fn run(&self, mut frame: FeatureFrame) -> PipelineResult<Preprocessed> {
        let fallbacks = self.encoder.encode(&mut frame)?;
        self.scaler.transform(&mut frame)?;
        let features = self.assembler.assemble(&frame)?;

        Ok(Preprocessed {
            features,
            fallbacks,
        })
    }
}
