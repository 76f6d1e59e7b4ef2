//! Multi-model ensemble scoring with temperature calibration

use crate::error::{PipelineError, PipelineResult};
use crate::models::aggregator::ProbabilityAggregator;
use crate::models::calibration::{temperature_scale, Temperatures};
use crate::models::classifier::LoadedModel;
use crate::preprocessing::{AssembledFeatures, FeatureAssembler};
use std::collections::HashSet;
use tracing::{debug, error, info};

/// Raw and calibrated distributions produced for one request
#[derive(Debug, Clone)]
pub struct EnsembleScores {
    /// Raw distribution of every model, in configuration order
    pub model_probabilities: Vec<(String, Vec<f64>)>,
    pub reference_raw: Vec<f64>,
    pub ensemble_raw: Vec<f64>,
    /// `reference_raw` scaled with the reference temperature
    pub reference_calibrated: Vec<f64>,
    /// `ensemble_raw` scaled with the ensemble temperature
    pub ensemble_calibrated: Vec<f64>,
}

/// Runs every classifier on its schema profile and fuses the results.
pub struct InferenceEngine {
    models: Vec<LoadedModel>,
    reference_index: usize,
    temperatures: Temperatures,
    n_classes: usize,
}

impl InferenceEngine {
    /// Check the models fit together: unique names, exactly one reference
    /// model, input widths matching their profile, class counts matching the
    /// target encoder.
    pub fn new(
        models: Vec<LoadedModel>,
        temperatures: Temperatures,
        n_classes: usize,
        assembler: &FeatureAssembler,
    ) -> PipelineResult<Self> {
        if models.is_empty() {
            return Err(PipelineError::config("no classifiers configured"));
        }
        temperatures.validate()?;

        let mut names = HashSet::new();
        for model in &models {
            if !names.insert(model.name.as_str()) {
                return Err(PipelineError::config(format!(
                    "model name '{}' is used twice",
                    model.name
                )));
            }

            let width = assembler.width(model.profile);
            if let Some(n) = model.classifier.n_features() {
                if n != width {
                    return Err(PipelineError::config(format!(
                        "model '{}' expects {} features but its {:?} profile has {}",
                        model.name, n, model.profile, width
                    )));
                }
            }
            if let Some(n) = model.classifier.n_classes() {
                if n != n_classes {
                    return Err(PipelineError::config(format!(
                        "model '{}' predicts {} classes, target encoder knows {}",
                        model.name, n, n_classes
                    )));
                }
            }
        }

        let references: Vec<usize> = models
            .iter()
            .enumerate()
            .filter(|(_, m)| m.reference)
            .map(|(i, _)| i)
            .collect();
        let reference_index = match references.as_slice() {
            [i] => *i,
            [] => return Err(PipelineError::config("no reference model configured")),
            _ => {
                return Err(PipelineError::config(format!(
                    "{} reference models configured, expected exactly one",
                    references.len()
                )))
            }
        };

        info!(
            models = models.len(),
            reference = %models[reference_index].name,
            t_reference = temperatures.reference,
            t_ensemble = temperatures.ensemble,
            "Inference engine initialized"
        );

        Ok(Self {
            models,
            reference_index,
            temperatures,
            n_classes,
        })
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }

    pub fn models(&self) -> &[LoadedModel] {
        &self.models
    }

    pub fn reference_model(&self) -> &LoadedModel {
        &self.models[self.reference_index]
    }

    pub fn temperatures(&self) -> Temperatures {
        self.temperatures
    }

    /// Score one assembled row with every model.
    pub fn score(&self, features: &AssembledFeatures) -> PipelineResult<EnsembleScores> {
        let mut model_probabilities = Vec::with_capacity(self.models.len());

        for model in &self.models {
            let row = features.for_profile(model.profile);
            let proba = model.classifier.predict_proba(row).map_err(|e| {
                error!(model = %model.name, error = %e, "Model inference failed");
                PipelineError::scoring(format!("model '{}': {}", model.name, e))
            })?;

            if proba.len() != self.n_classes || proba.iter().any(|p| !p.is_finite()) {
                error!(model = %model.name, proba = ?proba, "Model returned an invalid distribution");
                return Err(PipelineError::scoring(format!(
                    "model '{}' returned {} values for {} classes",
                    model.name,
                    proba.len(),
                    self.n_classes
                )));
            }

            debug!(model = %model.name, profile = ?model.profile, proba = ?proba, "Model scored");
            model_probabilities.push((model.name.clone(), proba));
        }

        let distributions: Vec<Vec<f64>> = model_probabilities.iter().map(|(_, p)| p.clone()).collect();
        let ensemble_raw = ProbabilityAggregator::average(&distributions)?;
        let reference_raw = distributions[self.reference_index].clone();

        let reference_calibrated = temperature_scale(&reference_raw, self.temperatures.reference);
        let ensemble_calibrated = temperature_scale(&ensemble_raw, self.temperatures.ensemble);

        debug!(
            ensemble_raw = ?ensemble_raw,
            ensemble_calibrated = ?ensemble_calibrated,
            reference_calibrated = ?reference_calibrated,
            "Ensemble inference complete"
        );

        Ok(EnsembleScores {
            model_probabilities,
            reference_raw,
            ensemble_raw,
            reference_calibrated,
            ensemble_calibrated,
        })
    }
}
