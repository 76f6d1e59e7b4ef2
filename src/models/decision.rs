//! Final class decision from calibrated distributions

use crate::error::{PipelineError, PipelineResult};
use crate::models::aggregator::ProbabilityAggregator;
use crate::models::inference::EnsembleScores;
use crate::preprocessing::LabelEncoder;

/// Outcome of resolving one request's calibrated scores.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub predicted_class: String,
    pub class_index: usize,
    /// Calibrated ensemble probability of `class_index`, in `[0, 1]`
    pub ensemble_confidence: f64,
    /// Arg-max of the calibrated reference distribution. Not part of the
    /// response; kept for logging and metrics.
    pub reference_class_index: usize,
    /// Calibrated reference probability of `reference_class_index`
    pub reference_confidence: f64,
}

impl Decision {
    /// Reference model and ensemble picked different classes.
    pub fn reference_disagrees(&self) -> bool {
        self.class_index != self.reference_class_index
    }
}

pub struct DecisionResolver;

impl DecisionResolver {
    /// Ensemble arg-max decides the label; the reference arg-max is picked
    /// independently and only contributes its probability.
    pub fn resolve(scores: &EnsembleScores, target: &LabelEncoder) -> PipelineResult<Decision> {
        let (class_index, ensemble_confidence) =
            ProbabilityAggregator::argmax(&scores.ensemble_calibrated)
                .ok_or_else(|| PipelineError::scoring("empty ensemble distribution"))?;
        let (reference_class_index, reference_confidence) =
            ProbabilityAggregator::argmax(&scores.reference_calibrated)
                .ok_or_else(|| PipelineError::scoring("empty reference distribution"))?;

        let predicted_class = target
            .inverse_transform(class_index)
            .ok_or_else(|| {
                PipelineError::scoring(format!(
                    "class index {} has no label in the target encoder",
                    class_index
                ))
            })?
            .to_string();

        Ok(Decision {
            predicted_class,
            class_index,
            ensemble_confidence,
            reference_class_index,
            reference_confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> LabelEncoder {
        LabelEncoder::new(vec![
            "Healthy".to_string(),
            "Insomnia".to_string(),
            "Sleep Apnea".to_string(),
        ])
    }

    fn scores(ensemble: Vec<f64>, reference: Vec<f64>) -> EnsembleScores {
        EnsembleScores {
            model_probabilities: Vec::new(),
            reference_raw: reference.clone(),
            ensemble_raw: ensemble.clone(),
            reference_calibrated: reference,
            ensemble_calibrated: ensemble,
        }
    }

    #[test]
    fn test_resolve_uses_ensemble_label() {
        let decision =
            DecisionResolver::resolve(&scores(vec![0.1, 0.3, 0.6], vec![0.2, 0.7, 0.1]), &target())
                .unwrap();

        assert_eq!(decision.predicted_class, "Sleep Apnea");
        assert_eq!(decision.ensemble_confidence, 0.6);
        // Reference picks Insomnia independently; only its probability is used
        assert_eq!(decision.reference_class_index, 1);
        assert_eq!(decision.reference_confidence, 0.7);
        assert!(decision.reference_disagrees());
    }

    #[test]
    fn test_label_out_of_range() {
        let err = DecisionResolver::resolve(
            &scores(vec![0.1, 0.1, 0.1, 0.7], vec![1.0, 0.0, 0.0, 0.0]),
            &target(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Scoring(_)));
    }
}
