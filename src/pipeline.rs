//! End-to-end inference: raw record in, calibrated prediction out

use crate::artifacts::ArtifactBundle;
use crate::error::PipelineResult;
use crate::feature_extractor::FeatureExtractor;
use crate::models::decision::{Decision, DecisionResolver};
use crate::models::inference::EnsembleScores;
use crate::preprocessing::EncodingFallback;
use crate::types::{PredictionResult, RawRecord};
use std::sync::Arc;
use tracing::debug;

/// Everything one request produced. Only `result` goes back to the caller.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub result: PredictionResult,
    pub decision: Decision,
    pub scores: EnsembleScores,
    /// Unseen categorical values that were replaced by code 0
    pub fallbacks: Vec<EncodingFallback>,
}

impl Prediction {
    pub fn fallback_applied(&self) -> bool {
        !self.fallbacks.is_empty()
    }
}

/// Stateless pipeline over a shared, immutable artifact bundle.
///
/// Cheap to clone; every clone reads the same bundle.
#[derive(Clone)]
pub struct SleepPipeline {
    bundle: Arc<ArtifactBundle>,
    extractor: Arc<FeatureExtractor>,
}

impl SleepPipeline {
    pub fn new(bundle: Arc<ArtifactBundle>) -> Self {
        Self {
            bundle,
            extractor: Arc::new(FeatureExtractor::new()),
        }
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    /// Derive, encode, scale, assemble, score, calibrate, decide.
    pub fn predict(&self, record: &RawRecord) -> PipelineResult<Prediction> {
        let frame = self.extractor.extract(record)?;

        // Unseen categories are logged by the encoder
        let preprocessed = self.bundle.preprocessor().run(frame)?;

        let scores = self.bundle.engine().score(&preprocessed.features)?;
        let decision = DecisionResolver::resolve(&scores, self.bundle.target_encoder())?;

        let result = PredictionResult::new(
            decision.predicted_class.clone(),
            decision.ensemble_confidence,
            decision.reference_confidence,
        );

        debug!(
            predicted_class = %result.predicted_class,
            ensemble_confidence = result.ensemble_confidence,
            rf_confidence = result.rf_confidence,
            reference_agrees = !decision.reference_disagrees(),
            fallbacks = preprocessed.fallbacks.len(),
            "Prediction complete"
        );

        Ok(Prediction {
            result,
            decision,
            scores,
            fallbacks: preprocessed.fallbacks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::tests::{fixture_config, fixture_dir};
    use crate::error::PipelineError;
    use crate::feature_extractor::{FeatureValue, DEFAULT_FEATURE_ORDER};
    use crate::models::aggregator::ProbabilityAggregator;
    use crate::preprocessing::SchemaProfile;
    use crate::types::prediction::as_percentage;
    use tracing_test::traced_test;

    fn pipeline() -> SleepPipeline {
        let bundle = ArtifactBundle::load(&fixture_config(&fixture_dir())).unwrap();
        SleepPipeline::new(Arc::new(bundle))
    }

    fn insomnia_leaning() -> RawRecord {
        RawRecord {
            sleep_duration: 3.0,
            quality_of_sleep: 1,
            stress_level: 10,
            physical_activity_level: 1,
            heart_rate: 95,
            ..RawRecord::healthy_baseline()
        }
    }

    fn apnea_leaning() -> RawRecord {
        RawRecord {
            age: 55,
            gender: "Male".to_string(),
            occupation: "Accountant".to_string(),
            bmi_category: "Obese".to_string(),
            sleep_duration: 7.0,
            quality_of_sleep: 2,
            stress_level: 4,
            physical_activity_level: 1,
            heart_rate: 95,
            daily_steps: 2000,
            systolic_bp: 150,
            diastolic_bp: 95,
        }
    }

    #[test]
    fn test_healthy_scenario() {
        let prediction = pipeline().predict(&RawRecord::healthy_baseline()).unwrap();

        assert_eq!(prediction.result.predicted_class, "Healthy");
        assert!(prediction.result.ensemble_confidence > 90.0);
        assert!(!prediction.fallback_applied());
    }

    #[test]
    fn test_insomnia_leaning_scenario() {
        let prediction = pipeline().predict(&insomnia_leaning()).unwrap();

        assert!(["Insomnia", "Sleep Apnea"].contains(&prediction.result.predicted_class.as_str()));

        let (_, top) = ProbabilityAggregator::argmax(&prediction.scores.ensemble_calibrated).unwrap();
        assert_eq!(prediction.result.ensemble_confidence, as_percentage(top));
    }

    #[test]
    fn test_apnea_leaning_scenario() {
        let prediction = pipeline().predict(&apnea_leaning()).unwrap();
        assert_eq!(prediction.result.predicted_class, "Sleep Apnea");
    }

    #[test]
    fn test_confidences_are_percentages() {
        let p = pipeline();
        for record in [RawRecord::healthy_baseline(), insomnia_leaning(), apnea_leaning()] {
            let result = p.predict(&record).unwrap().result;
            for confidence in [result.ensemble_confidence, result.rf_confidence] {
                assert!(confidence > 0.0 && confidence <= 100.0);
                assert_eq!(confidence, (confidence * 100.0).round() / 100.0);
            }
            assert_eq!(
                result.confidence_note,
                "Ensemble confidence is temperature-scaled and should be used as primary."
            );
        }
    }

    #[test]
    fn test_calibrated_distributions_sum_to_one() {
        let scores = pipeline().predict(&insomnia_leaning()).unwrap().scores;

        for distribution in [&scores.ensemble_calibrated, &scores.reference_calibrated] {
            let total: f64 = distribution.iter().sum();
            assert!((total - 1.0).abs() < 1e-6);
            assert!(distribution.iter().all(|p| *p > 0.0 && *p <= 1.0));
        }
    }

    #[test]
    fn test_reference_confidence_is_its_own_argmax() {
        let prediction = pipeline().predict(&apnea_leaning()).unwrap();

        let (index, top) = ProbabilityAggregator::argmax(&prediction.scores.reference_calibrated).unwrap();
        assert_eq!(prediction.decision.reference_class_index, index);
        assert_eq!(prediction.result.rf_confidence, as_percentage(top));
    }

    #[test]
    fn test_unseen_category_completes() {
        let record = RawRecord {
            occupation: "Astronaut".to_string(),
            ..RawRecord::healthy_baseline()
        };

        let prediction = pipeline().predict(&record).unwrap();

        assert!(prediction.fallback_applied());
        assert_eq!(prediction.fallbacks[0].column, "Occupation");
        assert_eq!(prediction.fallbacks[0].value, "Astronaut");
        assert_eq!(prediction.fallbacks[0].substituted_code, 0);
    }

    #[test]
    #[traced_test]
    fn test_unseen_category_warns_once() {
        let record = RawRecord {
            occupation: "Astronaut".to_string(),
            ..RawRecord::healthy_baseline()
        };

        pipeline().predict(&record).unwrap();

        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("WARN")).count() {
                1 => Ok(()),
                n => Err(format!("expected one warning, got {}", n)),
            }
        });
        assert!(logs_contain("Astronaut"));
    }

    #[test]
    fn test_assembled_order_is_canonical() {
        let p = pipeline();
        for record in [RawRecord::healthy_baseline(), insomnia_leaning(), apnea_leaning()] {
            let frame = FeatureExtractor::new().extract(&record).unwrap();
            let features = p.bundle().preprocessor().run(frame).unwrap().features;
            assert_eq!(features.columns(), DEFAULT_FEATURE_ORDER);
        }
    }

    #[test]
    fn test_stress_sleep_index_reaches_models_raw() {
        let frame = FeatureExtractor::new().extract(&insomnia_leaning()).unwrap();
        // 10 * (6 - 1)
        assert_eq!(frame.get("Stress_Sleep_Index"), Some(&FeatureValue::Numeric(50.0)));

        let features = pipeline().bundle().preprocessor().run(frame).unwrap().features;
        assert_eq!(features.for_profile(SchemaProfile::Full)[13], 50.0);
        assert_eq!(features.for_profile(SchemaProfile::Truncated).len(), 13);
    }

    #[test]
    fn test_non_finite_sleep_is_client_error() {
        let record = RawRecord {
            sleep_duration: f64::NAN,
            ..RawRecord::healthy_baseline()
        };

        let err = pipeline().predict(&record).unwrap_err();
        assert!(matches!(err, PipelineError::Preprocessing(_)));
        assert_eq!(err.status_code(), 400);
    }
}
