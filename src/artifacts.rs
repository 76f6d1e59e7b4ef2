//! Immutable artifact bundle loaded once at startup

use crate::config::ArtifactsConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::calibration::Temperatures;
use crate::models::classifier::LoadedModel;
use crate::models::inference::InferenceEngine;
use crate::models::loader::ModelLoader;
use crate::preprocessing::encoder::EncodersArtifact;
use crate::preprocessing::{
    CategoricalEncoder, FeatureAssembler, LabelEncoder, Preprocessor, StandardScaler,
};
use crate::types::HealthStatus;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::info;

/// Every fitted transform, classifier and calibration constant the pipeline
/// reads. Nothing in it changes after construction; share it behind an `Arc`.
pub struct ArtifactBundle {
    preprocessor: Preprocessor,
    engine: InferenceEngine,
    target_encoder: LabelEncoder,
    loaded_at: DateTime<Utc>,
}

impl ArtifactBundle {
    /// Load the complete bundle from the artifact directory.
    ///
    /// Every file is checked for existence before anything is parsed, and any
    /// failure aborts the load.
    pub fn load(config: &ArtifactsConfig) -> PipelineResult<Self> {
        let dir = Path::new(&config.dir);

        let mut required: Vec<PathBuf> = [
            &config.scaler_file,
            &config.encoders_file,
            &config.target_encoder_file,
            &config.feature_order_file,
            &config.calibration_file,
        ]
        .iter()
        .map(|f| dir.join(f))
        .collect();
        required.extend(config.models.iter().map(|m| dir.join(&m.file)));

        for path in &required {
            if !path.exists() {
                return Err(PipelineError::config(format!(
                    "Required file not found: {}",
                    path.display()
                )));
            }
        }

        let scaler: StandardScaler = read_json(&dir.join(&config.scaler_file))?;
        scaler.validate()?;

        let encoders: EncodersArtifact = read_json(&dir.join(&config.encoders_file))?;
        let encoder = CategoricalEncoder::from_artifact(encoders)?;

        let target_encoder: LabelEncoder = read_json(&dir.join(&config.target_encoder_file))?;

        let feature_order: Vec<String> = read_json(&dir.join(&config.feature_order_file))?;
        let assembler = FeatureAssembler::new(feature_order)?;

        let temperatures: Temperatures = read_json(&dir.join(&config.calibration_file))?;

        let preprocessor = Preprocessor::new(encoder, scaler, assembler)?;

        let models = ModelLoader::with_threads(config.onnx_threads).load_all_models(dir, &config.models)?;

        let bundle = Self::from_parts(preprocessor, models, temperatures, target_encoder)?;

        info!(
            dir = %dir.display(),
            models = ?bundle.engine.model_names(),
            features = bundle.preprocessor.assembler().feature_order().len(),
            classes = ?bundle.target_encoder.classes(),
            "All model artifacts loaded successfully"
        );

        Ok(bundle)
    }

    /// Assemble a bundle from already-built parts.
    pub fn from_parts(
        preprocessor: Preprocessor,
        models: Vec<LoadedModel>,
        temperatures: Temperatures,
        target_encoder: LabelEncoder,
    ) -> PipelineResult<Self> {
        if target_encoder.len() < 2 {
            return Err(PipelineError::config("target encoder needs at least 2 classes"));
        }

        let engine = InferenceEngine::new(
            models,
            temperatures,
            target_encoder.len(),
            preprocessor.assembler(),
        )?;

        Ok(Self {
            preprocessor,
            engine,
            target_encoder,
            loaded_at: Utc::now(),
        })
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    pub fn target_encoder(&self) -> &LabelEncoder {
        &self.target_encoder
    }

    pub fn feature_order(&self) -> &[String] {
        self.preprocessor.assembler().feature_order()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Per-model readiness. A bundle only exists fully loaded, so every model
    /// reports "loaded".
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            model_status: self
                .engine
                .model_names()
                .into_iter()
                .map(|name| (name, "loaded".to_string()))
                .collect(),
            loaded_at: self.loaded_at,
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> PipelineResult<T> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::config(format!("failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&json)
        .map_err(|e| PipelineError::config(format!("malformed artifact {}: {}", path.display(), e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ModelSpec;
    use crate::preprocessing::SchemaProfile;

    pub(crate) fn fixture_dir() -> String {
        format!("{}/tests/fixtures/bundle", env!("CARGO_MANIFEST_DIR"))
    }

    pub(crate) fn fixture_config(dir: &str) -> ArtifactsConfig {
        ArtifactsConfig::new(
            dir,
            vec![
                ModelSpec {
                    name: "random_forest".to_string(),
                    file: "rf_model.json".to_string(),
                    format: None,
                    profile: SchemaProfile::Full,
                    reference: true,
                },
                ModelSpec {
                    name: "xgboost".to_string(),
                    file: "xgb_model.json".to_string(),
                    format: None,
                    profile: SchemaProfile::Truncated,
                    reference: false,
                },
            ],
        )
    }

    /// Copy the fixture bundle somewhere it can be broken.
    fn scratch_bundle() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for entry in std::fs::read_dir(fixture_dir()).unwrap() {
            let entry = entry.unwrap();
            std::fs::copy(entry.path(), dir.path().join(entry.file_name())).unwrap();
        }
        dir
    }

    #[test]
    fn test_load_fixture_bundle() {
        let bundle = ArtifactBundle::load(&fixture_config(&fixture_dir())).unwrap();

        assert_eq!(bundle.engine().model_names(), vec!["random_forest", "xgboost"]);
        assert_eq!(bundle.engine().reference_model().name, "random_forest");
        assert_eq!(bundle.feature_order().len(), 14);
        assert_eq!(bundle.target_encoder().classes(), ["Healthy", "Insomnia", "Sleep Apnea"]);

        let health = bundle.health();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.model_status.get("xgboost").map(String::as_str), Some("loaded"));
    }

    #[test]
    fn test_missing_artifact_is_fatal() {
        let dir = scratch_bundle();
        std::fs::remove_file(dir.path().join("calibration.json")).unwrap();

        let err = ArtifactBundle::load(&fixture_config(dir.path().to_str().unwrap())).err().unwrap();
        assert!(matches!(err, PipelineError::Configuration(ref msg)
            if msg.starts_with("Required file not found") && msg.contains("calibration.json")));
    }

    #[test]
    fn test_missing_encoder_is_fatal() {
        let dir = scratch_bundle();
        std::fs::write(
            dir.path().join("encoders.json"),
            r#"{
                "categorical_columns": ["Gender", "Occupation", "BMI Category"],
                "encoders": {"Gender": {"classes": ["Female", "Male"]}}
            }"#,
        )
        .unwrap();

        let err = ArtifactBundle::load(&fixture_config(dir.path().to_str().unwrap())).err().unwrap();
        assert!(matches!(err, PipelineError::Configuration(ref msg) if msg.contains("Occupation")));
    }

    #[test]
    fn test_encoder_on_numeric_column_is_fatal() {
        let dir = scratch_bundle();
        std::fs::write(
            dir.path().join("encoders.json"),
            r#"{
                "categorical_columns": ["Gender", "Occupation", "BMI Category", "Age"],
                "encoders": {
                    "Gender": {"classes": ["Female", "Male"]},
                    "Occupation": {"classes": ["Doctor", "Engineer"]},
                    "BMI Category": {"classes": ["Normal", "Obese"]},
                    "Age": {"classes": ["25", "55"]}
                }
            }"#,
        )
        .unwrap();

        let err = ArtifactBundle::load(&fixture_config(dir.path().to_str().unwrap())).err().unwrap();
        assert!(matches!(err, PipelineError::Configuration(ref msg) if msg.contains("'Age'")));
    }

    #[test]
    fn test_bad_temperature_is_fatal() {
        let dir = scratch_bundle();
        std::fs::write(
            dir.path().join("calibration.json"),
            r#"{"reference": 1.1, "ensemble": -0.5}"#,
        )
        .unwrap();

        let err = ArtifactBundle::load(&fixture_config(dir.path().to_str().unwrap())).err().unwrap();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_profile_width_mismatch_is_fatal() {
        let mut config = fixture_config(&fixture_dir());
        // The boosted model was trained on 13 columns
        config.models[1].profile = SchemaProfile::Full;

        let err = ArtifactBundle::load(&config).err().unwrap();
        assert!(matches!(err, PipelineError::Configuration(ref msg) if msg.contains("xgboost")));
    }
}
