//! Classifier loader

use crate::config::{ModelFormat, ModelSpec};
use crate::error::{PipelineError, PipelineResult};
use crate::models::classifier::{Classifier, LoadedModel};
use crate::models::forest::TreeEnsemble;
use std::path::Path;
use tracing::info;

/// Loads every configured classifier, all or nothing.
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load a single classifier from `models_dir`.
    pub fn load_model<P: AsRef<Path>>(&self, models_dir: P, spec: &ModelSpec) -> PipelineResult<LoadedModel> {
        let path = models_dir.as_ref().join(&spec.file);

        let format = spec
            .format
            .or_else(|| ModelFormat::from_path(&path))
            .ok_or_else(|| {
                PipelineError::config(format!(
                    "cannot tell the format of model '{}' ({}); set `format`",
                    spec.name,
                    path.display()
                ))
            })?;

        let classifier: Box<dyn Classifier> = match format {
            ModelFormat::Trees => Box::new(TreeEnsemble::load(&path)?),
            ModelFormat::Onnx => self.load_onnx(&path, &spec.name)?,
        };

        info!(
            model = %spec.name,
            backend = classifier.backend(),
            profile = ?spec.profile,
            reference = spec.reference,
            "Model loaded"
        );

        Ok(LoadedModel {
            name: spec.name.clone(),
            profile: spec.profile,
            reference: spec.reference,
            classifier,
        })
    }

    /// Load all models. Any failure aborts: the service never runs with a
    /// partial ensemble.
    pub fn load_all_models<P: AsRef<Path>>(
        &self,
        models_dir: P,
        specs: &[ModelSpec],
    ) -> PipelineResult<Vec<LoadedModel>> {
        let models_dir = models_dir.as_ref();

        if specs.is_empty() {
            return Err(PipelineError::config("no models configured"));
        }

        if specs.iter().any(|s| self.format_of(models_dir, s) == Some(ModelFormat::Onnx)) {
            self.init_onnx()?;
        }

        let models = specs
            .iter()
            .map(|spec| self.load_model(models_dir, spec))
            .collect::<PipelineResult<Vec<_>>>()?;

        info!(
            count = models.len(),
            "Loaded {} models from {}",
            models.len(),
            models_dir.display()
        );

        Ok(models)
    }

    fn format_of(&self, models_dir: &Path, spec: &ModelSpec) -> Option<ModelFormat> {
        spec.format
            .or_else(|| ModelFormat::from_path(&models_dir.join(&spec.file)))
    }

    #[cfg(feature = "onnx")]
    fn init_onnx(&self) -> PipelineResult<()> {
        crate::models::onnx::init_runtime()
            .map_err(|e| PipelineError::config(format!("ONNX Runtime init failed: {}", e)))
    }

    #[cfg(not(feature = "onnx"))]
    fn init_onnx(&self) -> PipelineResult<()> {
        Ok(())
    }

    #[cfg(feature = "onnx")]
    fn load_onnx(&self, path: &Path, name: &str) -> PipelineResult<Box<dyn Classifier>> {
        let model = crate::models::onnx::OnnxClassifier::load(path, name, self.onnx_threads)?;
        Ok(Box::new(model))
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(&self, path: &Path, name: &str) -> PipelineResult<Box<dyn Classifier>> {
        Err(PipelineError::config(format!(
            "model '{}' ({}) is ONNX but this build has no `onnx` feature (threads: {})",
            name,
            path.display(),
            self.onnx_threads
        )))
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::SchemaProfile;
    use std::io::Write;

    const TINY_FOREST: &str = r#"{
        "n_features": 1, "n_classes": 2, "aggregation": "average",
        "trees": [{"nodes": [{"value": [1.0, 3.0]}]}]
    }"#;

    fn spec(name: &str, file: &str) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            file: file.to_string(),
            format: None,
            profile: SchemaProfile::Full,
            reference: false,
        }
    }

    #[test]
    fn test_load_tree_model_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("rf.json")).unwrap();
        file.write_all(TINY_FOREST.as_bytes()).unwrap();

        let model = ModelLoader::new().load_model(dir.path(), &spec("rf", "rf.json")).unwrap();

        assert_eq!(model.name, "rf");
        assert_eq!(model.classifier.backend(), "trees");
        assert_eq!(model.classifier.predict_proba(&[0.0]).unwrap(), vec![0.25, 0.75]);
    }

    #[test]
    fn test_missing_model_fails_whole_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rf.json"), TINY_FOREST).unwrap();

        let err = ModelLoader::new()
            .load_all_models(dir.path(), &[spec("rf", "rf.json"), spec("gb", "gb.json")])
            .unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(ref msg) if msg.contains("gb.json")));
    }

    #[test]
    fn test_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelLoader::new()
            .load_model(dir.path(), &spec("rf", "rf_model.pkl"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
