//! Classifier seam shared by all model backends

use crate::error::PipelineResult;
use crate::preprocessing::SchemaProfile;

/// A trained multi-class classifier.
///
/// Implementations are shared read-only across concurrent requests.
pub trait Classifier: Send + Sync {
    /// Backend name for logs ("trees", "onnx", ...)
    fn backend(&self) -> &'static str;

    /// Input width, when the artifact declares it.
    fn n_features(&self) -> Option<usize>;

    /// Number of output classes, when the artifact declares it.
    fn n_classes(&self) -> Option<usize>;

    /// Class-probability distribution for a single feature row, indexed by
    /// target class code.
    fn predict_proba(&self, features: &[f32]) -> PipelineResult<Vec<f64>>;
}

/// A classifier together with how the ensemble uses it.
pub struct LoadedModel {
    pub name: String,
    pub profile: SchemaProfile,
    /// Source of the secondary (reference) confidence
    pub reference: bool,
    pub classifier: Box<dyn Classifier>,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("name", &self.name)
            .field("profile", &self.profile)
            .field("reference", &self.reference)
            .field("backend", &self.classifier.backend())
            .finish()
    }
}
