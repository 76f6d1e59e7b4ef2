//! ML model inference components

pub mod aggregator;
pub mod calibration;
pub mod classifier;
pub mod decision;
pub mod forest;
pub mod inference;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use aggregator::ProbabilityAggregator;
pub use calibration::{temperature_scale, Temperatures};
pub use classifier::{Classifier, LoadedModel};
pub use decision::{Decision, DecisionResolver};
pub use forest::TreeEnsemble;
pub use inference::{EnsembleScores, InferenceEngine};
pub use loader::ModelLoader;
