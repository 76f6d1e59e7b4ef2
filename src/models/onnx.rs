//! ONNX Runtime classifier backend

use crate::error::{PipelineError, PipelineResult};
use crate::models::classifier::Classifier;
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Initialize the ONNX Runtime environment. Call once before loading models.
pub fn init_runtime() -> Result<()> {
    ort::init().commit()?;
    info!("ONNX Runtime initialized");
    Ok(())
}

/// Classifier exported to ONNX (sklearn random forest, XGBoost, ...).
///
/// A session needs exclusive access while running, so each one sits behind
/// its own mutex.
pub struct OnnxClassifier {
    name: String,
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(path: P, name: &str, threads: usize) -> PipelineResult<Self> {
        Self::load_session(path.as_ref(), name, threads)
            .map_err(|e| PipelineError::config(format!("{:#}", e)))
    }

    fn load_session(path: &Path, name: &str, threads: usize) -> Result<Self> {
        info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        // Converters emit "label" plus "probabilities"/"output_probability"
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    fn run(&self, features: &[f32]) -> Result<Vec<f64>> {
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, features.to_vec())).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        self.extract_distribution(&outputs)
    }

    /// Pull the class distribution out of the session outputs.
    ///
    /// Handles plain tensors (`[1, n_classes]`) and the `seq(map(int64, float))`
    /// layout some converters produce.
    fn extract_distribution(&self, outputs: &SessionOutputs) -> Result<Vec<f64>> {
        if let Some(output) = outputs.get(self.output_name.as_str()) {
            let dtype = output.dtype();

            if let Ok(tensor) = output.try_extract_tensor::<f32>() {
                let (shape, data) = tensor;
                return Self::distribution_from_tensor(&shape, data);
            }

            if DynSequenceValueType::can_downcast(&dtype) {
                return self.distribution_from_sequence_map(output);
            }
        }

        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }

            let dtype = output.dtype();

            if let Ok(tensor) = output.try_extract_tensor::<f32>() {
                let (shape, data) = tensor;
                debug!(model = %self.name, output = %name, "Extracted from tensor (fallback)");
                return Self::distribution_from_tensor(&shape, data);
            }

            if DynSequenceValueType::can_downcast(&dtype) {
                if let Ok(proba) = self.distribution_from_sequence_map(&output) {
                    return Ok(proba);
                }
            }
        }

        Err(anyhow::anyhow!("no probability output found"))
    }

    fn distribution_from_sequence_map(&self, output: &ort::value::DynValue) -> Result<Vec<f64>> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
        let map_value = maps.first().ok_or_else(|| anyhow::anyhow!("Empty sequence"))?;

        let mut pairs = map_value.try_extract_key_values::<i64, f32>()?;
        pairs.sort_by_key(|(class_id, _)| *class_id);

        // Class ids must be 0..n without gaps
        if pairs.iter().enumerate().any(|(i, (id, _))| *id != i as i64) {
            return Err(anyhow::anyhow!("class ids in probability map are not contiguous"));
        }

        debug!(model = %self.name, classes = pairs.len(), "Extracted from seq(map)");
        Ok(pairs.into_iter().map(|(_, p)| f64::from(p)).collect())
    }

    fn distribution_from_tensor(shape: &ort::tensor::Shape, data: &[f32]) -> Result<Vec<f64>> {
        let dims: Vec<i64> = shape.iter().copied().collect();

        let width = match dims.as_slice() {
            // [batch, n_classes]; batch is always 1
            [_, n] => *n as usize,
            [n] => *n as usize,
            _ => return Err(anyhow::anyhow!("unexpected probability shape {:?}", dims)),
        };

        if width == 0 || data.len() < width {
            return Err(anyhow::anyhow!("probability tensor too small: {:?}", dims));
        }

        Ok(data[..width].iter().map(|&p| f64::from(p)).collect())
    }
}

impl Classifier for OnnxClassifier {
    fn backend(&self) -> &'static str {
        "onnx"
    }

    fn n_features(&self) -> Option<usize> {
        None
    }

    fn n_classes(&self) -> Option<usize> {
        None
    }

    fn predict_proba(&self, features: &[f32]) -> PipelineResult<Vec<f64>> {
        self.run(features)
            .map_err(|e| PipelineError::scoring(format!("{:#}", e)))
    }
}
