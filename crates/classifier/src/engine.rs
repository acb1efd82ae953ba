//! tract-backed classifier

use std::path::Path;
use std::time::Instant;

use dms::{Classifier, DmsError, FaceFeatures, Label};
use tracing::{debug, info};
use tract_onnx::prelude::*;

use crate::ClassifierError;

/// Number of model inputs: left EAR, right EAR, MAR
const INPUT_WIDTH: usize = 3;

type Plan = TypedRunnableModel<TypedModel>;

/// Classifier backed by an optimized tract plan
pub struct OnnxClassifier {
    plan: Plan,
}

impl OnnxClassifier {
    /// Load and optimize the model at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        info!("Loading classifier model: {}", path.display());
        if !path.exists() {
            return Err(ClassifierError::ModelLoadError(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, INPUT_WIDTH]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| ClassifierError::ModelLoadError(e.to_string()))?;

        info!("Classifier model loaded");
        Ok(Self { plan })
    }

    /// Run the model on one feature vector
    pub fn predict(&self, features: &FaceFeatures) -> Result<Label, ClassifierError> {
        let start = Instant::now();
        let row = features.vector().map(|v| v as f32);
        let input = Tensor::from_shape(&[1, INPUT_WIDTH], &row)
            .map_err(|e| ClassifierError::InferenceFailed(e.to_string()))?;

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| ClassifierError::InferenceFailed(e.to_string()))?;
        let first = outputs
            .first()
            .ok_or_else(|| ClassifierError::UnsupportedOutput("model produced no outputs".into()))?;

        let label = decode_label(first)?;
        debug!("Classified frame as {} in {:?}", label, start.elapsed());
        Ok(label)
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, features: &FaceFeatures) -> Result<Label, DmsError> {
        Ok(self.predict(features)?)
    }
}

/// Read a label out of the first model output
///
/// Integer outputs are taken as the label itself (scikit-learn exports);
/// float outputs are treated as class scores and reduced by argmax.
pub fn decode_label(output: &Tensor) -> Result<Label, ClassifierError> {
    match output.datum_type() {
        DatumType::I64 => {
            let view = output
                .as_slice::<i64>()
                .map_err(|e| ClassifierError::UnsupportedOutput(e.to_string()))?;
            let raw = *view
                .first()
                .ok_or_else(|| ClassifierError::UnsupportedOutput("empty label tensor".into()))?;
            to_label(raw)
        }
        DatumType::F32 => {
            let scores = output
                .as_slice::<f32>()
                .map_err(|e| ClassifierError::UnsupportedOutput(e.to_string()))?;
            let best = scores
                .iter()
                .enumerate()
                .filter(|(_, s)| s.is_finite())
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .ok_or_else(|| ClassifierError::UnsupportedOutput("no finite class score".into()))?;
            to_label(best as i64)
        }
        other => Err(ClassifierError::UnsupportedOutput(format!("{:?}", other))),
    }
}

fn to_label(raw: i64) -> Result<Label, ClassifierError> {
    u8::try_from(raw)
        .ok()
        .and_then(|v| Label::try_from(v).ok())
        .ok_or(ClassifierError::InvalidLabel(raw))
}
