//! ONNX Frame Classifier
//!
//! Runs the trained `[left_ear, right_ear, mar]` model with tract and turns its
//! output into a [`dms::Label`].

mod engine;

pub use engine::{decode_label, OnnxClassifier};

use thiserror::Error;

/// Errors while loading or running the model
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Unsupported model output: {0}")]
    UnsupportedOutput(String),
    #[error("Label {0} out of range")]
    InvalidLabel(i64),
}

impl From<ClassifierError> for dms::DmsError {
    fn from(e: ClassifierError) -> Self {
        dms::DmsError::Inference(e.to_string())
    }
}
