//! Recorded frame source
//!
//! One JSON object per line:
//! `{"face": {"left_ear": 0.31, ..., "nose": [320, 240]}, "label": 1}`.
//! A recording may carry raw `landmarks` instead of `face`, in which case the
//! features are computed here. A frame with neither is a frame without a detected
//! face; `label` is the classifier output stored with the recording, if any.

use std::path::Path;

use dms::{Classifier, FaceFeatures, FaceLandmarks, FrameSignal, Label, Observation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One recorded frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    #[serde(default)]
    pub face: Option<FaceFeatures>,
    #[serde(default)]
    pub landmarks: Option<FaceLandmarks>,
    #[serde(default)]
    pub label: Option<u8>,
}

impl FrameRecord {
    /// Recorded features, else features computed from the recorded landmarks
    pub fn features(&self) -> Option<FaceFeatures> {
        self.face
            .or_else(|| self.landmarks.as_ref().map(FaceFeatures::from_landmarks))
    }

    /// Turn the record into this tick's observation
    ///
    /// Recorded labels win when `use_recorded_labels` is set and valid;
    /// otherwise the classifier (if any) runs on the recorded features.
    pub fn observe(&self, use_recorded_labels: bool, classifier: Option<&dyn Classifier>) -> Observation {
        let features = self.features();
        if use_recorded_labels {
            if let (Some(face), Some(raw)) = (&features, self.label) {
                match Label::try_from(raw) {
                    Ok(label) => return Observation::Classified(FrameSignal::new(face, label)),
                    Err(e) => warn!("Ignoring recorded label: {}", e),
                }
            }
        }
        Observation::classify(features, classifier)
    }
}

/// Replays a recording at the frame cadence
pub struct ReplaySource {
    frames: Vec<FrameRecord>,
    position: usize,
    looping: bool,
}

impl ReplaySource {
    pub fn open(path: &Path, looping: bool) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let source = Self::parse(&text, looping)?;
        info!("Loaded {} recorded frames from {}", source.len(), path.display());
        Ok(source)
    }

    pub fn parse(text: &str, looping: bool) -> Result<Self, SourceError> {
        let frames = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|source| SourceError::Parse { line: i + 1, source })
            })
            .collect::<Result<Vec<FrameRecord>, _>>()?;

        Ok(Self {
            frames,
            position: 0,
            looping,
        })
    }

    /// Next frame, or `None` once a non-looping recording is exhausted
    pub fn next_frame(&mut self) -> Option<&FrameRecord> {
        if self.position >= self.frames.len() {
            if !self.looping || self.frames.is_empty() {
                return None;
            }
            self.position = 0;
        }
        let frame = self.frames.get(self.position);
        self.position += 1;
        frame
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
