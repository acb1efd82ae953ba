//! Per-frame classifier labels and the signals fed into the state machine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::detector::{FaceBox, FaceFeatures};
use crate::{DmsConfig, DmsError};

/// Three-way frame classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    #[default]
    Normal,
    EyesClosed,
    Yawning,
}

impl TryFrom<u8> for Label {
    type Error = DmsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::Normal),
            1 => Ok(Label::EyesClosed),
            2 => Ok(Label::Yawning),
            other => Err(DmsError::InvalidLabel(other)),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Normal => write!(f, "normal"),
            Label::EyesClosed => write!(f, "eyes_closed"),
            Label::Yawning => write!(f, "yawning"),
        }
    }
}

/// One classified frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSignal {
    pub left_ear: f64,
    pub right_ear: f64,
    pub mar: f64,
    pub nose_y: i32,
    pub bbox: FaceBox,
    pub classifier_label: Label,
}

impl FrameSignal {
    pub fn new(features: &FaceFeatures, classifier_label: Label) -> Self {
        Self {
            left_ear: features.left_ear,
            right_ear: features.right_ear,
            mar: features.mar,
            nose_y: features.nose.1,
            bbox: features.bbox,
            classifier_label,
        }
    }
}

/// What one frame tick hands to the monitor
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// No face in the frame
    NoFace,
    /// Face found but no classifier label available
    FeaturesOnly(FaceFeatures),
    /// Face found and classified
    Classified(FrameSignal),
}

impl Observation {
    /// Classify extracted features, falling back to features-only on error
    pub fn classify(features: Option<FaceFeatures>, classifier: Option<&dyn Classifier>) -> Self {
        let Some(features) = features else {
            return Observation::NoFace;
        };
        match classifier {
            Some(classifier) => match classifier.classify(&features) {
                Ok(label) => Observation::Classified(FrameSignal::new(&features, label)),
                Err(e) => {
                    tracing::warn!("Classification failed, using features only: {}", e);
                    Observation::FeaturesOnly(features)
                }
            },
            None => Observation::FeaturesOnly(features),
        }
    }
}

/// Frame classifier collaborator
pub trait Classifier: Send + Sync {
    fn classify(&self, features: &FaceFeatures) -> Result<Label, DmsError>;
}

/// Apply the MAR override rules to a raw classifier label
///
/// A wide-open mouth is always a yawn; a yawn with a nearly closed mouth is a
/// false positive.
pub fn override_label(raw: Label, mar: f64, config: &DmsConfig) -> Label {
    if mar > config.force_yawn_mar {
        Label::Yawning
    } else if raw == Label::Yawning && mar < config.block_yawn_mar {
        Label::Normal
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<Label, ()>);

    impl Classifier for Fixed {
        fn classify(&self, _features: &FaceFeatures) -> Result<Label, DmsError> {
            self.0.map_err(|_| DmsError::Inference("model offline".into()))
        }
    }

    fn features() -> FaceFeatures {
        FaceFeatures {
            left_ear: 0.31,
            right_ear: 0.29,
            mar: 0.12,
            bbox: FaceBox::default(),
            nose: (320, 240),
        }
    }

    #[test]
    fn test_label_wire_values() {
        assert_eq!(Label::try_from(1).unwrap(), Label::EyesClosed);
        assert_eq!(Label::try_from(2).unwrap(), Label::Yawning);
        assert!(matches!(Label::try_from(7), Err(DmsError::InvalidLabel(7))));
    }

    #[test]
    fn test_high_mar_forces_yawn() {
        let config = DmsConfig::default();
        assert_eq!(override_label(Label::Normal, 0.45, &config), Label::Yawning);
        assert_eq!(override_label(Label::EyesClosed, 0.45, &config), Label::Yawning);
    }

    #[test]
    fn test_low_mar_blocks_yawn() {
        let config = DmsConfig::default();
        assert_eq!(override_label(Label::Yawning, 0.2, &config), Label::Normal);
        // Between the thresholds the classifier wins
        assert_eq!(override_label(Label::Yawning, 0.35, &config), Label::Yawning);
        assert_eq!(override_label(Label::EyesClosed, 0.1, &config), Label::EyesClosed);
    }

    #[test]
    fn test_observation_from_classifier() {
        let ok = Fixed(Ok(Label::EyesClosed));
        match Observation::classify(Some(features()), Some(&ok)) {
            Observation::Classified(signal) => {
                assert_eq!(signal.classifier_label, Label::EyesClosed);
                assert_eq!(signal.nose_y, 240);
            }
            other => panic!("unexpected {:?}", other),
        }

        let failing = Fixed(Err(()));
        assert!(matches!(
            Observation::classify(Some(features()), Some(&failing)),
            Observation::FeaturesOnly(_)
        ));
        assert!(matches!(Observation::classify(Some(features()), None), Observation::FeaturesOnly(_)));
        assert_eq!(Observation::classify(None, Some(&ok)), Observation::NoFace);
    }
}
