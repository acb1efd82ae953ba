//! Face geometry produced by the upstream feature extractor

use serde::{Deserialize, Serialize};

/// Face bounding box in pixel coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl FaceBox {
    /// Smallest box enclosing all landmarks
    pub fn enclosing(points: &[Landmark]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bbox = FaceBox {
            x_min: first.x as i32,
            y_min: first.y as i32,
            x_max: first.x as i32,
            y_max: first.y as i32,
        };
        for p in rest {
            bbox.x_min = bbox.x_min.min(p.x as i32);
            bbox.y_min = bbox.y_min.min(p.y as i32);
            bbox.x_max = bbox.x_max.max(p.x as i32);
            bbox.y_max = bbox.y_max.max(p.y as i32);
        }
        Some(bbox)
    }
}

/// A facial landmark in pixel coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance(&self, other: &Landmark) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Eye aspect ratio from six eye landmarks `p1..p6`
///
/// `(|p2-p6| + |p3-p5|) / (2 * |p1-p4|)`, or 0 when the eye corners coincide.
pub fn eye_aspect_ratio(eye: &[Landmark; 6]) -> f64 {
    let d_h = eye[0].distance(&eye[3]);
    if d_h == 0.0 {
        return 0.0;
    }
    let d_v1 = eye[1].distance(&eye[5]);
    let d_v2 = eye[2].distance(&eye[4]);
    (d_v1 + d_v2) / (2.0 * d_h)
}

/// Mouth aspect ratio: inner-lip opening over mouth width, 0 for a zero-width mouth
pub fn mouth_aspect_ratio(mouth: &MouthLandmarks) -> f64 {
    let d_h = mouth.left.distance(&mouth.right);
    if d_h == 0.0 {
        return 0.0;
    }
    mouth.upper.distance(&mouth.lower) / d_h
}

/// Inner-lip midpoints and mouth corners
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MouthLandmarks {
    pub upper: Landmark,
    pub lower: Landmark,
    pub left: Landmark,
    pub right: Landmark,
}

/// The landmark subset the drowsiness features are computed from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left_eye: [Landmark; 6],
    pub right_eye: [Landmark; 6],
    pub mouth: MouthLandmarks,
    pub nose: Landmark,
}

/// Per-frame output of the feature extractor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceFeatures {
    pub left_ear: f64,
    pub right_ear: f64,
    pub mar: f64,
    pub bbox: FaceBox,
    /// Nose tip (x, y) in pixels
    pub nose: (i32, i32),
}

impl FaceFeatures {
    /// Compute EAR, MAR, the enclosing box and the nose position from raw landmarks
    pub fn from_landmarks(face: &FaceLandmarks) -> Self {
        let mouth = [face.mouth.upper, face.mouth.lower, face.mouth.left, face.mouth.right];
        let points: Vec<Landmark> = face
            .left_eye
            .iter()
            .chain(&face.right_eye)
            .chain(&mouth)
            .chain(std::iter::once(&face.nose))
            .copied()
            .collect();

        Self {
            left_ear: eye_aspect_ratio(&face.left_eye),
            right_ear: eye_aspect_ratio(&face.right_eye),
            mar: mouth_aspect_ratio(&face.mouth),
            bbox: FaceBox::enclosing(&points).unwrap_or_default(),
            nose: (face.nose.x as i32, face.nose.y as i32),
        }
    }

    /// Classifier input vector `[left_ear, right_ear, mar]`
    pub fn vector(&self) -> [f64; 3] {
        [self.left_ear, self.right_ear, self.mar]
    }
}
