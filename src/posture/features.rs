//! Geometric posture features computed from a single landmark frame.

use crate::landmark::{LandmarkFrame, PoseLandmark};
use serde::{Deserialize, Serialize};

/// Coordinate system the landmark positions are measured in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameSpace {
    /// Scale normalized coordinates to a frame of this size.
    Pixels { width: f64, height: f64 },
    /// Use the normalized coordinates unchanged.
    Normalized,
}

impl FrameSpace {
    fn scale(self) -> (f64, f64) {
        match self {
            FrameSpace::Pixels { width, height } => (width, height),
            FrameSpace::Normalized => (1.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Shoulder line angle from horizontal, degrees in [0, 90].
    pub shoulder_tilt_deg: f64,
    /// Eye line angle from horizontal, degrees in [0, 180].
    pub head_roll_deg: f64,
    /// Signed eye line angle, degrees in [-180, 180].
    pub head_roll_raw: f64,
    /// Distance between the eyes; grows as the head approaches the camera.
    pub eye_dist_px: f64,
    /// Angle at the nose between both shoulders, degrees in [0, 180].
    pub nose_shoulder_angle: f64,
}

impl FeatureVector {
    /// Combine two vectors feature by feature.
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        Self {
            shoulder_tilt_deg: f(self.shoulder_tilt_deg, other.shoulder_tilt_deg),
            head_roll_deg: f(self.head_roll_deg, other.head_roll_deg),
            head_roll_raw: f(self.head_roll_raw, other.head_roll_raw),
            eye_dist_px: f(self.eye_dist_px, other.eye_dist_px),
            nose_shoulder_angle: f(self.nose_shoulder_angle, other.nose_shoulder_angle),
        }
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        self.zip_with(self, |value, _| f(value))
    }

    /// Arithmetic mean per feature, `None` for an empty slice.
    pub fn mean(vectors: &[FeatureVector]) -> Option<Self> {
        if vectors.is_empty() {
            return None;
        }
        let sum = vectors
            .iter()
            .fold(FeatureVector::default(), |acc, v| acc.zip_with(v, |a, b| a + b));
        let count = vectors.len() as f64;
        Some(sum.map(|value| value / count))
    }
}

/// Extract posture features, or `None` if a required keypoint is missing.
pub fn extract_features(frame: &LandmarkFrame, space: FrameSpace) -> Option<FeatureVector> {
    let (width, height) = space.scale();
    let point = |landmark: PoseLandmark| {
        frame
            .get(landmark)
            .map(|keypoint| keypoint.to_pixel(width, height))
    };

    let left_shoulder = point(PoseLandmark::LeftShoulder)?;
    let right_shoulder = point(PoseLandmark::RightShoulder)?;
    let left_eye = point(PoseLandmark::LeftEye)?;
    let right_eye = point(PoseLandmark::RightEye)?;
    let nose = point(PoseLandmark::Nose)?;

    let shoulder_dx = left_shoulder.0 - right_shoulder.0;
    let shoulder_dy = left_shoulder.1 - right_shoulder.1;
    let shoulder_tilt_deg = shoulder_dy.atan2(shoulder_dx.abs()).to_degrees().abs();

    let eye_dx = left_eye.0 - right_eye.0;
    let eye_dy = left_eye.1 - right_eye.1;
    let head_roll_raw = eye_dy.atan2(eye_dx).to_degrees();

    Some(FeatureVector {
        shoulder_tilt_deg,
        head_roll_deg: head_roll_raw.abs(),
        head_roll_raw,
        eye_dist_px: eye_dx.hypot(eye_dy),
        nose_shoulder_angle: vertex_angle(nose, left_shoulder, right_shoulder),
    })
}

/// Angle at `vertex` between the rays towards `a` and `b`, in degrees.
///
/// Zero-length rays yield 0.
pub fn vertex_angle(vertex: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let v1 = (a.0 - vertex.0, a.1 - vertex.1);
    let v2 = (b.0 - vertex.0, b.1 - vertex.1);

    let mag1 = v1.0.hypot(v1.1);
    let mag2 = v2.0.hypot(v2.1);
    let denominator = mag1 * mag2;
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let cos_angle = (dot / denominator).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}
