//! Landmark frames produced by the external pose detector.
//!
//! The detector is a black box; the pipeline only sees one optional
//! `LandmarkFrame` per video frame, delivered through a `LandmarkSource`.

use crate::error::AppError;
use serde::{Deserialize, Serialize};

pub mod jsonl;
pub mod mock;

/// Indices of the 33-point pose topology emitted by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
}

impl PoseLandmark {
    pub const COUNT: usize = 33;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Keypoints the posture features are computed from.
pub const REQUIRED_LANDMARKS: [PoseLandmark; 5] = [
    PoseLandmark::Nose,
    PoseLandmark::LeftEye,
    PoseLandmark::RightEye,
    PoseLandmark::LeftShoulder,
    PoseLandmark::RightShoulder,
];

/// Single keypoint in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "full_visibility")]
    pub visibility: f64,
}

fn full_visibility() -> f64 {
    1.0
}

impl Landmark {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility,
        }
    }

    /// Scale into pixel space.
    pub fn to_pixel(&self, width: f64, height: f64) -> (f64, f64) {
        (self.x * width, self.y * height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkFrame {
    points: Vec<Landmark>,
}

impl LandmarkFrame {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn get(&self, landmark: PoseLandmark) -> Option<&Landmark> {
        self.points.get(landmark.index())
    }

    /// True when every required keypoint exists and is visible enough.
    pub fn has_body(&self, min_visibility: f64) -> bool {
        REQUIRED_LANDMARKS.iter().all(|landmark| {
            self.get(*landmark)
                .is_some_and(|point| point.visibility >= min_visibility)
        })
    }
}

/// One video frame as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameInput {
    /// Monotonic seconds; the pipeline clock is used when absent.
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// `None` when the detector found no body.
    #[serde(default)]
    pub landmarks: Option<LandmarkFrame>,
}

impl FrameInput {
    pub fn present(timestamp: f64, landmarks: LandmarkFrame) -> Self {
        Self {
            timestamp: Some(timestamp),
            width: None,
            height: None,
            landmarks: Some(landmarks),
        }
    }

    pub fn absent(timestamp: f64) -> Self {
        Self {
            timestamp: Some(timestamp),
            width: None,
            height: None,
            landmarks: None,
        }
    }
}

pub trait LandmarkSource {
    /// Next frame, or `None` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<FrameInput>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upright_points() -> Vec<Landmark> {
        let mut points = vec![Landmark::new(0.0, 0.0, 1.0); PoseLandmark::COUNT];
        points[PoseLandmark::Nose.index()] = Landmark::new(0.5, 0.3, 0.99);
        points[PoseLandmark::LeftEye.index()] = Landmark::new(0.53, 0.27, 0.98);
        points[PoseLandmark::RightEye.index()] = Landmark::new(0.47, 0.27, 0.98);
        points[PoseLandmark::LeftShoulder.index()] = Landmark::new(0.65, 0.55, 0.95);
        points[PoseLandmark::RightShoulder.index()] = Landmark::new(0.35, 0.55, 0.95);
        points
    }

    #[test]
    fn frame_with_visible_keypoints_has_body() {
        let frame = LandmarkFrame::new(upright_points());

        assert!(frame.has_body(0.5));
    }

    #[test]
    fn low_visibility_shoulder_is_not_a_body() {
        let mut points = upright_points();
        points[PoseLandmark::RightShoulder.index()].visibility = 0.2;
        let frame = LandmarkFrame::new(points);

        assert!(!frame.has_body(0.5));
        assert!(frame.has_body(0.1));
    }

    #[test]
    fn truncated_frame_is_not_a_body() {
        let frame = LandmarkFrame::new(upright_points()[..8].to_vec());

        assert!(!frame.has_body(0.0));
    }

    #[test]
    fn frame_input_parses_with_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let input: FrameInput =
            serde_json::from_str(r#"{"landmarks":[{"x":0.1,"y":0.2}]}"#)?;

        assert_eq!(input.timestamp, None);
        let frame = input.landmarks.ok_or("missing landmarks")?;
        let nose = frame.get(PoseLandmark::Nose).ok_or("missing nose")?;
        assert_eq!(nose.visibility, 1.0);
        assert_eq!(nose.z, 0.0);
        Ok(())
    }
}
