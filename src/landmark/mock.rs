use crate::error::AppError;
use crate::landmark::{FrameInput, Landmark, LandmarkFrame, LandmarkSource, PoseLandmark};
use std::collections::VecDeque;

/// Replays a fixed list of frames, optionally failing at a given position.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    frames: VecDeque<FrameInput>,
    fail_after: Option<usize>,
    served: usize,
}

impl ScriptedSource {
    pub fn new(frames: Vec<FrameInput>) -> Self {
        Self {
            frames: frames.into(),
            fail_after: None,
            served: 0,
        }
    }

    /// Return an input error once `count` frames have been served.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

impl LandmarkSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<FrameInput>, AppError> {
        if self.fail_after.is_some_and(|limit| self.served >= limit) {
            return Err(AppError::Input(std::io::Error::other(
                "mock landmark stream failed",
            )));
        }
        self.served += 1;
        Ok(self.frames.pop_front())
    }
}

/// Keypoints for a given pose, expressed in normalized coordinates.
#[derive(Debug, Clone, Copy)]
pub struct PoseSketch {
    pub nose: (f64, f64),
    pub left_eye: (f64, f64),
    pub right_eye: (f64, f64),
    pub left_shoulder: (f64, f64),
    pub right_shoulder: (f64, f64),
}

impl PoseSketch {
    /// Level shoulders and eyes, head centred above the shoulder line.
    pub fn upright() -> Self {
        Self {
            nose: (0.5, 0.30),
            left_eye: (0.52, 0.27),
            right_eye: (0.48, 0.27),
            left_shoulder: (0.65, 0.55),
            right_shoulder: (0.35, 0.55),
        }
    }

    /// Head sunk towards the shoulders, left shoulder dropped well below the right.
    pub fn slumped() -> Self {
        Self {
            nose: (0.5, 0.42),
            left_eye: (0.52, 0.39),
            right_eye: (0.48, 0.39),
            left_shoulder: (0.65, 0.70),
            right_shoulder: (0.35, 0.55),
        }
    }

    pub fn to_frame(self) -> LandmarkFrame {
        let mut points = vec![Landmark::new(0.0, 0.0, 0.0); PoseLandmark::COUNT];
        let mut place = |landmark: PoseLandmark, (x, y): (f64, f64)| {
            points[landmark.index()] = Landmark::new(x, y, 0.99);
        };
        place(PoseLandmark::Nose, self.nose);
        place(PoseLandmark::LeftEye, self.left_eye);
        place(PoseLandmark::RightEye, self.right_eye);
        place(PoseLandmark::LeftShoulder, self.left_shoulder);
        place(PoseLandmark::RightShoulder, self.right_shoulder);
        LandmarkFrame::new(points)
    }
}
