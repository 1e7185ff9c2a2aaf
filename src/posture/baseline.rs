use crate::posture::features::FeatureVector;

/// About three seconds at 30 fps.
pub const DEFAULT_CALIBRATION_FRAMES: usize = 90;

/// Collects raw features during the warm-up window and averages them into a baseline.
#[derive(Debug, Clone)]
pub struct BaselineCalibrator {
    target_frames: usize,
    samples: Vec<FeatureVector>,
    baseline: Option<FeatureVector>,
}

impl BaselineCalibrator {
    pub fn new(target_frames: usize) -> Self {
        let target_frames = target_frames.max(1);
        Self {
            target_frames,
            samples: Vec::with_capacity(target_frames),
            baseline: None,
        }
    }

    /// Add one frame. Returns the baseline on the frame that completes calibration.
    ///
    /// Once calibrated, further samples are ignored.
    pub fn push(&mut self, features: FeatureVector) -> Option<FeatureVector> {
        if self.baseline.is_some() {
            return None;
        }
        self.samples.push(features);
        if self.samples.len() < self.target_frames {
            return None;
        }

        let baseline = FeatureVector::mean(&self.samples)?;
        self.samples = Vec::new();
        self.baseline = Some(baseline);
        Some(baseline)
    }

    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_some()
    }

    /// Fraction of the warm-up window collected, in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.is_calibrated() {
            return 1.0;
        }
        self.samples.len() as f64 / self.target_frames as f64
    }
}

impl Default for BaselineCalibrator {
    fn default() -> Self {
        Self::new(DEFAULT_CALIBRATION_FRAMES)
    }
}
