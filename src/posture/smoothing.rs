use crate::posture::features::FeatureVector;

pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.4;

/// Exponential moving average over feature vectors.
#[derive(Debug, Clone)]
pub struct FeatureSmoother {
    alpha: f64,
    prev: Option<FeatureVector>,
}

impl FeatureSmoother {
    /// `alpha` is the weight of the newest sample, clamped to [0, 1].
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            prev: None,
        }
    }

    pub fn apply(&mut self, features: FeatureVector) -> FeatureVector {
        let smoothed = match self.prev {
            Some(prev) => {
                let a = self.alpha;
                features.zip_with(&prev, |new, old| a * new + (1.0 - a) * old)
            }
            None => features,
        };
        self.prev = Some(smoothed);
        smoothed
    }
}

impl Default for FeatureSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_ALPHA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tilt(value: f64) -> FeatureVector {
        FeatureVector {
            shoulder_tilt_deg: value,
            ..FeatureVector::default()
        }
    }

    #[test]
    fn first_sample_is_adopted_unchanged() {
        let mut smoother = FeatureSmoother::default();

        let out = smoother.apply(tilt(12.0));

        assert_eq!(out, tilt(12.0));
    }

    #[test]
    fn blends_with_fixed_weights() {
        let mut smoother = FeatureSmoother::default();
        smoother.apply(tilt(10.0));

        let out = smoother.apply(tilt(20.0));

        // 0.4 * 20 + 0.6 * 10
        assert!((out.shoulder_tilt_deg - 14.0).abs() < 1e-9);
    }

    #[test]
    fn converges_geometrically_to_constant_input() {
        let mut smoother = FeatureSmoother::default();
        smoother.apply(tilt(0.0));

        let mut out = tilt(0.0);
        for step in 1..=30 {
            out = smoother.apply(tilt(10.0));
            let expected_gap = 10.0 * 0.6_f64.powi(step);
            assert!((10.0 - out.shoulder_tilt_deg - expected_gap).abs() < 1e-9);
        }

        assert!((out.shoulder_tilt_deg - 10.0).abs() < 1e-5);
    }
}
