//! Posture scoring: feature extraction, smoothing, baseline calibration and penalties.

pub mod baseline;
pub mod features;
pub mod scorer;
pub mod smoothing;

pub use baseline::BaselineCalibrator;
pub use features::{FeatureVector, FrameSpace, extract_features};
pub use scorer::{PenaltyCategory, PenaltySet, PostureScorer, ScoreResult, ScoringConfig};
