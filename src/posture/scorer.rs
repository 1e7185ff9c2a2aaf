//! Maps smoothed features to penalties, a 0–100 score and a status label.
//!
//! Without a baseline every feature is compared against fixed thresholds.
//! Once a baseline is installed the deviation from it is scored instead:
//! absolute differences for tilt and roll, signed differences for distance
//! and hunchback where only "closer" and "more hunched" are penalised.

use crate::posture::features::FeatureVector;
use crate::posture::smoothing::{DEFAULT_SMOOTHING_ALPHA, FeatureSmoother};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_SCORE: u32 = 100;
pub const GOOD_STATUS: &str = "Good";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyCategory {
    ShoulderTilt,
    HeadRoll,
    HeadDistance,
    Hunchback,
}

impl PenaltyCategory {
    pub const ALL: [PenaltyCategory; 4] = [
        PenaltyCategory::ShoulderTilt,
        PenaltyCategory::HeadRoll,
        PenaltyCategory::HeadDistance,
        PenaltyCategory::Hunchback,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PenaltyCategory::ShoulderTilt => "shoulder_tilt",
            PenaltyCategory::HeadRoll => "head_roll",
            PenaltyCategory::HeadDistance => "head_distance",
            PenaltyCategory::Hunchback => "hunchback",
        }
    }

    /// Points for the (warn, bad) tiers. Slouching weighs heavier.
    pub fn points(self) -> (u32, u32) {
        match self {
            PenaltyCategory::Hunchback => (15, 30),
            _ => (10, 20),
        }
    }
}

impl fmt::Display for PenaltyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Warn/bad thresholds for one category. Values below `warn` are free.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Tier {
    pub warn: f64,
    pub bad: f64,
}

impl Tier {
    pub const fn new(warn: f64, bad: f64) -> Self {
        Self { warn, bad }
    }

    fn penalty(&self, value: f64, category: PenaltyCategory) -> u32 {
        let (warn_points, bad_points) = category.points();
        if value < self.warn {
            0
        } else if value < self.bad {
            warn_points
        } else {
            bad_points
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdTable {
    pub shoulder_tilt: Tier,
    pub head_roll: Tier,
    pub head_distance: Tier,
    pub hunchback: Tier,
}

impl ThresholdTable {
    /// Thresholds on the raw feature values, in degrees and pixels.
    pub fn absolute() -> Self {
        Self {
            shoulder_tilt: Tier::new(5.0, 10.0),
            head_roll: Tier::new(10.0, 20.0),
            head_distance: Tier::new(90.0, 110.0),
            hunchback: Tier::new(85.0, 100.0),
        }
    }

    /// Thresholds on the deviation from the calibrated baseline.
    pub fn relative() -> Self {
        Self {
            shoulder_tilt: Tier::new(5.0, 10.0),
            head_roll: Tier::new(10.0, 15.0),
            head_distance: Tier::new(10.0, 30.0),
            hunchback: Tier::new(10.0, 25.0),
        }
    }

    fn tier(&self, category: PenaltyCategory) -> &Tier {
        match category {
            PenaltyCategory::ShoulderTilt => &self.shoulder_tilt,
            PenaltyCategory::HeadRoll => &self.head_roll,
            PenaltyCategory::HeadDistance => &self.head_distance,
            PenaltyCategory::Hunchback => &self.hunchback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    pub smoothing_alpha: f64,
    pub absolute: ThresholdTable,
    pub relative: ThresholdTable,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: DEFAULT_SMOOTHING_ALPHA,
            absolute: ThresholdTable::absolute(),
            relative: ThresholdTable::relative(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PenaltySet {
    pub shoulder_tilt: u32,
    pub head_roll: u32,
    pub head_distance: u32,
    pub hunchback: u32,
}

impl PenaltySet {
    pub fn get(&self, category: PenaltyCategory) -> u32 {
        match category {
            PenaltyCategory::ShoulderTilt => self.shoulder_tilt,
            PenaltyCategory::HeadRoll => self.head_roll,
            PenaltyCategory::HeadDistance => self.head_distance,
            PenaltyCategory::Hunchback => self.hunchback,
        }
    }

    fn set(&mut self, category: PenaltyCategory, points: u32) {
        match category {
            PenaltyCategory::ShoulderTilt => self.shoulder_tilt = points,
            PenaltyCategory::HeadRoll => self.head_roll = points,
            PenaltyCategory::HeadDistance => self.head_distance = points,
            PenaltyCategory::Hunchback => self.hunchback = points,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PenaltyCategory, u32)> + '_ {
        PenaltyCategory::ALL
            .into_iter()
            .map(move |category| (category, self.get(category)))
    }

    pub fn total(&self) -> u32 {
        self.iter().map(|(_, points)| points).sum()
    }

    /// Categories with a non-zero penalty, in declaration order.
    pub fn triggered(&self) -> impl Iterator<Item = PenaltyCategory> + '_ {
        self.iter()
            .filter(|(_, points)| *points > 0)
            .map(|(category, _)| category)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub score: u32,
    pub status: String,
    pub penalties: PenaltySet,
    pub features: FeatureVector,
}

impl ScoreResult {
    pub fn is_good(&self) -> bool {
        self.status == GOOD_STATUS
    }
}

#[derive(Debug, Clone)]
pub struct PostureScorer {
    config: ScoringConfig,
    smoother: FeatureSmoother,
    baseline: Option<FeatureVector>,
}

impl PostureScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            smoother: FeatureSmoother::new(config.smoothing_alpha),
            config,
            baseline: None,
        }
    }

    /// Install (or replace) the neutral posture used for relative scoring.
    pub fn set_baseline(&mut self, baseline: FeatureVector) {
        self.baseline = Some(baseline);
    }

    pub fn compute(&mut self, features: FeatureVector) -> ScoreResult {
        let smoothed = self.smoother.apply(features);
        let penalties = self.penalties(&smoothed);

        let score = MAX_SCORE.saturating_sub(penalties.total());
        let triggered: Vec<&str> = penalties.triggered().map(PenaltyCategory::name).collect();
        let status = if triggered.is_empty() {
            GOOD_STATUS.to_string()
        } else {
            triggered.join(", ")
        };

        ScoreResult {
            score,
            status,
            penalties,
            features: smoothed,
        }
    }

    fn penalties(&self, features: &FeatureVector) -> PenaltySet {
        let (table, measures) = match &self.baseline {
            Some(baseline) => (&self.config.relative, deviations(features, baseline)),
            None => (&self.config.absolute, raw_measures(features)),
        };

        let mut penalties = PenaltySet::default();
        for (category, value) in PenaltyCategory::ALL.into_iter().zip(measures) {
            penalties.set(category, table.tier(category).penalty(value, category));
        }
        penalties
    }
}

impl Default for PostureScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

fn raw_measures(features: &FeatureVector) -> [f64; 4] {
    [
        features.shoulder_tilt_deg,
        features.head_roll_deg,
        features.eye_dist_px,
        features.nose_shoulder_angle,
    ]
}

fn deviations(features: &FeatureVector, baseline: &FeatureVector) -> [f64; 4] {
    [
        (features.shoulder_tilt_deg - baseline.shoulder_tilt_deg).abs(),
        (features.head_roll_deg - baseline.head_roll_deg).abs(),
        features.eye_dist_px - baseline.eye_dist_px,
        features.nose_shoulder_angle - baseline.nose_shoulder_angle,
    ]
}
