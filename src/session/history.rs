//! Per-session posture statistics.
//!
//! Every scored frame is classified as good, warning or bad and the time
//! since the previous scored frame is credited to that class. Streaks and
//! bad episodes are tracked alongside.

use crate::posture::{PenaltySet, ScoreResult};
use serde::Serialize;

/// Any single penalty at or above this makes the frame bad.
pub const BAD_PENALTY_POINTS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostureState {
    Good,
    Warning,
    Bad,
}

impl PostureState {
    pub fn classify(penalties: &PenaltySet) -> Self {
        if penalties
            .iter()
            .any(|(_, points)| points >= BAD_PENALTY_POINTS)
        {
            PostureState::Bad
        } else if penalties.iter().all(|(_, points)| points == 0) {
            PostureState::Good
        } else {
            PostureState::Warning
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySnapshot {
    pub total_time: f64,
    pub good_time: f64,
    pub warning_time: f64,
    pub bad_time: f64,
    pub good_ratio: f64,
    pub bad_ratio: f64,
    pub current_state: PostureState,
    pub current_streak_time: f64,
    pub max_bad_streak: f64,
    pub bad_episodes_count: u32,
}

#[derive(Debug, Clone)]
pub struct PostureHistory {
    total_time: f64,
    good_time: f64,
    warning_time: f64,
    bad_time: f64,
    current_state: PostureState,
    current_streak_time: f64,
    max_bad_streak: f64,
    bad_episodes_count: u32,
    last_timestamp: Option<f64>,
    seeded: bool,
}

impl PostureHistory {
    pub fn new() -> Self {
        Self {
            total_time: 0.0,
            good_time: 0.0,
            warning_time: 0.0,
            bad_time: 0.0,
            current_state: PostureState::Good,
            current_streak_time: 0.0,
            max_bad_streak: 0.0,
            bad_episodes_count: 0,
            last_timestamp: None,
            seeded: false,
        }
    }

    pub fn update(&mut self, timestamp: f64, result: &ScoreResult) {
        let new_state = PostureState::classify(&result.penalties);

        if !self.seeded {
            self.seeded = true;
            self.last_timestamp = Some(timestamp);
            self.current_state = new_state;
            return;
        }

        // After a suspension the gap is not credited to any state.
        let delta = self
            .last_timestamp
            .map(|last| (timestamp - last).max(0.0))
            .unwrap_or(0.0);
        self.last_timestamp = Some(timestamp);

        self.total_time += delta;
        match new_state {
            PostureState::Good => self.good_time += delta,
            PostureState::Warning => self.warning_time += delta,
            PostureState::Bad => self.bad_time += delta,
        }

        if new_state == self.current_state {
            self.current_streak_time += delta;
        } else {
            if new_state == PostureState::Bad {
                self.bad_episodes_count += 1;
            }
            self.current_state = new_state;
            self.current_streak_time = delta;
        }

        if new_state == PostureState::Bad {
            self.max_bad_streak = self.max_bad_streak.max(self.current_streak_time);
        }
    }

    /// Stop crediting time until the next update, e.g. while the user is away.
    pub fn suspend(&mut self) {
        self.last_timestamp = None;
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        let (good_ratio, bad_ratio) = if self.total_time > 0.0 {
            (
                self.good_time / self.total_time,
                self.bad_time / self.total_time,
            )
        } else {
            (0.0, 0.0)
        };

        HistorySnapshot {
            total_time: self.total_time,
            good_time: self.good_time,
            warning_time: self.warning_time,
            bad_time: self.bad_time,
            good_ratio,
            bad_ratio,
            current_state: self.current_state,
            current_streak_time: self.current_streak_time,
            max_bad_streak: self.max_bad_streak,
            bad_episodes_count: self.bad_episodes_count,
        }
    }
}

impl Default for PostureHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posture::FeatureVector;

    fn result_with(penalties: PenaltySet) -> ScoreResult {
        ScoreResult {
            score: 100u32.saturating_sub(penalties.total()),
            status: String::new(),
            penalties,
            features: FeatureVector::default(),
        }
    }

    fn good() -> ScoreResult {
        result_with(PenaltySet::default())
    }

    fn warning() -> ScoreResult {
        result_with(PenaltySet {
            head_roll: 10,
            ..PenaltySet::default()
        })
    }

    fn bad() -> ScoreResult {
        result_with(PenaltySet {
            hunchback: 30,
            ..PenaltySet::default()
        })
    }

    fn assert_totals_consistent(snapshot: &HistorySnapshot) {
        let sum = snapshot.good_time + snapshot.warning_time + snapshot.bad_time;
        assert!((sum - snapshot.total_time).abs() < 1e-9);
    }

    #[test]
    fn classification_boundaries() {
        let tilt = |points| PenaltySet {
            shoulder_tilt: points,
            ..PenaltySet::default()
        };

        assert_eq!(PostureState::classify(&tilt(20)), PostureState::Bad);
        assert_eq!(PostureState::classify(&tilt(10)), PostureState::Warning);
        assert_eq!(PostureState::classify(&tilt(0)), PostureState::Good);
        assert_eq!(
            PostureState::classify(&PenaltySet {
                hunchback: 15,
                head_roll: 10,
                ..PenaltySet::default()
            }),
            PostureState::Warning
        );
    }

    #[test]
    fn first_update_seeds_state_without_time() {
        let mut history = PostureHistory::new();

        history.update(100.0, &bad());
        let snapshot = history.snapshot();

        assert_eq!(snapshot.total_time, 0.0);
        assert_eq!(snapshot.current_state, PostureState::Bad);
        assert_eq!(snapshot.bad_episodes_count, 0);
        assert_eq!(snapshot.good_ratio, 0.0);
        assert_eq!(snapshot.bad_ratio, 0.0);
    }

    #[test]
    fn accumulates_time_per_state() {
        let mut history = PostureHistory::new();
        history.update(0.0, &good());
        history.update(1.0, &good());
        history.update(3.0, &warning());
        history.update(6.0, &bad());
        history.update(6.5, &bad());

        let snapshot = history.snapshot();

        assert_eq!(snapshot.good_time, 1.0);
        assert_eq!(snapshot.warning_time, 2.0);
        assert_eq!(snapshot.bad_time, 3.5);
        assert_eq!(snapshot.total_time, 6.5);
        assert_eq!(snapshot.current_streak_time, 3.5);
        assert_eq!(snapshot.max_bad_streak, 3.5);
        assert_eq!(snapshot.bad_episodes_count, 1);
        assert!((snapshot.bad_ratio - 3.5 / 6.5).abs() < 1e-12);
        assert_totals_consistent(&snapshot);
    }

    #[test]
    fn max_bad_streak_keeps_longest_episode() {
        let mut history = PostureHistory::new();
        history.update(0.0, &good());
        history.update(1.0, &bad());
        history.update(5.0, &bad());
        history.update(6.0, &good());
        history.update(7.0, &bad());
        history.update(8.0, &bad());

        let snapshot = history.snapshot();

        assert_eq!(snapshot.bad_episodes_count, 2);
        assert_eq!(snapshot.max_bad_streak, 5.0);
        assert_eq!(snapshot.current_streak_time, 2.0);
        assert_totals_consistent(&snapshot);
    }

    #[test]
    fn negative_delta_is_clamped_to_zero() {
        let mut history = PostureHistory::new();
        history.update(10.0, &good());
        history.update(8.0, &warning());
        history.update(9.0, &warning());

        let snapshot = history.snapshot();

        assert_eq!(snapshot.total_time, 1.0);
        assert_eq!(snapshot.warning_time, 1.0);
        assert_totals_consistent(&snapshot);
    }

    #[test]
    fn suspended_gap_is_not_credited() {
        let mut history = PostureHistory::new();
        history.update(0.0, &good());
        history.update(2.0, &good());
        history.suspend();
        history.update(50.0, &good());
        history.update(51.0, &good());

        let snapshot = history.snapshot();

        assert_eq!(snapshot.total_time, 3.0);
        assert_eq!(snapshot.good_time, 3.0);
    }

    #[test]
    fn totals_stay_consistent_over_mixed_sequence() {
        let mut history = PostureHistory::new();
        let results = [good(), warning(), bad(), warning(), good(), bad()];
        let mut t = 0.0;
        for (i, result) in results.iter().cycle().take(60).enumerate() {
            t += 0.033 * ((i % 7) as f64 + 1.0);
            history.update(t, result);
        }

        assert_totals_consistent(&history.snapshot());
    }
}
