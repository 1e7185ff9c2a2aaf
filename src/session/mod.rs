//! Per-frame session orchestration.
//!
//! `SessionController` owns the scorer, the baseline calibrator, the
//! posture history and the presence/alert state machines, and decides per
//! frame which of them run. Frames are only scored and accumulated while
//! the user is confirmed present and the baseline is known.

use crate::landmark::LandmarkFrame;
use crate::posture::{
    BaselineCalibrator, FrameSpace, PostureScorer, ScoreResult, ScoringConfig, extract_features,
};
use serde::Serialize;
use tracing::{info, warn};

pub mod alerts;
pub mod history;
pub mod presence;
pub mod timer;

use alerts::{BreakTimer, BreakTimerView, LowScoreAlert};
use history::{HistorySnapshot, PostureHistory};
use presence::{AwayPeriod, PresenceController, PresenceEvent, PresenceState};

pub const CANNOT_RESET_NOTICE: &str = "Cannot reset: timer is still running";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub min_visibility: f64,
    pub calibration_frames: usize,
    pub low_score_threshold: u32,
    pub low_score_debounce_secs: f64,
    pub warning_cooldown_secs: f64,
    pub return_debounce_secs: f64,
    pub break_interval_secs: f64,
    pub break_repeat_secs: f64,
    pub notice_duration_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_visibility: 0.5,
            calibration_frames: 90,
            low_score_threshold: 70,
            low_score_debounce_secs: 1.5,
            warning_cooldown_secs: 5.0,
            return_debounce_secs: 3.0,
            break_interval_secs: 60.0,
            break_repeat_secs: 5.0,
            notice_duration_secs: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    Calibrating { progress: f64 },
    Monitoring,
    ConfirmingReturn { progress: f64 },
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    CalibrationComplete,
    UserLeft,
    ReturnDetected,
    UserReturned { away: AwayPeriod },
    PostureWarning { score: u32 },
    BreakDue,
    BreakTimerReset,
    ResetRejected { remaining_secs: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSample {
    pub elapsed: f64,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub timestamp: f64,
    pub elapsed: f64,
    pub phase: SessionPhase,
    /// `None` when the frame was not scored.
    pub result: Option<ScoreResult>,
    pub break_timer: BreakTimerView,
    pub notice: Option<String>,
    pub events: Vec<SessionEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub duration_secs: f64,
    pub samples: Vec<ScoreSample>,
    pub away_periods: Vec<AwayPeriod>,
    pub history: HistorySnapshot,
}

#[derive(Debug, Clone)]
struct Notice {
    text: String,
    until: f64,
}

#[derive(Debug)]
pub struct SessionController {
    config: SessionConfig,
    start: f64,
    scorer: PostureScorer,
    calibrator: BaselineCalibrator,
    history: PostureHistory,
    presence: PresenceController,
    low_score: LowScoreAlert,
    break_timer: BreakTimer,
    notice: Option<Notice>,
    samples: Vec<ScoreSample>,
}

impl SessionController {
    pub fn new(config: SessionConfig, scoring: ScoringConfig, start: f64) -> Self {
        Self {
            scorer: PostureScorer::new(scoring),
            calibrator: BaselineCalibrator::new(config.calibration_frames),
            history: PostureHistory::new(),
            presence: PresenceController::new(start, config.return_debounce_secs),
            low_score: LowScoreAlert::new(
                config.low_score_threshold,
                config.low_score_debounce_secs,
                config.warning_cooldown_secs,
            ),
            break_timer: BreakTimer::new(
                config.break_interval_secs,
                config.break_repeat_secs,
                start,
            ),
            notice: None,
            samples: Vec::new(),
            start,
            config,
        }
    }

    pub fn process_frame(
        &mut self,
        now: f64,
        frame: Option<&LandmarkFrame>,
        space: FrameSpace,
    ) -> FrameOutcome {
        let mut events = Vec::new();
        let features = frame
            .filter(|frame| frame.has_body(self.config.min_visibility))
            .and_then(|frame| extract_features(frame, space));

        let presence =
            self.presence
                .update(now, features.is_some(), self.calibrator.is_calibrated());
        let mut returned = false;
        match presence.event {
            Some(PresenceEvent::Left) => events.push(SessionEvent::UserLeft),
            Some(PresenceEvent::ReturnDetected) => events.push(SessionEvent::ReturnDetected),
            Some(PresenceEvent::Returned(away)) => {
                returned = true;
                events.push(SessionEvent::UserReturned { away });
            }
            None => {}
        }

        let mut result = None;
        let phase = match (presence.state, features) {
            (PresenceState::Away, _) | (PresenceState::Present, None) => {
                self.low_score.reset();
                self.break_timer.pause(now);
                SessionPhase::Away
            }
            (PresenceState::Confirming { progress }, _) => {
                self.break_timer.pause(now);
                SessionPhase::ConfirmingReturn { progress }
            }
            (PresenceState::Present, Some(_)) if returned => {
                self.break_timer.restart(now);
                SessionPhase::Monitoring
            }
            (PresenceState::Present, Some(features)) => {
                self.break_timer.resume(now);
                if self.calibrator.is_calibrated() {
                    let scored = self.scorer.compute(features);
                    self.record(now, &scored, &mut events);
                    result = Some(scored);
                    SessionPhase::Monitoring
                } else if let Some(baseline) = self.calibrator.push(features) {
                    self.scorer.set_baseline(baseline);
                    info!(?baseline, "Calibration complete");
                    events.push(SessionEvent::CalibrationComplete);
                    SessionPhase::Monitoring
                } else {
                    SessionPhase::Calibrating {
                        progress: self.calibrator.progress(),
                    }
                }
            }
        };

        if result.is_none() {
            self.history.suspend();
        }

        if self.break_timer.poll_reminder(now) {
            info!(
                elapsed = now - self.start,
                "Sitting limit reached, break reminder issued"
            );
            events.push(SessionEvent::BreakDue);
        }

        FrameOutcome {
            timestamp: now,
            elapsed: now - self.start,
            phase,
            result,
            break_timer: self.break_timer.view(now),
            notice: self.active_notice(now),
            events,
        }
    }

    fn record(&mut self, now: f64, scored: &ScoreResult, events: &mut Vec<SessionEvent>) {
        self.history.update(now, scored);
        self.samples.push(ScoreSample {
            elapsed: now - self.start,
            score: scored.score,
        });

        if self.low_score.observe(now, scored.score) {
            warn!(
                score = scored.score,
                status = %scored.status,
                "Low posture score persisted, warning issued"
            );
            events.push(SessionEvent::PostureWarning {
                score: scored.score,
            });
        }
    }

    /// Ask to restart the break countdown. Refused until the countdown has run out.
    pub fn request_break_reset(&mut self, now: f64) -> SessionEvent {
        let result = if self.presence.is_confirmed_present() {
            self.break_timer.request_reset(now)
        } else {
            Err(self.break_timer.remaining(now).max(0.0))
        };

        match result {
            Ok(()) => {
                info!(elapsed = now - self.start, "Break timer reset");
                self.notice = None;
                SessionEvent::BreakTimerReset
            }
            Err(remaining_secs) => {
                info!(remaining_secs, "Break timer reset rejected, timer still running");
                self.notice = Some(Notice {
                    text: CANNOT_RESET_NOTICE.to_string(),
                    until: now + self.config.notice_duration_secs,
                });
                SessionEvent::ResetRejected { remaining_secs }
            }
        }
    }

    fn active_notice(&self, now: f64) -> Option<String> {
        self.notice
            .as_ref()
            .filter(|notice| now < notice.until)
            .map(|notice| notice.text.clone())
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrator.is_calibrated()
    }

    pub fn history(&self) -> HistorySnapshot {
        self.history.snapshot()
    }

    pub fn away_periods(&self) -> &[AwayPeriod] {
        self.presence.away_periods()
    }

    pub fn samples(&self) -> &[ScoreSample] {
        &self.samples
    }

    /// End the session, closing any open away period at `now`.
    pub fn finish(mut self, now: f64) -> SessionSummary {
        let away_periods = self.presence.finish(now);
        SessionSummary {
            duration_secs: (now - self.start).max(0.0),
            samples: self.samples,
            away_periods,
            history: self.history.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::mock::PoseSketch;
    use crate::session::history::PostureState;

    const SPACE: FrameSpace = FrameSpace::Pixels {
        width: 1280.0,
        height: 720.0,
    };

    fn config() -> SessionConfig {
        SessionConfig {
            calibration_frames: 3,
            ..SessionConfig::default()
        }
    }

    fn controller() -> SessionController {
        SessionController::new(config(), ScoringConfig::default(), 0.0)
    }

    /// Calibrate on three upright frames at t = 0.0, 0.1, 0.2.
    fn calibrated() -> SessionController {
        let mut session = controller();
        let upright = PoseSketch::upright().to_frame();
        for i in 0..3 {
            session.process_frame(i as f64 * 0.1, Some(&upright), SPACE);
        }
        assert!(session.is_calibrated());
        session
    }

    #[test]
    fn calibration_frames_are_not_scored() {
        let mut session = controller();
        let upright = PoseSketch::upright().to_frame();

        let first = session.process_frame(0.0, Some(&upright), SPACE);
        session.process_frame(0.1, Some(&upright), SPACE);
        let last = session.process_frame(0.2, Some(&upright), SPACE);

        assert_eq!(first.phase, SessionPhase::Calibrating { progress: 1.0 / 3.0 });
        assert!(first.result.is_none());
        assert!(last.events.contains(&SessionEvent::CalibrationComplete));
        assert!(last.result.is_none());
        assert!(session.samples().is_empty());
    }

    #[test]
    fn upright_pose_scores_good_after_calibration() {
        let mut session = calibrated();
        let upright = PoseSketch::upright().to_frame();

        let outcome = session.process_frame(0.3, Some(&upright), SPACE);
        let result = outcome.result.expect("scored frame");

        assert_eq!(result.score, 100);
        assert_eq!(result.status, "Good");
        assert_eq!(outcome.phase, SessionPhase::Monitoring);
        assert_eq!(session.samples().len(), 1);
    }

    #[test]
    fn sustained_low_score_issues_one_warning() {
        let mut session = calibrated();
        let slumped = PoseSketch::slumped().to_frame();
        let mut times: Vec<f64> = (0..10).map(|step| 1.0 + step as f64 * 0.1).collect();
        times.extend([3.0, 4.0, 5.0]);

        let mut warnings = Vec::new();
        let mut last_score = None;
        for t in times {
            let outcome = session.process_frame(t, Some(&slumped), SPACE);
            last_score = outcome.result.map(|result| result.score);
            if outcome
                .events
                .iter()
                .any(|event| matches!(event, SessionEvent::PostureWarning { .. }))
            {
                warnings.push(t);
            }
        }

        assert!(last_score.is_some_and(|score| score < 70));
        assert_eq!(warnings, vec![3.0]);
    }

    #[test]
    fn away_and_return_suspend_scoring_and_record_period() {
        let mut session = calibrated();
        let upright = PoseSketch::upright().to_frame();
        session.process_frame(1.0, Some(&upright), SPACE);
        session.process_frame(2.0, Some(&upright), SPACE);
        let before = session.history();

        let left = session.process_frame(2.5, None, SPACE);
        assert!(left.events.contains(&SessionEvent::UserLeft));
        for step in 1..20 {
            let outcome = session.process_frame(2.5 + step as f64 * 0.5, None, SPACE);
            assert_eq!(outcome.phase, SessionPhase::Away);
            assert!(outcome.break_timer.paused);
        }

        let detected = session.process_frame(12.5, Some(&upright), SPACE);
        assert!(detected.events.contains(&SessionEvent::ReturnDetected));
        for t in [13.0, 14.0, 15.0] {
            let outcome = session.process_frame(t, Some(&upright), SPACE);
            assert!(outcome.result.is_none());
            assert!(matches!(outcome.phase, SessionPhase::ConfirmingReturn { .. }));
        }
        assert_eq!(session.history(), before);

        let back = session.process_frame(15.5, Some(&upright), SPACE);
        assert!(back.events.contains(&SessionEvent::UserReturned {
            away: AwayPeriod {
                start: 2.5,
                end: 12.5
            }
        }));
        assert_eq!(back.break_timer.remaining_secs, 60.0);
        assert!(!back.break_timer.paused);

        let resumed = session.process_frame(16.0, Some(&upright), SPACE);
        assert!(resumed.result.is_some());
        let after = session.history();
        assert_eq!(after.total_time, before.total_time);
        assert_eq!(after.current_state, PostureState::Good);

        session.process_frame(17.0, Some(&upright), SPACE);
        assert_eq!(session.history().total_time, before.total_time + 1.0);
    }

    #[test]
    fn leaving_before_calibration_needs_no_confirmation() {
        let mut session = controller();
        let upright = PoseSketch::upright().to_frame();
        session.process_frame(0.0, Some(&upright), SPACE);
        session.process_frame(1.0, None, SPACE);

        let back = session.process_frame(2.0, Some(&upright), SPACE);

        assert!(matches!(
            back.events.as_slice(),
            [SessionEvent::UserReturned { .. }]
        ));
        assert_eq!(session.away_periods().len(), 1);
    }

    #[test]
    fn break_reminder_and_reset() {
        let mut session = calibrated();
        let upright = PoseSketch::upright().to_frame();

        session.process_frame(30.0, Some(&upright), SPACE);
        let rejected = session.request_break_reset(30.0);
        assert_eq!(rejected, SessionEvent::ResetRejected { remaining_secs: 30.0 });
        let shown = session.process_frame(30.5, Some(&upright), SPACE);
        assert_eq!(shown.notice.as_deref(), Some(CANNOT_RESET_NOTICE));
        let faded = session.process_frame(31.5, Some(&upright), SPACE);
        assert_eq!(faded.notice, None);

        let due = session.process_frame(60.0, Some(&upright), SPACE);
        assert!(due.events.contains(&SessionEvent::BreakDue));
        assert!(due.break_timer.expired);
        let quiet = session.process_frame(62.0, Some(&upright), SPACE);
        assert!(!quiet.events.contains(&SessionEvent::BreakDue));
        let again = session.process_frame(65.5, Some(&upright), SPACE);
        assert!(again.events.contains(&SessionEvent::BreakDue));

        assert_eq!(session.request_break_reset(66.0), SessionEvent::BreakTimerReset);
        let fresh = session.process_frame(66.5, Some(&upright), SPACE);
        assert!(!fresh.break_timer.expired);
        assert_eq!(fresh.break_timer.remaining_secs, 59.5);
    }

    #[test]
    fn reset_rejected_while_away() {
        let mut session = calibrated();
        session.process_frame(61.0, None, SPACE);

        assert!(matches!(
            session.request_break_reset(61.5),
            SessionEvent::ResetRejected { .. }
        ));
    }

    #[test]
    fn finish_closes_open_away_period() {
        let mut session = calibrated();
        session.process_frame(5.0, None, SPACE);

        let summary = session.finish(9.0);

        assert_eq!(summary.away_periods, vec![AwayPeriod { start: 5.0, end: 9.0 }]);
        assert_eq!(summary.duration_secs, 9.0);
    }

    #[test]
    fn low_visibility_body_counts_as_absent() {
        let mut session = calibrated();
        let faint = LandmarkFrame::new(vec![
            crate::landmark::Landmark::new(0.5, 0.5, 0.1);
            crate::landmark::PoseLandmark::COUNT
        ]);

        let outcome = session.process_frame(1.0, Some(&faint), SPACE);

        assert_eq!(outcome.phase, SessionPhase::Away);
        assert!(outcome.events.contains(&SessionEvent::UserLeft));
    }
}
