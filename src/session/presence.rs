//! User presence tracking with a debounced return.
//!
//! A departure opens an away period. When a body shows up again it has to
//! stay in view for the return window before the user counts as back; only
//! then is the away period closed and scoring resumed.

use crate::session::timer::{DebounceTimer, TimerState};
use serde::Serialize;
use tracing::{debug, info};

/// Interval the user was away, in seconds since session start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AwayPeriod {
    pub start: f64,
    pub end: f64,
}

impl AwayPeriod {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PresenceState {
    /// Body in view and the user is confirmed back.
    Present,
    /// Body in view, still inside the return window.
    Confirming { progress: f64 },
    /// No body in view.
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PresenceEvent {
    Left,
    ReturnDetected,
    Returned(AwayPeriod),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceUpdate {
    pub state: PresenceState,
    pub event: Option<PresenceEvent>,
}

#[derive(Debug, Clone)]
pub struct PresenceController {
    session_start: f64,
    was_present: bool,
    confirmed_back: bool,
    pause_started: Option<f64>,
    reappeared_at: Option<f64>,
    confirmation: DebounceTimer,
    away_periods: Vec<AwayPeriod>,
}

impl PresenceController {
    pub fn new(session_start: f64, return_debounce_secs: f64) -> Self {
        Self {
            session_start,
            was_present: false,
            confirmed_back: true,
            pause_started: None,
            reappeared_at: None,
            confirmation: DebounceTimer::new(return_debounce_secs),
            away_periods: Vec::new(),
        }
    }

    /// Feed one frame's detection outcome.
    ///
    /// With `require_confirmation` unset a returning user counts as back
    /// immediately.
    pub fn update(
        &mut self,
        now: f64,
        body_present: bool,
        require_confirmation: bool,
    ) -> PresenceUpdate {
        let update = if body_present {
            self.on_body(now, require_confirmation)
        } else {
            self.on_no_body(now)
        };
        self.was_present = body_present;
        update
    }

    fn on_no_body(&mut self, now: f64) -> PresenceUpdate {
        let mut event = None;
        if self.was_present {
            // Leaving mid-confirmation keeps the original departure time.
            if self.pause_started.is_none() {
                self.pause_started = Some(now);
            }
            if self.confirmed_back {
                info!(elapsed = now - self.session_start, "User left, timers paused");
                event = Some(PresenceEvent::Left);
            }
            self.confirmed_back = false;
        }
        self.confirmation.cancel();
        self.reappeared_at = None;

        PresenceUpdate {
            state: PresenceState::Away,
            event,
        }
    }

    fn on_body(&mut self, now: f64, require_confirmation: bool) -> PresenceUpdate {
        if self.confirmed_back {
            return PresenceUpdate {
                state: PresenceState::Present,
                event: None,
            };
        }

        if !require_confirmation {
            let period = self.close_away_period(now);
            return PresenceUpdate {
                state: PresenceState::Present,
                event: Some(PresenceEvent::Returned(period)),
            };
        }

        let mut event = None;
        if self.confirmation.state() == TimerState::Idle {
            self.confirmation.start(now);
            self.reappeared_at = Some(now);
            debug!(elapsed = now - self.session_start, "User detected, confirming return");
            event = Some(PresenceEvent::ReturnDetected);
        }

        if self.confirmation.poll(now) == TimerState::Expired {
            let reappeared_at = self.reappeared_at.unwrap_or(now);
            let period = self.close_away_period(reappeared_at);
            return PresenceUpdate {
                state: PresenceState::Present,
                event: Some(PresenceEvent::Returned(period)),
            };
        }

        PresenceUpdate {
            state: PresenceState::Confirming {
                progress: self.confirmation.progress(now),
            },
            event,
        }
    }

    fn close_away_period(&mut self, end: f64) -> AwayPeriod {
        let start = self.pause_started.take().unwrap_or(end);
        let period = AwayPeriod {
            start: start - self.session_start,
            end: end - self.session_start,
        };
        self.away_periods.push(period);
        self.confirmed_back = true;
        self.confirmation.cancel();
        self.reappeared_at = None;
        info!(
            away_secs = period.duration(),
            start = period.start,
            end = period.end,
            "User back, away period closed"
        );
        period
    }

    pub fn is_confirmed_present(&self) -> bool {
        self.was_present && self.confirmed_back
    }

    pub fn away_periods(&self) -> &[AwayPeriod] {
        &self.away_periods
    }

    /// Close a still-open away period at shutdown and return all periods.
    pub fn finish(&mut self, now: f64) -> Vec<AwayPeriod> {
        if let Some(start) = self.pause_started.take() {
            self.away_periods.push(AwayPeriod {
                start: start - self.session_start,
                end: now - self.session_start,
            });
        }
        self.away_periods.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(controller: &mut PresenceController, from: f64, to: f64, present: bool) {
        let mut t = from;
        while t < to - 1e-9 {
            controller.update(t, present, true);
            t += 0.5;
        }
    }

    #[test]
    fn initial_absence_is_not_an_away_period() {
        let mut controller = PresenceController::new(0.0, 3.0);

        let update = controller.update(0.0, false, true);
        assert_eq!(update.state, PresenceState::Away);
        assert_eq!(update.event, None);

        let update = controller.update(1.0, true, true);
        assert_eq!(update.state, PresenceState::Present);
        assert!(controller.away_periods().is_empty());
    }

    #[test]
    fn return_requires_confirmation_window() {
        let mut controller = PresenceController::new(0.0, 3.0);
        controller.update(0.0, true, true);

        let left = controller.update(5.0, false, true);
        assert_eq!(left.event, Some(PresenceEvent::Left));
        run(&mut controller, 5.5, 15.0, false);

        let detected = controller.update(15.0, true, true);
        assert_eq!(detected.event, Some(PresenceEvent::ReturnDetected));
        assert!(matches!(detected.state, PresenceState::Confirming { .. }));

        let midway = controller.update(16.5, true, true);
        assert_eq!(midway.state, PresenceState::Confirming { progress: 0.5 });
        assert!(!controller.is_confirmed_present());

        let back = controller.update(18.0, true, true);
        assert_eq!(back.state, PresenceState::Present);
        assert_eq!(
            back.event,
            Some(PresenceEvent::Returned(AwayPeriod {
                start: 5.0,
                end: 15.0
            }))
        );
        assert!(controller.is_confirmed_present());
        assert_eq!(controller.away_periods().len(), 1);
    }

    #[test]
    fn leaving_during_confirmation_restarts_window_and_keeps_departure() {
        let mut controller = PresenceController::new(0.0, 3.0);
        controller.update(0.0, true, true);
        controller.update(1.0, false, true);
        controller.update(4.0, true, true);

        let gone_again = controller.update(5.0, false, true);
        assert_eq!(gone_again.event, None);
        assert_eq!(gone_again.state, PresenceState::Away);

        controller.update(6.0, true, true);
        let early = controller.update(8.0, true, true);
        assert!(matches!(early.state, PresenceState::Confirming { .. }));

        let back = controller.update(9.0, true, true);
        assert_eq!(
            back.event,
            Some(PresenceEvent::Returned(AwayPeriod { start: 1.0, end: 6.0 }))
        );
    }

    #[test]
    fn without_confirmation_return_is_immediate() {
        let mut controller = PresenceController::new(0.0, 3.0);
        controller.update(0.0, true, false);
        controller.update(2.0, false, false);

        let back = controller.update(4.0, true, false);

        assert_eq!(back.state, PresenceState::Present);
        assert_eq!(
            back.event,
            Some(PresenceEvent::Returned(AwayPeriod { start: 2.0, end: 4.0 }))
        );
    }

    #[test]
    fn finish_closes_open_away_period() {
        let mut controller = PresenceController::new(100.0, 3.0);
        controller.update(100.0, true, true);
        controller.update(110.0, false, true);

        let periods = controller.finish(130.0);

        assert_eq!(periods, vec![AwayPeriod { start: 10.0, end: 30.0 }]);
    }

    #[test]
    fn finish_without_open_period_changes_nothing() {
        let mut controller = PresenceController::new(0.0, 3.0);
        controller.update(0.0, true, true);

        assert!(controller.finish(10.0).is_empty());
    }
}
