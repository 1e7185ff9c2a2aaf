//! Small timer state machines shared by the presence and alert logic.
//!
//! All times are monotonic seconds supplied by the caller, so every
//! transition is deterministic under test.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Expired,
}

/// One-shot timer: `Idle` until started, `Expired` once `duration` has passed.
#[derive(Debug, Clone)]
pub struct DebounceTimer {
    duration: f64,
    started_at: Option<f64>,
    state: TimerState,
}

impl DebounceTimer {
    pub fn new(duration: f64) -> Self {
        Self {
            duration: duration.max(0.0),
            started_at: None,
            state: TimerState::Idle,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Start counting. Has no effect unless idle.
    pub fn start(&mut self, now: f64) {
        if self.state == TimerState::Idle {
            self.started_at = Some(now);
            self.state = TimerState::Running;
        }
    }

    /// Advance to `Expired` if the duration has elapsed.
    pub fn poll(&mut self, now: f64) -> TimerState {
        if self.state == TimerState::Running && self.elapsed(now) >= self.duration {
            self.state = TimerState::Expired;
        }
        self.state
    }

    pub fn cancel(&mut self) {
        self.started_at = None;
        self.state = TimerState::Idle;
    }

    pub fn elapsed(&self, now: f64) -> f64 {
        self.started_at
            .map(|start| (now - start).max(0.0))
            .unwrap_or(0.0)
    }

    /// Fraction of the duration elapsed, in [0, 1].
    pub fn progress(&self, now: f64) -> f64 {
        match self.state {
            TimerState::Idle => 0.0,
            TimerState::Expired => 1.0,
            TimerState::Running if self.duration <= 0.0 => 1.0,
            TimerState::Running => (self.elapsed(now) / self.duration).min(1.0),
        }
    }
}

/// Rate limiter that allows one firing per `period` seconds.
#[derive(Debug, Clone)]
pub struct Cooldown {
    period: f64,
    last_fired: Option<f64>,
}

impl Cooldown {
    pub fn new(period: f64) -> Self {
        Self {
            period,
            last_fired: None,
        }
    }

    /// True if never fired, or strictly more than `period` has passed since.
    pub fn ready(&self, now: f64) -> bool {
        self.last_fired
            .is_none_or(|last| now - last > self.period)
    }

    /// Fire if ready; returns whether it fired.
    pub fn try_fire(&mut self, now: f64) -> bool {
        if !self.ready(now) {
            return false;
        }
        self.last_fired = Some(now);
        true
    }

    pub fn clear(&mut self) {
        self.last_fired = None;
    }
}
