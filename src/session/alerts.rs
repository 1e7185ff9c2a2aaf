use crate::session::timer::{Cooldown, DebounceTimer, TimerState};
use serde::Serialize;

/// Fires when the score stays below a threshold long enough, rate limited.
#[derive(Debug, Clone)]
pub struct LowScoreAlert {
    threshold: u32,
    persistence: DebounceTimer,
    cooldown: Cooldown,
}

impl LowScoreAlert {
    pub fn new(threshold: u32, debounce_secs: f64, cooldown_secs: f64) -> Self {
        Self {
            threshold,
            persistence: DebounceTimer::new(debounce_secs),
            cooldown: Cooldown::new(cooldown_secs),
        }
    }

    /// Feed a scored frame. Returns true when a warning should be issued.
    pub fn observe(&mut self, now: f64, score: u32) -> bool {
        if score >= self.threshold {
            self.persistence.cancel();
            return false;
        }

        if self.persistence.state() == TimerState::Idle {
            self.persistence.start(now);
            return false;
        }

        self.persistence.poll(now) == TimerState::Expired && self.cooldown.try_fire(now)
    }

    /// Forget any low-score run in progress.
    pub fn reset(&mut self) {
        self.persistence.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreakTimerView {
    pub remaining_secs: f64,
    pub paused: bool,
    pub expired: bool,
}

/// Sit-duration countdown that only runs while the user is present.
#[derive(Debug, Clone)]
pub struct BreakTimer {
    limit: f64,
    origin: f64,
    paused_total: f64,
    paused_since: Option<f64>,
    reminder: Cooldown,
}

impl BreakTimer {
    pub fn new(limit_secs: f64, repeat_secs: f64, now: f64) -> Self {
        Self {
            limit: limit_secs,
            origin: now,
            paused_total: 0.0,
            paused_since: None,
            reminder: Cooldown::new(repeat_secs),
        }
    }

    pub fn pause(&mut self, now: f64) {
        if self.paused_since.is_none() {
            self.paused_since = Some(now);
        }
    }

    pub fn resume(&mut self, now: f64) {
        if let Some(since) = self.paused_since.take() {
            self.paused_total += (now - since).max(0.0);
        }
    }

    /// Start a fresh countdown from `now`.
    pub fn restart(&mut self, now: f64) {
        self.origin = now;
        self.paused_total = 0.0;
        self.paused_since = None;
        self.reminder.clear();
    }

    pub fn is_paused(&self) -> bool {
        self.paused_since.is_some()
    }

    /// Effective sitting time, excluding paused spans.
    pub fn elapsed(&self, now: f64) -> f64 {
        let current_pause = self
            .paused_since
            .map(|since| (now - since).max(0.0))
            .unwrap_or(0.0);
        (now - self.origin - self.paused_total - current_pause).max(0.0)
    }

    pub fn remaining(&self, now: f64) -> f64 {
        self.limit - self.elapsed(now)
    }

    pub fn state(&self, now: f64) -> TimerState {
        if self.remaining(now) <= 0.0 {
            TimerState::Expired
        } else {
            TimerState::Running
        }
    }

    /// True when the break reminder should be repeated now.
    pub fn poll_reminder(&mut self, now: f64) -> bool {
        !self.is_paused()
            && self.state(now) == TimerState::Expired
            && self.reminder.try_fire(now)
    }

    /// Restart only once the countdown has run out; otherwise return the time left.
    pub fn request_reset(&mut self, now: f64) -> Result<(), f64> {
        if self.is_paused() || self.state(now) != TimerState::Expired {
            return Err(self.remaining(now).max(0.0));
        }
        self.restart(now);
        Ok(())
    }

    pub fn view(&self, now: f64) -> BreakTimerView {
        BreakTimerView {
            remaining_secs: self.remaining(now).max(0.0),
            paused: self.is_paused(),
            expired: self.state(now) == TimerState::Expired,
        }
    }
}
