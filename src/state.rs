use crate::error::AppError;
use crate::pipeline::SessionCommand;
use crate::posture::ScoreResult;
use crate::session::alerts::BreakTimerView;
use crate::session::history::HistorySnapshot;
use crate::session::presence::AwayPeriod;
use crate::session::{FrameOutcome, SessionPhase};
use std::time::SystemTime;
use tokio::sync::{mpsc, watch};

/// What the API serves about the running session, refreshed every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub received_at: SystemTime,
    pub elapsed: f64,
    pub phase: SessionPhase,
    pub result: Option<ScoreResult>,
    pub history: HistorySnapshot,
    pub break_timer: BreakTimerView,
    pub notice: Option<String>,
    pub away_periods: Vec<AwayPeriod>,
}

impl SessionView {
    pub fn from_outcome(
        outcome: &FrameOutcome,
        history: HistorySnapshot,
        away_periods: Vec<AwayPeriod>,
        received_at: SystemTime,
    ) -> Self {
        Self {
            received_at,
            elapsed: outcome.elapsed,
            phase: outcome.phase,
            result: outcome.result.clone(),
            history,
            break_timer: outcome.break_timer,
            notice: outcome.notice.clone(),
            away_periods,
        }
    }
}

#[derive(Debug)]
pub struct AppState {
    session: Option<SessionView>,
    session_tx: watch::Sender<Option<SessionView>>,
    commands: Option<mpsc::UnboundedSender<SessionCommand>>,
}

impl AppState {
    pub fn new() -> Self {
        let (session_tx, _session_rx) = watch::channel(None);
        Self {
            session: None,
            session_tx,
            commands: None,
        }
    }

    pub fn session(&self) -> Option<&SessionView> {
        self.session.as_ref()
    }

    /// Wall-clock time the latest frame was processed.
    pub fn last_frame_at(&self) -> Option<SystemTime> {
        self.session.as_ref().map(|view| view.received_at)
    }

    pub fn subscribe_session(&self) -> watch::Receiver<Option<SessionView>> {
        self.session_tx.subscribe()
    }

    pub fn set_session(&mut self, view: SessionView) {
        self.session = Some(view.clone());
        self.session_tx.send_replace(Some(view));
    }

    pub fn set_command_sender(&mut self, sender: mpsc::UnboundedSender<SessionCommand>) {
        self.commands = Some(sender);
    }

    pub fn send_command(&self, command: SessionCommand) -> Result<(), AppError> {
        let sender = self.commands.as_ref().ok_or(AppError::CommandChannelClosed)?;
        sender
            .send(command)
            .map_err(|_| AppError::CommandChannelClosed)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
