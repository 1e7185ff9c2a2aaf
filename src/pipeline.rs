//! Frame loop: pulls landmark frames, drives the session, voices its events
//! and publishes the result for the API.

use crate::error::AppError;
use crate::landmark::{FrameInput, LandmarkSource};
use crate::posture::{FrameSpace, ScoringConfig};
use crate::session::{FrameOutcome, SessionConfig, SessionController, SessionEvent, SessionSummary};
use crate::state::{AppState, SessionView};
use crate::voice::Announcer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, info};

pub const CALIBRATED_MESSAGE: &str = "Calibration complete, monitoring started";
pub const WELCOME_BACK_MESSAGE: &str = "Welcome back, timer reset";
pub const POSTURE_WARNING_MESSAGE: &str = "Please sit up straight";
pub const BREAK_DUE_MESSAGE: &str = "Time is up, get up and move around";
pub const TIMER_RESET_MESSAGE: &str = "Timer reset";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    ResetBreakTimer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub session: SessionConfig,
    pub scoring: ScoringConfig,
    pub space: FrameSpace,
}

pub struct Pipeline {
    config: PipelineConfig,
    session: Option<SessionController>,
    announcer: Announcer,
    state: Arc<RwLock<AppState>>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    clock: Instant,
    last_timestamp: f64,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        announcer: Announcer,
        state: Arc<RwLock<AppState>>,
        commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> Self {
        Self {
            config,
            session: None,
            announcer,
            state,
            commands,
            clock: Instant::now(),
            last_timestamp: 0.0,
        }
    }

    /// Process one frame. The session clock starts at the first frame.
    pub fn process(&mut self, input: FrameInput) -> Result<FrameOutcome, AppError> {
        let now = input
            .timestamp
            .unwrap_or_else(|| self.clock.elapsed().as_secs_f64());
        self.last_timestamp = now;
        let space = self.frame_space(&input);

        let session = self.session.get_or_insert_with(|| {
            info!(start = now, "Session started, calibrating");
            SessionController::new(self.config.session.clone(), self.config.scoring, now)
        });

        let mut events = Vec::new();
        while let Ok(command) = self.commands.try_recv() {
            match command {
                SessionCommand::ResetBreakTimer => events.push(session.request_break_reset(now)),
            }
        }

        let mut outcome = session.process_frame(now, input.landmarks.as_ref(), space);
        events.append(&mut outcome.events);
        outcome.events = events;

        if let Some(result) = &outcome.result {
            debug!(
                score = result.score,
                status = %result.status,
                elapsed = outcome.elapsed,
                "Frame scored"
            );
        }

        for event in &outcome.events {
            voice_event(&self.announcer, event, now);
        }

        let view = SessionView::from_outcome(
            &outcome,
            session.history(),
            session.away_periods().to_vec(),
            SystemTime::now(),
        );
        self.state
            .write()
            .map_err(|_| AppError::StateLock)?
            .set_session(view);

        Ok(outcome)
    }

    fn frame_space(&self, input: &FrameInput) -> FrameSpace {
        match (self.config.space, input.width, input.height) {
            (FrameSpace::Pixels { .. }, Some(width), Some(height)) => FrameSpace::Pixels {
                width: width as f64,
                height: height as f64,
            },
            (space, _, _) => space,
        }
    }

    /// Close the session at the last frame time and drain pending announcements.
    pub fn finish(self) -> SessionSummary {
        let session = self.session.unwrap_or_else(|| {
            SessionController::new(
                self.config.session.clone(),
                self.config.scoring,
                self.last_timestamp,
            )
        });
        let summary = session.finish(self.last_timestamp);
        self.announcer.shutdown();
        info!(
            duration_secs = summary.duration_secs,
            samples = summary.samples.len(),
            away_periods = summary.away_periods.len(),
            "Session finished"
        );
        summary
    }
}

fn voice_event(announcer: &Announcer, event: &SessionEvent, now: f64) {
    let text = match event {
        SessionEvent::CalibrationComplete => CALIBRATED_MESSAGE,
        SessionEvent::UserReturned { .. } => WELCOME_BACK_MESSAGE,
        SessionEvent::PostureWarning { .. } => POSTURE_WARNING_MESSAGE,
        SessionEvent::BreakDue => BREAK_DUE_MESSAGE,
        SessionEvent::BreakTimerReset => {
            announcer.cancel_before(now);
            TIMER_RESET_MESSAGE
        }
        SessionEvent::UserLeft
        | SessionEvent::ReturnDetected
        | SessionEvent::ResetRejected { .. } => return,
    };
    announcer.announce(text, now);
}

/// Run the pipeline on its own thread until the stream ends or `stop` is set.
///
/// The source is read on a helper thread so a blocking read never delays
/// shutdown. `done` is notified once the loop exits.
pub fn spawn_pipeline_thread<S>(
    mut source: S,
    mut pipeline: Pipeline,
    stop: Arc<AtomicBool>,
    done: Arc<Notify>,
) -> std::thread::JoinHandle<SessionSummary>
where
    S: LandmarkSource + Send + 'static,
{
    std::thread::spawn(move || {
        let (frame_tx, frame_rx) = std_mpsc::channel();
        std::thread::spawn(move || {
            loop {
                let next = source.next_frame();
                let finished = !matches!(next, Ok(Some(_)));
                if frame_tx.send(next).is_err() || finished {
                    break;
                }
            }
        });

        while !stop.load(Ordering::Relaxed) {
            match frame_rx.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(Some(input))) => {
                    if let Err(err) = pipeline.process(input) {
                        error!(error = %err, "Frame processing failed, stopping pipeline");
                        break;
                    }
                }
                Ok(Ok(None)) => {
                    info!("Landmark stream ended");
                    break;
                }
                Ok(Err(err)) => {
                    error!(error = %err, "Landmark stream failed, ending session");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        done.notify_one();
        pipeline.finish()
    })
}
