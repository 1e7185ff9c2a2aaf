//! Spoken announcements played off the frame thread.
//!
//! Announcements are queued to a small worker pool. Playback is serialized
//! through a single speaker lock, and `cancel_before` drops every queued
//! announcement issued before the given instant.

use std::process::Command;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SpeakError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}")]
    Exit { program: String, status: String },
}

pub trait Speaker: Send {
    /// Play `text`, blocking until playback is done.
    fn speak(&mut self, text: &str) -> Result<(), SpeakError>;
}

/// Writes announcements to the log instead of playing them.
#[derive(Debug, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&mut self, text: &str) -> Result<(), SpeakError> {
        info!(text, "Announcement");
        Ok(())
    }
}

/// Runs an external text-to-speech program with the text as its last argument.
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a full argv, `None` when it is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&mut self, text: &str) -> Result<(), SpeakError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .status()
            .map_err(|source| SpeakError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(SpeakError::Exit {
                program: self.program.clone(),
                status: status.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone)]
struct Announcement {
    text: String,
    issued_at: f64,
}

pub struct Announcer {
    sender: Option<Sender<Announcement>>,
    cutoff: Arc<Mutex<f64>>,
    workers: Vec<JoinHandle<()>>,
}

impl Announcer {
    pub fn new(speaker: Box<dyn Speaker>, workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let speaker = Arc::new(Mutex::new(speaker));
        let cutoff = Arc::new(Mutex::new(f64::NEG_INFINITY));

        let workers = (0..workers.max(1))
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                let speaker = Arc::clone(&speaker);
                let cutoff = Arc::clone(&cutoff);
                std::thread::spawn(move || run_worker(&receiver, &speaker, &cutoff))
            })
            .collect();

        Self {
            sender: Some(sender),
            cutoff,
            workers,
        }
    }

    /// An announcer that silently discards everything.
    pub fn disabled() -> Self {
        Self {
            sender: None,
            cutoff: Arc::new(Mutex::new(f64::NEG_INFINITY)),
            workers: Vec::new(),
        }
    }

    /// Queue `text` for playback. Empty text is ignored.
    pub fn announce(&self, text: &str, issued_at: f64) {
        if text.is_empty() {
            return;
        }
        let Some(sender) = &self.sender else {
            debug!(text, "Voice disabled, announcement skipped");
            return;
        };
        let announcement = Announcement {
            text: text.to_string(),
            issued_at,
        };
        if sender.send(announcement).is_err() {
            warn!(text, "Voice workers gone, announcement dropped");
        }
    }

    /// Drop every pending announcement issued before `instant`.
    pub fn cancel_before(&self, instant: f64) {
        match self.cutoff.lock() {
            Ok(mut cutoff) => *cutoff = cutoff.max(instant),
            Err(_) => warn!("Voice cutoff lock poisoned, cancel ignored"),
        }
    }

    /// Stop accepting announcements and wait for the queue to drain.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Voice worker panicked");
            }
        }
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(
    receiver: &Mutex<Receiver<Announcement>>,
    speaker: &Mutex<Box<dyn Speaker>>,
    cutoff: &Mutex<f64>,
) {
    loop {
        let next = match receiver.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => break,
        };
        let Ok(announcement) = next else {
            break;
        };

        let Ok(mut speaker) = speaker.lock() else {
            warn!("Speaker lock poisoned, voice worker stopping");
            break;
        };
        // A cancel may have landed while this worker waited for the speaker.
        let cancelled = cutoff
            .lock()
            .map(|cutoff| announcement.issued_at < *cutoff)
            .unwrap_or(false);
        if cancelled {
            debug!(text = %announcement.text, "Cancelled announcement dropped");
            continue;
        }
        if let Err(err) = speaker.speak(&announcement.text) {
            warn!(error = %err, text = %announcement.text, "Announcement failed");
        }
    }
}
