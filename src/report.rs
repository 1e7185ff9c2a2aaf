//! End-of-session report written as JSON for the external chart generator.

use crate::session::history::HistorySnapshot;
use crate::session::presence::AwayPeriod;
use crate::session::{ScoreSample, SessionSummary};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

/// Samples scoring strictly above this count as good posture.
pub const GOOD_SCORE_THRESHOLD: u32 = 80;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to format report timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("report clock is before the unix epoch")]
    Clock,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub generated_at: String,
    pub duration_minutes: f64,
    /// `None` when nothing was scored.
    pub average_score: Option<f64>,
    pub good_posture_percent: Option<f64>,
    pub total_away_secs: f64,
    pub samples: Vec<ScoreSample>,
    pub away_periods: Vec<AwayPeriod>,
    pub history: HistorySnapshot,
}

impl SessionReport {
    pub fn build(summary: &SessionSummary, generated_at: SystemTime) -> Result<Self, ReportError> {
        let generated_at = OffsetDateTime::from(generated_at).format(&Rfc3339)?;
        let scores: Vec<u32> = summary.samples.iter().map(|sample| sample.score).collect();

        let (average_score, good_posture_percent) = if scores.is_empty() {
            (None, None)
        } else {
            let count = scores.len() as f64;
            let sum: u32 = scores.iter().sum();
            let good = scores
                .iter()
                .filter(|score| **score > GOOD_SCORE_THRESHOLD)
                .count();
            (Some(sum as f64 / count), Some(good as f64 / count * 100.0))
        };

        Ok(Self {
            generated_at,
            duration_minutes: summary.duration_secs / 60.0,
            average_score,
            good_posture_percent,
            total_away_secs: summary.away_periods.iter().map(AwayPeriod::duration).sum(),
            samples: summary.samples.clone(),
            away_periods: summary.away_periods.clone(),
            history: summary.history.clone(),
        })
    }
}

/// Build the report and write it to `<dir>/posture_report_<unix seconds>.json`.
pub fn write_report(
    summary: &SessionSummary,
    dir: impl AsRef<Path>,
    now: SystemTime,
) -> Result<PathBuf, ReportError> {
    let report = SessionReport::build(summary, now)?;
    let unix = now
        .duration_since(UNIX_EPOCH)
        .map_err(|_| ReportError::Clock)?
        .as_secs();

    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("posture_report_{unix}.json"));
    std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;

    info!(
        path = %path.display(),
        samples = report.samples.len(),
        away_periods = report.away_periods.len(),
        "Session report written"
    );
    Ok(path)
}
