use crate::posture::{FeatureVector, PenaltySet};
use crate::session::SessionPhase;
use crate::session::alerts::BreakTimerView;
use crate::session::history::HistorySnapshot;
use crate::session::presence::AwayPeriod;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PostureSuccessResponse {
    pub score: u32,
    pub status: String,
    pub penalties: PenaltySet,
    pub features: FeatureVector,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionSuccessResponse {
    #[serde(flatten)]
    pub phase: SessionPhase,
    pub elapsed_secs: f64,
    pub history: HistorySnapshot,
    pub away_periods: Vec<AwayPeriod>,
    pub break_timer: BreakTimerView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Ko,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthSuccessResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_frame_at: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TimerResetResponse {
    pub accepted: bool,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoData,
    PipelineUnavailable,
    InternalError,
}
