use crate::api::responses::{
    ErrorCode, ErrorResponse, HealthStatus, HealthSuccessResponse, PostureSuccessResponse,
    SessionSuccessResponse, TimerResetResponse,
};
use crate::error::AppError;
use crate::pipeline::SessionCommand;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// A frame older than this marks the pipeline as degraded.
pub const FRAME_STALE_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

pub enum ApiResponse<T> {
    Success { status: StatusCode, body: T },
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success { status, body } => (status, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_posture(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_posture_response(state, SystemTime::now())
}

pub async fn get_session(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_session_response(state, SystemTime::now())
}

pub async fn get_health(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_health_response(state, SystemTime::now())
}

pub async fn post_timer_reset(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_timer_reset_response(state, SystemTime::now())
}

fn build_posture_response(
    state: Arc<RwLock<AppState>>,
    now: SystemTime,
) -> ApiResponse<PostureSuccessResponse> {
    const ENDPOINT: &str = "/api/posture";
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => return internal_error(ENDPOINT, "state lock poisoned while reading session"),
    };
    let latest = guard
        .session()
        .and_then(|view| Some((view.result.clone()?, view.received_at)));
    drop(guard);

    let Some((result, received_at)) = latest else {
        return error_response(
            ENDPOINT,
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::NoData,
            "No posture score available",
            now,
        );
    };

    match format_timestamp(received_at) {
        Ok(timestamp) => ApiResponse::Success {
            status: StatusCode::OK,
            body: PostureSuccessResponse {
                score: result.score,
                status: result.status,
                penalties: result.penalties,
                features: result.features,
                timestamp,
            },
        },
        Err(_) => internal_error(ENDPOINT, "timestamp formatting failure"),
    }
}

fn build_session_response(
    state: Arc<RwLock<AppState>>,
    now: SystemTime,
) -> ApiResponse<SessionSuccessResponse> {
    const ENDPOINT: &str = "/api/session";
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => return internal_error(ENDPOINT, "state lock poisoned while reading session"),
    };
    let view = guard.session().cloned();
    drop(guard);

    let Some(view) = view else {
        return error_response(
            ENDPOINT,
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::NoData,
            "No frame processed yet",
            now,
        );
    };

    match format_timestamp(view.received_at) {
        Ok(timestamp) => ApiResponse::Success {
            status: StatusCode::OK,
            body: SessionSuccessResponse {
                phase: view.phase,
                elapsed_secs: view.elapsed,
                history: view.history,
                away_periods: view.away_periods,
                break_timer: view.break_timer,
                notice: view.notice,
                timestamp,
            },
        },
        Err(_) => internal_error(ENDPOINT, "timestamp formatting failure"),
    }
}

fn build_health_response(
    state: Arc<RwLock<AppState>>,
    now: SystemTime,
) -> ApiResponse<HealthSuccessResponse> {
    const ENDPOINT: &str = "/api/health";
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => return internal_error(ENDPOINT, "state lock poisoned while reading session"),
    };
    let last_frame_at = guard.last_frame_at();
    drop(guard);

    let status = derive_health_status(last_frame_at, now);
    let formatted = (
        format_timestamp(now),
        last_frame_at.map(format_timestamp).transpose(),
    );
    let (timestamp, last_frame_at) = match formatted {
        (Ok(timestamp), Ok(last_frame_at)) => (timestamp, last_frame_at),
        _ => return internal_error(ENDPOINT, "timestamp formatting failure"),
    };

    let status_code = match status {
        HealthStatus::Ko => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
    };

    ApiResponse::Success {
        status: status_code,
        body: HealthSuccessResponse {
            status,
            last_frame_at,
            timestamp,
        },
    }
}

fn derive_health_status(last_frame_at: Option<SystemTime>, now: SystemTime) -> HealthStatus {
    let Some(last_frame_at) = last_frame_at else {
        return HealthStatus::Ko;
    };
    // A frame stamped after `now` is fresh.
    match now.duration_since(last_frame_at) {
        Ok(age) if age > FRAME_STALE_AFTER => HealthStatus::Degraded,
        _ => HealthStatus::Ok,
    }
}

fn build_timer_reset_response(
    state: Arc<RwLock<AppState>>,
    now: SystemTime,
) -> ApiResponse<TimerResetResponse> {
    const ENDPOINT: &str = "/api/timer/reset";
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => return internal_error(ENDPOINT, "state lock poisoned while sending command"),
    };
    let sent = guard.send_command(SessionCommand::ResetBreakTimer);
    drop(guard);

    match sent {
        Ok(()) => {
            info!("Break timer reset requested");
            match format_timestamp(now) {
                Ok(timestamp) => ApiResponse::Success {
                    status: StatusCode::ACCEPTED,
                    body: TimerResetResponse {
                        accepted: true,
                        timestamp,
                    },
                },
                Err(_) => internal_error(ENDPOINT, "timestamp formatting failure"),
            }
        }
        Err(AppError::CommandChannelClosed) => error_response(
            ENDPOINT,
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::PipelineUnavailable,
            "Pipeline is not running",
            now,
        ),
        Err(_) => internal_error(ENDPOINT, "unexpected error while sending command"),
    }
}

fn error_response<T>(
    endpoint: &str,
    status: StatusCode,
    error_code: ErrorCode,
    message: &str,
    now: SystemTime,
) -> ApiResponse<T> {
    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Error {
            status,
            body: ErrorResponse {
                error_code,
                error_message: message.to_string(),
                timestamp,
            },
        },
        Err(_) => internal_error(endpoint, "timestamp formatting failure"),
    }
}

fn internal_error<T>(endpoint: &str, message: &str) -> ApiResponse<T> {
    error!(endpoint, message, "Internal error while handling request");
    let formatted = format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format internal error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    });
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            error_code: ErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: formatted,
        },
    }
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posture::{FeatureVector, PenaltySet, ScoreResult};
    use crate::session::SessionPhase;
    use crate::session::alerts::BreakTimerView;
    use crate::session::history::PostureHistory;
    use crate::session::presence::AwayPeriod;
    use crate::state::SessionView;
    use std::time::UNIX_EPOCH;
    use tokio::sync::mpsc;

    fn view(received_at: SystemTime, result: Option<ScoreResult>) -> SessionView {
        SessionView {
            received_at,
            elapsed: 30.0,
            phase: SessionPhase::Monitoring,
            result,
            history: PostureHistory::new().snapshot(),
            break_timer: BreakTimerView {
                remaining_secs: 30.0,
                paused: false,
                expired: false,
            },
            notice: Some("Cannot reset: timer is still running".to_string()),
            away_periods: vec![AwayPeriod {
                start: 5.0,
                end: 9.0,
            }],
        }
    }

    fn scored(score: u32) -> ScoreResult {
        ScoreResult {
            score,
            status: "shoulder_tilt".to_string(),
            penalties: PenaltySet {
                shoulder_tilt: 100 - score,
                ..PenaltySet::default()
            },
            features: FeatureVector::default(),
        }
    }

    fn state_with(view: SessionView) -> Arc<RwLock<AppState>> {
        let mut app_state = AppState::new();
        app_state.set_session(view);
        Arc::new(RwLock::new(app_state))
    }

    fn poisoned_state() -> Arc<RwLock<AppState>> {
        let state = Arc::new(RwLock::new(AppState::new()));
        let state_for_thread = Arc::clone(&state);
        let _ = std::thread::spawn(move || {
            let _guard = state_for_thread.write().expect("lock for poison");
            panic!("poison lock");
        })
        .join();
        state
    }

    #[test]
    fn posture_handler_returns_latest_score() {
        let state = state_with(view(UNIX_EPOCH + Duration::from_secs(1), Some(scored(80))));

        let response = build_posture_response(state, UNIX_EPOCH + Duration::from_secs(2));

        match response {
            ApiResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body.score, 80);
                assert_eq!(body.penalties.shoulder_tilt, 20);
                assert_eq!(body.timestamp, "1970-01-01T00:00:01Z");
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }

    #[test]
    fn posture_handler_returns_no_data_when_frame_unscored() {
        let state = state_with(view(UNIX_EPOCH, None));

        let response = build_posture_response(state, UNIX_EPOCH + Duration::from_secs(3));

        match response {
            ApiResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body.error_code, ErrorCode::NoData);
                assert_eq!(body.timestamp, "1970-01-01T00:00:03Z");
            }
            ApiResponse::Success { .. } => panic!("expected no data error response"),
        }
    }

    #[test]
    fn posture_handler_returns_internal_error_when_lock_poisoned() {
        let response = build_posture_response(poisoned_state(), UNIX_EPOCH);

        match response {
            ApiResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body.error_code, ErrorCode::InternalError);
                assert_eq!(body.error_message, "Internal server error");
            }
            ApiResponse::Success { .. } => panic!("expected internal error response"),
        }
    }

    #[test]
    fn session_handler_returns_view() {
        let state = state_with(view(UNIX_EPOCH + Duration::from_secs(4), None));

        let response = build_session_response(state, UNIX_EPOCH + Duration::from_secs(5));

        match response {
            ApiResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body.phase, SessionPhase::Monitoring);
                assert_eq!(body.elapsed_secs, 30.0);
                assert_eq!(body.away_periods.len(), 1);
                assert!(body.notice.is_some());
                assert_eq!(body.timestamp, "1970-01-01T00:00:04Z");
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }

    #[test]
    fn session_handler_returns_no_data_before_first_frame() {
        let state = Arc::new(RwLock::new(AppState::new()));

        let response = build_session_response(state, UNIX_EPOCH);

        assert!(matches!(
            response,
            ApiResponse::Error { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
        ));
    }

    #[test]
    fn health_handler_returns_ok_for_recent_frame() {
        let state = state_with(view(UNIX_EPOCH + Duration::from_secs(10), None));

        let response = build_health_response(state, UNIX_EPOCH + Duration::from_secs(14));

        match response {
            ApiResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body.status, HealthStatus::Ok);
                assert_eq!(body.last_frame_at.as_deref(), Some("1970-01-01T00:00:10Z"));
                assert_eq!(body.timestamp, "1970-01-01T00:00:14Z");
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }

    #[test]
    fn health_handler_returns_degraded_for_stale_frame() {
        let state = state_with(view(UNIX_EPOCH + Duration::from_secs(10), None));

        let response = build_health_response(state, UNIX_EPOCH + Duration::from_secs(16));

        match response {
            ApiResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body.status, HealthStatus::Degraded);
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }

    #[test]
    fn health_handler_returns_ko_before_first_frame() {
        let state = Arc::new(RwLock::new(AppState::new()));

        let response = build_health_response(state, UNIX_EPOCH + Duration::from_secs(6));

        match response {
            ApiResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body.status, HealthStatus::Ko);
                assert_eq!(body.last_frame_at, None);
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }

    #[test]
    fn health_handler_returns_internal_error_when_lock_poisoned() {
        let response = build_health_response(poisoned_state(), UNIX_EPOCH);

        assert!(matches!(
            response,
            ApiResponse::Error { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[test]
    fn timer_reset_forwards_command() {
        let mut app_state = AppState::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        app_state.set_command_sender(tx);
        let state = Arc::new(RwLock::new(app_state));

        let response = build_timer_reset_response(state, UNIX_EPOCH + Duration::from_secs(7));

        match response {
            ApiResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::ACCEPTED);
                assert!(body.accepted);
            }
            ApiResponse::Error { status, .. } => {
                panic!("expected accepted response, got error: {status}");
            }
        }
        assert_eq!(rx.try_recv().ok(), Some(SessionCommand::ResetBreakTimer));
    }

    #[test]
    fn timer_reset_without_pipeline_is_unavailable() {
        let state = Arc::new(RwLock::new(AppState::new()));

        let response = build_timer_reset_response(state, UNIX_EPOCH);

        match response {
            ApiResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body.error_code, ErrorCode::PipelineUnavailable);
            }
            ApiResponse::Success { .. } => panic!("expected unavailable response"),
        }
    }
}
