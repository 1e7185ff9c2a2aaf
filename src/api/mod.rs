use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::{Arc, RwLock};

pub mod handlers;
pub mod responses;

pub fn router(state: Arc<RwLock<AppState>>) -> Router {
    Router::new()
        .route("/api/posture", get(handlers::get_posture))
        .route("/api/session", get(handlers::get_session))
        .route("/api/health", get(handlers::get_health))
        .route("/api/timer/reset", post(handlers::post_timer_reset))
        .with_state(state)
}
