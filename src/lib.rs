pub mod api;
pub mod config;
pub mod error;
pub mod landmark;
pub mod pipeline;
pub mod posture;
pub mod report;
pub mod session;
pub mod state;
pub mod voice;
