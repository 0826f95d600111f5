//! Document-to-quiz HTTP service.
//!
//! Two stateless endpoints wrap one external text-generation call each:
//! `/api/generate-quiz` turns an uploaded document into multiple-choice
//! questions, `/api/analyze-results` turns a list of missed questions into
//! a short study-feedback paragraph.
pub mod config;
pub mod error;
pub mod extract;
pub mod feedback;
pub mod gemini;
pub mod generate;
pub mod routes;

use axum::{
    Router,
    routing::{get, post},
};

pub use config::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status/ping", get(routes::get_status_ping))
        .route("/api/generate-quiz", post(routes::post_generate_quiz))
        .route("/api/analyze-results", post(routes::post_analyze_results))
        .with_state(state)
}
