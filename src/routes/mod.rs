pub mod api;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/papers", post(api::create_paper))
        .route("/api/papers/:paper_id", get(api::get_paper))
        .route("/api/reviewers", post(api::create_reviewer))
        .route(
            "/api/papers/:paper_id/reviewers",
            put(api::replace_assignment).get(api::get_assignment),
        )
        .route(
            "/api/papers/:paper_id/decisions",
            post(api::submit_decision).get(api::get_decision_history),
        )
        .route("/api/papers/:paper_id/aggregation", get(api::get_aggregation))
        .route("/api/papers/:paper_id/phase", post(api::advance_phase))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
