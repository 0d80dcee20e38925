use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::review::{DecisionSubmission, Verdict};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreatePaperRequest {
    pub title: String,
}

pub async fn create_paper(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePaperRequest>,
) -> Result<impl IntoResponse> {
    let paper = state.store.create_paper(&req.title).await?;
    tracing::info!(paper = %paper.id, "paper registered");
    Ok((StatusCode::CREATED, Json(paper)))
}

pub async fn get_paper(
    State(state): State<Arc<AppState>>,
    Path(paper_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let paper = state.store.get_paper(paper_id).await?;
    Ok(Json(paper))
}

#[derive(Deserialize)]
pub struct CreateReviewerRequest {
    pub name: String,
}

pub async fn create_reviewer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReviewerRequest>,
) -> Result<impl IntoResponse> {
    let reviewer = state.store.create_reviewer(&req.name).await?;
    Ok((StatusCode::CREATED, Json(reviewer)))
}

#[derive(Deserialize)]
pub struct ReplaceAssignmentRequest {
    pub reviewer_ids: Vec<Uuid>,
}

pub async fn replace_assignment(
    State(state): State<Arc<AppState>>,
    Path(paper_id): Path<Uuid>,
    Json(req): Json<ReplaceAssignmentRequest>,
) -> Result<impl IntoResponse> {
    let set: BTreeSet<Uuid> = req.reviewer_ids.into_iter().collect();
    let assigned = state.store.replace_assignment(paper_id, &set).await?;
    Ok(Json(serde_json::json!({ "reviewer_ids": assigned })))
}

pub async fn get_assignment(
    State(state): State<Arc<AppState>>,
    Path(paper_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let assigned = state.store.assigned_reviewers(paper_id).await?;
    Ok(Json(serde_json::json!({ "reviewer_ids": assigned })))
}

#[derive(Deserialize)]
pub struct SubmitDecisionRequest {
    pub reviewer_id: Uuid,
    pub verdict: String,
    #[serde(default)]
    pub evaluation: serde_json::Value,
}

/// The single mutating operation of the aggregation engine. The identity of
/// the caller is assumed to be verified upstream; assignment membership is
/// still enforced here.
pub async fn submit_decision(
    State(state): State<Arc<AppState>>,
    Path(paper_id): Path<Uuid>,
    Json(req): Json<SubmitDecisionRequest>,
) -> Result<impl IntoResponse> {
    let verdict: Verdict = req.verdict.parse()?;

    let outcome = state
        .store
        .submit_decision(DecisionSubmission {
            paper_id,
            reviewer_id: req.reviewer_id,
            verdict,
            evaluation: req.evaluation,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn get_aggregation(
    State(state): State<Arc<AppState>>,
    Path(paper_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let view = state.store.aggregation(paper_id).await?;
    Ok(Json(view))
}

pub async fn get_decision_history(
    State(state): State<Arc<AppState>>,
    Path(paper_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let history = state.store.decision_history(paper_id).await?;
    Ok(Json(history))
}

/// Editorial resubmission: open the re-review round.
pub async fn advance_phase(
    State(state): State<Arc<AppState>>,
    Path(paper_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let advanced = state.store.advance_phase(paper_id).await?;
    Ok(Json(advanced))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "package": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
