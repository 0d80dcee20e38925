use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, ReviewError>;

/// Errors surfaced by the review engine and its HTTP layer.
///
/// All variants are returned synchronously to the caller; nothing is
/// retried inside the service.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("unknown paper {0}")]
    UnknownPaper(Uuid),

    #[error("unknown reviewer {0}")]
    UnknownReviewer(Uuid),

    /// The submitting reviewer is not in the paper's assignment snapshot.
    /// Rejected before logging, so unauthorized votes never affect quorum.
    #[error("reviewer {reviewer} is not assigned to paper {paper}")]
    NotAssigned { paper: Uuid, reviewer: Uuid },

    #[error("invalid verdict {0:?}, expected ACCEPT, REJECT or REVISE")]
    InvalidVerdict(String),

    #[error("invalid paper status {0:?}")]
    InvalidStatus(String),

    #[error("invalid lifecycle phase {0:?}")]
    InvalidPhase(String),

    /// Resubmission only makes sense while a revision is pending.
    #[error("paper {0} is not awaiting a resubmission")]
    PhaseNotAdvanceable(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ReviewError {
    fn into_response(self) -> Response {
        let status = match &self {
            ReviewError::UnknownPaper(_) | ReviewError::UnknownReviewer(_) => {
                StatusCode::NOT_FOUND
            }
            ReviewError::NotAssigned { .. } => StatusCode::FORBIDDEN,
            ReviewError::InvalidVerdict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ReviewError::PhaseNotAdvanceable(_) => StatusCode::CONFLICT,
            ReviewError::InvalidStatus(_)
            | ReviewError::InvalidPhase(_)
            | ReviewError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
