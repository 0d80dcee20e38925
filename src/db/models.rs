use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ReviewError;
use crate::review::{Paper, Reviewer};

/// `papers` row as stored. Status and phase are TEXT in the database and
/// are decoded into their closed enums when crossing into the domain.
#[derive(Debug, FromRow)]
pub struct PaperRow {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub phase: String,
    pub phase_started_at: DateTime<Utc>,
    pub needs_attention: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PaperRow> for Paper {
    type Error = ReviewError;

    fn try_from(row: PaperRow) -> Result<Self, Self::Error> {
        Ok(Paper {
            id: row.id,
            title: row.title,
            status: row.status.parse()?,
            phase: row.phase.parse()?,
            phase_started_at: row.phase_started_at,
            needs_attention: row.needs_attention,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ReviewerRow {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<ReviewerRow> for Reviewer {
    fn from(row: ReviewerRow) -> Self {
        Reviewer {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

/// `decisions` row as stored. Append-only; never updated or deleted.
#[derive(Debug, FromRow)]
pub struct DecisionRow {
    pub id: i64,
    pub paper_id: Uuid,
    pub reviewer_id: Uuid,
    pub verdict: String,
    pub evaluation: serde_json::Value,
    pub submitted_at: DateTime<Utc>,
}
