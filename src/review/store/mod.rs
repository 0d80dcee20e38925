//! Storage abstraction for the review engine.
//!
//! `ReviewStore` owns the atomic submit path: append to the decision log,
//! re-project the round, resolve, and persist the outcome as one unit.
//! Backends differ only in how they achieve per-paper serialization; the
//! aggregation rules themselves live in [`crate::review::aggregate`] and
//! are shared.

pub mod memory;
pub mod postgres;


pub use memory::InMemoryReviewStore;
pub use postgres::PgReviewStore;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::review::{LifecyclePhase, Paper, PaperStatus, Reviewer, Verdict};

/// A verdict submission, already validated at the HTTP boundary.
#[derive(Debug, Clone)]
pub struct DecisionSubmission {
    pub paper_id: Uuid,
    pub reviewer_id: Uuid,
    pub verdict: Verdict,
    /// Free-form evaluation payload. Logged verbatim, never interpreted.
    pub evaluation: serde_json::Value,
}

/// Result of one decision submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub decision_id: i64,
    pub status_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<PaperStatus>,
}

/// Read-only aggregation view for diagnostics and UI support.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationView {
    pub latest_by_reviewer: BTreeMap<Uuid, Verdict>,
    pub quorum_met: bool,
    pub current_status: PaperStatus,
}

/// One row of the audit trail. The verdict is reported as stored.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionEntry {
    pub id: i64,
    pub reviewer_id: Uuid,
    pub verdict: String,
    pub evaluation: serde_json::Value,
    pub submitted_at: DateTime<Utc>,
}

/// Result of the editorial resubmission action.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseAdvanced {
    pub phase: LifecyclePhase,
    pub phase_started_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn create_paper(&self, title: &str) -> Result<Paper>;

    async fn get_paper(&self, paper_id: Uuid) -> Result<Paper>;

    async fn create_reviewer(&self, name: &str) -> Result<Reviewer>;

    /// Snapshot of the assignment registry for one paper.
    async fn assigned_reviewers(&self, paper_id: Uuid) -> Result<BTreeSet<Uuid>>;

    /// Replace the assignment set. Every id must name an existing reviewer;
    /// the set is validated here, once, and never re-parsed at read time.
    /// A first non-empty assignment moves a `PENDING` paper to
    /// `UNDER_REVIEW`.
    async fn replace_assignment(
        &self,
        paper_id: Uuid,
        reviewer_ids: &BTreeSet<Uuid>,
    ) -> Result<BTreeSet<Uuid>>;

    /// Append a decision and apply the aggregation outcome atomically.
    /// Either the decision row and any status movement are both visible, or
    /// neither is. Same-paper submissions are serialized; different papers
    /// proceed in parallel.
    async fn submit_decision(&self, submission: DecisionSubmission) -> Result<SubmitOutcome>;

    /// Recompute the projection for one paper. No side effects.
    async fn aggregation(&self, paper_id: Uuid) -> Result<AggregationView>;

    /// Full decision history for one paper, oldest first.
    async fn decision_history(&self, paper_id: Uuid) -> Result<Vec<DecisionEntry>>;

    /// Editorial resubmission: move a `REVISION_PENDING` paper into its
    /// re-review round and reset the round window so prior-round verdicts
    /// stop counting. Leaves `status` untouched.
    async fn advance_phase(&self, paper_id: Uuid) -> Result<PhaseAdvanced>;
}
