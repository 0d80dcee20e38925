//! In-memory review store.
//!
//! Backs the test suite and small demo deployments. Each paper lives in its
//! own cell behind a `tokio::sync::Mutex`; the cell lock is held across the
//! whole append-project-resolve-apply sequence, which gives the same
//! serialization the Postgres backend gets from its row lock while leaving
//! different papers free to proceed in parallel. The outer map lock is only
//! taken long enough to clone the cell handle out.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{
    AggregationView, DecisionEntry, DecisionSubmission, PhaseAdvanced, ReviewStore, SubmitOutcome,
};
use crate::error::{ReviewError, Result};
use crate::review::aggregate;
use crate::review::{DecisionRecord, LifecyclePhase, Paper, PaperStatus, Reviewer};

struct PaperCell {
    paper: Paper,
    assigned: BTreeSet<Uuid>,
    log: Vec<(DecisionRecord, serde_json::Value)>,
}

pub struct InMemoryReviewStore {
    papers: RwLock<HashMap<Uuid, Arc<Mutex<PaperCell>>>>,
    reviewers: RwLock<HashMap<Uuid, Reviewer>>,
    next_decision_id: AtomicI64,
}

impl Default for InMemoryReviewStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryReviewStore {
    pub fn new() -> Self {
        Self {
            papers: RwLock::new(HashMap::new()),
            reviewers: RwLock::new(HashMap::new()),
            next_decision_id: AtomicI64::new(1),
        }
    }

    async fn cell(&self, paper_id: Uuid) -> Result<Arc<Mutex<PaperCell>>> {
        let papers = self.papers.read().await;
        papers
            .get(&paper_id)
            .cloned()
            .ok_or(ReviewError::UnknownPaper(paper_id))
    }

    async fn reviewer_exists(&self, reviewer_id: Uuid) -> bool {
        self.reviewers.read().await.contains_key(&reviewer_id)
    }
}

#[async_trait]
impl ReviewStore for InMemoryReviewStore {
    async fn create_paper(&self, title: &str) -> Result<Paper> {
        let now = Utc::now();
        let paper = Paper {
            id: Uuid::new_v4(),
            title: title.to_string(),
            status: PaperStatus::Pending,
            phase: LifecyclePhase::FirstRound,
            phase_started_at: now,
            needs_attention: false,
            created_at: now,
        };

        let cell = PaperCell {
            paper: paper.clone(),
            assigned: BTreeSet::new(),
            log: Vec::new(),
        };
        self.papers
            .write()
            .await
            .insert(paper.id, Arc::new(Mutex::new(cell)));

        Ok(paper)
    }

    async fn get_paper(&self, paper_id: Uuid) -> Result<Paper> {
        let cell = self.cell(paper_id).await?;
        let cell = cell.lock().await;
        Ok(cell.paper.clone())
    }

    async fn create_reviewer(&self, name: &str) -> Result<Reviewer> {
        let reviewer = Reviewer {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.reviewers
            .write()
            .await
            .insert(reviewer.id, reviewer.clone());
        Ok(reviewer)
    }

    async fn assigned_reviewers(&self, paper_id: Uuid) -> Result<BTreeSet<Uuid>> {
        let cell = self.cell(paper_id).await?;
        let cell = cell.lock().await;
        Ok(cell.assigned.clone())
    }

    async fn replace_assignment(
        &self,
        paper_id: Uuid,
        reviewer_ids: &BTreeSet<Uuid>,
    ) -> Result<BTreeSet<Uuid>> {
        {
            let known = self.reviewers.read().await;
            if let Some(missing) = reviewer_ids.iter().find(|id| !known.contains_key(id)) {
                return Err(ReviewError::UnknownReviewer(*missing));
            }
        }

        let cell = self.cell(paper_id).await?;
        let mut cell = cell.lock().await;
        cell.assigned = reviewer_ids.clone();
        if cell.paper.status == PaperStatus::Pending && !reviewer_ids.is_empty() {
            cell.paper.status = PaperStatus::UnderReview;
        }
        Ok(cell.assigned.clone())
    }

    async fn submit_decision(&self, submission: DecisionSubmission) -> Result<SubmitOutcome> {
        if !self.reviewer_exists(submission.reviewer_id).await {
            return Err(ReviewError::UnknownReviewer(submission.reviewer_id));
        }

        let cell = self.cell(submission.paper_id).await?;
        let mut cell = cell.lock().await;

        if !cell.assigned.contains(&submission.reviewer_id) {
            return Err(ReviewError::NotAssigned {
                paper: submission.paper_id,
                reviewer: submission.reviewer_id,
            });
        }

        let record = DecisionRecord {
            id: self.next_decision_id.fetch_add(1, Ordering::Relaxed),
            reviewer_id: submission.reviewer_id,
            verdict: submission.verdict.as_str().to_string(),
            submitted_at: Utc::now(),
        };
        let decision_id = record.id;
        cell.log.push((record, submission.evaluation));

        let records: Vec<DecisionRecord> = cell.log.iter().map(|(r, _)| r.clone()).collect();
        let result = aggregate::project(&records, &cell.assigned, cell.paper.phase_started_at);
        let applied = aggregate::apply_submission(
            cell.paper.status,
            cell.paper.phase,
            cell.paper.needs_attention,
            &cell.assigned,
            &result,
        );

        cell.paper.status = applied.status;
        cell.paper.phase = applied.phase;
        cell.paper.needs_attention = applied.needs_attention;

        Ok(SubmitOutcome {
            decision_id,
            status_changed: applied.status_changed,
            new_status: applied.status_changed.then_some(applied.status),
        })
    }

    async fn aggregation(&self, paper_id: Uuid) -> Result<AggregationView> {
        let cell = self.cell(paper_id).await?;
        let cell = cell.lock().await;

        let records: Vec<DecisionRecord> = cell.log.iter().map(|(r, _)| r.clone()).collect();
        let result = aggregate::project(&records, &cell.assigned, cell.paper.phase_started_at);

        Ok(AggregationView {
            latest_by_reviewer: result.latest_by_reviewer,
            quorum_met: result.quorum_met,
            current_status: cell.paper.status,
        })
    }

    async fn decision_history(&self, paper_id: Uuid) -> Result<Vec<DecisionEntry>> {
        let cell = self.cell(paper_id).await?;
        let cell = cell.lock().await;

        Ok(cell
            .log
            .iter()
            .map(|(record, evaluation)| DecisionEntry {
                id: record.id,
                reviewer_id: record.reviewer_id,
                verdict: record.verdict.clone(),
                evaluation: evaluation.clone(),
                submitted_at: record.submitted_at,
            })
            .collect())
    }

    async fn advance_phase(&self, paper_id: Uuid) -> Result<PhaseAdvanced> {
        let cell = self.cell(paper_id).await?;
        let mut cell = cell.lock().await;

        if cell.paper.phase != LifecyclePhase::RevisionPending {
            return Err(ReviewError::PhaseNotAdvanceable(paper_id));
        }

        cell.paper.phase = LifecyclePhase::PostRevisionRound;
        cell.paper.phase_started_at = Utc::now();

        Ok(PhaseAdvanced {
            phase: cell.paper.phase,
            phase_started_at: cell.paper.phase_started_at,
        })
    }
}
