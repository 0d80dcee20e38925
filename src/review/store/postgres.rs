//! Postgres-backed review store.
//!
//! Every mutating operation runs in a single transaction that takes the
//! paper's row lock (`SELECT ... FOR UPDATE`) up front. Submissions for the
//! same paper are therefore serialized across processes while different
//! papers never contend, and the append + projection + status write commit
//! or roll back as one unit.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    AggregationView, DecisionEntry, DecisionSubmission, PhaseAdvanced, ReviewStore, SubmitOutcome,
};
use crate::db::{DbPool, DecisionRow, PaperRow, ReviewerRow};
use crate::error::{ReviewError, Result};
use crate::review::aggregate;
use crate::review::{DecisionRecord, LifecyclePhase, Paper, PaperStatus, Reviewer};

pub struct PgReviewStore {
    pool: DbPool,
}

impl PgReviewStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }

    async fn lock_paper(
        tx: &mut Transaction<'_, Postgres>,
        paper_id: Uuid,
    ) -> Result<Paper> {
        let row = sqlx::query_as::<_, PaperRow>(
            r#"
            SELECT id, title, status, phase, phase_started_at, needs_attention, created_at
            FROM papers WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(paper_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(ReviewError::UnknownPaper(paper_id))?;

        row.try_into()
    }

    async fn fetch_paper(&self, paper_id: Uuid) -> Result<Paper> {
        let row = sqlx::query_as::<_, PaperRow>(
            r#"
            SELECT id, title, status, phase, phase_started_at, needs_attention, created_at
            FROM papers WHERE id = $1
            "#,
        )
        .bind(paper_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or(ReviewError::UnknownPaper(paper_id))?;

        row.try_into()
    }

    async fn fetch_assignment<'e, E>(executor: E, paper_id: Uuid) -> Result<BTreeSet<Uuid>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT reviewer_id FROM paper_reviewers WHERE paper_id = $1",
        )
        .bind(paper_id)
        .fetch_all(executor)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn fetch_records<'e, E>(executor: E, paper_id: Uuid) -> Result<Vec<DecisionRecord>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, (i64, Uuid, String, DateTime<Utc>)>(
            r#"
            SELECT id, reviewer_id, verdict, submitted_at
            FROM decisions WHERE paper_id = $1
            ORDER BY submitted_at, id
            "#,
        )
        .bind(paper_id)
        .fetch_all(executor)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, reviewer_id, verdict, submitted_at)| DecisionRecord {
                id,
                reviewer_id,
                verdict,
                submitted_at,
            })
            .collect())
    }
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    async fn create_paper(&self, title: &str) -> Result<Paper> {
        let row = sqlx::query_as::<_, PaperRow>(
            r#"
            INSERT INTO papers (id, title)
            VALUES ($1, $2)
            RETURNING id, title, status, phase, phase_started_at, needs_attention, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .fetch_one(self.pool())
        .await?;

        row.try_into()
    }

    async fn get_paper(&self, paper_id: Uuid) -> Result<Paper> {
        self.fetch_paper(paper_id).await
    }

    async fn create_reviewer(&self, name: &str) -> Result<Reviewer> {
        let row = sqlx::query_as::<_, ReviewerRow>(
            r#"
            INSERT INTO reviewers (id, name)
            VALUES ($1, $2)
            RETURNING id, name, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(self.pool())
        .await?;

        Ok(row.into())
    }

    async fn assigned_reviewers(&self, paper_id: Uuid) -> Result<BTreeSet<Uuid>> {
        self.fetch_paper(paper_id).await?;
        Self::fetch_assignment(self.pool(), paper_id).await
    }

    async fn replace_assignment(
        &self,
        paper_id: Uuid,
        reviewer_ids: &BTreeSet<Uuid>,
    ) -> Result<BTreeSet<Uuid>> {
        let mut tx = self.pool().begin().await?;
        let paper = Self::lock_paper(&mut tx, paper_id).await?;

        let requested: Vec<Uuid> = reviewer_ids.iter().copied().collect();
        let known: BTreeSet<Uuid> =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM reviewers WHERE id = ANY($1)")
                .bind(&requested)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();

        if let Some(missing) = reviewer_ids.iter().find(|id| !known.contains(id)) {
            return Err(ReviewError::UnknownReviewer(*missing));
        }

        sqlx::query("DELETE FROM paper_reviewers WHERE paper_id = $1")
            .bind(paper_id)
            .execute(&mut *tx)
            .await?;

        for reviewer_id in reviewer_ids {
            sqlx::query("INSERT INTO paper_reviewers (paper_id, reviewer_id) VALUES ($1, $2)")
                .bind(paper_id)
                .bind(reviewer_id)
                .execute(&mut *tx)
                .await?;
        }

        if paper.status == PaperStatus::Pending && !reviewer_ids.is_empty() {
            sqlx::query("UPDATE papers SET status = $2 WHERE id = $1")
                .bind(paper_id)
                .bind(PaperStatus::UnderReview.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(reviewer_ids.clone())
    }

    async fn submit_decision(&self, submission: DecisionSubmission) -> Result<SubmitOutcome> {
        let mut tx = self.pool().begin().await?;
        let paper = Self::lock_paper(&mut tx, submission.paper_id).await?;

        sqlx::query_scalar::<_, Uuid>("SELECT id FROM reviewers WHERE id = $1")
            .bind(submission.reviewer_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ReviewError::UnknownReviewer(submission.reviewer_id))?;

        let assigned = Self::fetch_assignment(&mut *tx, submission.paper_id).await?;
        if !assigned.contains(&submission.reviewer_id) {
            return Err(ReviewError::NotAssigned {
                paper: submission.paper_id,
                reviewer: submission.reviewer_id,
            });
        }

        // clock_timestamp() rather than now(): the recorded order must match
        // the order imposed by the row lock, not transaction start order.
        let decision_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO decisions (paper_id, reviewer_id, verdict, evaluation, submitted_at)
            VALUES ($1, $2, $3, $4, clock_timestamp())
            RETURNING id
            "#,
        )
        .bind(submission.paper_id)
        .bind(submission.reviewer_id)
        .bind(submission.verdict.as_str())
        .bind(&submission.evaluation)
        .fetch_one(&mut *tx)
        .await?;

        let records = Self::fetch_records(&mut *tx, submission.paper_id).await?;
        let result = aggregate::project(&records, &assigned, paper.phase_started_at);
        let applied = aggregate::apply_submission(
            paper.status,
            paper.phase,
            paper.needs_attention,
            &assigned,
            &result,
        );

        if applied.status != paper.status
            || applied.phase != paper.phase
            || applied.needs_attention != paper.needs_attention
        {
            sqlx::query("UPDATE papers SET status = $2, phase = $3, needs_attention = $4 WHERE id = $1")
                .bind(paper.id)
                .bind(applied.status.as_str())
                .bind(applied.phase.as_str())
                .bind(applied.needs_attention)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        if applied.status_changed {
            tracing::info!(
                paper = %paper.id,
                status = %applied.status,
                "paper status resolved"
            );
        }

        Ok(SubmitOutcome {
            decision_id,
            status_changed: applied.status_changed,
            new_status: applied.status_changed.then_some(applied.status),
        })
    }

    async fn aggregation(&self, paper_id: Uuid) -> Result<AggregationView> {
        let paper = self.fetch_paper(paper_id).await?;
        let assigned = Self::fetch_assignment(self.pool(), paper_id).await?;
        let records = Self::fetch_records(self.pool(), paper_id).await?;
        let result = aggregate::project(&records, &assigned, paper.phase_started_at);

        Ok(AggregationView {
            latest_by_reviewer: result.latest_by_reviewer,
            quorum_met: result.quorum_met,
            current_status: paper.status,
        })
    }

    async fn decision_history(&self, paper_id: Uuid) -> Result<Vec<DecisionEntry>> {
        self.fetch_paper(paper_id).await?;

        let rows = sqlx::query_as::<_, DecisionRow>(
            r#"
            SELECT id, paper_id, reviewer_id, verdict, evaluation, submitted_at
            FROM decisions WHERE paper_id = $1
            ORDER BY submitted_at, id
            "#,
        )
        .bind(paper_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| DecisionEntry {
                id: row.id,
                reviewer_id: row.reviewer_id,
                verdict: row.verdict,
                evaluation: row.evaluation,
                submitted_at: row.submitted_at,
            })
            .collect())
    }

    async fn advance_phase(&self, paper_id: Uuid) -> Result<PhaseAdvanced> {
        let mut tx = self.pool().begin().await?;
        let paper = Self::lock_paper(&mut tx, paper_id).await?;

        if paper.phase != LifecyclePhase::RevisionPending {
            return Err(ReviewError::PhaseNotAdvanceable(paper_id));
        }

        let phase_started_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            UPDATE papers SET phase = $2, phase_started_at = clock_timestamp()
            WHERE id = $1
            RETURNING phase_started_at
            "#,
        )
        .bind(paper_id)
        .bind(LifecyclePhase::PostRevisionRound.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(paper = %paper_id, "re-review round opened");

        Ok(PhaseAdvanced {
            phase: LifecyclePhase::PostRevisionRound,
            phase_started_at,
        })
    }
}
