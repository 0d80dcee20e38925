pub mod aggregate;
pub mod store;

pub use aggregate::{project, resolve, AggregationResult, Resolution};
pub use store::{
    AggregationView, DecisionEntry, DecisionSubmission, PhaseAdvanced, ReviewStore, SubmitOutcome,
};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReviewError;

/// A reviewer's judgment for one review round.
///
/// Decoded from raw text exactly once, at the system boundary; internal
/// logic never compares on strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Accept,
    Reject,
    Revise,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accept => "ACCEPT",
            Verdict::Reject => "REJECT",
            Verdict::Revise => "REVISE",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCEPT" => Ok(Verdict::Accept),
            "REJECT" => Ok(Verdict::Reject),
            "REVISE" => Ok(Verdict::Revise),
            other => Err(ReviewError::InvalidVerdict(other.to_string())),
        }
    }
}

/// Current derived status of a paper. The aggregation engine is the only
/// writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaperStatus {
    Pending,
    UnderReview,
    Accepted,
    Rejected,
    RevisionRequested,
}

impl PaperStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperStatus::Pending => "PENDING",
            PaperStatus::UnderReview => "UNDER_REVIEW",
            PaperStatus::Accepted => "ACCEPTED",
            PaperStatus::Rejected => "REJECTED",
            PaperStatus::RevisionRequested => "REVISION_REQUESTED",
        }
    }
}

impl fmt::Display for PaperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaperStatus {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaperStatus::Pending),
            "UNDER_REVIEW" => Ok(PaperStatus::UnderReview),
            "ACCEPTED" => Ok(PaperStatus::Accepted),
            "REJECTED" => Ok(PaperStatus::Rejected),
            "REVISION_REQUESTED" => Ok(PaperStatus::RevisionRequested),
            other => Err(ReviewError::InvalidStatus(other.to_string())),
        }
    }
}

/// Which review round a paper is in.
///
/// `FirstRound` and `PostRevisionRound` are active rounds; `RevisionPending`
/// means the round ended in a revision request and the paper is back with
/// the authors. The editorial resubmission action is the only transition
/// into `PostRevisionRound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecyclePhase {
    FirstRound,
    RevisionPending,
    PostRevisionRound,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::FirstRound => "FIRST_ROUND",
            LifecyclePhase::RevisionPending => "REVISION_PENDING",
            LifecyclePhase::PostRevisionRound => "POST_REVISION_ROUND",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecyclePhase {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIRST_ROUND" => Ok(LifecyclePhase::FirstRound),
            "REVISION_PENDING" => Ok(LifecyclePhase::RevisionPending),
            "POST_REVISION_ROUND" => Ok(LifecyclePhase::PostRevisionRound),
            other => Err(ReviewError::InvalidPhase(other.to_string())),
        }
    }
}

/// A paper as the engine sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub id: Uuid,
    pub title: String,
    pub status: PaperStatus,
    pub phase: LifecyclePhase,
    pub phase_started_at: DateTime<Utc>,
    pub needs_attention: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reviewer {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One logged verdict, reduced to the fields aggregation cares about.
///
/// The verdict is kept as the raw stored text: the write path only ever
/// records canonical values, but the projector re-decodes defensively so a
/// corrupted row is flagged instead of silently shaping an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRecord {
    pub id: i64,
    pub reviewer_id: Uuid,
    pub verdict: String,
    pub submitted_at: DateTime<Utc>,
}
