//! Decision aggregation: projecting the latest verdict per reviewer out of
//! the append-only decision log, and resolving a paper status from the
//! projection.
//!
//! Everything here is a pure function over already-loaded data. The storage
//! backends call these inside their per-paper atomic section, so the
//! projection never observes a torn log and two resolutions never race.

use std::collections::{btree_map, BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{DecisionRecord, LifecyclePhase, PaperStatus, Verdict};

/// The latest verdict per reviewer within the current round, plus whether
/// the full assigned quorum has voted.
///
/// Recomputed on every submission, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationResult {
    /// Reviewers with at least one decodable decision in the round window.
    pub latest_by_reviewer: BTreeMap<Uuid, Verdict>,
    /// Reviewers whose latest stored verdict failed to decode, with the raw
    /// text. They still count toward quorum (the reviewer did vote) but
    /// block resolution.
    pub unrecognized: Vec<(Uuid, String)>,
    /// True iff every assigned reviewer has a surviving entry. Vacuously
    /// true for an empty assignment; `resolve` refuses that case.
    pub quorum_met: bool,
}

/// Compute the latest-verdict projection for one paper.
///
/// Only decisions with `submitted_at >= phase_started_at` participate, so a
/// prior round's verdicts never leak into the current round's quorum. Within
/// the window the latest decision per reviewer wins, ties on `submitted_at`
/// broken by decision id (last inserted wins).
pub fn project(
    decisions: &[DecisionRecord],
    assigned: &BTreeSet<Uuid>,
    phase_started_at: DateTime<Utc>,
) -> AggregationResult {
    let mut latest: BTreeMap<Uuid, &DecisionRecord> = BTreeMap::new();
    for decision in decisions.iter().filter(|d| d.submitted_at >= phase_started_at) {
        match latest.entry(decision.reviewer_id) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(decision);
            }
            btree_map::Entry::Occupied(mut entry) => {
                let current = entry.get();
                if (decision.submitted_at, decision.id) >= (current.submitted_at, current.id) {
                    entry.insert(decision);
                }
            }
        }
    }

    let quorum_met = assigned.iter().all(|id| latest.contains_key(id));

    let mut latest_by_reviewer = BTreeMap::new();
    let mut unrecognized = Vec::new();
    for (reviewer_id, decision) in latest {
        match decision.verdict.parse::<Verdict>() {
            Ok(verdict) => {
                latest_by_reviewer.insert(reviewer_id, verdict);
            }
            Err(_) => unrecognized.push((reviewer_id, decision.verdict.clone())),
        }
    }

    AggregationResult {
        latest_by_reviewer,
        unrecognized,
        quorum_met,
    }
}

/// What the resolver decided for one projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Quorum incomplete or assignment empty; the status stays as it is.
    Unchanged,
    /// Full quorum reached; the priority rule produced a round outcome.
    Transition(PaperStatus),
    /// Full quorum reached but a stored verdict did not decode. The paper
    /// must be parked for manual inspection, not given a guessed outcome.
    Flag,
}

/// Apply the verdict-priority rule to a projection.
///
/// Fires only on a complete quorum over a non-empty assignment; an empty
/// assignment can never resolve, and before quorum the status never moves,
/// no matter how strong an individual verdict is. One REJECT among the
/// latest verdicts rejects the paper; otherwise one REVISE requests a
/// revision; otherwise the verdicts are unanimously ACCEPT.
///
/// Only currently-assigned reviewers participate. Verdicts left behind by a
/// reviewer who has since been unassigned stay in the log but carry no
/// weight here.
pub fn resolve(assigned: &BTreeSet<Uuid>, result: &AggregationResult) -> Resolution {
    if assigned.is_empty() || !result.quorum_met {
        return Resolution::Unchanged;
    }

    if result
        .unrecognized
        .iter()
        .any(|(reviewer_id, _)| assigned.contains(reviewer_id))
    {
        return Resolution::Flag;
    }

    let mut saw_revise = false;
    for reviewer_id in assigned {
        match result.latest_by_reviewer.get(reviewer_id) {
            Some(Verdict::Reject) => return Resolution::Transition(PaperStatus::Rejected),
            Some(Verdict::Revise) => saw_revise = true,
            Some(Verdict::Accept) => {}
            None => return Resolution::Unchanged,
        }
    }

    if saw_revise {
        Resolution::Transition(PaperStatus::RevisionRequested)
    } else {
        Resolution::Transition(PaperStatus::Accepted)
    }
}

/// The paper fields a submission may rewrite, computed from the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub status: PaperStatus,
    pub phase: LifecyclePhase,
    pub needs_attention: bool,
    pub status_changed: bool,
}

/// Fold a resolution into the paper's current fields.
///
/// A `REVISION_REQUESTED` outcome also closes the round: the phase moves to
/// `RevisionPending` in the same atomic apply. The round window
/// (`phase_started_at`) is left alone; only the editorial resubmission
/// action resets it. A paper still `PENDING` when its first decision of the
/// round arrives warms up to `UNDER_REVIEW` even without quorum.
pub fn apply_submission(
    status: PaperStatus,
    phase: LifecyclePhase,
    needs_attention: bool,
    assigned: &BTreeSet<Uuid>,
    result: &AggregationResult,
) -> Applied {
    let mut new_status = status;
    let mut new_phase = phase;
    let mut flag = needs_attention;

    match resolve(assigned, result) {
        Resolution::Unchanged => {
            if new_status == PaperStatus::Pending {
                new_status = PaperStatus::UnderReview;
            }
        }
        Resolution::Flag => {
            new_status = PaperStatus::UnderReview;
            flag = true;
        }
        Resolution::Transition(resolved) => {
            new_status = resolved;
            if resolved == PaperStatus::RevisionRequested {
                new_phase = LifecyclePhase::RevisionPending;
            }
        }
    }

    Applied {
        status: new_status,
        phase: new_phase,
        needs_attention: flag,
        status_changed: new_status != status,
    }
}
