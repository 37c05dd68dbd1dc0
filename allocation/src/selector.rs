//! Determines which batches a depletion may draw from, and in what order.
//
//  This module is deliberately pure: no async, no IO.

use chrono::NaiveDate;

use crate::types::{BatchOrdering, SelectionConstraints};
use herd::model::{Batch, BatchStatus};

/// Result of an eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEligibility {
    Eligible,
    NotActive,
    Exhausted,
    TooYoung,
    TooOld,
}

impl BatchEligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, BatchEligibility::Eligible)
    }
}

/// Check whether one batch may be drawn from.
///
/// This enforces:
///   - batch lifecycle (must be Active)
///   - remaining head count > 0
///   - optional age bounds relative to `today`
pub fn check_batch_eligibility(
    batch: &Batch,
    constraints: &SelectionConstraints,
    today: NaiveDate,
) -> BatchEligibility {
    if batch.status != BatchStatus::Active {
        return BatchEligibility::NotActive;
    }

    if !batch.has_available() {
        return BatchEligibility::Exhausted;
    }

    let age = batch.age_days(today);
    if let Some(min) = constraints.min_age_days {
        if age < min {
            return BatchEligibility::TooYoung;
        }
    }
    if let Some(max) = constraints.max_age_days {
        if age > max {
            return BatchEligibility::TooOld;
        }
    }

    BatchEligibility::Eligible
}

/// Collect the batches a plan may draw from, in strategy order.
///
/// Returns an empty list (not an error) when nothing qualifies; the caller
/// decides whether emptiness is a problem.
pub fn candidates(
    batches: &[Batch],
    constraints: &SelectionConstraints,
    ordering: BatchOrdering,
    today: NaiveDate,
) -> Vec<Batch> {
    let mut eligible: Vec<Batch> = batches
        .iter()
        .filter(|b| check_batch_eligibility(b, constraints, today).is_eligible())
        .cloned()
        .collect();

    sort_candidates(&mut eligible, ordering);
    eligible
}

fn sort_candidates(batches: &mut [Batch], ordering: BatchOrdering) {
    match ordering {
        BatchOrdering::OldestFirst => {
            batches.sort_by(|a, b| a.started_on.cmp(&b.started_on).then(a.id.cmp(&b.id)));
        }
        BatchOrdering::NewestFirst => {
            batches.sort_by(|a, b| b.started_on.cmp(&a.started_on).then(a.id.cmp(&b.id)));
        }
        BatchOrdering::LargestAvailable => {
            batches.sort_by(|a, b| {
                b.available_quantity()
                    .cmp(&a.available_quantity())
                    .then(a.started_on.cmp(&b.started_on))
                    .then(a.id.cmp(&b.id))
            });
        }
        BatchOrdering::WorstHealthFirst => {
            batches.sort_by(|a, b| {
                b.health
                    .severity()
                    .cmp(&a.health.severity())
                    .then(a.started_on.cmp(&b.started_on))
                    .then(a.id.cmp(&b.id))
            });
        }
    }
}
