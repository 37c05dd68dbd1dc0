//! Strategy resolution: maps a requested method onto a batch ordering and a
//! distribution algorithm, and validates manual requests line by line.

use std::collections::HashSet;

use crate::distribution::{DistributionPlan, PlanLine};
use crate::error::ValidationError;
use crate::types::{AllocationConfig, BatchOrdering, ManualLine};
use herd::model::{Batch, BatchStatus, DepletionMethod, PopulationId};

/// The algorithm family a plan is computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sequential { single_batch: bool },
    Proportional,
    Balanced,
}

/// A fully resolved strategy for an automatic request.
#[derive(Debug, Clone, Copy)]
pub struct Strategy {
    pub ordering: BatchOrdering,
    pub algorithm: Algorithm,
}

/// Resolve the strategy for an automatic method.
///
/// Manual requests carry explicit lines and have no automatic strategy, so
/// they resolve to None; callers route them through `manual_plan` instead.
pub fn resolve(method: DepletionMethod, cfg: &AllocationConfig) -> Option<Strategy> {
    let default_ordering = match method {
        DepletionMethod::NewestFirst => BatchOrdering::NewestFirst,
        _ => BatchOrdering::OldestFirst,
    };
    let ordering = cfg.ordering.unwrap_or(default_ordering);

    let algorithm = match method {
        DepletionMethod::OldestFirst | DepletionMethod::NewestFirst => Algorithm::Sequential {
            single_batch: cfg.single_batch,
        },
        DepletionMethod::Proportional => Algorithm::Proportional,
        DepletionMethod::Balanced => Algorithm::Balanced,
        DepletionMethod::Manual => return None,
    };

    Some(Strategy {
        ordering,
        algorithm,
    })
}

/// Validate a manual request and turn it into a plan.
///
/// Every line is checked independently: the batch must exist in `batches`,
/// belong to `population_id`, be active, and have enough head count for the
/// line. The first violation fails the whole request, naming the batch; no
/// partial plan is ever produced.
pub fn manual_plan(
    population_id: PopulationId,
    lines: &[ManualLine],
    batches: &[Batch],
) -> Result<DistributionPlan, ValidationError> {
    let mut seen: HashSet<_> = HashSet::with_capacity(lines.len());
    let mut plan_lines = Vec::with_capacity(lines.len());
    let mut requested = 0u64;

    for line in lines {
        if !seen.insert(line.batch_id) {
            return Err(ValidationError::DuplicateBatch(line.batch_id));
        }
        if line.quantity == 0 {
            return Err(ValidationError::ZeroLineQuantity(line.batch_id));
        }

        let batch = batches
            .iter()
            .find(|b| b.id == line.batch_id)
            .ok_or(ValidationError::UnknownBatch(line.batch_id))?;

        if batch.population_id != population_id {
            return Err(ValidationError::ForeignBatch {
                batch_id: line.batch_id,
                population_id,
            });
        }
        if batch.status != BatchStatus::Active {
            return Err(ValidationError::InactiveBatch(line.batch_id));
        }

        let available = batch.available_quantity();
        if line.quantity > available {
            return Err(ValidationError::ExceedsAvailable {
                batch_id: line.batch_id,
                requested: line.quantity,
                available,
            });
        }

        plan_lines.push(PlanLine {
            batch_id: line.batch_id,
            quantity: line.quantity,
            remaining_after: available - line.quantity,
        });
        requested += line.quantity;
    }

    Ok(DistributionPlan {
        lines: plan_lines,
        requested,
        fully_satisfied: true,
        shortfall: 0,
    })
}
