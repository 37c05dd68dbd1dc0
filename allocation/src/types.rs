//! Shared types used by the allocation subsystem.

use chrono::NaiveDate;

use crate::error::ValidationError;
use herd::model::{BatchId, DepletionMethod, DepletionType, PopulationId};

/// Configuration knobs for allocation.
///
/// These are global policy parameters; callers construct them directly.
#[derive(Debug, Clone)]
pub struct AllocationConfig {
    /// Sequential strategies draw from the first eligible batch only and
    /// stop, regardless of shortfall ("one lot per transaction").
    pub single_batch: bool,

    /// Head count sequential strategies always leave behind in each batch.
    pub min_remaining: u64,

    /// Whether a plan that cannot fully satisfy the requested quantity may
    /// still be committed with a shortfall.
    pub allow_partial: bool,

    /// Overrides the ordering implied by the requested method.
    pub ordering: Option<BatchOrdering>,

    /// Batch age bounds (in days relative to "today") for selection.
    pub min_age_days: Option<i64>,
    pub max_age_days: Option<i64>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            single_batch: true,
            min_remaining: 0,
            allow_partial: false,
            ordering: None,
            min_age_days: None,
            max_age_days: None,
        }
    }
}

impl AllocationConfig {
    pub fn constraints(&self) -> SelectionConstraints {
        SelectionConstraints {
            min_age_days: self.min_age_days,
            max_age_days: self.max_age_days,
        }
    }
}

/// Filters applied when collecting candidate batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionConstraints {
    pub min_age_days: Option<i64>,
    pub max_age_days: Option<i64>,
}

/// Primary sort key for candidate batches. Ties always break by entry date,
/// then by id, so candidate order is fully deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOrdering {
    OldestFirst,
    NewestFirst,
    LargestAvailable,
    WorstHealthFirst,
}

/// One explicit batch/quantity pair of a manual request.
#[derive(Debug, Clone, Copy)]
pub struct ManualLine {
    pub batch_id: BatchId,
    pub quantity: u64,
}

/// A depletion request as submitted by the caller.
///
/// Automatic methods carry `quantity`; the manual method carries `lines`.
/// The two are mutually exclusive, enforced by `validate`.
#[derive(Debug, Clone)]
pub struct DepletionRequest {
    pub population_id: PopulationId,
    pub method: DepletionMethod,
    pub depletion_type: DepletionType,

    pub quantity: Option<u64>,
    pub lines: Vec<ManualLine>,

    pub occurred_on: NaiveDate,
    pub reason: Option<String>,
    pub note: Option<String>,
}

impl DepletionRequest {
    pub fn total(
        population_id: PopulationId,
        method: DepletionMethod,
        depletion_type: DepletionType,
        quantity: u64,
        occurred_on: NaiveDate,
    ) -> Self {
        Self {
            population_id,
            method,
            depletion_type,
            quantity: Some(quantity),
            lines: Vec::new(),
            occurred_on,
            reason: None,
            note: None,
        }
    }

    pub fn manual(
        population_id: PopulationId,
        depletion_type: DepletionType,
        lines: Vec<ManualLine>,
        occurred_on: NaiveDate,
    ) -> Self {
        Self {
            population_id,
            method: DepletionMethod::Manual,
            depletion_type,
            quantity: None,
            lines,
            occurred_on,
            reason: None,
            note: None,
        }
    }

    /// Shape checks that need no store access. Runs before any mutation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.method == DepletionMethod::Manual {
            if self.quantity.is_some() {
                return Err(ValidationError::QuantityWithManual);
            }
            if self.lines.is_empty() {
                return Err(ValidationError::NoManualLines);
            }
            return Ok(());
        }

        if !self.lines.is_empty() {
            return Err(ValidationError::LinesWithAutomatic(self.method));
        }
        match self.quantity {
            None => Err(ValidationError::MissingQuantity(self.method)),
            Some(0) => Err(ValidationError::ZeroQuantity),
            Some(_) => Ok(()),
        }
    }
}
