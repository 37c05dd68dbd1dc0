use thiserror::Error;

use herd::model::{BatchId, DepletionMethod, PopulationId};

/// Request problems surfaced to the caller before any mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("method {0} requires a total quantity")]
    MissingQuantity(DepletionMethod),

    #[error("total quantity must be positive")]
    ZeroQuantity,

    #[error("manual requests take explicit lines, not a total quantity")]
    QuantityWithManual,

    #[error("manual request carries no lines")]
    NoManualLines,

    #[error("explicit lines are not allowed with method {0}")]
    LinesWithAutomatic(DepletionMethod),

    #[error("batch {0} appears more than once in the request")]
    DuplicateBatch(BatchId),

    #[error("quantity for batch {0} must be positive")]
    ZeroLineQuantity(BatchId),

    #[error("batch {0} does not exist")]
    UnknownBatch(BatchId),

    #[error("batch {batch_id} does not belong to population {population_id}")]
    ForeignBatch {
        batch_id: BatchId,
        population_id: PopulationId,
    },

    #[error("batch {0} is not active")]
    InactiveBatch(BatchId),

    #[error("batch {batch_id} has only {available} available, requested {requested}")]
    ExceedsAvailable {
        batch_id: BatchId,
        requested: u64,
        available: u64,
    },

    #[error("availability checks are not defined for the manual method")]
    ManualAvailabilityCheck,

    #[error("entries span more than one population")]
    MixedPopulations,
}
