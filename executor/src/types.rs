//! Common types and small abstraction traits used by the executor.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use allocation::error::ValidationError;
use herd::model::{BatchId, EntryId, PopulationId, UserId};

/// Injectable time source so commits and reversals are deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Resolves the user a ledger entry is stamped with.
///
/// Stamped into entry context only; never used in computation.
pub trait ActorContext: Send + Sync {
    fn current_user_id(&self) -> Option<UserId>;
}

/// Fixed acting user (service processes, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticActor(pub Option<UserId>);

impl ActorContext for StaticActor {
    fn current_user_id(&self) -> Option<UserId> {
        self.0
    }
}

/// Result of an availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub can_fulfill: bool,
    pub shortfall: u64,
}

/// Errors that can occur while planning, committing, or reversing a depletion.
#[derive(Debug, Error)]
pub enum DepletionError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("population {0} not found")]
    PopulationNotFound(PopulationId),

    #[error("ledger entry {0} not found")]
    EntryNotFound(EntryId),

    #[error("no eligible batches in population {0}")]
    NoEligibleBatches(PopulationId),

    #[error(
        "insufficient inventory: requested {requested}, available {available} (short {shortfall})"
    )]
    InsufficientInventory {
        requested: u64,
        available: u64,
        shortfall: u64,
    },

    #[error("batch {batch_id} changed underneath the plan: need {required}, only {available} left")]
    StaleBatchState {
        batch_id: BatchId,
        required: u64,
        available: u64,
    },

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}
