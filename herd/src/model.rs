use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type PopulationId = uuid::Uuid;
pub type BatchId = uuid::Uuid;
pub type EntryId = uuid::Uuid;

/// Identifier of the user an entry was recorded by.
pub type UserId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Active,
    Closed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchStatus::Active => "Active",
            BatchStatus::Closed => "Closed",
        };
        f.write_str(s)
    }
}

impl FromStr for BatchStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(BatchStatus::Active),
            "Closed" => Ok(BatchStatus::Closed),
            other => Err(anyhow::anyhow!("Invalid BatchStatus value: {}", other)),
        }
    }
}

/// Coarse herd-health grade, used only as an optional selection ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Watch,
    Sick,
}

impl HealthStatus {
    /// Higher = worse. Worst-first ordering pulls from sick batches first.
    pub fn severity(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Watch => 1,
            HealthStatus::Sick => 2,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Watch => "Watch",
            HealthStatus::Sick => "Sick",
        };
        f.write_str(s)
    }
}

impl FromStr for HealthStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Healthy" => Ok(HealthStatus::Healthy),
            "Watch" => Ok(HealthStatus::Watch),
            "Sick" => Ok(HealthStatus::Sick),
            other => Err(anyhow::anyhow!("Invalid HealthStatus value: {}", other)),
        }
    }
}

/// What kind of reduction a ledger entry records.
///
/// The type decides which batch counter the quantity lands on:
/// mortality/culling/other -> depleted, sale -> sold, transfer -> transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepletionType {
    Mortality,
    Culling,
    Sale,
    Transfer,
    Other,
}

impl fmt::Display for DepletionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DepletionType::Mortality => "mortality",
            DepletionType::Culling => "culling",
            DepletionType::Sale => "sale",
            DepletionType::Transfer => "transfer",
            DepletionType::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for DepletionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mortality" => Ok(DepletionType::Mortality),
            "culling" => Ok(DepletionType::Culling),
            "sale" => Ok(DepletionType::Sale),
            "transfer" => Ok(DepletionType::Transfer),
            "other" => Ok(DepletionType::Other),
            other => Err(anyhow::anyhow!("Invalid DepletionType value: {}", other)),
        }
    }
}

/// Allocation strategy requested by the caller.
///
/// This is a closed set: unknown method strings are rejected at the boundary
/// instead of falling back to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepletionMethod {
    OldestFirst,
    NewestFirst,
    Manual,
    Proportional,
    Balanced,
}

impl fmt::Display for DepletionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DepletionMethod::OldestFirst => "oldest_first",
            DepletionMethod::NewestFirst => "newest_first",
            DepletionMethod::Manual => "manual",
            DepletionMethod::Proportional => "proportional",
            DepletionMethod::Balanced => "balanced",
        };
        f.write_str(s)
    }
}

impl FromStr for DepletionMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oldest_first" => Ok(DepletionMethod::OldestFirst),
            "newest_first" => Ok(DepletionMethod::NewestFirst),
            "manual" => Ok(DepletionMethod::Manual),
            "proportional" => Ok(DepletionMethod::Proportional),
            "balanced" => Ok(DepletionMethod::Balanced),
            other => Err(anyhow::anyhow!("Invalid DepletionMethod value: {}", other)),
        }
    }
}

/// One cohort of animals that entered inventory together.
///
/// `initial_quantity` is fixed at creation; the three counters only ever move
/// through the depletion executor and the reversal engine. Exhausted batches
/// are never deleted: they stay behind with zero availability for history.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: BatchId,
    pub population_id: PopulationId,

    /// Entry date into inventory; defines FIFO/LIFO order.
    pub started_on: NaiveDate,
    pub status: BatchStatus,
    pub health: HealthStatus,

    pub initial_quantity: u64,
    pub quantity_depleted: u64,
    pub quantity_sold: u64,
    pub quantity_transferred: u64,
}

impl Batch {
    /// Head count still in this batch.
    pub fn available_quantity(&self) -> u64 {
        self.initial_quantity
            .saturating_sub(self.quantity_depleted + self.quantity_sold + self.quantity_transferred)
    }

    pub fn has_available(&self) -> bool {
        self.available_quantity() > 0
    }

    /// Whole days since the batch entered inventory, as of `on`.
    pub fn age_days(&self, on: NaiveDate) -> i64 {
        (on - self.started_on).num_days()
    }

    /// Current value of the counter a depletion of `kind` lands on.
    pub fn counter(&self, kind: DepletionType) -> u64 {
        match kind {
            DepletionType::Mortality | DepletionType::Culling | DepletionType::Other => {
                self.quantity_depleted
            }
            DepletionType::Sale => self.quantity_sold,
            DepletionType::Transfer => self.quantity_transferred,
        }
    }

    fn counter_mut(&mut self, kind: DepletionType) -> &mut u64 {
        match kind {
            DepletionType::Mortality | DepletionType::Culling | DepletionType::Other => {
                &mut self.quantity_depleted
            }
            DepletionType::Sale => &mut self.quantity_sold,
            DepletionType::Transfer => &mut self.quantity_transferred,
        }
    }

    /// Add `quantity` to the counter matching `kind`.
    pub fn apply_depletion(&mut self, kind: DepletionType, quantity: u64) {
        *self.counter_mut(kind) += quantity;
    }

    /// Subtract `quantity` from the counter matching `kind`, clamped at 0.
    pub fn reverse_depletion(&mut self, kind: DepletionType, quantity: u64) {
        let counter = self.counter_mut(kind);
        *counter = counter.saturating_sub(quantity);
    }

    /// Counter state at a point in time, stored into entry context for audit.
    pub fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            initial_quantity: self.initial_quantity,
            quantity_depleted: self.quantity_depleted,
            quantity_sold: self.quantity_sold,
            quantity_transferred: self.quantity_transferred,
        }
    }
}

/// A livestock group. Batches hang off a population; `current_quantity` is the
/// cached aggregate the executor recomputes after every commit.
///
/// Populations with `tracks_batches = false` keep totals only: depletions land
/// on the population's own counter and no batch rows exist.
#[derive(Debug, Clone)]
pub struct Population {
    pub id: PopulationId,
    pub name: String,
    pub tracks_batches: bool,

    pub current_quantity: u64,
    pub quantity_depleted: u64,
}

/// Structured audit context carried by a ledger entry.
///
/// Used for reversal forensics and reporting, never for computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryContext {
    pub reason: Option<String>,
    pub note: Option<String>,
    pub recorded_by: Option<UserId>,
    /// Batch counters as they stood immediately before this entry applied.
    pub batch_before: Option<BatchSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub initial_quantity: u64,
    pub quantity_depleted: u64,
    pub quantity_sold: u64,
    pub quantity_transferred: u64,
}

/// One depletion applied to one batch (or to a totals-only population when
/// `batch_id` is None). Immutable once written; reversal voids it, never
/// deletes or edits it.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub population_id: PopulationId,
    pub batch_id: Option<BatchId>,

    pub depletion_type: DepletionType,
    pub quantity: u64,
    pub occurred_on: NaiveDate,
    pub method: DepletionMethod,

    /// Position within the multi-batch plan this entry came from.
    pub sequence_index: u32,

    pub created_at: DateTime<Utc>,
    pub voided_at: Option<DateTime<Utc>>,

    pub context: EntryContext,
}

impl LedgerEntry {
    pub fn is_voided(&self) -> bool {
        self.voided_at.is_some()
    }
}
