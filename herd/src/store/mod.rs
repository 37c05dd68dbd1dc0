pub mod sqlite_store;

use crate::model::{
    Batch, BatchId, DepletionType, EntryId, LedgerEntry, Population, PopulationId,
};

/// Query filter for ledger lookups. Voided entries are excluded by default.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub batch_id: Option<BatchId>,
    pub depletion_type: Option<DepletionType>,
    pub include_voided: bool,
}

/// Persistence seam for populations, batches, and the depletion ledger.
///
/// `commit_unit` is the transaction boundary: everything passed in lands
/// atomically or not at all. The executor and the reversal engine never write
/// through the individual `save_*` methods during a depletion.
#[async_trait::async_trait]
pub trait HerdStore: Send + Sync {
    async fn population(&self, id: PopulationId) -> anyhow::Result<Option<Population>>;
    async fn save_population(&self, population: &Population) -> anyhow::Result<()>;

    async fn batch(&self, id: BatchId) -> anyhow::Result<Option<Batch>>;
    async fn batches_for(&self, population_id: PopulationId) -> anyhow::Result<Vec<Batch>>;
    async fn save_batch(&self, batch: &Batch) -> anyhow::Result<()>;

    async fn entry(&self, id: EntryId) -> anyhow::Result<Option<LedgerEntry>>;
    async fn entries_for(
        &self,
        population_id: PopulationId,
        filter: &EntryFilter,
    ) -> anyhow::Result<Vec<LedgerEntry>>;

    /// Persist one depletion or reversal as a single all-or-nothing unit:
    /// the updated population aggregate, every touched batch, and every
    /// written or voided ledger entry.
    async fn commit_unit(
        &self,
        population: &Population,
        batches: &[Batch],
        entries: &[LedgerEntry],
    ) -> anyhow::Result<()>;
}
