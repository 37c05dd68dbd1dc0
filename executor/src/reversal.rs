//! The reversal engine.
//!
//! Restores batch counters and the population aggregate to their state
//! before a previously committed depletion, and voids the ledger entries.
//! Voided entries are skipped, so reversing twice is a no-op rather than a
//! double credit.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::types::{Clock, DepletionError};
use allocation::error::ValidationError;
use herd::model::{Batch, BatchId, EntryId, LedgerEntry};
use herd::store::HerdStore;

/// What a reversal call actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReversalOutcome {
    pub reversed: usize,
    pub already_voided: usize,
}

pub struct ReversalEngine<S, C> {
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S: HerdStore, C: Clock> ReversalEngine<S, C> {
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Reverse a set of ledger entries belonging to one population.
    ///
    /// Each non-voided entry has its quantity subtracted from the counter it
    /// was originally added to (clamped at 0: a corrupted prior state must
    /// not go negative) and is marked voided. All mutations persist as one
    /// atomic unit. Entries that are already voided count into
    /// `already_voided` and change nothing.
    pub async fn reverse(&self, entry_ids: &[EntryId]) -> Result<ReversalOutcome, DepletionError> {
        if entry_ids.is_empty() {
            return Ok(ReversalOutcome {
                reversed: 0,
                already_voided: 0,
            });
        }

        let mut entries: Vec<LedgerEntry> = Vec::with_capacity(entry_ids.len());
        for id in entry_ids {
            let entry = self
                .store
                .entry(*id)
                .await?
                .ok_or(DepletionError::EntryNotFound(*id))?;
            entries.push(entry);
        }

        let population_id = entries[0].population_id;
        if entries.iter().any(|e| e.population_id != population_id) {
            return Err(ValidationError::MixedPopulations.into());
        }

        let mut population = self
            .store
            .population(population_id)
            .await?
            .ok_or(DepletionError::PopulationNotFound(population_id))?;

        let now = self.clock.now();
        let mut touched: HashMap<BatchId, Batch> = HashMap::new();
        let mut voided: Vec<LedgerEntry> = Vec::new();
        let mut already_voided = 0usize;

        for mut entry in entries {
            if entry.is_voided() {
                already_voided += 1;
                continue;
            }

            match entry.batch_id {
                Some(batch_id) => {
                    if !touched.contains_key(&batch_id) {
                        let batch = self
                            .store
                            .batch(batch_id)
                            .await?
                            .ok_or(ValidationError::UnknownBatch(batch_id))?;
                        touched.insert(batch_id, batch);
                    }
                    if let Some(batch) = touched.get_mut(&batch_id) {
                        if entry.quantity > batch.counter(entry.depletion_type) {
                            warn!(
                                entry_id = %entry.id,
                                batch_id = %batch_id,
                                quantity = entry.quantity,
                                counter = batch.counter(entry.depletion_type),
                                "reversal clamped: counter below entry quantity"
                            );
                        }
                        batch.reverse_depletion(entry.depletion_type, entry.quantity);
                    }
                }
                None => {
                    // Population-level entry: restore the totals directly.
                    population.quantity_depleted =
                        population.quantity_depleted.saturating_sub(entry.quantity);
                    population.current_quantity += entry.quantity;
                }
            }

            entry.voided_at = Some(now);
            voided.push(entry);
        }

        if voided.is_empty() {
            return Ok(ReversalOutcome {
                reversed: 0,
                already_voided,
            });
        }

        if population.tracks_batches {
            let mut all = self.store.batches_for(population.id).await?;
            for batch in &mut all {
                if let Some(fresh) = touched.get(&batch.id) {
                    *batch = fresh.clone();
                }
            }
            population.current_quantity = all.iter().map(|b| b.available_quantity()).sum();
        }

        let batches: Vec<Batch> = touched.into_values().collect();
        self.store
            .commit_unit(&population, &batches, &voided)
            .await?;

        info!(
            population_id = %population.id,
            reversed = voided.len(),
            already_voided,
            "reversal committed"
        );

        Ok(ReversalOutcome {
            reversed: voided.len(),
            already_voided,
        })
    }
}
