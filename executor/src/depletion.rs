//! The depletion transaction executor.
//!
//! Takes a computed plan and commits it: one ledger entry per plan line,
//! batch counters moved, population aggregate recomputed, all persisted as a
//! single all-or-nothing unit.
//!
//! Design principles:
//! - **Fail-closed**: every line re-reads the batch and re-checks
//!   availability before anything is written; a stale batch aborts the whole
//!   commit with zero partial writes.
//! - **Entries derive from the plan**: ledger quantities are taken verbatim
//!   from validated plan lines, so the non-negative invariant holds by
//!   construction.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::types::{ActorContext, Clock, DepletionError};
use allocation::distribution::DistributionPlan;
use allocation::error::ValidationError;
use allocation::types::DepletionRequest;
use herd::model::{Batch, EntryContext, LedgerEntry, Population};
use herd::store::HerdStore;

pub struct DepletionExecutor<S, C, A> {
    store: Arc<S>,
    clock: Arc<C>,
    actor: Arc<A>,
}

impl<S: HerdStore, C: Clock, A: ActorContext> DepletionExecutor<S, C, A> {
    pub fn new(store: Arc<S>, clock: Arc<C>, actor: Arc<A>) -> Self {
        Self {
            store,
            clock,
            actor,
        }
    }

    /// Commit `plan` against a batch-tracked population.
    ///
    /// Plan lines apply in order; each gets a ledger entry whose
    /// `sequence_index` is its position in the plan. Returns the entries as
    /// written.
    pub async fn commit(
        &self,
        population: &Population,
        request: &DepletionRequest,
        plan: &DistributionPlan,
    ) -> Result<Vec<LedgerEntry>, DepletionError> {
        let now = self.clock.now();
        let recorded_by = self.actor.current_user_id();

        let mut updated: Vec<Batch> = Vec::with_capacity(plan.lines.len());
        let mut entries: Vec<LedgerEntry> = Vec::with_capacity(plan.lines.len());

        for (index, line) in plan.lines.iter().enumerate() {
            // Staleness guard: the plan was computed from a snapshot; only
            // current state decides whether the line still fits.
            let mut batch = self
                .store
                .batch(line.batch_id)
                .await?
                .ok_or(ValidationError::UnknownBatch(line.batch_id))?;

            let available = batch.available_quantity();
            if line.quantity > available {
                return Err(DepletionError::StaleBatchState {
                    batch_id: line.batch_id,
                    required: line.quantity,
                    available,
                });
            }

            let before = batch.snapshot();
            batch.apply_depletion(request.depletion_type, line.quantity);

            entries.push(LedgerEntry {
                id: Uuid::new_v4(),
                population_id: population.id,
                batch_id: Some(batch.id),
                depletion_type: request.depletion_type,
                quantity: line.quantity,
                occurred_on: request.occurred_on,
                method: request.method,
                sequence_index: index as u32,
                created_at: now,
                voided_at: None,
                context: EntryContext {
                    reason: request.reason.clone(),
                    note: request.note.clone(),
                    recorded_by,
                    batch_before: Some(before),
                },
            });
            updated.push(batch);
        }

        let mut population = population.clone();
        population.current_quantity = self.aggregate_with(&population, &updated).await?;

        self.store
            .commit_unit(&population, &updated, &entries)
            .await?;

        info!(
            population_id = %population.id,
            depletion_type = %request.depletion_type,
            method = %request.method,
            batches = updated.len(),
            quantity = plan.allocated(),
            "depletion committed"
        );

        Ok(entries)
    }

    /// Commit a depletion against a totals-only population.
    ///
    /// No batches exist, so a single population-level entry is written and
    /// the population's own counters move directly.
    pub async fn commit_total(
        &self,
        population: &Population,
        request: &DepletionRequest,
        quantity: u64,
    ) -> Result<Vec<LedgerEntry>, DepletionError> {
        let available = population.current_quantity;
        if quantity > available {
            return Err(DepletionError::InsufficientInventory {
                requested: quantity,
                available,
                shortfall: quantity - available,
            });
        }

        let mut population = population.clone();
        population.current_quantity -= quantity;
        population.quantity_depleted += quantity;

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            population_id: population.id,
            batch_id: None,
            depletion_type: request.depletion_type,
            quantity,
            occurred_on: request.occurred_on,
            method: request.method,
            sequence_index: 0,
            created_at: self.clock.now(),
            voided_at: None,
            context: EntryContext {
                reason: request.reason.clone(),
                note: request.note.clone(),
                recorded_by: self.actor.current_user_id(),
                batch_before: None,
            },
        };

        self.store
            .commit_unit(&population, &[], std::slice::from_ref(&entry))
            .await?;

        info!(
            population_id = %population.id,
            depletion_type = %request.depletion_type,
            quantity,
            "population-level depletion committed"
        );

        Ok(vec![entry])
    }

    /// Sum of available head count over all batches, with the in-flight
    /// updates overlaid on what the store holds.
    async fn aggregate_with(
        &self,
        population: &Population,
        updated: &[Batch],
    ) -> Result<u64, DepletionError> {
        let mut all = self.store.batches_for(population.id).await?;
        for batch in &mut all {
            if let Some(fresh) = updated.iter().find(|u| u.id == batch.id) {
                *batch = fresh.clone();
            }
        }
        Ok(all.iter().map(|b| b.available_quantity()).sum())
    }
}
