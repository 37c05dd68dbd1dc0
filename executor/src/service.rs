//! Caller-facing depletion service.
//!
//! Runs the full pipeline for each request:
//!   1. Validates the request shape.
//!   2. Collects candidate batches through the selector.
//!   3. Computes a plan with the resolved strategy.
//!   4. Commits through the executor (process) or stops short (preview).
//!
//! Reversal bypasses selection and planning entirely and goes straight to
//! the reversal engine.

use std::sync::Arc;

use tracing::{error, warn};

use crate::depletion::DepletionExecutor;
use crate::reversal::{ReversalEngine, ReversalOutcome};
use crate::types::{ActorContext, Availability, Clock, DepletionError};
use allocation::distribution::{DistributionPlan, PlanOptions, build_plan};
use allocation::error::ValidationError;
use allocation::selector::candidates;
use allocation::strategy::{manual_plan, resolve};
use allocation::types::{AllocationConfig, DepletionRequest};
use herd::model::{
    DepletionMethod, DepletionType, EntryId, LedgerEntry, Population, PopulationId,
};
use herd::store::HerdStore;

/// Intermediate planning result; keeps enough context for error reporting.
struct Planned {
    plan: DistributionPlan,
    eligible: usize,
    total_available: u64,
}

pub struct DepletionService<S, C, A> {
    store: Arc<S>,
    clock: Arc<C>,
    cfg: AllocationConfig,
    executor: DepletionExecutor<S, C, A>,
    reversal: ReversalEngine<S, C>,
}

impl<S: HerdStore, C: Clock, A: ActorContext> DepletionService<S, C, A> {
    pub fn new(store: Arc<S>, clock: Arc<C>, actor: Arc<A>, cfg: AllocationConfig) -> Self {
        let executor = DepletionExecutor::new(store.clone(), clock.clone(), actor);
        let reversal = ReversalEngine::new(store.clone(), clock.clone());
        Self {
            store,
            clock,
            cfg,
            executor,
            reversal,
        }
    }

    /// Run the pipeline without committing. The returned plan reports
    /// shortfalls instead of erroring, so callers can inspect feasibility.
    pub async fn preview_depletion(
        &self,
        request: &DepletionRequest,
    ) -> Result<DistributionPlan, DepletionError> {
        let population = self.population(request.population_id).await?;
        let planned = self.planned(&population, request).await?;
        Ok(planned.plan)
    }

    /// Run the pipeline and commit. Surfaces `NoEligibleBatches` and
    /// `InsufficientInventory` before anything is written.
    pub async fn process_depletion(
        &self,
        request: &DepletionRequest,
    ) -> Result<Vec<LedgerEntry>, DepletionError> {
        let population = self.population(request.population_id).await?;
        let planned = self.planned(&population, request).await?;

        if !population.tracks_batches {
            return self.commit_total(&population, request, &planned.plan).await;
        }

        if planned.eligible == 0 {
            return Err(DepletionError::NoEligibleBatches(population.id));
        }
        if !planned.plan.fully_satisfied && !self.cfg.allow_partial {
            return Err(DepletionError::InsufficientInventory {
                requested: planned.plan.requested,
                available: planned.total_available,
                shortfall: planned.plan.shortfall,
            });
        }
        if planned.plan.is_empty() {
            // Partial fulfillment is allowed but nothing was allocatable.
            return Err(DepletionError::InsufficientInventory {
                requested: planned.plan.requested,
                available: planned.total_available,
                shortfall: planned.plan.shortfall,
            });
        }

        self.executor.commit(&population, request, &planned.plan).await
    }

    /// Process each request as its own independent atomic unit. A failure in
    /// one item never undoes the ones already committed.
    pub async fn process_many(
        &self,
        requests: &[DepletionRequest],
    ) -> Vec<Result<Vec<LedgerEntry>, DepletionError>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.process_depletion(request).await);
        }
        results
    }

    /// Process the whole set or none of it: on the first failure, every item
    /// committed by this call is reversed before the error surfaces.
    pub async fn process_all_or_nothing(
        &self,
        requests: &[DepletionRequest],
    ) -> Result<Vec<Vec<LedgerEntry>>, DepletionError> {
        let mut committed: Vec<Vec<LedgerEntry>> = Vec::with_capacity(requests.len());

        for request in requests {
            match self.process_depletion(request).await {
                Ok(entries) => committed.push(entries),
                Err(e) => {
                    warn!(error = %e, done = committed.len(), "bulk aborted, compensating");
                    for entries in committed.iter().rev() {
                        let ids: Vec<EntryId> = entries.iter().map(|entry| entry.id).collect();
                        if let Err(undo) = self.reversal.reverse(&ids).await {
                            error!(error = %undo, "compensating reversal failed");
                            return Err(undo);
                        }
                    }
                    return Err(e);
                }
            }
        }

        Ok(committed)
    }

    /// Reverse one previously committed ledger entry. Reversing an already
    /// voided entry succeeds and reports it as skipped.
    pub async fn reverse_depletion(
        &self,
        entry_id: EntryId,
    ) -> Result<ReversalOutcome, DepletionError> {
        self.reversal.reverse(std::slice::from_ref(&entry_id)).await
    }

    /// Reverse several entries of one population in a single atomic unit.
    pub async fn reverse_entries(
        &self,
        entry_ids: &[EntryId],
    ) -> Result<ReversalOutcome, DepletionError> {
        self.reversal.reverse(entry_ids).await
    }

    /// Dry-run feasibility check for an automatic method.
    pub async fn validate_availability(
        &self,
        population_id: PopulationId,
        quantity: u64,
        method: DepletionMethod,
    ) -> Result<Availability, DepletionError> {
        if method == DepletionMethod::Manual {
            return Err(ValidationError::ManualAvailabilityCheck.into());
        }
        if quantity == 0 {
            return Err(ValidationError::ZeroQuantity.into());
        }

        let population = self.population(population_id).await?;
        let request = DepletionRequest::total(
            population_id,
            method,
            DepletionType::Other,
            quantity,
            self.clock.today(),
        );
        let planned = self.planned(&population, &request).await?;

        Ok(Availability {
            can_fulfill: planned.plan.fully_satisfied,
            shortfall: planned.plan.shortfall,
        })
    }

    async fn population(&self, id: PopulationId) -> Result<Population, DepletionError> {
        self.store
            .population(id)
            .await?
            .ok_or(DepletionError::PopulationNotFound(id))
    }

    async fn planned(
        &self,
        population: &Population,
        request: &DepletionRequest,
    ) -> Result<Planned, DepletionError> {
        request.validate()?;

        let strategy = match resolve(request.method, &self.cfg) {
            Some(strategy) => strategy,
            None => {
                // Manual: every line is validated independently against the
                // batch it names; foreign batches must stay visible, so each
                // one is fetched by id rather than scoped to the population.
                let mut batches = Vec::with_capacity(request.lines.len());
                for line in &request.lines {
                    if let Some(batch) = self.store.batch(line.batch_id).await? {
                        batches.push(batch);
                    }
                }
                let plan = manual_plan(population.id, &request.lines, &batches)?;
                let total_available = batches.iter().map(|b| b.available_quantity()).sum();
                return Ok(Planned {
                    eligible: plan.lines.len(),
                    total_available,
                    plan,
                });
            }
        };

        let quantity = match request.quantity {
            Some(q) => q,
            None => return Err(ValidationError::MissingQuantity(request.method).into()),
        };

        if !population.tracks_batches {
            // Totals-only population: the "plan" is a feasibility summary.
            let allocatable = quantity.min(population.current_quantity);
            let shortfall = quantity - allocatable;
            return Ok(Planned {
                plan: DistributionPlan {
                    lines: Vec::new(),
                    requested: quantity,
                    fully_satisfied: shortfall == 0,
                    shortfall,
                },
                eligible: 0,
                total_available: population.current_quantity,
            });
        }

        let all = self.store.batches_for(population.id).await?;
        let ordered = candidates(
            &all,
            &self.cfg.constraints(),
            strategy.ordering,
            self.clock.today(),
        );
        let total_available = ordered.iter().map(|b| b.available_quantity()).sum();

        let plan = build_plan(
            &ordered,
            quantity,
            strategy.algorithm,
            &PlanOptions {
                min_remaining: self.cfg.min_remaining,
            },
        );

        Ok(Planned {
            plan,
            eligible: ordered.len(),
            total_available,
        })
    }

    async fn commit_total(
        &self,
        population: &Population,
        request: &DepletionRequest,
        plan: &DistributionPlan,
    ) -> Result<Vec<LedgerEntry>, DepletionError> {
        if plan.shortfall > 0 && !self.cfg.allow_partial {
            return Err(DepletionError::InsufficientInventory {
                requested: plan.requested,
                available: population.current_quantity,
                shortfall: plan.shortfall,
            });
        }

        let quantity = plan.requested - plan.shortfall;
        if quantity == 0 {
            return Err(DepletionError::InsufficientInventory {
                requested: plan.requested,
                available: population.current_quantity,
                shortfall: plan.shortfall,
            });
        }

        self.executor.commit_total(population, request, quantity).await
    }
}
