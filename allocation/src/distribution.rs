//! Plan computation: given candidate batches in strategy order and a total
//! quantity, decide how much to draw from each batch.
//
//  Every function here is a pure function of its inputs. Batches are never
//  mutated; committing a plan is the executor's job.

use crate::strategy::Algorithm;
use herd::model::{Batch, BatchId};

/// One allocation against one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLine {
    pub batch_id: BatchId,
    pub quantity: u64,
    /// Head count the batch would have left once this line applies.
    pub remaining_after: u64,
}

/// The computed allocation for one depletion request.
///
/// Conservation holds by construction: the allocated total plus `shortfall`
/// always equals `requested`.
#[derive(Debug, Clone)]
pub struct DistributionPlan {
    /// Allocations in draw order; zero-quantity lines are never recorded.
    pub lines: Vec<PlanLine>,
    pub requested: u64,
    pub fully_satisfied: bool,
    pub shortfall: u64,
}

impl DistributionPlan {
    pub fn allocated(&self) -> u64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Options shared by the plan builders.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// Head count sequential draws always leave behind in each batch.
    pub min_remaining: u64,
}

/// Compute a plan for `total_quantity` over `ordered` candidate batches.
///
/// `ordered` must already be filtered and sorted by the selector; this
/// function trusts its order. `total_quantity` must be positive (validated
/// at the request boundary).
pub fn build_plan(
    ordered: &[Batch],
    total_quantity: u64,
    algorithm: Algorithm,
    opts: &PlanOptions,
) -> DistributionPlan {
    match algorithm {
        Algorithm::Sequential { single_batch } => {
            plan_sequential(ordered, total_quantity, single_batch, opts.min_remaining)
        }
        Algorithm::Proportional => plan_proportional(ordered, total_quantity),
        Algorithm::Balanced => plan_balanced(ordered, total_quantity),
    }
}

/// Walk the candidates in order, draining each before moving to the next.
///
/// In single-batch mode only the first candidate is drawn from, whatever the
/// shortfall ends up being.
fn plan_sequential(
    ordered: &[Batch],
    total_quantity: u64,
    single_batch: bool,
    min_remaining: u64,
) -> DistributionPlan {
    let mut remaining = total_quantity;
    let mut lines = Vec::new();

    for batch in ordered {
        if remaining == 0 {
            break;
        }

        let available = batch.available_quantity();
        let take = available.saturating_sub(min_remaining).min(remaining);
        if take > 0 {
            lines.push(PlanLine {
                batch_id: batch.id,
                quantity: take,
                remaining_after: available - take,
            });
            remaining -= take;
        }

        if single_batch {
            break;
        }
    }

    finish(lines, total_quantity, remaining)
}

/// Share the quantity across all candidates by their proportion of the total
/// available head count.
///
/// Shares are floored; the entire rounding remainder goes to the OLDEST
/// candidate (ties by entry date, then id). That FIFO bias is a compatibility
/// requirement, not an even spread. Each final allocation is capped at the
/// batch's availability.
fn plan_proportional(ordered: &[Batch], total_quantity: u64) -> DistributionPlan {
    let candidates: Vec<&Batch> = ordered.iter().filter(|b| b.has_available()).collect();
    let total_available: u64 = candidates.iter().map(|b| b.available_quantity()).sum();

    if candidates.is_empty() {
        return finish(Vec::new(), total_quantity, total_quantity);
    }

    let mut oldest = (candidates[0].started_on, candidates[0].id);
    for b in &candidates[1..] {
        if (b.started_on, b.id) < oldest {
            oldest = (b.started_on, b.id);
        }
    }
    let oldest_id = oldest.1;

    let mut shares: Vec<u64> = candidates
        .iter()
        .map(|b| {
            ((total_quantity as u128 * b.available_quantity() as u128) / total_available as u128)
                as u64
        })
        .collect();

    let remainder = total_quantity - shares.iter().sum::<u64>();
    for (i, b) in candidates.iter().enumerate() {
        if b.id == oldest_id {
            shares[i] += remainder;
            break;
        }
    }

    let mut lines = Vec::new();
    let mut allocated = 0u64;
    for (i, b) in candidates.iter().enumerate() {
        let available = b.available_quantity();
        let quantity = shares[i].min(available);
        if quantity > 0 {
            lines.push(PlanLine {
                batch_id: b.id,
                quantity,
                remaining_after: available - quantity,
            });
            allocated += quantity;
        }
    }

    finish(lines, total_quantity, total_quantity - allocated)
}

/// Round-robin equal draw-down: each round divides the remaining quantity
/// over the still-eligible batches, dropping batches as they hit their cap.
///
/// Terminates because each round either allocates something or empties the
/// eligible set; a zero-progress round breaks out explicitly.
fn plan_balanced(ordered: &[Batch], total_quantity: u64) -> DistributionPlan {
    let caps: Vec<u64> = ordered.iter().map(|b| b.available_quantity()).collect();
    let mut allocated = vec![0u64; ordered.len()];
    let mut remaining = total_quantity;

    while remaining > 0 {
        let eligible: Vec<usize> = (0..ordered.len())
            .filter(|&i| allocated[i] < caps[i])
            .collect();
        if eligible.is_empty() {
            break;
        }

        let per_round = (remaining / eligible.len() as u64).max(1);

        let mut progressed = false;
        for &i in &eligible {
            if remaining == 0 {
                break;
            }
            let take = per_round.min(caps[i] - allocated[i]).min(remaining);
            if take > 0 {
                allocated[i] += take;
                remaining -= take;
                progressed = true;
            }
        }

        if !progressed {
            break;
        }
    }

    let mut lines = Vec::new();
    for (i, batch) in ordered.iter().enumerate() {
        if allocated[i] > 0 {
            lines.push(PlanLine {
                batch_id: batch.id,
                quantity: allocated[i],
                remaining_after: caps[i] - allocated[i],
            });
        }
    }

    finish(lines, total_quantity, remaining)
}

fn finish(lines: Vec<PlanLine>, requested: u64, shortfall: u64) -> DistributionPlan {
    DistributionPlan {
        lines,
        requested,
        fully_satisfied: shortfall == 0,
        shortfall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use herd::model::{BatchStatus, HealthStatus};

    fn batch_on(year: i32, month: u32, day: u32, available: u64) -> Batch {
        Batch {
            id: uuid::Uuid::new_v4(),
            population_id: uuid::Uuid::new_v4(),
            started_on: NaiveDate::from_ymd_opt(year, month, day).unwrap(),
            status: BatchStatus::Active,
            health: HealthStatus::Healthy,
            initial_quantity: available,
            quantity_depleted: 0,
            quantity_sold: 0,
            quantity_transferred: 0,
        }
    }

    fn assert_conservation(plan: &DistributionPlan) {
        assert_eq!(plan.allocated() + plan.shortfall, plan.requested);
        assert_eq!(plan.fully_satisfied, plan.shortfall == 0);
    }

    // Sequential

    #[test]
    fn sequential_spills_into_the_next_batch() {
        // A(10 days older, 50 available), B(30 available), quantity 60
        let a = batch_on(2024, 3, 1, 50);
        let b = batch_on(2024, 3, 9, 30);

        let plan = plan_sequential(&[a.clone(), b.clone()], 60, false, 0);

        assert_eq!(
            plan.lines,
            vec![
                PlanLine {
                    batch_id: a.id,
                    quantity: 50,
                    remaining_after: 0,
                },
                PlanLine {
                    batch_id: b.id,
                    quantity: 10,
                    remaining_after: 20,
                },
            ]
        );
        assert!(plan.fully_satisfied);
        assert_conservation(&plan);
    }

    #[test]
    fn sequential_reports_shortfall_when_demand_exceeds_stock() {
        let a = batch_on(2024, 3, 1, 50);
        let b = batch_on(2024, 3, 9, 30);

        let plan = plan_sequential(&[a.clone(), b.clone()], 100, false, 0);

        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.lines[0].quantity, 50);
        assert_eq!(plan.lines[1].quantity, 30);
        assert_eq!(plan.shortfall, 20);
        assert!(!plan.fully_satisfied);
        assert_conservation(&plan);
    }

    #[test]
    fn single_batch_mode_never_produces_a_second_line() {
        let a = batch_on(2024, 3, 1, 50);
        let b = batch_on(2024, 3, 9, 30);

        let plan = plan_sequential(&[a.clone(), b], 60, true, 0);

        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].batch_id, a.id);
        assert_eq!(plan.lines[0].quantity, 50);
        assert_eq!(plan.shortfall, 10);
        assert_conservation(&plan);
    }

    #[test]
    fn min_remaining_leaves_a_floor_in_every_batch() {
        let a = batch_on(2024, 3, 1, 50);
        let b = batch_on(2024, 3, 9, 30);

        let plan = plan_sequential(&[a.clone(), b.clone()], 60, false, 5);

        assert_eq!(plan.lines[0].quantity, 45);
        assert_eq!(plan.lines[0].remaining_after, 5);
        assert_eq!(plan.lines[1].quantity, 15);
        assert_eq!(plan.lines[1].remaining_after, 15);
        assert_conservation(&plan);
    }

    #[test]
    fn sequential_with_no_candidates_is_all_shortfall() {
        let plan = plan_sequential(&[], 40, false, 0);

        assert!(plan.is_empty());
        assert_eq!(plan.shortfall, 40);
        assert!(!plan.fully_satisfied);
    }

    #[test]
    fn exact_exhaustion_leaves_zero_remaining() {
        let a = batch_on(2024, 3, 1, 50);

        let plan = plan_sequential(&[a], 50, false, 0);

        assert!(plan.fully_satisfied);
        assert_eq!(plan.lines[0].remaining_after, 0);
    }

    // Proportional

    #[test]
    fn proportional_exact_shares_have_no_remainder() {
        // A(30), B(70), quantity 10 -> 3 and 7
        let a = batch_on(2024, 3, 1, 30);
        let b = batch_on(2024, 3, 9, 70);

        let plan = plan_proportional(&[a.clone(), b.clone()], 10);

        assert_eq!(plan.lines[0].quantity, 3);
        assert_eq!(plan.lines[1].quantity, 7);
        assert!(plan.fully_satisfied);
        assert_conservation(&plan);
    }

    #[test]
    fn proportional_remainder_goes_to_the_oldest_batch() {
        // quantity 11: floor shares 3 and 7, remainder 1 -> oldest gets 4
        let a = batch_on(2024, 3, 1, 30);
        let b = batch_on(2024, 3, 9, 70);

        let plan = plan_proportional(&[a.clone(), b.clone()], 11);

        assert_eq!(plan.lines[0].batch_id, a.id);
        assert_eq!(plan.lines[0].quantity, 4);
        assert_eq!(plan.lines[1].quantity, 7);
        assert_conservation(&plan);
    }

    #[test]
    fn proportional_remainder_biases_oldest_even_with_smaller_share() {
        // Oldest batch has the smaller share but still receives the remainder.
        let old_small = batch_on(2024, 1, 1, 10);
        let new_large = batch_on(2024, 5, 1, 90);

        let plan = plan_proportional(&[old_small.clone(), new_large.clone()], 7);

        // floor(7*10/100)=0, floor(7*90/100)=6, remainder 1 -> oldest
        assert_eq!(plan.lines[0].batch_id, old_small.id);
        assert_eq!(plan.lines[0].quantity, 1);
        assert_eq!(plan.lines[1].quantity, 6);
        assert_conservation(&plan);
    }

    #[test]
    fn proportional_candidate_order_does_not_change_the_oldest() {
        // Same fixture, reversed input order: bias still lands on the oldest.
        let old_small = batch_on(2024, 1, 1, 10);
        let new_large = batch_on(2024, 5, 1, 90);

        let plan = plan_proportional(&[new_large.clone(), old_small.clone()], 7);

        let old_line = plan
            .lines
            .iter()
            .find(|l| l.batch_id == old_small.id)
            .expect("oldest allocated");
        assert_eq!(old_line.quantity, 1);
        assert_conservation(&plan);
    }

    #[test]
    fn proportional_caps_allocations_at_availability() {
        let a = batch_on(2024, 3, 1, 30);
        let b = batch_on(2024, 3, 9, 70);

        let plan = plan_proportional(&[a, b], 150);

        assert_eq!(plan.allocated(), 100);
        assert_eq!(plan.shortfall, 50);
        assert!(!plan.fully_satisfied);
        assert_conservation(&plan);
    }

    #[test]
    fn proportional_with_no_candidates_is_all_shortfall() {
        let plan = plan_proportional(&[], 25);

        assert!(plan.is_empty());
        assert_eq!(plan.shortfall, 25);
    }

    #[test]
    fn proportional_skips_zero_share_batches() {
        // B's floor share is 0 and it is not the oldest: no line for B.
        let a = batch_on(2024, 1, 1, 99);
        let b = batch_on(2024, 5, 1, 1);

        let plan = plan_proportional(&[a.clone(), b.clone()], 10);

        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].batch_id, a.id);
        assert_eq!(plan.lines[0].quantity, 10);
        assert_conservation(&plan);
    }

    // Balanced

    #[test]
    fn balanced_draws_evenly_when_stock_allows() {
        let a = batch_on(2024, 3, 1, 40);
        let b = batch_on(2024, 3, 9, 40);
        let c = batch_on(2024, 3, 17, 40);

        let plan = plan_balanced(&[a, b, c], 30);

        assert_eq!(plan.lines.len(), 3);
        for line in &plan.lines {
            assert_eq!(line.quantity, 10);
        }
        assert!(plan.fully_satisfied);
        assert_conservation(&plan);
    }

    #[test]
    fn balanced_redistributes_after_a_batch_caps_out() {
        // A can only give 4; its slack flows to B and C on later rounds.
        let a = batch_on(2024, 3, 1, 4);
        let b = batch_on(2024, 3, 9, 40);
        let c = batch_on(2024, 3, 17, 40);

        let plan = plan_balanced(&[a.clone(), b.clone(), c.clone()], 30);

        assert!(plan.fully_satisfied);
        assert_eq!(plan.allocated(), 30);
        let a_line = plan.lines.iter().find(|l| l.batch_id == a.id).unwrap();
        assert_eq!(a_line.quantity, 4);
        assert_eq!(a_line.remaining_after, 0);
        assert_conservation(&plan);
    }

    #[test]
    fn balanced_handles_remainders_below_batch_count() {
        // 7 over 3 batches: per-round floor is 2, then 1s until satisfied.
        let a = batch_on(2024, 3, 1, 10);
        let b = batch_on(2024, 3, 9, 10);
        let c = batch_on(2024, 3, 17, 10);

        let plan = plan_balanced(&[a, b, c], 7);

        assert!(plan.fully_satisfied);
        assert_eq!(plan.allocated(), 7);
        assert_conservation(&plan);
    }

    #[test]
    fn balanced_terminates_when_all_batches_cap_out() {
        let a = batch_on(2024, 3, 1, 5);
        let b = batch_on(2024, 3, 9, 5);

        let plan = plan_balanced(&[a, b], 100);

        assert_eq!(plan.allocated(), 10);
        assert_eq!(plan.shortfall, 90);
        assert!(!plan.fully_satisfied);
        assert_conservation(&plan);
    }

    #[test]
    fn balanced_with_no_candidates_is_all_shortfall() {
        let plan = plan_balanced(&[], 12);

        assert!(plan.is_empty());
        assert_eq!(plan.shortfall, 12);
    }

    // Dispatch

    #[test]
    fn build_plan_routes_by_algorithm() {
        let a = batch_on(2024, 3, 1, 50);
        let b = batch_on(2024, 3, 9, 30);
        let batches = [a.clone(), b.clone()];
        let opts = PlanOptions::default();

        let sequential = build_plan(
            &batches,
            60,
            Algorithm::Sequential {
                single_batch: false,
            },
            &opts,
        );
        assert_eq!(sequential.lines.len(), 2);

        let single = build_plan(
            &batches,
            60,
            Algorithm::Sequential { single_batch: true },
            &opts,
        );
        assert_eq!(single.lines.len(), 1);

        let proportional = build_plan(&batches, 8, Algorithm::Proportional, &opts);
        assert_eq!(proportional.allocated(), 8);

        let balanced = build_plan(&batches, 8, Algorithm::Balanced, &opts);
        assert_eq!(balanced.allocated(), 8);
    }
}
