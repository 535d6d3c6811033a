use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sched_core::{CancelToken, Model, Registry, UnitIdx};
use std::thread;
use std::time::Instant;
use tracing::debug;
use types::SolveParams;

use crate::search::{Search, SearchOptions, SearchOutcome};
use crate::termination::solve_budget;

/// Outcome kept for one component together with the effort spent on it by
/// every worker. `stopped` is the kept outcome's: its search hit the budget.
#[derive(Debug, Clone)]
pub struct ComponentResult {
    pub outcome: SearchOutcome,
    pub worker: usize,
    pub stopped: bool,
    pub nodes: u64,
    pub backtracks: u64,
    pub solutions: u32,
}

/// Seeds of the perturbed workers; worker 0 always keeps the canonical order.
pub fn perturbation_seeds(seed: u64, workers: usize) -> Vec<Option<u64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut seeds = vec![None];
    seeds.extend((1..workers).map(|_| Some(rng.gen::<u64>())));
    seeds
}

pub fn solve_components(
    model: &Model<'_>,
    registry: &Registry,
    components: &[Vec<UnitIdx>],
    params: &SolveParams,
    cancel: &CancelToken,
    started_at: Instant,
) -> Vec<ComponentResult> {
    let workers = params.workers.max(1);
    match components {
        [single] if workers > 1 => {
            vec![race(model, registry, single, params, cancel, started_at, workers)]
        }
        _ => split(model, registry, components, params, cancel, started_at, workers),
    }
}

fn run_one(
    model: &Model<'_>,
    registry: &Registry,
    units: &[UnitIdx],
    params: &SolveParams,
    cancel: &CancelToken,
    started_at: Instant,
    perturbation: Option<u64>,
) -> SearchOutcome {
    let options = SearchOptions {
        max_solutions: params.max_solutions.max(1),
        perturbation,
    };
    let mut budget = solve_budget(started_at, params, cancel);
    Search::new(model, registry, units, options).run(&mut budget)
}

fn split(
    model: &Model<'_>,
    registry: &Registry,
    components: &[Vec<UnitIdx>],
    params: &SolveParams,
    cancel: &CancelToken,
    started_at: Instant,
    workers: usize,
) -> Vec<ComponentResult> {
    let threads = workers.min(components.len()).max(1);
    let mut done: Vec<(usize, SearchOutcome)> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|w| {
                s.spawn(move || {
                    components
                        .iter()
                        .enumerate()
                        .skip(w)
                        .step_by(threads)
                        .map(|(k, units)| {
                            debug!(worker = w, component = k, units = units.len(), "solving component");
                            (k, run_one(model, registry, units, params, cancel, started_at, None))
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|payload| std::panic::resume_unwind(payload)))
            .collect()
    });
    done.sort_by_key(|(k, _)| *k);
    done.into_iter()
        .map(|(k, outcome)| ComponentResult {
            worker: k % threads,
            stopped: outcome.stopped,
            nodes: outcome.nodes,
            backtracks: outcome.backtracks,
            solutions: outcome.solutions,
            outcome,
        })
        .collect()
}

fn race(
    model: &Model<'_>,
    registry: &Registry,
    units: &[UnitIdx],
    params: &SolveParams,
    cancel: &CancelToken,
    started_at: Instant,
    workers: usize,
) -> ComponentResult {
    let seeds = perturbation_seeds(params.seed, workers);
    let mut outcomes: Vec<SearchOutcome> = thread::scope(|s| {
        let handles: Vec<_> = seeds
            .iter()
            .map(|&seed| {
                s.spawn(move || run_one(model, registry, units, params, cancel, started_at, seed))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|payload| std::panic::resume_unwind(payload)))
            .collect()
    });
    for (w, out) in outcomes.iter().enumerate() {
        debug!(
            worker = w,
            nodes = out.nodes,
            solutions = out.solutions,
            exhausted = out.exhausted,
            "portfolio worker finished"
        );
    }
    let nodes = outcomes.iter().map(|o| o.nodes).sum();
    let backtracks = outcomes.iter().map(|o| o.backtracks).sum();
    let solutions = outcomes.iter().map(|o| o.solutions).sum();
    let worker = pick(&outcomes);
    let outcome = outcomes.swap_remove(worker);
    ComponentResult {
        stopped: outcome.stopped,
        outcome,
        worker,
        nodes,
        backtracks,
        solutions,
    }
}

/// Index of the winning outcome: a complete solution first, then the lowest
/// penalty, then a proof of infeasibility, then the deepest partial; the lower
/// worker index breaks ties.
fn pick(outcomes: &[SearchOutcome]) -> usize {
    let complete = outcomes
        .iter()
        .enumerate()
        .filter_map(|(w, o)| o.best.as_ref().map(|b| (w, b.penalty)))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    if let Some((w, _)) = complete {
        return w;
    }
    if let Some(w) = outcomes.iter().position(SearchOutcome::is_infeasible) {
        return w;
    }
    outcomes
        .iter()
        .enumerate()
        .max_by_key(|(w, o)| {
            (
                o.deepest.iter().filter(|p| p.is_some()).count(),
                std::cmp::Reverse(*w),
            )
        })
        .map_or(0, |(w, _)| w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Solution;

    fn outcome(best: Option<f64>, exhausted: bool) -> SearchOutcome {
        SearchOutcome {
            best: best.map(|penalty| Solution {
                placements: vec![],
                penalty,
            }),
            deepest: vec![],
            exhausted,
            stopped: !exhausted,
            conflicts: vec![],
            nodes: 1,
            backtracks: 0,
            solutions: best.is_some() as u32,
        }
    }

    #[test]
    fn complete_beats_partial_and_lower_penalty_wins() {
        let outs = vec![
            outcome(None, false),
            outcome(Some(4.0), false),
            outcome(Some(2.0), false),
            outcome(Some(2.0), false),
        ];
        assert_eq!(pick(&outs), 2);
    }

    #[test]
    fn infeasibility_proof_beats_a_partial() {
        let outs = vec![outcome(None, false), outcome(None, true)];
        assert_eq!(pick(&outs), 1);
    }

    #[test]
    fn worker_zero_is_canonical_and_seeds_are_reproducible() {
        let a = perturbation_seeds(7, 3);
        assert_eq!(a[0], None);
        assert_eq!(a, perturbation_seeds(7, 3));
        assert_ne!(a[1], a[2]);
    }
}
