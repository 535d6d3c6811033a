use sched_core::CancelToken;
use std::time::{Duration, Instant};
use types::SolveParams;

pub trait TerminationCondition {
    fn should_stop(&mut self) -> bool;

    fn node_visited(&mut self) {}
}

impl<T: TerminationCondition> TerminationCondition for Option<T> {
    fn should_stop(&mut self) -> bool {
        match self {
            Some(t) => t.should_stop(),
            None => false,
        }
    }

    fn node_visited(&mut self) {
        if let Some(t) = self {
            t.node_visited()
        }
    }
}

/// Triggers once the wall-clock budget measured from `started_at` is spent.
#[derive(Clone, Copy, Debug)]
pub struct TimeBudget {
    started_at: Instant,
    budget: Duration,
}

impl TimeBudget {
    pub fn starting_now(budget: Duration) -> Self {
        Self::starting_at(Instant::now(), budget)
    }

    pub fn starting_at(started_at: Instant, budget: Duration) -> Self {
        TimeBudget { started_at, budget }
    }
}

impl TerminationCondition for TimeBudget {
    fn should_stop(&mut self) -> bool {
        self.started_at.elapsed() >= self.budget
    }
}

#[derive(Clone, Copy, Debug)]
pub struct NodeBudget {
    visited: u64,
    limit: u64,
}

impl NodeBudget {
    pub fn new(limit: u64) -> Self {
        NodeBudget { visited: 0, limit }
    }
}

impl TerminationCondition for NodeBudget {
    fn should_stop(&mut self) -> bool {
        self.visited >= self.limit
    }

    fn node_visited(&mut self) {
        self.visited += 1;
    }
}

#[derive(Clone, Debug)]
pub struct Cancelled(pub CancelToken);

impl TerminationCondition for Cancelled {
    fn should_stop(&mut self) -> bool {
        self.0.is_cancelled()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Combinator<T1, T2> {
    t1: T1,
    t2: T2,
}

impl<T1, T2> Combinator<T1, T2> {
    pub fn new(t1: T1, t2: T2) -> Self {
        Combinator { t1, t2 }
    }
}

impl<T1: TerminationCondition, T2: TerminationCondition> TerminationCondition
    for Combinator<T1, T2>
{
    fn should_stop(&mut self) -> bool {
        self.t1.should_stop() || self.t2.should_stop()
    }

    fn node_visited(&mut self) {
        self.t1.node_visited();
        self.t2.node_visited();
    }
}

pub type SolveBudget = Combinator<Combinator<TimeBudget, Option<NodeBudget>>, Cancelled>;

/// Budget of one search worker: the shared deadline, its own node allowance
/// and the job's cancellation token.
pub fn solve_budget(started_at: Instant, params: &SolveParams, cancel: &CancelToken) -> SolveBudget {
    Combinator::new(
        Combinator::new(
            TimeBudget::starting_at(started_at, Duration::from_millis(params.time_limit_ms)),
            params.node_limit.map(NodeBudget::new),
        ),
        Cancelled(cancel.clone()),
    )
}
