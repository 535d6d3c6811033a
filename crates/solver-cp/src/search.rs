//! Depth-first search with forward checking over one set of lesson units.
//!
//! The search is iterative: each decision level is a [`Frame`] holding the
//! ordered candidate placements of one unit and a trail mark to undo its
//! domain reductions. Variables are picked by smallest remaining start domain.

use rand::seq::SliceRandom;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sched_core::scoring::total_penalty;
use sched_core::{Model, PartialAssignment, Placement, Registry, UnitIdx};
use std::cmp::Reverse;
use std::collections::VecDeque;
use types::{Conflict, ConstraintId, EntityRef};

use crate::domain::Domains;
use crate::propagate::{after_placement, placement_fits, propagate};
use crate::termination::TerminationCondition;

pub const MAX_CONFLICTS: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub max_solutions: u32,
    /// Seed for shuffling ties in the value order; `None` keeps the canonical order.
    pub perturbation: Option<u64>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_solutions: 1,
            perturbation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub placements: Vec<Option<Placement>>,
    pub penalty: f64,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Lowest-penalty complete solution, earliest on ties.
    pub best: Option<Solution>,
    /// Placements of the deepest consistent state reached.
    pub deepest: Vec<Option<Placement>>,
    pub exhausted: bool,
    pub stopped: bool,
    pub conflicts: Vec<Conflict>,
    pub nodes: u64,
    pub backtracks: u64,
    pub solutions: u32,
}

impl SearchOutcome {
    pub fn is_infeasible(&self) -> bool {
        self.best.is_none() && self.exhausted
    }
}

#[derive(Debug, Default)]
struct ConflictLog(VecDeque<Conflict>);

impl ConflictLog {
    fn push(&mut self, c: Conflict) {
        if self.0.len() == MAX_CONFLICTS {
            self.0.pop_front();
        }
        self.0.push_back(c);
    }

    fn into_vec(self) -> Vec<Conflict> {
        self.0.into_iter().collect()
    }
}

struct Frame {
    unit: UnitIdx,
    values: Vec<Placement>,
    next: usize,
    mark: usize,
}

struct Candidate {
    cost: f64,
    teacher_rank: usize,
    room_rank: usize,
    p: Placement,
}

pub struct Search<'m, 's> {
    model: &'m Model<'s>,
    registry: &'m Registry,
    units: &'m [UnitIdx],
    in_scope: Vec<bool>,
    options: SearchOptions,
}

impl<'m, 's> Search<'m, 's> {
    pub fn new(
        model: &'m Model<'s>,
        registry: &'m Registry,
        units: &'m [UnitIdx],
        options: SearchOptions,
    ) -> Self {
        let mut in_scope = vec![false; model.unit_count()];
        for &u in units {
            in_scope[u] = true;
        }
        Self {
            model,
            registry,
            units,
            in_scope,
            options,
        }
    }

    pub fn run<T: TerminationCondition>(&self, term: &mut T) -> SearchOutcome {
        let model = self.model;
        let mut asg = PartialAssignment::new(model);
        let mut domains = Domains::new(model);
        let mut log = ConflictLog::default();
        let mut rng = self.options.perturbation.map(ChaCha8Rng::seed_from_u64);
        let mut out = SearchOutcome {
            best: None,
            deepest: asg.placements().to_vec(),
            exhausted: false,
            stopped: false,
            conflicts: Vec::new(),
            nodes: 0,
            backtracks: 0,
            solutions: 0,
        };

        if let Err(c) = propagate(model, &asg, &mut domains, self.units) {
            log.push(c);
            out.exhausted = true;
            out.conflicts = log.into_vec();
            return out;
        }

        let mut stack: Vec<Frame> = Vec::new();
        let mut deepest = 0;
        let mut descend = true;
        loop {
            if descend {
                term.node_visited();
                out.nodes += 1;
                if term.should_stop() {
                    out.stopped = true;
                    break;
                }
                match self.select(&asg, &domains) {
                    Some(unit) => {
                        let values = self.values(unit, &asg, &domains, rng.as_mut());
                        stack.push(Frame {
                            unit,
                            values,
                            next: 0,
                            mark: domains.mark(),
                        });
                    }
                    None => {
                        out.solutions += 1;
                        let penalty = total_penalty(model, self.registry, &asg);
                        if out.best.as_ref().map_or(true, |b| penalty < b.penalty) {
                            out.best = Some(Solution {
                                placements: asg.placements().to_vec(),
                                penalty,
                            });
                        }
                        if out.solutions >= self.options.max_solutions.max(1) {
                            break;
                        }
                    }
                }
            }

            let Some(frame) = stack.last_mut() else {
                out.exhausted = true;
                break;
            };
            if asg.placement(frame.unit).is_some() {
                asg.unassign(model, frame.unit);
                domains.undo_to(frame.mark);
            }
            let mut placed = false;
            while frame.next < frame.values.len() {
                let p = frame.values[frame.next];
                frame.next += 1;
                asg.assign(model, frame.unit, p);
                if let Some(id) = self.registry.first_broken_after(model, &asg, frame.unit) {
                    log.push(hard_conflict(model, frame.unit, p, id));
                    asg.unassign(model, frame.unit);
                    continue;
                }
                match after_placement(
                    model,
                    &asg,
                    &mut domains,
                    frame.unit,
                    &self.in_scope,
                    self.units,
                ) {
                    Ok(()) => {
                        placed = true;
                        break;
                    }
                    Err(c) => {
                        log.push(c);
                        domains.undo_to(frame.mark);
                        asg.unassign(model, frame.unit);
                    }
                }
            }

            if placed {
                if asg.assigned_count() > deepest {
                    deepest = asg.assigned_count();
                    out.deepest = asg.placements().to_vec();
                }
                descend = true;
            } else {
                stack.pop();
                out.backtracks += 1;
                descend = false;
            }
        }

        out.conflicts = log.into_vec();
        out
    }

    fn select(&self, asg: &PartialAssignment, domains: &Domains) -> Option<UnitIdx> {
        self.units
            .iter()
            .copied()
            .filter(|&u| asg.placement(u).is_none())
            .min_by_key(|&u| {
                let unit = &self.model.units[u];
                (domains.size(u), Reverse(unit.priority), Reverse(unit.len), u)
            })
    }

    fn values(
        &self,
        unit: UnitIdx,
        asg: &PartialAssignment,
        domains: &Domains,
        rng: Option<&mut ChaCha8Rng>,
    ) -> Vec<Placement> {
        let u = &self.model.units[unit];
        let mut candidates = Vec::new();
        for start in domains.get(unit).iter() {
            for (teacher_rank, &teacher) in u.teachers.iter().enumerate() {
                let mut cost = None;
                for (room_rank, &room) in u.rooms.iter().enumerate() {
                    let p = Placement {
                        start,
                        teacher,
                        room,
                    };
                    if !placement_fits(self.model, asg, unit, p) {
                        continue;
                    }
                    let cost = *cost.get_or_insert_with(|| {
                        self.registry.placement_cost(self.model, asg, unit, p)
                    });
                    candidates.push(Candidate {
                        cost,
                        teacher_rank,
                        room_rank,
                        p,
                    });
                }
            }
        }
        match rng {
            Some(rng) => {
                candidates.shuffle(rng);
                candidates.sort_by(|a, b| a.cost.total_cmp(&b.cost));
            }
            None => candidates.sort_by(|a, b| {
                a.cost
                    .total_cmp(&b.cost)
                    .then(a.p.start.cmp(&b.p.start))
                    .then(a.teacher_rank.cmp(&b.teacher_rank))
                    .then(a.room_rank.cmp(&b.room_rank))
            }),
        }
        candidates.into_iter().map(|c| c.p).collect()
    }
}

fn hard_conflict(model: &Model<'_>, unit: UnitIdx, p: Placement, id: &str) -> Conflict {
    let snap = model.snapshot;
    let u = &model.units[unit];
    let slot = snap.slots[p.start];
    Conflict {
        constraint: ConstraintId::new(id),
        entities: vec![
            EntityRef::Class(snap.classes[u.class].id.clone()),
            EntityRef::Teacher(snap.teachers[p.teacher].id.clone()),
            EntityRef::Room(snap.rooms[p.room].id.clone()),
            EntityRef::Slot(slot),
        ],
        description: format!(
            "{} for class {} at {} with {} in {} breaks {}",
            snap.subjects[u.subject].id,
            snap.classes[u.class].id,
            slot,
            snap.teachers[p.teacher].id,
            snap.rooms[p.room].id,
            id
        ),
    }
}
