pub mod domain;
pub mod extract;
pub mod improve;
pub mod partition;
pub mod portfolio;
pub mod propagate;
pub mod search;
pub mod termination;

use sched_core::constraints::{
    CLASS_CLASH, ROOM_CLASH, SUBJECT_DAILY_CAP, SUBJECT_MAX_CONSECUTIVE, TEACHER_CLASH,
    TEACHER_DAILY_CAP, TEACHER_WEEKLY_CAP,
};
use sched_core::scoring::broken_hard_constraints;
use sched_core::{
    CancelToken, ConstraintWeights, Model, PartialAssignment, Placement, Registry, Snapshot,
    SolveError, SolveParams, SolveResult, Solver,
};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use types::{Conflict, ConstraintId, EntityRef, SolveStats};

use crate::portfolio::ComponentResult;
use crate::termination::{Cancelled, Combinator, TimeBudget};

/// Complete backtracking search with forward checking, decomposition into
/// independent components and a repair pass over the first good solution.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpSolver;

impl CpSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Solver for CpSolver {
    fn solve(
        &self,
        snapshot: &Snapshot,
        weights: &ConstraintWeights,
        params: &SolveParams,
        cancel: &CancelToken,
    ) -> Result<SolveResult, SolveError> {
        let started_at = Instant::now();
        info!(
            schedule = %snapshot.schedule_id,
            classes = snapshot.classes.len(),
            teachers = snapshot.teachers.len(),
            slots = snapshot.slot_count(),
            time_limit_ms = params.time_limit_ms,
            seed = params.seed,
            "solve started"
        );

        let model = Model::build(snapshot)?;
        let registry = Registry::standard(weights);
        let mut stats = SolveStats {
            workers: params.workers.max(1),
            seed: params.seed,
            ..SolveStats::default()
        };

        let mut result = match locked_conflicts(&model, &registry) {
            Some(conflicts) => SolveResult::Infeasible {
                reason: "locked lessons alone break a hard constraint".into(),
                conflicts,
                stats: stats.clone(),
            },
            None => {
                let components = partition::components(&model);
                stats.components = components.len();
                debug!(components = components.len(), units = model.unit_count(), "model partitioned");
                let results = portfolio::solve_components(
                    &model,
                    &registry,
                    &components,
                    params,
                    cancel,
                    started_at,
                );
                for r in &results {
                    stats.nodes += r.nodes;
                    stats.backtracks += r.backtracks;
                    stats.solutions += r.solutions;
                }
                conclude(&model, &registry, &components, results, params, cancel, started_at, &mut stats)?
            }
        };

        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        match &mut result {
            SolveResult::Success { stats: s, .. }
            | SolveResult::Infeasible { stats: s, .. }
            | SolveResult::TimedOut { stats: s, .. } => s.elapsed_ms = elapsed_ms,
        }
        let stats = result.stats();
        info!(
            status = result.status(),
            nodes = stats.nodes,
            backtracks = stats.backtracks,
            repairs = stats.repairs,
            elapsed_ms,
            "solve finished"
        );
        Ok(result)
    }
}

fn locked_conflicts(model: &Model<'_>, registry: &Registry) -> Option<Vec<Conflict>> {
    let base = PartialAssignment::new(model);
    let broken = broken_hard_constraints(model, registry, &base);
    if broken.is_empty() {
        return None;
    }
    Some(
        broken
            .into_iter()
            .map(|id| Conflict {
                constraint: ConstraintId::new(id),
                entities: locked_culprits(model, &base, id),
                description: format!("locked lessons break {id}"),
            })
            .collect(),
    )
}

/// Entities whose locked lessons break `id`; the classes of every locked
/// lesson when the rule has no narrower owner.
fn locked_culprits(model: &Model<'_>, asg: &PartialAssignment, id: &str) -> Vec<EntityRef> {
    let snap = model.snapshot;
    let days = 0..snap.day_count();
    let mut out = Vec::new();
    match id {
        TEACHER_CLASH | TEACHER_DAILY_CAP | TEACHER_WEEKLY_CAP => {
            for (t, teacher) in snap.teachers.iter().enumerate() {
                let broken = match id {
                    TEACHER_DAILY_CAP => teacher.max_hours_day.is_some_and(|cap| {
                        days.clone().any(|d| asg.teacher_day_hours(t, d) > cap)
                    }),
                    TEACHER_WEEKLY_CAP => teacher
                        .max_hours_week
                        .is_some_and(|cap| asg.teacher_week_hours(t) > cap),
                    _ => asg.teacher_busy(t).iter().any(|s| asg.teacher_count(t, s) > 1),
                };
                if broken {
                    out.push(EntityRef::Teacher(teacher.id.clone()));
                }
            }
        }
        ROOM_CLASH => {
            for (r, room) in snap.rooms.iter().enumerate() {
                if asg.room_busy(r).iter().any(|s| asg.room_count(r, s) > 1) {
                    out.push(EntityRef::Room(room.id.clone()));
                }
            }
        }
        CLASS_CLASH => {
            for (c, class) in snap.classes.iter().enumerate() {
                if asg.class_busy(c).iter().any(|s| asg.class_count(c, s) > 1) {
                    out.push(EntityRef::Class(class.id.clone()));
                }
            }
        }
        SUBJECT_DAILY_CAP | SUBJECT_MAX_CONSECUTIVE => {
            let pairs: BTreeSet<_> = snap.locked.iter().map(|l| (l.class, l.subject)).collect();
            for (c, j) in pairs {
                let subject = &snap.subjects[j];
                let taught = asg.requirement_slots(c, j);
                let broken = if id == SUBJECT_DAILY_CAP {
                    subject.max_per_day.is_some_and(|cap| {
                        days.clone()
                            .any(|d| taught.intersection(snap.day_slots(d)).len() as u32 > cap)
                    })
                } else {
                    subject
                        .max_consecutive
                        .is_some_and(|cap| snap.longest_run(taught) > cap)
                };
                if broken {
                    out.push(EntityRef::Class(snap.classes[c].id.clone()));
                    out.push(EntityRef::Subject(subject.id.clone()));
                }
            }
        }
        _ => {}
    }
    if out.is_empty() {
        let classes: BTreeSet<_> = snap.locked.iter().map(|l| l.class).collect();
        out.extend(
            classes
                .into_iter()
                .map(|c| EntityRef::Class(snap.classes[c].id.clone())),
        );
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn conclude(
    model: &Model<'_>,
    registry: &Registry,
    components: &[Vec<usize>],
    results: Vec<ComponentResult>,
    params: &SolveParams,
    cancel: &CancelToken,
    started_at: Instant,
    stats: &mut SolveStats,
) -> Result<SolveResult, SolveError> {
    if let Some((k, r)) = results
        .iter()
        .enumerate()
        .find(|(_, r)| r.outcome.is_infeasible())
    {
        debug!(component = k, worker = r.worker, "component exhausted without a solution");
        return Ok(SolveResult::Infeasible {
            reason: format!(
                "no timetable satisfies every hard constraint for {} lesson unit(s)",
                components[k].len()
            ),
            conflicts: r.outcome.conflicts.clone(),
            stats: stats.clone(),
        });
    }

    let mut merged: Vec<Option<Placement>> = vec![None; model.unit_count()];
    let mut complete = true;
    for (units, r) in components.iter().zip(&results) {
        let source = match &r.outcome.best {
            Some(best) => &best.placements,
            None => {
                complete = false;
                &r.outcome.deepest
            }
        };
        for &u in units {
            merged[u] = source[u];
        }
    }
    let mut asg = PartialAssignment::from_placements(model, &merged);
    let stopped = results.iter().any(|r| r.stopped);

    if complete && stopped {
        warn!(
            solutions = stats.solutions,
            "budget ran out while enumerating; returning the best complete timetable"
        );
        let out = extract::extract_complete(model, registry, &asg)?;
        return Ok(SolveResult::TimedOut {
            best_partial: out.schedule,
            violations: out.scores.violations,
            unassigned: Vec::new(),
            stats: stats.clone(),
        });
    }

    if complete {
        let mut budget = Combinator::new(
            TimeBudget::starting_at(started_at, Duration::from_millis(params.time_limit_ms)),
            Cancelled(cancel.clone()),
        );
        stats.repairs = improve::repair(
            model,
            registry,
            &mut asg,
            params.repair_steps,
            params.seed,
            &mut budget,
        );
        let out = extract::extract_complete(model, registry, &asg)?;
        return Ok(SolveResult::Success {
            schedule: out.schedule,
            quality_score: out.scores.objective,
            violations: out.scores.violations,
            stats: stats.clone(),
        });
    }

    warn!(
        placed = asg.assigned_count(),
        units = model.unit_count(),
        "search stopped before a complete timetable was found"
    );
    let out = extract::extract(model, registry, &asg)?;
    Ok(SolveResult::TimedOut {
        best_partial: out.schedule,
        violations: out.scores.violations,
        unassigned: extract::unassigned(model, &asg),
        stats: stats.clone(),
    })
}
