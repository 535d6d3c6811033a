use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sched_core::scoring::total_penalty;
use sched_core::{Model, PartialAssignment, Placement, Registry, UnitIdx};

use crate::propagate::placement_fits;
use crate::termination::TerminationCondition;

/// Cheapest alternatives by estimated cost that get a full penalty evaluation.
const CANDIDATES_PER_STEP: usize = 4;

/// Moves single units to other hard-feasible placements while the total
/// penalty strictly decreases. Returns the number of accepted moves.
pub fn repair<T: TerminationCondition>(
    model: &Model<'_>,
    registry: &Registry,
    asg: &mut PartialAssignment,
    steps: u32,
    seed: u64,
    term: &mut T,
) -> u32 {
    let n = model.unit_count();
    if n == 0 || steps == 0 {
        return 0;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut current = total_penalty(model, registry, asg);
    let mut repairs = 0;

    for _ in 0..steps {
        if current <= 0.0 || term.should_stop() {
            break;
        }
        let unit = rng.gen_range(0..n);
        let Some(old) = asg.unassign(model, unit) else {
            continue;
        };
        let mut best: Option<(Placement, f64)> = None;
        for p in alternatives(model, registry, asg, unit, old) {
            asg.assign(model, unit, p);
            if registry.first_broken_after(model, asg, unit).is_none() {
                let pen = total_penalty(model, registry, asg);
                if pen < best.map_or(current, |(_, b)| b) {
                    best = Some((p, pen));
                }
            }
            asg.unassign(model, unit);
        }
        match best {
            Some((p, pen)) => {
                asg.assign(model, unit, p);
                current = pen;
                repairs += 1;
            }
            None => asg.assign(model, unit, old),
        }
    }
    repairs
}

fn alternatives(
    model: &Model<'_>,
    registry: &Registry,
    asg: &PartialAssignment,
    unit: UnitIdx,
    old: Placement,
) -> Vec<Placement> {
    let u = &model.units[unit];
    let mut scored = Vec::new();
    for start in u.starts.iter() {
        for &teacher in &u.teachers {
            for &room in &u.rooms {
                let p = Placement {
                    start,
                    teacher,
                    room,
                };
                if p != old && placement_fits(model, asg, unit, p) {
                    scored.push((registry.placement_cost(model, asg, unit, p), p));
                }
            }
        }
    }
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored
        .into_iter()
        .take(CANDIDATES_PER_STEP)
        .map(|(_, p)| p)
        .collect()
}
