use sched_core::scoring::broken_hard_constraints;
use sched_core::{
    compute_soft_scores, ExtractionError, Model, PartialAssignment, Registry, Schedule, Scores,
};
use std::collections::BTreeMap;
use types::{Assignment, UnassignedLesson};

/// Locked lessons plus every placed unit, one record per period, sorted.
pub fn assignments(model: &Model<'_>, asg: &PartialAssignment) -> Vec<Assignment> {
    let snap = model.snapshot;
    let mut out: Vec<Assignment> = snap
        .locked
        .iter()
        .map(|l| snap.to_assignment(l.class, l.subject, l.teacher, l.room, l.slot, true))
        .collect();
    for (unit, p) in asg.placements().iter().enumerate() {
        let Some(p) = p else { continue };
        let u = &model.units[unit];
        for slot in model.footprint(unit, p.start).iter() {
            out.push(snap.to_assignment(u.class, u.subject, p.teacher, p.room, slot, false));
        }
    }
    out.sort();
    out
}

/// Hours still missing per requirement, in (class, subject) order.
pub fn unassigned(model: &Model<'_>, asg: &PartialAssignment) -> Vec<UnassignedLesson> {
    let snap = model.snapshot;
    let mut missing: BTreeMap<(usize, usize), u32> = BTreeMap::new();
    for unit in asg.unassigned() {
        let u = &model.units[unit];
        *missing.entry((u.class, u.subject)).or_default() += u.len as u32;
    }
    missing
        .into_iter()
        .map(|((c, j), hours)| UnassignedLesson {
            class: snap.classes[c].id.clone(),
            subject: snap.subjects[j].id.clone(),
            hours,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Extracted {
    pub schedule: Schedule,
    pub scores: Scores,
}

pub fn extract(
    model: &Model<'_>,
    registry: &Registry,
    asg: &PartialAssignment,
) -> Result<Extracted, ExtractionError> {
    if let Some(id) = broken_hard_constraints(model, registry, asg).first() {
        return Err(ExtractionError::HardConstraintBroken(id.to_string()));
    }
    let snap = model.snapshot;
    Ok(Extracted {
        schedule: Schedule {
            id: snap.schedule_id.clone(),
            version: snap.next_version,
            assignments: assignments(model, asg),
        },
        scores: compute_soft_scores(model, registry, asg),
    })
}

pub fn extract_complete(
    model: &Model<'_>,
    registry: &Registry,
    asg: &PartialAssignment,
) -> Result<Extracted, ExtractionError> {
    let left = asg.unassigned().count();
    if left > 0 {
        return Err(ExtractionError::Incomplete(left));
    }
    extract(model, registry, asg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::{Placement, Snapshot, SnapshotParts};
    use types::{
        ClassGroup, ConstraintWeights, DayOfWeek, Requirement, Room, ScheduleId, Subject,
        Teacher, TimeSlot, WeekGrid,
    };

    fn snapshot() -> Snapshot {
        Snapshot::build(SnapshotParts {
            schedule_id: ScheduleId::new("term-1"),
            version: 3,
            grid: WeekGrid::uniform(&[DayOfWeek::Mon], 4),
            teachers: vec![Teacher::new("t1").teaching("math")],
            subjects: vec![Subject::new("math", 3)],
            classes: vec![ClassGroup::new("7a", 20).needs(Requirement::new("math").double())],
            rooms: vec![Room::new("r1", 30)],
            locked: vec![],
        })
        .unwrap()
    }

    #[test]
    fn pair_emits_two_sorted_records() {
        let snap = snapshot();
        let model = Model::build(&snap).unwrap();
        let registry = Registry::standard(&ConstraintWeights::new());
        let pair = (0..model.unit_count())
            .find(|&u| model.units[u].len == 2)
            .unwrap();
        let single = (0..model.unit_count())
            .find(|&u| model.units[u].len == 1)
            .unwrap();
        let mut placements = vec![None; model.unit_count()];
        placements[pair] = Some(Placement {
            start: 1,
            teacher: 0,
            room: 0,
        });
        placements[single] = Some(Placement {
            start: 0,
            teacher: 0,
            room: 0,
        });
        let asg = PartialAssignment::from_placements(&model, &placements);
        let out = extract_complete(&model, &registry, &asg).unwrap();
        assert_eq!(out.schedule.version, 4);
        let slots: Vec<TimeSlot> = out.schedule.assignments.iter().map(|a| a.slot).collect();
        assert_eq!(
            slots,
            vec![
                TimeSlot::new(DayOfWeek::Mon, 0),
                TimeSlot::new(DayOfWeek::Mon, 1),
                TimeSlot::new(DayOfWeek::Mon, 2),
            ]
        );
        assert_eq!(out.scores.objective, 0.0);
    }

    #[test]
    fn partial_lists_missing_hours_and_refuses_completion() {
        let snap = snapshot();
        let model = Model::build(&snap).unwrap();
        let registry = Registry::standard(&ConstraintWeights::new());
        let asg = PartialAssignment::new(&model);
        let missing = unassigned(&model, &asg);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].hours, 3);
        assert_eq!(
            extract_complete(&model, &registry, &asg).unwrap_err(),
            ExtractionError::Incomplete(2)
        );
        assert!(extract(&model, &registry, &asg).is_ok());
    }
}
