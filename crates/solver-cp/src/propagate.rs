use sched_core::constraints::{
    CLASS_CLASH, ROOM_CLASH, SUBJECT_DAILY_CAP, SUBJECT_MAX_CONSECUTIVE, TEACHER_CLASH,
    TEACHER_DAILY_CAP, TEACHER_WEEKLY_CAP,
};
use sched_core::{Model, PartialAssignment, Placement, SlotSet, UnitIdx};
use types::{Conflict, ConstraintId, EntityRef};

use crate::domain::Domains;

fn conflict(constraint: &str, entities: Vec<EntityRef>, description: String) -> Conflict {
    Conflict {
        constraint: ConstraintId::new(constraint),
        entities,
        description,
    }
}

fn coverage(starts: SlotSet, len: u8) -> SlotSet {
    let mut cover = starts;
    let mut shifted = starts;
    for _ in 1..len {
        shifted = shifted.later_by_one();
        cover = cover.union(shifted);
    }
    cover
}

/// Starts of `dom` at which the unit can still be placed given `asg`.
pub fn viable_starts(
    model: &Model<'_>,
    asg: &PartialAssignment,
    unit: UnitIdx,
    dom: SlotSet,
) -> Result<SlotSet, Conflict> {
    let snap = model.snapshot;
    let u = &model.units[unit];
    let len = u.len;
    let class = &snap.classes[u.class];
    let subject = &snap.subjects[u.subject];
    let what = || format!("{} for class {}", subject.id, class.id);

    let class_free = snap
        .class_available(u.class)
        .difference(asg.class_busy(u.class));
    let starts = dom.intersection(snap.starts_within(class_free, len));
    if starts.is_empty() {
        return Err(conflict(
            CLASS_CLASH,
            vec![EntityRef::Class(class.id.clone())],
            format!("no free block of the class left for {}", what()),
        ));
    }

    let mut by_teacher = SlotSet::EMPTY;
    let mut uncapped = SlotSet::EMPTY;
    let mut week_blocked = true;
    for &t in &u.teachers {
        let free = snap.teacher_available(t).difference(asg.teacher_busy(t));
        let s = snap.starts_within(free, len).intersection(starts);
        if s.is_empty() {
            continue;
        }
        uncapped = uncapped.union(s);
        let teacher = &snap.teachers[t];
        if teacher
            .max_hours_week
            .is_some_and(|cap| asg.teacher_week_hours(t) + len as u32 > cap)
        {
            continue;
        }
        week_blocked = false;
        let s = match teacher.max_hours_day {
            Some(cap) => s
                .iter()
                .filter(|&st| asg.teacher_day_hours(t, snap.day_of(st)) + len as u32 <= cap)
                .collect(),
            None => s,
        };
        by_teacher = by_teacher.union(s);
    }
    if by_teacher.is_empty() {
        let teachers = u
            .teachers
            .iter()
            .map(|&t| EntityRef::Teacher(snap.teachers[t].id.clone()))
            .collect();
        let (id, why) = if uncapped.is_empty() {
            (TEACHER_CLASH, "every qualified teacher is busy")
        } else if week_blocked {
            (TEACHER_WEEKLY_CAP, "every qualified teacher reached the weekly cap")
        } else {
            (TEACHER_DAILY_CAP, "every qualified teacher reached the daily cap")
        };
        return Err(conflict(id, teachers, format!("{why} for {}", what())));
    }

    let mut by_room = SlotSet::EMPTY;
    for &r in &u.rooms {
        let free = snap.room_available(r).difference(asg.room_busy(r));
        by_room = by_room.union(snap.starts_within(free, len).intersection(by_teacher));
    }
    if by_room.is_empty() {
        let rooms = u
            .rooms
            .iter()
            .map(|&r| EntityRef::Room(snap.rooms[r].id.clone()))
            .collect();
        return Err(conflict(
            ROOM_CLASH,
            rooms,
            format!("every suitable room is taken when a teacher is free for {}", what()),
        ));
    }

    let mut starts = by_room;
    if subject.max_per_day.is_some() || subject.max_consecutive.is_some() {
        let taught = asg.requirement_slots(u.class, u.subject);
        let mut daily_hit = false;
        starts = starts
            .iter()
            .filter(|&s| {
                let block = model.footprint(unit, s);
                let day = snap.day_slots(snap.day_of(s));
                let daily_ok = subject.max_per_day.map_or(true, |cap| {
                    taught.intersection(day).len() as u32 + len as u32 <= cap
                });
                daily_hit |= !daily_ok;
                daily_ok
                    && subject
                        .max_consecutive
                        .map_or(true, |cap| snap.run_through(taught.union(block), s) <= cap)
            })
            .collect();
        if starts.is_empty() {
            let id = if daily_hit {
                SUBJECT_DAILY_CAP
            } else {
                SUBJECT_MAX_CONSECUTIVE
            };
            return Err(conflict(
                id,
                vec![
                    EntityRef::Class(class.id.clone()),
                    EntityRef::Subject(subject.id.clone()),
                ],
                format!("subject limits leave no start for {}", what()),
            ));
        }
    }
    Ok(starts)
}

/// Whether `p` can be taken right now: inside availability, nothing busy,
/// caps not exceeded.
pub fn placement_fits(model: &Model<'_>, asg: &PartialAssignment, unit: UnitIdx, p: Placement) -> bool {
    let snap = model.snapshot;
    let u = &model.units[unit];
    let Some(block) = snap.block(p.start, u.len) else {
        return false;
    };
    let teacher = &snap.teachers[p.teacher];
    let hours = u.len as u32;
    let open_teacher = snap
        .teacher_available(p.teacher)
        .difference(asg.teacher_busy(p.teacher));
    let open_room = snap.room_available(p.room).difference(asg.room_busy(p.room));
    let open_class = snap
        .class_available(u.class)
        .difference(asg.class_busy(u.class));
    block.is_subset(open_teacher.intersection(open_room).intersection(open_class))
        && teacher
            .max_hours_week
            .map_or(true, |cap| asg.teacher_week_hours(p.teacher) + hours <= cap)
        && teacher.max_hours_day.map_or(true, |cap| {
            asg.teacher_day_hours(p.teacher, snap.day_of(p.start)) + hours <= cap
        })
}

/// Demand of units that can only use one resource against the free periods
/// their domains still cover.
pub fn counting_bounds(
    model: &Model<'_>,
    asg: &PartialAssignment,
    domains: &Domains,
    units: &[UnitIdx],
) -> Result<(), Conflict> {
    let snap = model.snapshot;
    let mut class_demand = vec![0u32; snap.classes.len()];
    let mut class_cover = vec![SlotSet::EMPTY; snap.classes.len()];
    let mut teacher_demand = vec![0u32; snap.teachers.len()];
    let mut teacher_cover = vec![SlotSet::EMPTY; snap.teachers.len()];
    let mut room_demand = vec![0u32; snap.rooms.len()];
    let mut room_cover = vec![SlotSet::EMPTY; snap.rooms.len()];

    for &unit in units {
        if asg.placement(unit).is_some() {
            continue;
        }
        let u = &model.units[unit];
        let cover = coverage(domains.get(unit), u.len);
        class_demand[u.class] += u.len as u32;
        class_cover[u.class] = class_cover[u.class].union(cover);
        if let &[t] = u.teachers.as_slice() {
            teacher_demand[t] += u.len as u32;
            teacher_cover[t] = teacher_cover[t].union(cover);
        }
        if let &[r] = u.rooms.as_slice() {
            room_demand[r] += u.len as u32;
            room_cover[r] = room_cover[r].union(cover);
        }
    }

    for (c, class) in snap.classes.iter().enumerate() {
        let free = class_cover[c].len() as u32;
        if class_demand[c] > free {
            return Err(conflict(
                CLASS_CLASH,
                vec![EntityRef::Class(class.id.clone())],
                format!(
                    "class {} still needs {} periods but only {} remain open",
                    class.id, class_demand[c], free
                ),
            ));
        }
    }
    for (t, teacher) in snap.teachers.iter().enumerate() {
        if teacher_demand[t] == 0 {
            continue;
        }
        let free = teacher_cover[t]
            .difference(asg.teacher_busy(t))
            .len() as u32;
        if teacher_demand[t] > free {
            return Err(conflict(
                TEACHER_CLASH,
                vec![EntityRef::Teacher(teacher.id.clone())],
                format!(
                    "teacher {} is the only option for {} periods but has {} open",
                    teacher.id, teacher_demand[t], free
                ),
            ));
        }
        if let Some(cap) = teacher.max_hours_week {
            if asg.teacher_week_hours(t) + teacher_demand[t] > cap {
                return Err(conflict(
                    TEACHER_WEEKLY_CAP,
                    vec![EntityRef::Teacher(teacher.id.clone())],
                    format!(
                        "teacher {} would exceed the weekly cap of {} hours",
                        teacher.id, cap
                    ),
                ));
            }
        }
    }
    for (r, room) in snap.rooms.iter().enumerate() {
        if room_demand[r] == 0 {
            continue;
        }
        let free = room_cover[r].difference(asg.room_busy(r)).len() as u32;
        if room_demand[r] > free {
            return Err(conflict(
                ROOM_CLASH,
                vec![EntityRef::Room(room.id.clone())],
                format!(
                    "room {} is the only option for {} periods but has {} open",
                    room.id, room_demand[r], free
                ),
            ));
        }
    }
    Ok(())
}

pub fn propagate(
    model: &Model<'_>,
    asg: &PartialAssignment,
    domains: &mut Domains,
    units: &[UnitIdx],
) -> Result<(), Conflict> {
    for &unit in units {
        if asg.placement(unit).is_some() {
            continue;
        }
        let starts = viable_starts(model, asg, unit, domains.get(unit))?;
        domains.set(unit, starts);
    }
    counting_bounds(model, asg, domains, units)
}

/// Forward check after `placed` was assigned: only units sharing its class,
/// teacher or room can lose values.
pub fn after_placement(
    model: &Model<'_>,
    asg: &PartialAssignment,
    domains: &mut Domains,
    placed: UnitIdx,
    in_scope: &[bool],
    units: &[UnitIdx],
) -> Result<(), Conflict> {
    let Some(p) = asg.placement(placed) else {
        return Ok(());
    };
    let class = model.units[placed].class;
    let touched = model
        .units_of_class(class)
        .iter()
        .chain(model.units_of_teacher(p.teacher))
        .chain(model.units_of_room(p.room));
    for &unit in touched {
        if !in_scope[unit] || asg.placement(unit).is_some() {
            continue;
        }
        let starts = viable_starts(model, asg, unit, domains.get(unit))?;
        domains.set(unit, starts);
    }
    counting_bounds(model, asg, domains, units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::{Snapshot, SnapshotParts};
    use types::{ClassGroup, DayOfWeek, Requirement, Room, ScheduleId, Subject, Teacher, WeekGrid};

    fn two_classes_one_teacher(hours: u32) -> Snapshot {
        Snapshot::build(SnapshotParts {
            schedule_id: ScheduleId::new("s"),
            version: 0,
            grid: WeekGrid::uniform(&[DayOfWeek::Mon], 4),
            teachers: vec![Teacher::new("t1").teaching("math")],
            subjects: vec![Subject::new("math", hours)],
            classes: vec![
                ClassGroup::new("7a", 20).needs(Requirement::new("math")),
                ClassGroup::new("7b", 20).needs(Requirement::new("math")),
            ],
            rooms: vec![Room::new("r1", 30), Room::new("r2", 30)],
            locked: vec![],
        })
        .unwrap()
    }

    #[test]
    fn bounds_cite_the_overloaded_teacher() {
        let snap = two_classes_one_teacher(3);
        let model = Model::build(&snap).unwrap();
        let asg = PartialAssignment::new(&model);
        let mut domains = Domains::new(&model);
        let units: Vec<UnitIdx> = (0..model.unit_count()).collect();
        let err = propagate(&model, &asg, &mut domains, &units).unwrap_err();
        assert_eq!(err.constraint.as_str(), TEACHER_CLASH);
        assert_eq!(err.entities, vec![EntityRef::Teacher("t1".into())]);
    }

    #[test]
    fn placing_a_lesson_removes_its_slot_from_neighbours() {
        let snap = two_classes_one_teacher(2);
        let model = Model::build(&snap).unwrap();
        let mut asg = PartialAssignment::new(&model);
        let mut domains = Domains::new(&model);
        let units: Vec<UnitIdx> = (0..model.unit_count()).collect();
        let in_scope = vec![true; units.len()];
        propagate(&model, &asg, &mut domains, &units).unwrap();
        let p = Placement {
            start: 0,
            teacher: 0,
            room: 0,
        };
        assert!(placement_fits(&model, &asg, 0, p));
        asg.assign(&model, 0, p);
        after_placement(&model, &asg, &mut domains, 0, &in_scope, &units).unwrap();
        for u in 1..units.len() {
            assert!(!domains.get(u).contains(0));
        }
        assert!(!placement_fits(&model, &asg, 2, Placement { room: 1, ..p }));
    }
}
