use super::{
    placed, requirements, Constraint, Strength, CLASS_CLASH, DOUBLE_PERIOD, ROOM_CLASH,
    SUBJECT_DAILY_CAP, SUBJECT_MAX_CONSECUTIVE, TEACHER_CLASH, TEACHER_DAILY_CAP,
    TEACHER_WEEKLY_CAP, WITHIN_DOMAIN,
};
use crate::assignment::{PartialAssignment, Placement};
use crate::model::{Model, UnitIdx};
use crate::snapshot::{ClassIdx, SubjectIdx};

#[derive(Debug, Clone, Copy)]
pub struct TeacherClash;

impl Constraint for TeacherClash {
    fn id(&self) -> &'static str {
        TEACHER_CLASH
    }

    fn strength(&self) -> Strength {
        Strength::Hard
    }

    fn is_satisfied(&self, _model: &Model<'_>, asg: &PartialAssignment) -> bool {
        asg.teacher_clashes() == 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RoomClash;

impl Constraint for RoomClash {
    fn id(&self) -> &'static str {
        ROOM_CLASH
    }

    fn strength(&self) -> Strength {
        Strength::Hard
    }

    fn is_satisfied(&self, _model: &Model<'_>, asg: &PartialAssignment) -> bool {
        asg.room_clashes() == 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClassClash;

impl Constraint for ClassClash {
    fn id(&self) -> &'static str {
        CLASS_CLASH
    }

    fn strength(&self) -> Strength {
        Strength::Hard
    }

    fn is_satisfied(&self, _model: &Model<'_>, asg: &PartialAssignment) -> bool {
        asg.class_clashes() == 0
    }
}

/// Teacher, room and start come from the unit's domain, and the whole block
/// lies inside the availability of the class, the teacher and the room.
#[derive(Debug, Clone, Copy)]
pub struct WithinDomain;

impl WithinDomain {
    fn admits(model: &Model<'_>, unit: UnitIdx, p: Placement) -> bool {
        let u = &model.units[unit];
        let snap = model.snapshot;
        if !u.starts.contains(p.start)
            || u.teacher_rank(p.teacher).is_none()
            || u.room_rank(p.room).is_none()
        {
            return false;
        }
        let Some(block) = snap.block(p.start, u.len) else {
            return false;
        };
        let open = snap
            .class_available(u.class)
            .intersection(snap.teacher_available(p.teacher))
            .intersection(snap.room_available(p.room));
        block.is_subset(open)
    }
}

impl Constraint for WithinDomain {
    fn id(&self) -> &'static str {
        WITHIN_DOMAIN
    }

    fn strength(&self) -> Strength {
        Strength::Hard
    }

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool {
        placed(asg).all(|(u, p)| Self::admits(model, u, p))
    }

    fn is_satisfied_after(&self, model: &Model<'_>, asg: &PartialAssignment, unit: UnitIdx) -> bool {
        asg.placement(unit)
            .map_or(true, |p| Self::admits(model, unit, p))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DoublePeriod;

impl Constraint for DoublePeriod {
    fn id(&self) -> &'static str {
        DOUBLE_PERIOD
    }

    fn strength(&self) -> Strength {
        Strength::Hard
    }

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool {
        placed(asg).all(|(u, p)| {
            let len = model.units[u].len;
            len == 1 || model.snapshot.block(p.start, len).is_some()
        })
    }

    fn is_satisfied_after(&self, model: &Model<'_>, asg: &PartialAssignment, unit: UnitIdx) -> bool {
        let len = model.units[unit].len;
        asg.placement(unit)
            .map_or(true, |p| len == 1 || model.snapshot.block(p.start, len).is_some())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TeacherDailyCap;

impl Constraint for TeacherDailyCap {
    fn id(&self) -> &'static str {
        TEACHER_DAILY_CAP
    }

    fn strength(&self) -> Strength {
        Strength::Hard
    }

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool {
        let snap = model.snapshot;
        snap.teachers.iter().enumerate().all(|(t, teacher)| {
            teacher.max_hours_day.map_or(true, |cap| {
                (0..snap.day_count()).all(|d| asg.teacher_day_hours(t, d) <= cap)
            })
        })
    }

    fn is_satisfied_after(&self, model: &Model<'_>, asg: &PartialAssignment, unit: UnitIdx) -> bool {
        let Some(p) = asg.placement(unit) else {
            return true;
        };
        let snap = model.snapshot;
        snap.teachers[p.teacher]
            .max_hours_day
            .map_or(true, |cap| {
                asg.teacher_day_hours(p.teacher, snap.day_of(p.start)) <= cap
            })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TeacherWeeklyCap;

impl Constraint for TeacherWeeklyCap {
    fn id(&self) -> &'static str {
        TEACHER_WEEKLY_CAP
    }

    fn strength(&self) -> Strength {
        Strength::Hard
    }

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool {
        model
            .snapshot
            .teachers
            .iter()
            .enumerate()
            .all(|(t, teacher)| {
                teacher
                    .max_hours_week
                    .map_or(true, |cap| asg.teacher_week_hours(t) <= cap)
            })
    }

    fn is_satisfied_after(&self, model: &Model<'_>, asg: &PartialAssignment, unit: UnitIdx) -> bool {
        let Some(p) = asg.placement(unit) else {
            return true;
        };
        model.snapshot.teachers[p.teacher]
            .max_hours_week
            .map_or(true, |cap| asg.teacher_week_hours(p.teacher) <= cap)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SubjectDailyCap;

impl SubjectDailyCap {
    fn holds(model: &Model<'_>, asg: &PartialAssignment, c: ClassIdx, j: SubjectIdx, day: usize) -> bool {
        let snap = model.snapshot;
        snap.subjects[j].max_per_day.map_or(true, |cap| {
            asg.requirement_slots(c, j)
                .intersection(snap.day_slots(day))
                .len() as u32
                <= cap
        })
    }
}

impl Constraint for SubjectDailyCap {
    fn id(&self) -> &'static str {
        SUBJECT_DAILY_CAP
    }

    fn strength(&self) -> Strength {
        Strength::Hard
    }

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool {
        requirements(model)
            .all(|(c, j)| (0..model.snapshot.day_count()).all(|d| Self::holds(model, asg, c, j, d)))
    }

    fn is_satisfied_after(&self, model: &Model<'_>, asg: &PartialAssignment, unit: UnitIdx) -> bool {
        let Some(p) = asg.placement(unit) else {
            return true;
        };
        let u = &model.units[unit];
        Self::holds(model, asg, u.class, u.subject, model.snapshot.day_of(p.start))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SubjectMaxConsecutive;

impl Constraint for SubjectMaxConsecutive {
    fn id(&self) -> &'static str {
        SUBJECT_MAX_CONSECUTIVE
    }

    fn strength(&self) -> Strength {
        Strength::Hard
    }

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool {
        let snap = model.snapshot;
        requirements(model).all(|(c, j)| {
            snap.subjects[j]
                .max_consecutive
                .map_or(true, |cap| snap.longest_run(asg.requirement_slots(c, j)) <= cap)
        })
    }

    fn is_satisfied_after(&self, model: &Model<'_>, asg: &PartialAssignment, unit: UnitIdx) -> bool {
        let Some(p) = asg.placement(unit) else {
            return true;
        };
        let u = &model.units[unit];
        let snap = model.snapshot;
        snap.subjects[u.subject].max_consecutive.map_or(true, |cap| {
            snap.run_through(asg.requirement_slots(u.class, u.subject), p.start) <= cap
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotParts;
    use crate::Snapshot;
    use types::{
        AvailabilityWindow, ClassGroup, DayOfWeek, Requirement, Room, ScheduleId, Subject,
        Teacher, WeekGrid,
    };

    fn snapshot(subject: Subject, teacher: Teacher) -> Snapshot {
        Snapshot::build(SnapshotParts {
            schedule_id: ScheduleId::new("s"),
            version: 0,
            grid: WeekGrid::uniform(&[DayOfWeek::Mon, DayOfWeek::Tue], 4),
            teachers: vec![teacher],
            subjects: vec![subject],
            classes: vec![ClassGroup::new("7a", 20).needs(Requirement::new("math"))],
            rooms: vec![Room::new("r1", 30)],
            locked: vec![],
        })
        .unwrap()
    }

    fn at(start: usize) -> Placement {
        Placement {
            start,
            teacher: 0,
            room: 0,
        }
    }

    #[test]
    fn subject_caps_are_checked_per_day_and_run() {
        let subject = Subject {
            max_per_day: Some(2),
            max_consecutive: Some(1),
            ..Subject::new("math", 3)
        };
        let snap = snapshot(subject, Teacher::new("t1").teaching("math"));
        let model = Model::build(&snap).unwrap();
        let mut asg = PartialAssignment::new(&model);
        asg.assign(&model, 0, at(0));
        asg.assign(&model, 1, at(2));
        assert!(SubjectDailyCap.is_satisfied(&model, &asg));
        assert!(SubjectMaxConsecutive.is_satisfied(&model, &asg));

        asg.assign(&model, 2, at(3));
        assert!(!SubjectDailyCap.is_satisfied_after(&model, &asg, 2));
        assert!(!SubjectMaxConsecutive.is_satisfied_after(&model, &asg, 2));

        asg.assign(&model, 2, at(4));
        assert!(SubjectDailyCap.is_satisfied(&model, &asg));
        assert!(SubjectMaxConsecutive.is_satisfied(&model, &asg));
    }

    #[test]
    fn teacher_caps_count_every_lesson() {
        let teacher = Teacher {
            max_hours_day: Some(1),
            max_hours_week: Some(2),
            ..Teacher::new("t1").teaching("math")
        };
        let snap = snapshot(Subject::new("math", 3), teacher);
        let model = Model::build(&snap).unwrap();
        let mut asg = PartialAssignment::new(&model);
        asg.assign(&model, 0, at(0));
        asg.assign(&model, 1, at(1));
        assert!(!TeacherDailyCap.is_satisfied_after(&model, &asg, 1));
        asg.assign(&model, 1, at(4));
        assert!(TeacherDailyCap.is_satisfied(&model, &asg));
        assert!(TeacherWeeklyCap.is_satisfied(&model, &asg));
        asg.assign(&model, 2, at(5));
        assert!(!TeacherWeeklyCap.is_satisfied(&model, &asg));
    }

    #[test]
    fn within_domain_respects_teacher_availability() {
        let teacher = Teacher {
            availability: vec![AvailabilityWindow::whole_day(DayOfWeek::Mon)],
            ..Teacher::new("t1").teaching("math")
        };
        let snap = snapshot(Subject::new("math", 1), teacher);
        let model = Model::build(&snap).unwrap();
        let mut asg = PartialAssignment::new(&model);
        asg.assign(&model, 0, at(1));
        assert!(WithinDomain.is_satisfied(&model, &asg));
        asg.assign(&model, 0, at(5));
        assert!(!WithinDomain.is_satisfied_after(&model, &asg, 0));
    }

    #[test]
    fn clashes_are_hard() {
        let snap = snapshot(Subject::new("math", 2), Teacher::new("t1").teaching("math"));
        let model = Model::build(&snap).unwrap();
        let mut asg = PartialAssignment::new(&model);
        asg.assign(&model, 0, at(0));
        asg.assign(&model, 1, at(0));
        assert!(!TeacherClash.is_satisfied(&model, &asg));
        assert!(!RoomClash.is_satisfied(&model, &asg));
        assert!(!ClassClash.is_satisfied(&model, &asg));
        assert!(DoublePeriod.is_satisfied(&model, &asg));
    }
}
