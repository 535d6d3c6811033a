use std::collections::HashMap;
use tracing::debug;

use crate::error::{EmptyDomain, ModelInfeasibleError};
use crate::slots::{SlotIdx, SlotSet};
use crate::snapshot::{ClassIdx, RoomIdx, Snapshot, SubjectIdx, TeacherIdx};

pub type UnitIdx = usize;

/// One block of consecutive lesson periods to place: a single hour, or both
/// halves of a double period (same teacher and room, adjacent slots).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonUnit {
    pub class: ClassIdx,
    pub subject: SubjectIdx,
    pub len: u8,
    pub priority: u8,
    /// Candidate teachers, best proficiency first.
    pub teachers: Vec<TeacherIdx>,
    /// Candidate rooms, smallest fitting first.
    pub rooms: Vec<RoomIdx>,
    /// Admissible first periods of the block.
    pub starts: SlotSet,
}

impl LessonUnit {
    pub fn teacher_rank(&self, teacher: TeacherIdx) -> Option<usize> {
        self.teachers.iter().position(|&t| t == teacher)
    }

    pub fn room_rank(&self, room: RoomIdx) -> Option<usize> {
        self.rooms.iter().position(|&r| r == room)
    }
}

#[derive(Debug, Clone)]
pub struct Model<'s> {
    pub snapshot: &'s Snapshot,
    pub units: Vec<LessonUnit>,
    by_class: Vec<Vec<UnitIdx>>,
    by_teacher: Vec<Vec<UnitIdx>>,
    by_room: Vec<Vec<UnitIdx>>,
    by_requirement: HashMap<(ClassIdx, SubjectIdx), Vec<UnitIdx>>,
    locked_by_requirement: HashMap<(ClassIdx, SubjectIdx), Vec<usize>>,
    demanded: Vec<bool>,
    locked_teacher: Vec<SlotSet>,
    locked_room: Vec<SlotSet>,
    locked_class: Vec<SlotSet>,
}

impl<'s> Model<'s> {
    pub fn build(snapshot: &'s Snapshot) -> Result<Model<'s>, ModelInfeasibleError> {
        let mut locked_teacher = vec![SlotSet::EMPTY; snapshot.teachers.len()];
        let mut locked_room = vec![SlotSet::EMPTY; snapshot.rooms.len()];
        let mut locked_class = vec![SlotSet::EMPTY; snapshot.classes.len()];
        let mut locked_by_requirement: HashMap<(ClassIdx, SubjectIdx), Vec<usize>> =
            HashMap::new();
        for (i, l) in snapshot.locked.iter().enumerate() {
            locked_teacher[l.teacher].insert(l.slot);
            locked_room[l.room].insert(l.slot);
            locked_class[l.class].insert(l.slot);
            locked_by_requirement
                .entry((l.class, l.subject))
                .or_default()
                .push(i);
        }
        let mut demanded = vec![false; snapshot.subjects.len()];

        let mut units = Vec::new();
        for (c, class) in snapshot.classes.iter().enumerate() {
            let class_free = snapshot.class_available(c).difference(locked_class[c]);
            for req in &class.requirements {
                let Some(j) = snapshot.subject_idx(&req.subject) else {
                    continue;
                };
                demanded[j] = true;
                let locked = locked_by_requirement.get(&(c, j)).map_or(0, Vec::len);
                let hours = snapshot.required_hours(c, j).saturating_sub(locked as u32);
                if hours == 0 {
                    continue;
                }
                let fail = |cause| ModelInfeasibleError {
                    class: class.id.clone(),
                    subject: req.subject.clone(),
                    cause,
                };

                let teachers = snapshot.qualified(j);
                if teachers.is_empty() {
                    return Err(fail(EmptyDomain::NoQualifiedTeacher));
                }
                let mut rooms: Vec<RoomIdx> = (0..snapshot.rooms.len())
                    .filter(|&r| snapshot.room_fits(r, c, j))
                    .collect();
                rooms.sort_by_key(|&r| (snapshot.rooms[r].capacity, r));
                if rooms.is_empty() {
                    return Err(fail(EmptyDomain::NoSuitableRoom));
                }

                let mut lengths = Vec::new();
                if req.double_period {
                    lengths.extend(std::iter::repeat(2u8).take((hours / 2) as usize));
                    if hours % 2 == 1 {
                        lengths.push(1);
                    }
                } else {
                    lengths.extend(std::iter::repeat(1u8).take(hours as usize));
                }

                for len in lengths {
                    let domain = Domain::compute(
                        snapshot,
                        class_free,
                        teachers,
                        &rooms,
                        &locked_teacher,
                        &locked_room,
                        len,
                    );
                    if domain.starts.is_empty() {
                        let singles = Domain::compute(
                            snapshot,
                            class_free,
                            teachers,
                            &rooms,
                            &locked_teacher,
                            &locked_room,
                            1,
                        );
                        let cause = if len > 1 && !singles.starts.is_empty() {
                            EmptyDomain::NoAdjacentPair
                        } else {
                            EmptyDomain::NoFeasibleSlot
                        };
                        return Err(fail(cause));
                    }
                    units.push(LessonUnit {
                        class: c,
                        subject: j,
                        len,
                        priority: req.priority,
                        teachers: domain.teachers,
                        rooms: domain.rooms,
                        starts: domain.starts,
                    });
                }
            }
        }

        let mut by_class = vec![Vec::new(); snapshot.classes.len()];
        let mut by_teacher = vec![Vec::new(); snapshot.teachers.len()];
        let mut by_room = vec![Vec::new(); snapshot.rooms.len()];
        let mut by_requirement: HashMap<(ClassIdx, SubjectIdx), Vec<UnitIdx>> = HashMap::new();
        for (u, unit) in units.iter().enumerate() {
            by_class[unit.class].push(u);
            for &t in &unit.teachers {
                by_teacher[t].push(u);
            }
            for &r in &unit.rooms {
                by_room[r].push(u);
            }
            by_requirement
                .entry((unit.class, unit.subject))
                .or_default()
                .push(u);
        }

        debug!(units = units.len(), locked = snapshot.locked.len(), "model built");

        Ok(Model {
            snapshot,
            units,
            by_class,
            by_teacher,
            by_room,
            by_requirement,
            locked_by_requirement,
            demanded,
            locked_teacher,
            locked_room,
            locked_class,
        })
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn footprint(&self, unit: UnitIdx, start: SlotIdx) -> SlotSet {
        self.snapshot
            .block(start, self.units[unit].len)
            .unwrap_or(SlotSet::EMPTY)
    }

    pub fn units_of_class(&self, class: ClassIdx) -> &[UnitIdx] {
        &self.by_class[class]
    }

    pub fn units_of_teacher(&self, teacher: TeacherIdx) -> &[UnitIdx] {
        &self.by_teacher[teacher]
    }

    pub fn units_of_room(&self, room: RoomIdx) -> &[UnitIdx] {
        &self.by_room[room]
    }

    pub fn units_of_requirement(&self, class: ClassIdx, subject: SubjectIdx) -> &[UnitIdx] {
        self.by_requirement
            .get(&(class, subject))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Indices into `snapshot.locked` of the requirement's pinned lessons.
    pub fn locked_of_requirement(&self, class: ClassIdx, subject: SubjectIdx) -> &[usize] {
        self.locked_by_requirement
            .get(&(class, subject))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_demanded(&self, subject: SubjectIdx) -> bool {
        self.demanded[subject]
    }

    pub fn locked_teacher(&self, teacher: TeacherIdx) -> SlotSet {
        self.locked_teacher[teacher]
    }

    pub fn locked_room(&self, room: RoomIdx) -> SlotSet {
        self.locked_room[room]
    }

    pub fn locked_class(&self, class: ClassIdx) -> SlotSet {
        self.locked_class[class]
    }
}

struct Domain {
    teachers: Vec<TeacherIdx>,
    rooms: Vec<RoomIdx>,
    starts: SlotSet,
}

impl Domain {
    /// Keeps only teachers and rooms that admit at least one start together.
    fn compute(
        snapshot: &Snapshot,
        class_free: SlotSet,
        teachers: &[TeacherIdx],
        rooms: &[RoomIdx],
        locked_teacher: &[SlotSet],
        locked_room: &[SlotSet],
        len: u8,
    ) -> Domain {
        let mut keep_room = vec![false; rooms.len()];
        let mut kept_teachers = Vec::new();
        let mut starts = SlotSet::EMPTY;
        for &t in teachers {
            let t_free = snapshot
                .teacher_available(t)
                .difference(locked_teacher[t])
                .intersection(class_free);
            let mut any = false;
            for (k, &r) in rooms.iter().enumerate() {
                let free = snapshot
                    .room_available(r)
                    .difference(locked_room[r])
                    .intersection(t_free);
                let s = snapshot.starts_within(free, len);
                if !s.is_empty() {
                    any = true;
                    keep_room[k] = true;
                    starts = starts.union(s);
                }
            }
            if any {
                kept_teachers.push(t);
            }
        }
        Domain {
            teachers: kept_teachers,
            rooms: rooms
                .iter()
                .zip(keep_room)
                .filter_map(|(&r, keep)| keep.then_some(r))
                .collect(),
            starts,
        }
    }
}
