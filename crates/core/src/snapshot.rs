//! Entities sit in arenas sorted by id, so index order is id order.

use std::collections::{HashMap, HashSet};
use tracing::debug;
use types::{
    Assignment, AvailabilityWindow, ClassGroup, ClassId, Room, RoomId, ScheduleId, Subject,
    SubjectId, Teacher, TeacherId, TimeSlot, WeekGrid,
};

use crate::error::{DataIntegrityError, LoadError};
use crate::provider::DataProvider;
use crate::slots::{SlotIdx, SlotSet, MAX_SLOTS};

pub type TeacherIdx = usize;
pub type SubjectIdx = usize;
pub type ClassIdx = usize;
pub type RoomIdx = usize;

/// A human-pinned lesson, resolved to arena indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedLesson {
    pub class: ClassIdx,
    pub subject: SubjectIdx,
    pub teacher: TeacherIdx,
    pub room: RoomIdx,
    pub slot: SlotIdx,
}

#[derive(Debug, Clone)]
pub struct SnapshotParts {
    pub schedule_id: ScheduleId,
    /// Version of the currently persisted schedule.
    pub version: u32,
    pub grid: WeekGrid,
    pub teachers: Vec<Teacher>,
    pub subjects: Vec<Subject>,
    pub classes: Vec<ClassGroup>,
    pub rooms: Vec<Room>,
    pub locked: Vec<Assignment>,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub schedule_id: ScheduleId,
    /// Version a successful solve will publish.
    pub next_version: u32,
    pub grid: WeekGrid,
    pub slots: Vec<TimeSlot>,
    pub teachers: Vec<Teacher>,
    pub subjects: Vec<Subject>,
    pub classes: Vec<ClassGroup>,
    pub rooms: Vec<Room>,
    pub locked: Vec<LockedLesson>,
    slot_day: Vec<usize>,
    day_slots: Vec<SlotSet>,
    qualified: Vec<Vec<TeacherIdx>>,
    teacher_avail: Vec<SlotSet>,
    room_avail: Vec<SlotSet>,
    class_avail: Vec<SlotSet>,
    teacher_index: HashMap<TeacherId, TeacherIdx>,
    subject_index: HashMap<SubjectId, SubjectIdx>,
    class_index: HashMap<ClassId, ClassIdx>,
    room_index: HashMap<RoomId, RoomIdx>,
    slot_index: HashMap<TimeSlot, SlotIdx>,
}

impl Snapshot {
    pub async fn load<P>(provider: &P, schedule_id: &ScheduleId) -> Result<Snapshot, LoadError>
    where
        P: DataProvider + ?Sized,
    {
        let parts = SnapshotParts {
            schedule_id: schedule_id.clone(),
            version: provider.load_schedule_version(schedule_id).await?,
            grid: provider.load_grid().await?,
            teachers: provider.load_teachers().await?,
            subjects: provider.load_subjects().await?,
            classes: provider.load_class_groups().await?,
            rooms: provider.load_rooms().await?,
            locked: provider.load_locked_assignments(schedule_id).await?,
        };
        Ok(Snapshot::build(parts)?)
    }

    pub fn build(parts: SnapshotParts) -> Result<Snapshot, DataIntegrityError> {
        let SnapshotParts {
            schedule_id,
            version,
            grid,
            mut teachers,
            mut subjects,
            mut classes,
            mut rooms,
            locked,
        } = parts;
        let mut problems: Vec<String> = Vec::new();

        teachers.sort_by(|a, b| a.id.cmp(&b.id));
        subjects.sort_by(|a, b| a.id.cmp(&b.id));
        classes.sort_by(|a, b| a.id.cmp(&b.id));
        rooms.sort_by(|a, b| a.id.cmp(&b.id));

        chk_unique("teacher", teachers.iter().map(|t| &t.id), &mut problems);
        chk_unique("subject", subjects.iter().map(|s| &s.id), &mut problems);
        chk_unique("class", classes.iter().map(|c| &c.id), &mut problems);
        chk_unique("room", rooms.iter().map(|r| &r.id), &mut problems);

        if !chk_grid(&grid, &mut problems) {
            return Err(DataIntegrityError { problems });
        }

        let slots: Vec<TimeSlot> = grid.slots().collect();
        let mut slot_day = Vec::with_capacity(slots.len());
        let mut day_slots = vec![SlotSet::EMPTY; grid.days.len()];
        for (pos, day) in grid.days.iter().enumerate() {
            for _ in 0..day.periods {
                day_slots[pos].insert(slot_day.len());
                slot_day.push(pos);
            }
        }
        let slot_index: HashMap<TimeSlot, SlotIdx> =
            slots.iter().enumerate().map(|(i, s)| (*s, i)).collect();

        let teacher_index = index_of(teachers.iter().map(|t| &t.id));
        let subject_index = index_of(subjects.iter().map(|s| &s.id));
        let class_index = index_of(classes.iter().map(|c| &c.id));
        let room_index = index_of(rooms.iter().map(|r| &r.id));

        for s in &subjects {
            if s.hours_per_week == 0 {
                problems.push(format!("subject {} has zero weekly hours", s.id));
            }
            if let Some(room) = &s.requires.room {
                if !room_index.contains_key(room) {
                    problems.push(format!("subject {} requires unknown room {}", s.id, room));
                }
            }
        }

        for t in &teachers {
            for cap in &t.capabilities {
                if !subject_index.contains_key(&cap.subject) {
                    problems.push(format!(
                        "teacher {} is capable of unknown subject {}",
                        t.id, cap.subject
                    ));
                }
                if !(1..=10).contains(&cap.proficiency) {
                    problems.push(format!(
                        "teacher {} has proficiency {} for {} (expected 1..=10)",
                        t.id, cap.proficiency, cap.subject
                    ));
                }
            }
            for pref in &t.preferences {
                if !(1..=10).contains(&pref.priority) {
                    problems.push(format!(
                        "teacher {} has a preference with priority {} (expected 1..=10)",
                        t.id, pref.priority
                    ));
                }
            }
        }

        let teacher_avail: Vec<SlotSet> = teachers
            .iter()
            .map(|t| window_set(&slots, &t.availability))
            .collect();
        let room_avail: Vec<SlotSet> = rooms
            .iter()
            .map(|r| window_set(&slots, &r.availability))
            .collect();
        let class_avail: Vec<SlotSet> = classes
            .iter()
            .map(|c| window_set(&slots, &c.availability))
            .collect();

        for (ci, c) in classes.iter().enumerate() {
            let mut seen = HashSet::new();
            let mut total = 0u64;
            for req in &c.requirements {
                let Some(&j) = subject_index.get(&req.subject) else {
                    problems.push(format!(
                        "class {} requires unknown subject {}",
                        c.id, req.subject
                    ));
                    continue;
                };
                if !seen.insert(j) {
                    problems.push(format!("class {} lists subject {} twice", c.id, req.subject));
                }
                let subject = &subjects[j];
                let hours = req.hours_per_week.unwrap_or(subject.hours_per_week);
                if hours == 0 {
                    problems.push(format!(
                        "requirement {} of class {} has zero weekly hours",
                        req.subject, c.id
                    ));
                }
                if req.double_period && subject.max_consecutive.is_some_and(|m| m < 2) {
                    problems.push(format!(
                        "class {} needs double periods of {} but the subject allows at most {} in a row",
                        c.id,
                        req.subject,
                        subject.max_consecutive.unwrap_or(0)
                    ));
                }
                total += u64::from(hours);
            }
            let available = class_avail[ci].len() as u64;
            if total > available {
                problems.push(format!(
                    "class {} needs {} periods a week but is available for {}",
                    c.id, total, available
                ));
            }
        }

        let mut locked_lessons = Vec::with_capacity(locked.len());
        for a in &locked {
            let resolved = (
                class_index.get(&a.class),
                subject_index.get(&a.subject),
                teacher_index.get(&a.teacher),
                room_index.get(&a.room),
                slot_index.get(&a.slot),
            );
            let (Some(&class), Some(&subject), Some(&teacher), Some(&room), Some(&slot)) = resolved
            else {
                problems.push(format!(
                    "locked assignment {}/{} at {} references unknown entities",
                    a.class, a.subject, a.slot
                ));
                continue;
            };
            if teachers[teacher].proficiency(&a.subject).is_none() {
                problems.push(format!(
                    "locked assignment at {} has teacher {} teaching {} without the capability",
                    a.slot, a.teacher, a.subject
                ));
            }
            if !classes[class]
                .requirements
                .iter()
                .any(|r| r.subject == a.subject)
            {
                problems.push(format!(
                    "locked assignment at {} gives class {} subject {} it does not require",
                    a.slot, a.class, a.subject
                ));
            }
            locked_lessons.push(LockedLesson {
                class,
                subject,
                teacher,
                room,
                slot,
            });
        }
        chk_locked(&locked_lessons, &teachers, &classes, &rooms, &slots, &mut problems);

        let mut per_requirement: HashMap<(ClassIdx, SubjectIdx), u32> = HashMap::new();
        for l in &locked_lessons {
            *per_requirement.entry((l.class, l.subject)).or_default() += 1;
        }
        let mut over: Vec<_> = per_requirement.into_iter().collect();
        over.sort_unstable();
        for ((ci, j), n) in over {
            let required = classes[ci]
                .requirements
                .iter()
                .find(|r| r.subject == subjects[j].id)
                .map(|r| r.hours_per_week.unwrap_or(subjects[j].hours_per_week))
                .unwrap_or(0);
            if n > required {
                problems.push(format!(
                    "{} locked lessons of {} for class {} exceed the {} required",
                    n, subjects[j].id, classes[ci].id, required
                ));
            }
        }

        if !problems.is_empty() {
            return Err(DataIntegrityError { problems });
        }

        let qualified: Vec<Vec<TeacherIdx>> = subjects
            .iter()
            .map(|s| {
                let mut q: Vec<(u8, TeacherIdx)> = teachers
                    .iter()
                    .enumerate()
                    .filter_map(|(ti, t)| t.proficiency(&s.id).map(|p| (p, ti)))
                    .collect();
                q.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
                q.into_iter().map(|(_, ti)| ti).collect()
            })
            .collect();

        debug!(
            teachers = teachers.len(),
            subjects = subjects.len(),
            classes = classes.len(),
            rooms = rooms.len(),
            slots = slots.len(),
            locked = locked_lessons.len(),
            "snapshot built"
        );

        Ok(Snapshot {
            schedule_id,
            next_version: version + 1,
            grid,
            slots,
            teachers,
            subjects,
            classes,
            rooms,
            locked: locked_lessons,
            slot_day,
            day_slots,
            qualified,
            teacher_avail,
            room_avail,
            class_avail,
            teacher_index,
            subject_index,
            class_index,
            room_index,
            slot_index,
        })
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn day_count(&self) -> usize {
        self.day_slots.len()
    }

    pub fn day_of(&self, slot: SlotIdx) -> usize {
        self.slot_day[slot]
    }

    pub fn period_of(&self, slot: SlotIdx) -> u8 {
        self.slots[slot].period
    }

    pub fn day_slots(&self, day: usize) -> SlotSet {
        self.day_slots[day]
    }

    pub fn periods_on(&self, day: usize) -> u32 {
        self.day_slots[day].len() as u32
    }

    /// Slots covered by a block of `len` periods starting at `start`, if the
    /// block fits inside one day.
    pub fn block(&self, start: SlotIdx, len: u8) -> Option<SlotSet> {
        let day = *self.slot_day.get(start)?;
        let mut set = SlotSet::EMPTY;
        for k in 0..len as usize {
            let s = start + k;
            if s >= self.slots.len() || self.slot_day[s] != day {
                return None;
            }
            set.insert(s);
        }
        Some(set)
    }

    /// Start slots whose whole `len`-period block lies inside `free`.
    pub fn starts_within(&self, free: SlotSet, len: u8) -> SlotSet {
        let mut starts = free;
        let mut tail = free;
        for _ in 1..len {
            tail = tail.earlier_by_one();
            starts = starts.intersection(tail);
        }
        if len > 1 {
            starts = starts
                .iter()
                .filter(|&s| self.block(s, len).is_some())
                .collect();
        }
        starts
    }

    /// Length of the run of consecutive members of `set` on the same day that
    /// passes through `slot`.
    pub fn run_through(&self, set: SlotSet, slot: SlotIdx) -> u32 {
        if !set.contains(slot) {
            return 0;
        }
        let day = self.slot_day[slot];
        let mut run = 1;
        let mut s = slot;
        while s > 0 && self.slot_day[s - 1] == day && set.contains(s - 1) {
            run += 1;
            s -= 1;
        }
        let mut s = slot + 1;
        while s < self.slots.len() && self.slot_day[s] == day && set.contains(s) {
            run += 1;
            s += 1;
        }
        run
    }

    pub fn longest_run(&self, set: SlotSet) -> u32 {
        let mut best = 0;
        let mut run = 0;
        let mut prev: Option<SlotIdx> = None;
        for s in set.iter() {
            run = match prev {
                Some(p) if p + 1 == s && self.slot_day[p] == self.slot_day[s] => run + 1,
                _ => 1,
            };
            best = best.max(run);
            prev = Some(s);
        }
        best
    }

    pub fn qualified(&self, subject: SubjectIdx) -> &[TeacherIdx] {
        &self.qualified[subject]
    }

    pub fn teacher_available(&self, teacher: TeacherIdx) -> SlotSet {
        self.teacher_avail[teacher]
    }

    pub fn room_available(&self, room: RoomIdx) -> SlotSet {
        self.room_avail[room]
    }

    pub fn class_available(&self, class: ClassIdx) -> SlotSet {
        self.class_avail[class]
    }

    pub fn teacher_idx(&self, id: &TeacherId) -> Option<TeacherIdx> {
        self.teacher_index.get(id).copied()
    }

    pub fn subject_idx(&self, id: &SubjectId) -> Option<SubjectIdx> {
        self.subject_index.get(id).copied()
    }

    pub fn class_idx(&self, id: &ClassId) -> Option<ClassIdx> {
        self.class_index.get(id).copied()
    }

    pub fn room_idx(&self, id: &RoomId) -> Option<RoomIdx> {
        self.room_index.get(id).copied()
    }

    pub fn slot_idx(&self, slot: &TimeSlot) -> Option<SlotIdx> {
        self.slot_index.get(slot).copied()
    }

    pub fn required_hours(&self, class: ClassIdx, subject: SubjectIdx) -> u32 {
        let s = &self.subjects[subject];
        self.classes[class]
            .requirements
            .iter()
            .find(|r| r.subject == s.id)
            .map(|r| r.hours_per_week.unwrap_or(s.hours_per_week))
            .unwrap_or(0)
    }

    pub fn class_hours(&self, class: ClassIdx) -> u32 {
        self.classes[class]
            .requirements
            .iter()
            .filter_map(|r| self.subject_idx(&r.subject))
            .map(|j| self.required_hours(class, j))
            .sum()
    }

    pub fn room_fits(&self, room: RoomIdx, class: ClassIdx, subject: SubjectIdx) -> bool {
        let r = &self.rooms[room];
        r.capacity >= self.classes[class].students && r.satisfies(&self.subjects[subject].requires)
    }

    pub fn to_assignment(
        &self,
        class: ClassIdx,
        subject: SubjectIdx,
        teacher: TeacherIdx,
        room: RoomIdx,
        slot: SlotIdx,
        locked: bool,
    ) -> Assignment {
        Assignment {
            slot: self.slots[slot],
            class: self.classes[class].id.clone(),
            subject: self.subjects[subject].id.clone(),
            teacher: self.teachers[teacher].id.clone(),
            room: self.rooms[room].id.clone(),
            locked,
        }
    }
}

fn chk_unique<'a, I, T>(name: &str, ids: I, problems: &mut Vec<String>)
where
    I: Iterator<Item = &'a T>,
    T: std::fmt::Display + Eq + std::hash::Hash + 'a,
{
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            problems.push(format!("duplicate {name} id: {id}"));
        }
    }
}

fn chk_grid(grid: &WeekGrid, problems: &mut Vec<String>) -> bool {
    let before = problems.len();
    if grid.is_empty() {
        problems.push("grid has no periods".into());
    }
    if grid.len() > MAX_SLOTS {
        problems.push(format!(
            "grid has {} periods, at most {MAX_SLOTS} are supported",
            grid.len()
        ));
    }
    let mut days = HashSet::new();
    for d in &grid.days {
        if !days.insert(d.day) {
            problems.push(format!("grid lists {} twice", d.day));
        }
    }
    problems.len() == before
}

fn chk_locked(
    locked: &[LockedLesson],
    teachers: &[Teacher],
    classes: &[ClassGroup],
    rooms: &[Room],
    slots: &[TimeSlot],
    problems: &mut Vec<String>,
) {
    let mut teacher_busy = HashSet::new();
    let mut room_busy = HashSet::new();
    let mut class_busy = HashSet::new();
    for l in locked {
        if !teacher_busy.insert((l.teacher, l.slot)) {
            problems.push(format!(
                "locked assignments double-book teacher {} at {}",
                teachers[l.teacher].id, slots[l.slot]
            ));
        }
        if !room_busy.insert((l.room, l.slot)) {
            problems.push(format!(
                "locked assignments double-book room {} at {}",
                rooms[l.room].id, slots[l.slot]
            ));
        }
        if !class_busy.insert((l.class, l.slot)) {
            problems.push(format!(
                "locked assignments double-book class {} at {}",
                classes[l.class].id, slots[l.slot]
            ));
        }
    }
}

fn index_of<'a, T>(ids: impl Iterator<Item = &'a T>) -> HashMap<T, usize>
where
    T: Clone + Eq + std::hash::Hash + 'a,
{
    let mut map = HashMap::new();
    for (i, id) in ids.enumerate() {
        map.entry(id.clone()).or_insert(i);
    }
    map
}

fn window_set(slots: &[TimeSlot], windows: &[AvailabilityWindow]) -> SlotSet {
    slots
        .iter()
        .enumerate()
        .filter(|(_, s)| AvailabilityWindow::admits(windows, **s))
        .map(|(i, _)| i)
        .collect()
}
