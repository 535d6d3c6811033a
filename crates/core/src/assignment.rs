use crate::model::{Model, UnitIdx};
use crate::slots::{SlotIdx, SlotSet};
use crate::snapshot::{ClassIdx, RoomIdx, SubjectIdx, TeacherIdx};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub start: SlotIdx,
    pub teacher: TeacherIdx,
    pub room: RoomIdx,
}

#[derive(Debug, Clone, Default)]
struct Occupancy {
    slots: usize,
    counts: Vec<u8>,
    busy: Vec<SlotSet>,
    clashes: u32,
}

impl Occupancy {
    fn new(entities: usize, slots: usize) -> Self {
        Self {
            slots,
            counts: vec![0; entities * slots],
            busy: vec![SlotSet::EMPTY; entities],
            clashes: 0,
        }
    }

    fn add(&mut self, entity: usize, slot: SlotIdx) {
        let c = &mut self.counts[entity * self.slots + slot];
        *c = c.saturating_add(1);
        if *c > 1 {
            self.clashes += 1;
        }
        self.busy[entity].insert(slot);
    }

    fn remove(&mut self, entity: usize, slot: SlotIdx) {
        let c = &mut self.counts[entity * self.slots + slot];
        if *c > 1 {
            self.clashes -= 1;
        }
        *c = c.saturating_sub(1);
        if *c == 0 {
            self.busy[entity].remove(slot);
        }
    }

    fn count(&self, entity: usize, slot: SlotIdx) -> u8 {
        self.counts[entity * self.slots + slot]
    }
}

#[derive(Debug, Clone)]
pub struct PartialAssignment {
    placements: Vec<Option<Placement>>,
    assigned: usize,
    days: usize,
    subjects: usize,
    teachers: Occupancy,
    rooms: Occupancy,
    classes: Occupancy,
    teacher_day: Vec<u32>,
    teacher_week: Vec<u32>,
    requirement_slots: Vec<SlotSet>,
}

impl PartialAssignment {
    pub fn new(model: &Model<'_>) -> Self {
        let snap = model.snapshot;
        let n = snap.slot_count();
        let mut asg = PartialAssignment {
            placements: vec![None; model.unit_count()],
            assigned: 0,
            days: snap.day_count(),
            subjects: snap.subjects.len(),
            teachers: Occupancy::new(snap.teachers.len(), n),
            rooms: Occupancy::new(snap.rooms.len(), n),
            classes: Occupancy::new(snap.classes.len(), n),
            teacher_day: vec![0; snap.teachers.len() * snap.day_count()],
            teacher_week: vec![0; snap.teachers.len()],
            requirement_slots: vec![SlotSet::EMPTY; snap.classes.len() * snap.subjects.len()],
        };
        for l in &snap.locked {
            asg.occupy(model, l.class, l.subject, l.teacher, l.room, l.slot);
        }
        asg
    }

    pub fn from_placements(model: &Model<'_>, placements: &[Option<Placement>]) -> Self {
        let mut asg = Self::new(model);
        for (u, p) in placements.iter().enumerate() {
            if let Some(p) = p {
                asg.assign(model, u, *p);
            }
        }
        asg
    }

    pub fn assign(&mut self, model: &Model<'_>, unit: UnitIdx, p: Placement) {
        if let Some(old) = self.placements[unit] {
            self.release(model, unit, old);
        } else {
            self.assigned += 1;
        }
        let u = &model.units[unit];
        for slot in model.footprint(unit, p.start).iter() {
            self.occupy(model, u.class, u.subject, p.teacher, p.room, slot);
        }
        self.placements[unit] = Some(p);
    }

    pub fn unassign(&mut self, model: &Model<'_>, unit: UnitIdx) -> Option<Placement> {
        let old = self.placements[unit].take()?;
        self.assigned -= 1;
        self.release(model, unit, old);
        Some(old)
    }

    fn release(&mut self, model: &Model<'_>, unit: UnitIdx, p: Placement) {
        let u = &model.units[unit];
        for slot in model.footprint(unit, p.start).iter() {
            self.vacate(model, u.class, u.subject, p.teacher, p.room, slot);
        }
    }

    fn occupy(
        &mut self,
        model: &Model<'_>,
        class: ClassIdx,
        subject: SubjectIdx,
        teacher: TeacherIdx,
        room: RoomIdx,
        slot: SlotIdx,
    ) {
        let day = model.snapshot.day_of(slot);
        self.teachers.add(teacher, slot);
        self.rooms.add(room, slot);
        self.classes.add(class, slot);
        self.teacher_day[teacher * self.days + day] += 1;
        self.teacher_week[teacher] += 1;
        self.requirement_slots[class * self.subjects + subject].insert(slot);
    }

    fn vacate(
        &mut self,
        model: &Model<'_>,
        class: ClassIdx,
        subject: SubjectIdx,
        teacher: TeacherIdx,
        room: RoomIdx,
        slot: SlotIdx,
    ) {
        let day = model.snapshot.day_of(slot);
        self.teachers.remove(teacher, slot);
        self.rooms.remove(room, slot);
        self.classes.remove(class, slot);
        self.teacher_day[teacher * self.days + day] -= 1;
        self.teacher_week[teacher] -= 1;
        self.requirement_slots[class * self.subjects + subject].remove(slot);
    }

    pub fn placement(&self, unit: UnitIdx) -> Option<Placement> {
        self.placements[unit]
    }

    pub fn placements(&self) -> &[Option<Placement>] {
        &self.placements
    }

    pub fn assigned_count(&self) -> usize {
        self.assigned
    }

    pub fn is_complete(&self) -> bool {
        self.assigned == self.placements.len()
    }

    pub fn unassigned(&self) -> impl Iterator<Item = UnitIdx> + '_ {
        self.placements
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_none())
            .map(|(u, _)| u)
    }

    pub fn teacher_busy(&self, teacher: TeacherIdx) -> SlotSet {
        self.teachers.busy[teacher]
    }

    pub fn room_busy(&self, room: RoomIdx) -> SlotSet {
        self.rooms.busy[room]
    }

    pub fn class_busy(&self, class: ClassIdx) -> SlotSet {
        self.classes.busy[class]
    }

    pub fn teacher_count(&self, teacher: TeacherIdx, slot: SlotIdx) -> u8 {
        self.teachers.count(teacher, slot)
    }

    pub fn room_count(&self, room: RoomIdx, slot: SlotIdx) -> u8 {
        self.rooms.count(room, slot)
    }

    pub fn class_count(&self, class: ClassIdx, slot: SlotIdx) -> u8 {
        self.classes.count(class, slot)
    }

    pub fn teacher_clashes(&self) -> u32 {
        self.teachers.clashes
    }

    pub fn room_clashes(&self) -> u32 {
        self.rooms.clashes
    }

    pub fn class_clashes(&self) -> u32 {
        self.classes.clashes
    }

    pub fn teacher_day_hours(&self, teacher: TeacherIdx, day: usize) -> u32 {
        self.teacher_day[teacher * self.days + day]
    }

    pub fn teacher_week_hours(&self, teacher: TeacherIdx) -> u32 {
        self.teacher_week[teacher]
    }

    /// Slots where the class is taught the subject, locked lessons included.
    pub fn requirement_slots(&self, class: ClassIdx, subject: SubjectIdx) -> SlotSet {
        self.requirement_slots[class * self.subjects + subject]
    }
}
