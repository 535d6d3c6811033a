use types::{ConstraintId, ConstraintViolation, EntityRef, Severity};

use super::{
    requirements, Constraint, Strength, CLASS_GAPS, CLASS_SPREAD, DEMANDING_MORNING,
    TEACHER_CONTINUITY, TEACHER_GAPS, TEACHER_LOAD_BALANCE, TEACHER_PREFERENCES,
};
use crate::assignment::{PartialAssignment, Placement};
use crate::model::{Model, UnitIdx};
use crate::slots::{SlotIdx, SlotSet};
use crate::snapshot::{ClassIdx, Snapshot, SubjectIdx, TeacherIdx};

fn violation(
    id: &str,
    weight: u32,
    raw: f64,
    entities: Vec<EntityRef>,
    description: String,
) -> ConstraintViolation {
    ConstraintViolation {
        constraint: ConstraintId::new(id),
        severity: Severity::from_weight(weight),
        entities,
        penalty: raw * weight as f64,
        description,
    }
}

fn gaps_on(day: SlotSet) -> u32 {
    match (day.first(), day.last()) {
        (Some(f), Some(l)) => (l - f + 1) as u32 - day.len() as u32,
        _ => 0,
    }
}

fn gap_delta(snap: &Snapshot, busy: SlotSet, block: SlotSet, start: SlotIdx) -> f64 {
    let day = snap.day_slots(snap.day_of(start));
    let before = gaps_on(busy.intersection(day));
    let after = gaps_on(busy.union(block).intersection(day));
    after as f64 - before as f64
}

#[derive(Debug, Clone, Copy)]
pub struct TeacherGaps {
    weight: u32,
}

impl TeacherGaps {
    pub fn new(weight: u32) -> Self {
        Self { weight }
    }

    fn factor(snap: &Snapshot, t: TeacherIdx) -> u32 {
        if snap.teachers[t].prefers_consecutive {
            2
        } else {
            1
        }
    }
}

impl Constraint for TeacherGaps {
    fn id(&self) -> &'static str {
        TEACHER_GAPS
    }

    fn strength(&self) -> Strength {
        Strength::Soft {
            weight: self.weight,
        }
    }

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool {
        self.penalty(model, asg) == 0.0
    }

    fn penalty(&self, model: &Model<'_>, asg: &PartialAssignment) -> f64 {
        let snap = model.snapshot;
        let raw: u32 = (0..snap.teachers.len())
            .map(|t| {
                let busy = asg.teacher_busy(t);
                let gaps: u32 = (0..snap.day_count())
                    .map(|d| gaps_on(busy.intersection(snap.day_slots(d))))
                    .sum();
                gaps * Self::factor(snap, t)
            })
            .sum();
        raw as f64 * self.weight as f64
    }

    fn placement_cost(
        &self,
        model: &Model<'_>,
        asg: &PartialAssignment,
        unit: UnitIdx,
        p: Placement,
    ) -> f64 {
        let snap = model.snapshot;
        let block = model.footprint(unit, p.start);
        let delta = gap_delta(snap, asg.teacher_busy(p.teacher), block, p.start);
        delta * Self::factor(snap, p.teacher) as f64 * self.weight as f64
    }

    fn violations(&self, model: &Model<'_>, asg: &PartialAssignment) -> Vec<ConstraintViolation> {
        let snap = model.snapshot;
        let mut out = Vec::new();
        for (t, teacher) in snap.teachers.iter().enumerate() {
            for d in 0..snap.day_count() {
                let gaps = gaps_on(asg.teacher_busy(t).intersection(snap.day_slots(d)));
                if gaps == 0 {
                    continue;
                }
                out.push(violation(
                    TEACHER_GAPS,
                    self.weight,
                    (gaps * Self::factor(snap, t)) as f64,
                    vec![EntityRef::Teacher(teacher.id.clone())],
                    format!(
                        "teacher {} has {} idle period(s) on {}",
                        teacher.id, gaps, snap.grid.days[d].day
                    ),
                ));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClassGaps {
    weight: u32,
}

impl ClassGaps {
    pub fn new(weight: u32) -> Self {
        Self { weight }
    }
}

impl Constraint for ClassGaps {
    fn id(&self) -> &'static str {
        CLASS_GAPS
    }

    fn strength(&self) -> Strength {
        Strength::Soft {
            weight: self.weight,
        }
    }

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool {
        self.penalty(model, asg) == 0.0
    }

    fn penalty(&self, model: &Model<'_>, asg: &PartialAssignment) -> f64 {
        let snap = model.snapshot;
        let raw: u32 = (0..snap.classes.len())
            .flat_map(|c| (0..snap.day_count()).map(move |d| (c, d)))
            .map(|(c, d)| gaps_on(asg.class_busy(c).intersection(snap.day_slots(d))))
            .sum();
        raw as f64 * self.weight as f64
    }

    fn placement_cost(
        &self,
        model: &Model<'_>,
        asg: &PartialAssignment,
        unit: UnitIdx,
        p: Placement,
    ) -> f64 {
        let class = model.units[unit].class;
        let block = model.footprint(unit, p.start);
        gap_delta(model.snapshot, asg.class_busy(class), block, p.start) * self.weight as f64
    }

    fn violations(&self, model: &Model<'_>, asg: &PartialAssignment) -> Vec<ConstraintViolation> {
        let snap = model.snapshot;
        let mut out = Vec::new();
        for (c, class) in snap.classes.iter().enumerate() {
            for d in 0..snap.day_count() {
                let gaps = gaps_on(asg.class_busy(c).intersection(snap.day_slots(d)));
                if gaps > 0 {
                    out.push(violation(
                        CLASS_GAPS,
                        self.weight,
                        gaps as f64,
                        vec![EntityRef::Class(class.id.clone())],
                        format!(
                            "class {} has {} free period(s) inside {}",
                            class.id, gaps, snap.grid.days[d].day
                        ),
                    ));
                }
            }
        }
        out
    }
}

/// Demanding subjects belong in the morning; each afternoon period costs more
/// the later it is.
#[derive(Debug, Clone, Copy)]
pub struct DemandingMorning {
    weight: u32,
}

impl DemandingMorning {
    pub fn new(weight: u32) -> Self {
        Self { weight }
    }

    fn lateness(snap: &Snapshot, slot: SlotIdx) -> u32 {
        let from = snap.grid.afternoon_from;
        let period = snap.period_of(slot);
        if period >= from {
            (period - from + 1) as u32
        } else {
            0
        }
    }

    fn demanding<'a>(
        model: &'a Model<'_>,
    ) -> impl Iterator<Item = (ClassIdx, SubjectIdx)> + 'a {
        let snap: &'a Snapshot = model.snapshot;
        requirements(model).filter(move |&(_, j)| snap.subjects[j].demanding)
    }
}

impl Constraint for DemandingMorning {
    fn id(&self) -> &'static str {
        DEMANDING_MORNING
    }

    fn strength(&self) -> Strength {
        Strength::Soft {
            weight: self.weight,
        }
    }

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool {
        self.penalty(model, asg) == 0.0
    }

    fn penalty(&self, model: &Model<'_>, asg: &PartialAssignment) -> f64 {
        let snap = model.snapshot;
        let raw: u32 = Self::demanding(model)
            .flat_map(|(c, j)| asg.requirement_slots(c, j).iter())
            .map(|s| Self::lateness(snap, s))
            .sum();
        raw as f64 * self.weight as f64
    }

    fn placement_cost(
        &self,
        model: &Model<'_>,
        _asg: &PartialAssignment,
        unit: UnitIdx,
        p: Placement,
    ) -> f64 {
        let snap = model.snapshot;
        if !snap.subjects[model.units[unit].subject].demanding {
            return 0.0;
        }
        let raw: u32 = model
            .footprint(unit, p.start)
            .iter()
            .map(|s| Self::lateness(snap, s))
            .sum();
        raw as f64 * self.weight as f64
    }

    fn violations(&self, model: &Model<'_>, asg: &PartialAssignment) -> Vec<ConstraintViolation> {
        let snap = model.snapshot;
        let mut out = Vec::new();
        for (c, j) in Self::demanding(model) {
            for s in asg.requirement_slots(c, j).iter() {
                let late = Self::lateness(snap, s);
                if late == 0 {
                    continue;
                }
                out.push(violation(
                    DEMANDING_MORNING,
                    self.weight,
                    late as f64,
                    vec![
                        EntityRef::Class(snap.classes[c].id.clone()),
                        EntityRef::Subject(snap.subjects[j].id.clone()),
                        EntityRef::Slot(snap.slots[s]),
                    ],
                    format!(
                        "{} for class {} is taught in the afternoon at {}",
                        snap.subjects[j].id, snap.classes[c].id, snap.slots[s]
                    ),
                ));
            }
        }
        out
    }
}

/// For each demanded subject with at least two qualified teachers, the
/// absolute deviation of those teachers' weekly loads from their mean.
#[derive(Debug, Clone, Copy)]
pub struct TeacherLoadBalance {
    weight: u32,
}

impl TeacherLoadBalance {
    pub fn new(weight: u32) -> Self {
        Self { weight }
    }

    fn balanced(model: &Model<'_>, j: SubjectIdx) -> bool {
        model.is_demanded(j) && model.snapshot.qualified(j).len() >= 2
    }

    fn deviation(loads: impl Iterator<Item = u32> + Clone) -> f64 {
        let n = loads.clone().count();
        if n == 0 {
            return 0.0;
        }
        let mean = loads.clone().sum::<u32>() as f64 / n as f64;
        loads.map(|l| (l as f64 - mean).abs()).sum()
    }

    fn subject_deviation(
        model: &Model<'_>,
        asg: &PartialAssignment,
        j: SubjectIdx,
        extra: Option<(TeacherIdx, u32)>,
    ) -> f64 {
        let loads = model.snapshot.qualified(j).iter().map(move |&t| {
            let bonus = match extra {
                Some((who, hours)) if who == t => hours,
                _ => 0,
            };
            asg.teacher_week_hours(t) + bonus
        });
        Self::deviation(loads)
    }
}

impl Constraint for TeacherLoadBalance {
    fn id(&self) -> &'static str {
        TEACHER_LOAD_BALANCE
    }

    fn strength(&self) -> Strength {
        Strength::Soft {
            weight: self.weight,
        }
    }

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool {
        self.penalty(model, asg) == 0.0
    }

    fn penalty(&self, model: &Model<'_>, asg: &PartialAssignment) -> f64 {
        let raw: f64 = (0..model.snapshot.subjects.len())
            .filter(|&j| Self::balanced(model, j))
            .map(|j| Self::subject_deviation(model, asg, j, None))
            .sum();
        raw * self.weight as f64
    }

    fn placement_cost(
        &self,
        model: &Model<'_>,
        asg: &PartialAssignment,
        unit: UnitIdx,
        p: Placement,
    ) -> f64 {
        let snap = model.snapshot;
        let hours = model.units[unit].len as u32;
        let delta: f64 = snap.teachers[p.teacher]
            .capabilities
            .iter()
            .filter_map(|cap| snap.subject_idx(&cap.subject))
            .filter(|&j| Self::balanced(model, j))
            .map(|j| {
                Self::subject_deviation(model, asg, j, Some((p.teacher, hours)))
                    - Self::subject_deviation(model, asg, j, None)
            })
            .sum();
        delta * self.weight as f64
    }

    fn violations(&self, model: &Model<'_>, asg: &PartialAssignment) -> Vec<ConstraintViolation> {
        let snap = model.snapshot;
        let mut out = Vec::new();
        for j in (0..snap.subjects.len()).filter(|&j| Self::balanced(model, j)) {
            let dev = Self::subject_deviation(model, asg, j, None);
            if dev <= f64::EPSILON {
                continue;
            }
            let mut entities = vec![EntityRef::Subject(snap.subjects[j].id.clone())];
            entities.extend(
                snap.qualified(j)
                    .iter()
                    .map(|&t| EntityRef::Teacher(snap.teachers[t].id.clone())),
            );
            out.push(violation(
                TEACHER_LOAD_BALANCE,
                self.weight,
                dev,
                entities,
                format!(
                    "weekly loads of teachers qualified for {} deviate by {:.1} in total",
                    snap.subjects[j].id, dev
                ),
            ));
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TeacherPreferences {
    weight: u32,
}

impl TeacherPreferences {
    pub fn new(weight: u32) -> Self {
        Self { weight }
    }

    /// Summed priority of the teacher's preferences broken by teaching at `slot`.
    fn cost_at(snap: &Snapshot, t: TeacherIdx, slot: SlotIdx) -> u32 {
        snap.teachers[t]
            .preferences
            .iter()
            .filter(|p| p.rule.is_broken_by(snap.slots[slot]))
            .map(|p| p.priority as u32)
            .sum()
    }
}

impl Constraint for TeacherPreferences {
    fn id(&self) -> &'static str {
        TEACHER_PREFERENCES
    }

    fn strength(&self) -> Strength {
        Strength::Soft {
            weight: self.weight,
        }
    }

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool {
        self.penalty(model, asg) == 0.0
    }

    fn penalty(&self, model: &Model<'_>, asg: &PartialAssignment) -> f64 {
        let snap = model.snapshot;
        let raw: u32 = (0..snap.teachers.len())
            .flat_map(|t| asg.teacher_busy(t).iter().map(move |s| (t, s)))
            .map(|(t, s)| Self::cost_at(snap, t, s))
            .sum();
        raw as f64 * self.weight as f64
    }

    fn placement_cost(
        &self,
        model: &Model<'_>,
        _asg: &PartialAssignment,
        unit: UnitIdx,
        p: Placement,
    ) -> f64 {
        let raw: u32 = model
            .footprint(unit, p.start)
            .iter()
            .map(|s| Self::cost_at(model.snapshot, p.teacher, s))
            .sum();
        raw as f64 * self.weight as f64
    }

    fn violations(&self, model: &Model<'_>, asg: &PartialAssignment) -> Vec<ConstraintViolation> {
        let snap = model.snapshot;
        let mut out = Vec::new();
        for (t, teacher) in snap.teachers.iter().enumerate() {
            for s in asg.teacher_busy(t).iter() {
                let cost = Self::cost_at(snap, t, s);
                if cost == 0 {
                    continue;
                }
                out.push(violation(
                    TEACHER_PREFERENCES,
                    self.weight,
                    cost as f64,
                    vec![
                        EntityRef::Teacher(teacher.id.clone()),
                        EntityRef::Slot(snap.slots[s]),
                    ],
                    format!("teacher {} teaches at {} against a preference", teacher.id, snap.slots[s]),
                ));
            }
        }
        out
    }
}

/// Even daily load per class, and lessons of one subject spread over the week.
#[derive(Debug, Clone, Copy)]
pub struct ClassSpread {
    weight: u32,
}

impl ClassSpread {
    pub fn new(weight: u32) -> Self {
        Self { weight }
    }

    fn blocks_on(day: SlotSet) -> u32 {
        day.difference(day.later_by_one()).len() as u32
    }

    fn excess(
        model: &Model<'_>,
        asg: &PartialAssignment,
        c: ClassIdx,
        extra: Option<(SubjectIdx, SlotSet)>,
    ) -> u32 {
        let snap = model.snapshot;
        let total = snap.class_hours(c) as usize;
        let n = snap.slot_count();
        let days = snap.day_count();
        let extra_slots = extra.map_or(SlotSet::EMPTY, |(_, b)| b);
        let busy = asg.class_busy(c).union(extra_slots);

        let mut excess = 0;
        for d in 0..days {
            let periods = snap.periods_on(d) as usize;
            let ideal = (total * periods).div_ceil(n) as u32;
            let load = busy.intersection(snap.day_slots(d)).len() as u32;
            excess += load.saturating_sub(ideal);
        }

        for req in &snap.classes[c].requirements {
            let Some(j) = snap.subject_idx(&req.subject) else {
                continue;
            };
            let mut set = asg.requirement_slots(c, j);
            if let Some((sj, block)) = extra {
                if sj == j {
                    set = set.union(block);
                }
            }
            let blocks = model.units_of_requirement(c, j).len()
                + model.locked_of_requirement(c, j).len();
            let cap = blocks.div_ceil(days) as u32;
            for d in 0..days {
                excess += Self::blocks_on(set.intersection(snap.day_slots(d))).saturating_sub(cap);
            }
        }
        excess
    }
}

impl Constraint for ClassSpread {
    fn id(&self) -> &'static str {
        CLASS_SPREAD
    }

    fn strength(&self) -> Strength {
        Strength::Soft {
            weight: self.weight,
        }
    }

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool {
        self.penalty(model, asg) == 0.0
    }

    fn penalty(&self, model: &Model<'_>, asg: &PartialAssignment) -> f64 {
        let raw: u32 = (0..model.snapshot.classes.len())
            .map(|c| Self::excess(model, asg, c, None))
            .sum();
        raw as f64 * self.weight as f64
    }

    fn placement_cost(
        &self,
        model: &Model<'_>,
        asg: &PartialAssignment,
        unit: UnitIdx,
        p: Placement,
    ) -> f64 {
        let u = &model.units[unit];
        let block = model.footprint(unit, p.start);
        let after = Self::excess(model, asg, u.class, Some((u.subject, block)));
        let before = Self::excess(model, asg, u.class, None);
        (after as f64 - before as f64) * self.weight as f64
    }

    fn violations(&self, model: &Model<'_>, asg: &PartialAssignment) -> Vec<ConstraintViolation> {
        let snap = model.snapshot;
        (0..snap.classes.len())
            .filter_map(|c| {
                let excess = Self::excess(model, asg, c, None);
                (excess > 0).then(|| {
                    violation(
                        CLASS_SPREAD,
                        self.weight,
                        excess as f64,
                        vec![EntityRef::Class(snap.classes[c].id.clone())],
                        format!(
                            "class {} has {} lesson(s) bunched beyond an even spread",
                            snap.classes[c].id, excess
                        ),
                    )
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TeacherContinuity {
    weight: u32,
}

impl TeacherContinuity {
    pub fn new(weight: u32) -> Self {
        Self { weight }
    }

    fn teachers_of(
        model: &Model<'_>,
        asg: &PartialAssignment,
        c: ClassIdx,
        j: SubjectIdx,
    ) -> Vec<TeacherIdx> {
        let snap = model.snapshot;
        let mut teachers: Vec<TeacherIdx> = model
            .units_of_requirement(c, j)
            .iter()
            .filter_map(|&u| asg.placement(u).map(|p| p.teacher))
            .chain(
                model
                    .locked_of_requirement(c, j)
                    .iter()
                    .map(|&l| snap.locked[l].teacher),
            )
            .collect();
        teachers.sort_unstable();
        teachers.dedup();
        teachers
    }
}

impl Constraint for TeacherContinuity {
    fn id(&self) -> &'static str {
        TEACHER_CONTINUITY
    }

    fn strength(&self) -> Strength {
        Strength::Soft {
            weight: self.weight,
        }
    }

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool {
        self.penalty(model, asg) == 0.0
    }

    fn penalty(&self, model: &Model<'_>, asg: &PartialAssignment) -> f64 {
        let raw: usize = requirements(model)
            .map(|(c, j)| Self::teachers_of(model, asg, c, j).len().saturating_sub(1))
            .sum();
        raw as f64 * self.weight as f64
    }

    fn placement_cost(
        &self,
        model: &Model<'_>,
        asg: &PartialAssignment,
        unit: UnitIdx,
        p: Placement,
    ) -> f64 {
        let u = &model.units[unit];
        let current = Self::teachers_of(model, asg, u.class, u.subject);
        if current.is_empty() || current.contains(&p.teacher) {
            0.0
        } else {
            self.weight as f64
        }
    }

    fn violations(&self, model: &Model<'_>, asg: &PartialAssignment) -> Vec<ConstraintViolation> {
        let snap = model.snapshot;
        let mut out = Vec::new();
        for (c, j) in requirements(model) {
            let teachers = Self::teachers_of(model, asg, c, j);
            if teachers.len() < 2 {
                continue;
            }
            let mut entities = vec![
                EntityRef::Class(snap.classes[c].id.clone()),
                EntityRef::Subject(snap.subjects[j].id.clone()),
            ];
            entities.extend(
                teachers
                    .iter()
                    .map(|&t| EntityRef::Teacher(snap.teachers[t].id.clone())),
            );
            out.push(violation(
                TEACHER_CONTINUITY,
                self.weight,
                (teachers.len() - 1) as f64,
                entities,
                format!(
                    "{} for class {} is split across {} teachers",
                    snap.subjects[j].id,
                    snap.classes[c].id,
                    teachers.len()
                ),
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotParts;
    use types::{
        ClassGroup, DayOfWeek, PreferenceRule, Requirement, Room, ScheduleId, Subject, Teacher,
        TeacherPreference, WeekGrid,
    };

    fn at(start: SlotIdx, teacher: TeacherIdx) -> Placement {
        Placement {
            start,
            teacher,
            room: 0,
        }
    }

    fn snapshot(subject: Subject, teachers: Vec<Teacher>) -> Snapshot {
        Snapshot::build(SnapshotParts {
            schedule_id: ScheduleId::new("s"),
            version: 0,
            grid: WeekGrid::uniform(&[DayOfWeek::Mon, DayOfWeek::Tue], 6).with_afternoon_from(4),
            teachers,
            subjects: vec![subject],
            classes: vec![ClassGroup::new("7a", 20).needs(Requirement::new("math"))],
            rooms: vec![Room::new("r1", 30)],
            locked: vec![],
        })
        .unwrap()
    }

    #[test]
    fn gaps_count_idle_periods_inside_a_day() {
        let mut teacher = Teacher::new("t1").teaching("math");
        teacher.prefers_consecutive = true;
        let snap = snapshot(Subject::new("math", 2), vec![teacher]);
        let model = Model::build(&snap).unwrap();
        let mut asg = PartialAssignment::new(&model);
        asg.assign(&model, 0, at(0, 0));
        assert_eq!(TeacherGaps::new(3).placement_cost(&model, &asg, 1, at(3, 0)), 12.0);
        asg.assign(&model, 1, at(3, 0));
        assert_eq!(TeacherGaps::new(3).penalty(&model, &asg), 12.0);
        assert_eq!(ClassGaps::new(1).penalty(&model, &asg), 2.0);
        let v = ClassGaps::new(1).violations(&model, &asg);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].description, "class 7a has 2 free period(s) inside mon");
    }

    #[test]
    fn afternoon_lessons_of_demanding_subjects_cost_lateness() {
        let subject = Subject {
            demanding: true,
            ..Subject::new("math", 2)
        };
        let snap = snapshot(subject, vec![Teacher::new("t1").teaching("math")]);
        let model = Model::build(&snap).unwrap();
        let mut asg = PartialAssignment::new(&model);
        asg.assign(&model, 0, at(3, 0));
        asg.assign(&model, 1, at(5, 0));
        // periods 3 and 5 with afternoon from 4: 0 + 2
        let c = DemandingMorning::new(2);
        assert_eq!(c.penalty(&model, &asg), 4.0);
        assert_eq!(c.violations(&model, &asg).len(), 1);
        assert_eq!(c.placement_cost(&model, &asg, 0, at(4, 0)), 2.0);
    }

    #[test]
    fn broken_preferences_cost_their_priority() {
        let mut teacher = Teacher::new("t1").teaching("math");
        teacher.preferences = vec![TeacherPreference {
            rule: PreferenceRule::AvoidDay {
                day: DayOfWeek::Tue,
            },
            priority: 7,
        }];
        let snap = snapshot(Subject::new("math", 2), vec![teacher]);
        let model = Model::build(&snap).unwrap();
        let mut asg = PartialAssignment::new(&model);
        asg.assign(&model, 0, at(0, 0));
        asg.assign(&model, 1, at(6, 0));
        assert_eq!(TeacherPreferences::new(1).penalty(&model, &asg), 7.0);
        assert_eq!(
            TeacherPreferences::new(2).placement_cost(&model, &asg, 1, at(7, 0)),
            14.0
        );
    }

    #[test]
    fn continuity_and_balance_look_at_who_teaches() {
        let snap = snapshot(
            Subject::new("math", 2),
            vec![
                Teacher::new("t1").teaching("math"),
                Teacher::new("t2").teaching("math"),
            ],
        );
        let model = Model::build(&snap).unwrap();
        let mut asg = PartialAssignment::new(&model);
        asg.assign(&model, 0, at(0, 0));
        asg.assign(&model, 1, at(1, 0));
        // loads 2 and 0, mean 1
        assert_eq!(TeacherLoadBalance::new(1).penalty(&model, &asg), 2.0);
        assert_eq!(TeacherContinuity::new(5).penalty(&model, &asg), 0.0);

        asg.assign(&model, 1, at(1, 1));
        assert_eq!(TeacherLoadBalance::new(1).penalty(&model, &asg), 0.0);
        assert_eq!(TeacherContinuity::new(5).penalty(&model, &asg), 5.0);
        let v = TeacherContinuity::new(5).violations(&model, &asg);
        assert_eq!(v[0].entities.len(), 4);
        assert_eq!(v[0].severity, Severity::Medium);
    }

    #[test]
    fn spread_penalizes_bunched_days() {
        let snap = snapshot(Subject::new("math", 4), vec![Teacher::new("t1").teaching("math")]);
        let model = Model::build(&snap).unwrap();
        let mut asg = PartialAssignment::new(&model);
        for (u, s) in [0, 1, 2, 3].into_iter().enumerate() {
            asg.assign(&model, u, at(s, 0));
        }
        // 4 hours on a 6+6 grid: ideal 2 a day, so 2 extra on monday; one
        // run on monday is within the cap of 2 blocks a day
        assert_eq!(ClassSpread::new(1).penalty(&model, &asg), 2.0);

        let mut asg = PartialAssignment::new(&model);
        for (u, s) in [0, 2, 6, 8].into_iter().enumerate() {
            asg.assign(&model, u, at(s, 0));
        }
        assert_eq!(ClassSpread::new(1).penalty(&model, &asg), 0.0);
    }
}
