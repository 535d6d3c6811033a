//! Hard rules gate placements during search. Soft rules are weighted and
//! scored; they also provide value-ordering hints through [`Constraint::placement_cost`].

mod hard;
mod soft;

use std::fmt;
use tracing::{debug, warn};
use types::{ConstraintViolation, ConstraintWeights};

use crate::assignment::{PartialAssignment, Placement};
use crate::model::{Model, UnitIdx};
use crate::snapshot::{ClassIdx, Snapshot, SubjectIdx};

pub use hard::{
    ClassClash, DoublePeriod, RoomClash, SubjectDailyCap, SubjectMaxConsecutive, TeacherClash,
    TeacherDailyCap, TeacherWeeklyCap, WithinDomain,
};
pub use soft::{
    ClassGaps, ClassSpread, DemandingMorning, TeacherContinuity, TeacherGaps, TeacherLoadBalance,
    TeacherPreferences,
};

pub const TEACHER_CLASH: &str = "teacher_clash";
pub const ROOM_CLASH: &str = "room_clash";
pub const CLASS_CLASH: &str = "class_clash";
pub const WITHIN_DOMAIN: &str = "within_domain";
pub const DOUBLE_PERIOD: &str = "double_period";
pub const TEACHER_DAILY_CAP: &str = "teacher_daily_cap";
pub const TEACHER_WEEKLY_CAP: &str = "teacher_weekly_cap";
pub const SUBJECT_DAILY_CAP: &str = "subject_daily_cap";
pub const SUBJECT_MAX_CONSECUTIVE: &str = "subject_max_consecutive";

pub const TEACHER_GAPS: &str = "teacher_gaps";
pub const CLASS_GAPS: &str = "class_gaps";
pub const DEMANDING_MORNING: &str = "demanding_morning";
pub const TEACHER_LOAD_BALANCE: &str = "teacher_load_balance";
pub const TEACHER_PREFERENCES: &str = "teacher_preferences";
pub const CLASS_SPREAD: &str = "class_spread";
pub const TEACHER_CONTINUITY: &str = "teacher_continuity";

pub const SOFT_CONSTRAINTS: [&str; 7] = [
    TEACHER_GAPS,
    CLASS_GAPS,
    DEMANDING_MORNING,
    TEACHER_LOAD_BALANCE,
    TEACHER_PREFERENCES,
    CLASS_SPREAD,
    TEACHER_CONTINUITY,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Hard,
    Soft { weight: u32 },
}

pub trait Constraint: fmt::Debug + Send + Sync {
    fn id(&self) -> &'static str;

    fn strength(&self) -> Strength;

    fn is_satisfied(&self, model: &Model<'_>, asg: &PartialAssignment) -> bool;

    /// Focused check after `unit` was just placed; the rest of `asg` is known
    /// to satisfy the rule.
    fn is_satisfied_after(&self, model: &Model<'_>, asg: &PartialAssignment, unit: UnitIdx) -> bool {
        let _ = unit;
        self.is_satisfied(model, asg)
    }

    fn penalty(&self, _model: &Model<'_>, _asg: &PartialAssignment) -> f64 {
        0.0
    }

    /// Estimated change in penalty if `unit` were placed at `p`.
    fn placement_cost(
        &self,
        _model: &Model<'_>,
        _asg: &PartialAssignment,
        _unit: UnitIdx,
        _p: Placement,
    ) -> f64 {
        0.0
    }

    fn violations(&self, _model: &Model<'_>, _asg: &PartialAssignment) -> Vec<ConstraintViolation> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    constraints: Vec<Box<dyn Constraint>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every hard rule, plus each soft rule whose weight is positive.
    pub fn standard(weights: &ConstraintWeights) -> Self {
        for id in weights.0.keys() {
            if !SOFT_CONSTRAINTS.contains(&id.as_str()) {
                warn!(constraint = %id, "ignoring weight for unknown soft constraint");
            }
        }
        let mut reg = Self::new();
        reg.register(Box::new(TeacherClash));
        reg.register(Box::new(RoomClash));
        reg.register(Box::new(ClassClash));
        reg.register(Box::new(WithinDomain));
        reg.register(Box::new(DoublePeriod));
        reg.register(Box::new(TeacherDailyCap));
        reg.register(Box::new(TeacherWeeklyCap));
        reg.register(Box::new(SubjectDailyCap));
        reg.register(Box::new(SubjectMaxConsecutive));

        reg.register(Box::new(TeacherGaps::new(weights.get(TEACHER_GAPS))));
        reg.register(Box::new(ClassGaps::new(weights.get(CLASS_GAPS))));
        reg.register(Box::new(DemandingMorning::new(weights.get(DEMANDING_MORNING))));
        reg.register(Box::new(TeacherLoadBalance::new(
            weights.get(TEACHER_LOAD_BALANCE),
        )));
        reg.register(Box::new(TeacherPreferences::new(
            weights.get(TEACHER_PREFERENCES),
        )));
        reg.register(Box::new(ClassSpread::new(weights.get(CLASS_SPREAD))));
        reg.register(Box::new(TeacherContinuity::new(weights.get(TEACHER_CONTINUITY))));
        reg
    }

    pub fn register(&mut self, constraint: Box<dyn Constraint>) {
        if let Strength::Soft { weight: 0 } = constraint.strength() {
            debug!(constraint = constraint.id(), "soft constraint disabled by zero weight");
            return;
        }
        self.constraints.push(constraint);
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Constraint> {
        self.constraints.iter().map(|c| c.as_ref())
    }

    pub fn hard(&self) -> impl Iterator<Item = &dyn Constraint> {
        self.iter().filter(|c| c.strength() == Strength::Hard)
    }

    pub fn soft(&self) -> impl Iterator<Item = &dyn Constraint> {
        self.iter()
            .filter(|c| matches!(c.strength(), Strength::Soft { .. }))
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn placement_cost(
        &self,
        model: &Model<'_>,
        asg: &PartialAssignment,
        unit: UnitIdx,
        p: Placement,
    ) -> f64 {
        self.soft()
            .map(|c| c.placement_cost(model, asg, unit, p))
            .sum()
    }

    /// First hard rule broken by the latest placement of `unit`.
    pub fn first_broken_after(
        &self,
        model: &Model<'_>,
        asg: &PartialAssignment,
        unit: UnitIdx,
    ) -> Option<&'static str> {
        self.hard()
            .find(|c| !c.is_satisfied_after(model, asg, unit))
            .map(|c| c.id())
    }
}

fn placed<'a>(asg: &'a PartialAssignment) -> impl Iterator<Item = (UnitIdx, Placement)> + 'a {
    asg.placements()
        .iter()
        .enumerate()
        .filter_map(|(u, p)| p.map(|p| (u, p)))
}

fn requirements<'a>(model: &'a Model<'_>) -> impl Iterator<Item = (ClassIdx, SubjectIdx)> + 'a {
    let snap: &'a Snapshot = model.snapshot;
    snap.classes.iter().enumerate().flat_map(move |(c, class)| {
        class
            .requirements
            .iter()
            .filter_map(move |r| snap.subject_idx(&r.subject).map(|j| (c, j)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_weights_leave_soft_rules_out() {
        let reg = Registry::standard(&ConstraintWeights::new().with(TEACHER_GAPS, 2));
        assert_eq!(reg.hard().count(), 9);
        let soft: Vec<_> = reg.soft().map(|c| c.id()).collect();
        assert_eq!(soft, vec![TEACHER_GAPS]);
    }

    #[test]
    fn recommended_weights_enable_every_soft_rule() {
        let reg = Registry::standard(&ConstraintWeights::recommended());
        assert_eq!(reg.soft().count(), SOFT_CONSTRAINTS.len());
        assert_eq!(reg.len(), 16);
    }
}
