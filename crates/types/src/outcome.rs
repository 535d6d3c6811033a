use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::time::TimeSlot;
use crate::{ClassId, ConstraintId, RoomId, ScheduleId, SubjectId, TeacherId};

/// One taught period. Field order is the canonical sort order of a schedule.
#[derive(
    Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Ord, PartialOrd, Hash,
)]
pub struct Assignment {
    pub slot: TimeSlot,
    pub class: ClassId,
    pub subject: SubjectId,
    pub teacher: TeacherId,
    pub room: RoomId,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Teacher(TeacherId),
    Class(ClassId),
    Subject(SubjectId),
    Room(RoomId),
    Slot(TimeSlot),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Ord, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_weight(weight: u32) -> Self {
        match weight {
            0..=3 => Severity::Low,
            4..=6 => Severity::Medium,
            _ => Severity::High,
        }
    }
}

/// A soft rule that could not be fully satisfied.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ConstraintViolation {
    pub constraint: ConstraintId,
    pub severity: Severity,
    pub entities: Vec<EntityRef>,
    pub penalty: f64,
    pub description: String,
}

/// A hard-constraint clash met during search.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
pub struct Conflict {
    pub constraint: ConstraintId,
    pub entities: Vec<EntityRef>,
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
pub struct UnassignedLesson {
    pub class: ClassId,
    pub subject: SubjectId,
    pub hours: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(transparent)]
pub struct ConstraintWeights(pub BTreeMap<ConstraintId, u32>);

impl ConstraintWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, weight: u32) -> Self {
        self.0.insert(ConstraintId::new(id), weight);
        self
    }

    /// Starting weights for every soft rule the engine knows.
    pub fn recommended() -> Self {
        Self::new()
            .with("teacher_gaps", 3)
            .with("class_gaps", 2)
            .with("demanding_morning", 2)
            .with("teacher_load_balance", 1)
            .with("teacher_preferences", 1)
            .with("class_spread", 2)
            .with("teacher_continuity", 5)
    }

    pub fn get(&self, id: &str) -> u32 {
        self.0
            .iter()
            .find(|(k, _)| k.as_str() == id)
            .map(|(_, w)| *w)
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
pub struct Schedule {
    pub id: ScheduleId,
    pub version: u32,
    pub assignments: Vec<Assignment>,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SolveParams {
    pub time_limit_ms: u64,
    #[serde(default)]
    pub node_limit: Option<u64>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_solutions")]
    pub max_solutions: u32,
    #[serde(default)]
    pub repair_steps: u32,
}

fn default_workers() -> usize {
    1
}

fn default_max_solutions() -> u32 {
    1
}

impl Default for SolveParams {
    fn default() -> Self {
        Self {
            time_limit_ms: 120_000,
            node_limit: None,
            seed: 0,
            workers: default_workers(),
            max_solutions: default_max_solutions(),
            repair_steps: 0,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
pub struct SolveStats {
    pub nodes: u64,
    pub backtracks: u64,
    pub solutions: u32,
    pub components: usize,
    pub workers: usize,
    pub repairs: u32,
    pub elapsed_ms: u64,
    pub seed: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SolveResult {
    Success {
        schedule: Schedule,
        quality_score: f64,
        violations: Vec<ConstraintViolation>,
        stats: SolveStats,
    },
    Infeasible {
        reason: String,
        conflicts: Vec<Conflict>,
        stats: SolveStats,
    },
    TimedOut {
        best_partial: Schedule,
        violations: Vec<ConstraintViolation>,
        unassigned: Vec<UnassignedLesson>,
        stats: SolveStats,
    },
}

impl SolveResult {
    pub fn status(&self) -> &'static str {
        match self {
            SolveResult::Success { .. } => "success",
            SolveResult::Infeasible { .. } => "infeasible",
            SolveResult::TimedOut { .. } => "timed_out",
        }
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        match self {
            SolveResult::Success { schedule, .. } => Some(schedule),
            SolveResult::TimedOut { best_partial, .. } => Some(best_partial),
            SolveResult::Infeasible { .. } => None,
        }
    }

    pub fn stats(&self) -> &SolveStats {
        match self {
            SolveResult::Success { stats, .. }
            | SolveResult::Infeasible { stats, .. }
            | SolveResult::TimedOut { stats, .. } => stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DayOfWeek;

    #[test]
    fn assignments_sort_by_slot_first() {
        let a = |day, period, class: &str| Assignment {
            slot: TimeSlot::new(day, period),
            class: ClassId::new(class),
            subject: SubjectId::new("math"),
            teacher: TeacherId::new("t1"),
            room: RoomId::new("r1"),
            locked: false,
        };
        let mut v = vec![
            a(DayOfWeek::Tue, 0, "7a"),
            a(DayOfWeek::Mon, 2, "7b"),
            a(DayOfWeek::Mon, 2, "7a"),
        ];
        v.sort();
        assert_eq!(v[0].class.as_str(), "7a");
        assert_eq!(v[0].slot.day, DayOfWeek::Mon);
        assert_eq!(v[1].class.as_str(), "7b");
        assert_eq!(v[2].slot.day, DayOfWeek::Tue);
    }

    #[test]
    fn result_is_tagged_by_status() {
        let res = SolveResult::Infeasible {
            reason: "no room".into(),
            conflicts: vec![],
            stats: SolveStats::default(),
        };
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["status"], "infeasible");
        assert_eq!(res.status(), "infeasible");
        assert!(res.schedule().is_none());
    }

    #[test]
    fn missing_weight_reads_as_zero() {
        let w = ConstraintWeights::new().with("teacher_gaps", 3);
        assert_eq!(w.get("teacher_gaps"), 3);
        assert_eq!(w.get("class_gaps"), 0);
        assert_eq!(ConstraintWeights::recommended().get("teacher_continuity"), 5);
    }
}
