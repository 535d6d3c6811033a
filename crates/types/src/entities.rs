use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::time::{DayOfWeek, TimeSlot};
use crate::{ClassId, RoomId, SubjectId, TeacherId};

/// Half-open period range `[from, until)` on one day.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash)]
pub struct AvailabilityWindow {
    pub day: DayOfWeek,
    pub from: u8,
    pub until: u8,
}

impl AvailabilityWindow {
    pub fn new(day: DayOfWeek, from: u8, until: u8) -> Self {
        Self { day, from, until }
    }

    pub fn whole_day(day: DayOfWeek) -> Self {
        Self::new(day, 0, u8::MAX)
    }

    pub fn contains(&self, slot: TimeSlot) -> bool {
        slot.day == self.day && slot.period >= self.from && slot.period < self.until
    }

    /// An empty window list means "always available".
    pub fn admits(windows: &[AvailabilityWindow], slot: TimeSlot) -> bool {
        windows.is_empty() || windows.iter().any(|w| w.contains(slot))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Equip {
    Projector,
    Whiteboard,
    ComputerLab,
    ScienceLab,
    Gym,
    Music,
    Art,
    Online,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    #[default]
    Standard,
    Lab,
    Special,
}

fn default_proficiency() -> u8 {
    5
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
pub struct Capability {
    pub subject: SubjectId,
    /// 1 (can cover) ..= 10 (specialist).
    #[serde(default = "default_proficiency")]
    pub proficiency: u8,
}

impl Capability {
    pub fn new(subject: impl Into<SubjectId>) -> Self {
        Self {
            subject: subject.into(),
            proficiency: default_proficiency(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PreferenceRule {
    /// No lessons at or after `period`, e.g. "nothing after 3pm".
    NotAfter { period: u8 },
    /// No lessons before `period`.
    NotBefore { period: u8 },
    AvoidDay { day: DayOfWeek },
    AvoidSlot { slot: TimeSlot },
}

impl PreferenceRule {
    pub fn is_broken_by(&self, slot: TimeSlot) -> bool {
        match *self {
            PreferenceRule::NotAfter { period } => slot.period >= period,
            PreferenceRule::NotBefore { period } => slot.period < period,
            PreferenceRule::AvoidDay { day } => slot.day == day,
            PreferenceRule::AvoidSlot { slot: avoid } => slot == avoid,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
pub struct TeacherPreference {
    #[serde(flatten)]
    pub rule: PreferenceRule,
    /// 1..=10, scales the penalty of every broken period.
    pub priority: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
pub struct Teacher {
    pub id: TeacherId,
    #[serde(default)]
    pub max_hours_week: Option<u32>,
    #[serde(default)]
    pub max_hours_day: Option<u32>,
    #[serde(default)]
    pub prefers_consecutive: bool,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub availability: Vec<AvailabilityWindow>,
    #[serde(default)]
    pub preferences: Vec<TeacherPreference>,
}

impl Teacher {
    pub fn new(id: impl Into<TeacherId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn teaching(mut self, subject: impl Into<SubjectId>) -> Self {
        self.capabilities.push(Capability::new(subject));
        self
    }

    pub fn proficiency(&self, subject: &SubjectId) -> Option<u8> {
        self.capabilities
            .iter()
            .find(|c| &c.subject == subject)
            .map(|c| c.proficiency)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default, Eq, PartialEq)]
pub struct RoomRequirement {
    #[serde(default)]
    pub kind: Option<RoomKind>,
    #[serde(default)]
    pub equip: Vec<Equip>,
    /// A specific special room the subject must use.
    #[serde(default)]
    pub room: Option<RoomId>,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
pub struct Subject {
    pub id: SubjectId,
    /// Default weekly hours; a class requirement may override it.
    pub hours_per_week: u32,
    #[serde(default)]
    pub requires: RoomRequirement,
    #[serde(default)]
    pub max_consecutive: Option<u32>,
    #[serde(default)]
    pub max_per_day: Option<u32>,
    /// Cognitively demanding subjects prefer morning periods.
    #[serde(default)]
    pub demanding: bool,
}

impl Subject {
    pub fn new(id: impl Into<SubjectId>, hours_per_week: u32) -> Self {
        Self {
            id: id.into(),
            hours_per_week,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct Requirement {
    pub subject: SubjectId,
    #[serde(default)]
    pub hours_per_week: Option<u32>,
    #[serde(default)]
    pub double_period: bool,
    /// Higher is scheduled earlier when domains tie.
    #[serde(default)]
    pub priority: u8,
}

impl Requirement {
    pub fn new(subject: impl Into<SubjectId>) -> Self {
        Self {
            subject: subject.into(),
            hours_per_week: None,
            double_period: false,
            priority: 0,
        }
    }

    pub fn hours(mut self, hours: u32) -> Self {
        self.hours_per_week = Some(hours);
        self
    }

    pub fn double(mut self) -> Self {
        self.double_period = true;
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
pub struct ClassGroup {
    pub id: ClassId,
    pub students: u32,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub availability: Vec<AvailabilityWindow>,
}

impl ClassGroup {
    pub fn new(id: impl Into<ClassId>, students: u32) -> Self {
        Self {
            id: id.into(),
            students,
            ..Default::default()
        }
    }

    pub fn needs(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
pub struct Room {
    pub id: RoomId,
    pub capacity: u32,
    #[serde(default)]
    pub kind: RoomKind,
    #[serde(default)]
    pub equip: Vec<Equip>,
    #[serde(default)]
    pub availability: Vec<AvailabilityWindow>,
}

impl Room {
    pub fn new(id: impl Into<RoomId>, capacity: u32) -> Self {
        Self {
            id: id.into(),
            capacity,
            ..Default::default()
        }
    }

    pub fn satisfies(&self, req: &RoomRequirement) -> bool {
        if let Some(pinned) = &req.room {
            if pinned != &self.id {
                return false;
            }
        }
        if let Some(kind) = req.kind {
            if kind != self.kind {
                return false;
            }
        }
        req.equip.iter().all(|need| self.equip.contains(need))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_availability_means_always() {
        let slot = TimeSlot::new(DayOfWeek::Wed, 3);
        assert!(AvailabilityWindow::admits(&[], slot));
        let morning = [AvailabilityWindow::new(DayOfWeek::Wed, 0, 3)];
        assert!(!AvailabilityWindow::admits(&morning, slot));
        assert!(AvailabilityWindow::admits(
            &morning,
            TimeSlot::new(DayOfWeek::Wed, 2)
        ));
    }

    #[test]
    fn room_requirement_checks_kind_equipment_and_pin() {
        let mut lab = Room::new("lab-1", 30);
        lab.kind = RoomKind::Lab;
        lab.equip = vec![Equip::ScienceLab, Equip::Projector];

        let req = RoomRequirement {
            kind: Some(RoomKind::Lab),
            equip: vec![Equip::ScienceLab],
            room: None,
        };
        assert!(lab.satisfies(&req));
        assert!(!Room::new("r-101", 30).satisfies(&req));

        let pinned = RoomRequirement {
            room: Some(RoomId::new("lab-2")),
            ..Default::default()
        };
        assert!(!lab.satisfies(&pinned));
    }

    #[test]
    fn preference_json_is_flat() {
        let pref: TeacherPreference =
            serde_json::from_str(r#"{"rule":"not_after","period":6,"priority":7}"#).unwrap();
        assert_eq!(pref.rule, PreferenceRule::NotAfter { period: 6 });
        assert_eq!(pref.priority, 7);
        assert!(pref.rule.is_broken_by(TimeSlot::new(DayOfWeek::Mon, 6)));
        assert!(!pref.rule.is_broken_by(TimeSlot::new(DayOfWeek::Mon, 5)));
    }
}
