mod entities;
mod outcome;
mod time;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use entities::{
    AvailabilityWindow, Capability, ClassGroup, Equip, PreferenceRule, Requirement, Room,
    RoomKind, RoomRequirement, Subject, Teacher, TeacherPreference,
};
pub use outcome::{
    Assignment, Conflict, ConstraintViolation, ConstraintWeights, EntityRef, Schedule, Severity,
    SolveParams, SolveResult, SolveStats, UnassignedLesson,
};
pub use time::{DayOfWeek, DayPlan, TimeSlot, WeekGrid};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone,
            Debug,
            Default,
            Serialize,
            Deserialize,
            JsonSchema,
            Eq,
            PartialEq,
            Ord,
            PartialOrd,
            Hash,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}
id_newtype!(TeacherId);
id_newtype!(SubjectId);
id_newtype!(ClassId);
id_newtype!(RoomId);
id_newtype!(ScheduleId);
id_newtype!(ConstraintId);
