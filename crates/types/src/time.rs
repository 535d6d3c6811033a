//! The weekly period grid.
//!
//! A [`WeekGrid`] lists the school days in order together with the number of
//! periods each day has. Calendar rules live here: a shortened final weekday is
//! simply a [`DayPlan`] with fewer periods.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Ord, PartialOrd, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
        DayOfWeek::Sat,
        DayOfWeek::Sun,
    ];

    pub const WORKWEEK: [DayOfWeek; 5] = [
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Mon => "mon",
            DayOfWeek::Tue => "tue",
            DayOfWeek::Wed => "wed",
            DayOfWeek::Thu => "thu",
            DayOfWeek::Fri => "fri",
            DayOfWeek::Sat => "sat",
            DayOfWeek::Sun => "sun",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (day, period) cell of the weekly grid. Periods are zero-based.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Ord, PartialOrd, Hash,
)]
pub struct TimeSlot {
    pub day: DayOfWeek,
    pub period: u8,
}

impl TimeSlot {
    pub fn new(day: DayOfWeek, period: u8) -> Self {
        Self { day, period }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.day, self.period)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
pub struct DayPlan {
    pub day: DayOfWeek,
    pub periods: u8,
}

fn default_afternoon_from() -> u8 {
    5
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
pub struct WeekGrid {
    pub days: Vec<DayPlan>,
    /// First period index that counts as afternoon.
    #[serde(default = "default_afternoon_from")]
    pub afternoon_from: u8,
}

impl WeekGrid {
    pub fn uniform(days: &[DayOfWeek], periods: u8) -> Self {
        Self {
            days: days.iter().map(|&day| DayPlan { day, periods }).collect(),
            afternoon_from: default_afternoon_from(),
        }
    }

    /// Shortens the last day of the grid to `periods`.
    pub fn with_short_last_day(mut self, periods: u8) -> Self {
        if let Some(last) = self.days.last_mut() {
            last.periods = last.periods.min(periods);
        }
        self
    }

    pub fn with_afternoon_from(mut self, period: u8) -> Self {
        self.afternoon_from = period;
        self
    }

    /// All slots, day by day in grid order, periods ascending.
    pub fn slots(&self) -> impl Iterator<Item = TimeSlot> + '_ {
        self.days
            .iter()
            .flat_map(|d| (0..d.periods).map(move |p| TimeSlot::new(d.day, p)))
    }

    pub fn len(&self) -> usize {
        self.days.iter().map(|d| d.periods as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn periods_on(&self, day: DayOfWeek) -> u8 {
        self.days
            .iter()
            .find(|d| d.day == day)
            .map(|d| d.periods)
            .unwrap_or(0)
    }

    pub fn contains(&self, slot: TimeSlot) -> bool {
        slot.period < self.periods_on(slot.day)
    }
}
