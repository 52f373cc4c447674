//! Recurrence schedules and the rule they resolve to.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use crate::id::RoutineId;
use crate::{Error, Result};

/// Weekday flags for a routine. At most one per routine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdaySchedule {
    /// Routine this schedule belongs to
    pub routine_id: RoutineId,

    /// Due on Mondays
    pub monday: bool,
    /// Due on Tuesdays
    pub tuesday: bool,
    /// Due on Wednesdays
    pub wednesday: bool,
    /// Due on Thursdays
    pub thursday: bool,
    /// Due on Fridays
    pub friday: bool,
    /// Due on Saturdays
    pub saturday: bool,
    /// Due on Sundays
    pub sunday: bool,
}

impl WeekdaySchedule {
    /// A schedule with no day set (valid, never due).
    pub fn empty(routine_id: RoutineId) -> Self {
        Self {
            routine_id,
            ..Default::default()
        }
    }

    /// A schedule with exactly the given days set.
    pub fn from_days(routine_id: RoutineId, days: &[Weekday]) -> Self {
        let mut schedule = Self::empty(routine_id);
        for day in days {
            schedule.set(*day, true);
        }
        schedule
    }

    /// Whether the flag for `day` is set.
    pub fn is_set(&self, day: Weekday) -> bool {
        match day {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }

    /// Set or clear the flag for `day`.
    pub fn set(&mut self, day: Weekday, value: bool) {
        let flag = match day {
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
            Weekday::Sun => &mut self.sunday,
        };
        *flag = value;
    }

    /// Replace the whole flag set with `other`'s, keeping the routine id.
    pub fn replace_flags(&mut self, other: &WeekdaySchedule) {
        let routine_id = self.routine_id;
        *self = other.clone();
        self.routine_id = routine_id;
    }

    /// Days with their flag set, Monday first.
    pub fn days(&self) -> Vec<Weekday> {
        WEEK.iter().copied().filter(|d| self.is_set(*d)).collect()
    }

    /// True when no day is set.
    pub fn is_empty(&self) -> bool {
        self.days().is_empty()
    }
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Every-N-days schedule counted from an anchor date. At most one per routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepetitionSchedule {
    /// Routine this schedule belongs to
    pub routine_id: RoutineId,

    /// Days between occurrences, at least 1
    pub interval_days: u32,

    /// First due date; the interval is counted from here
    pub anchor_date: NaiveDate,
}

impl RepetitionSchedule {
    /// Create a validated schedule.
    pub fn new(routine_id: RoutineId, interval_days: u32, anchor_date: NaiveDate) -> Result<Self> {
        let schedule = Self {
            routine_id,
            interval_days,
            anchor_date,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Reject intervals below one day.
    ///
    /// Schedules loaded from storage bypass [`RepetitionSchedule::new`], so
    /// evaluation validates again.
    pub fn validate(&self) -> Result<()> {
        if self.interval_days < 1 {
            return Err(Error::InvalidConfiguration(format!(
                "routine {}: interval_days must be at least 1, got {}",
                self.routine_id, self.interval_days
            )));
        }
        Ok(())
    }

    /// Replace the interval, leaving the schedule untouched if it is invalid.
    pub fn set_interval(&mut self, interval_days: u32) -> Result<()> {
        let updated = Self {
            interval_days,
            ..self.clone()
        };
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

/// The recurrence rule in effect for a routine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecurrenceRule {
    /// Due on flagged weekdays
    Weekday(WeekdaySchedule),

    /// Due every `interval_days` from the anchor date
    Repetition(RepetitionSchedule),

    /// No schedule; never due
    #[default]
    None,
}

impl RecurrenceRule {
    /// Resolve a routine's schedules into the rule that applies.
    ///
    /// A weekday schedule takes precedence over a repetition schedule. A
    /// routine with neither is never due.
    pub fn from_schedules(
        weekday: Option<&WeekdaySchedule>,
        repetition: Option<&RepetitionSchedule>,
    ) -> Self {
        match (weekday, repetition) {
            (Some(w), _) => RecurrenceRule::Weekday(w.clone()),
            (None, Some(r)) => RecurrenceRule::Repetition(r.clone()),
            (None, None) => RecurrenceRule::None,
        }
    }
}
