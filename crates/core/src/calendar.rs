//! Calendar helpers: weekdays, day arithmetic, date ranges and the local day
//! boundary used to map timestamps onto calendar days.

use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc, Weekday};
use serde::{Deserialize, Serialize};
use crate::Time;

/// Weekday of a calendar date.
pub fn weekday_of(date: NaiveDate) -> Weekday {
    date.weekday()
}

/// Numeric weekday of a date, 0 = Sunday through 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

/// Whole calendar days from `a` to `b`; negative when `b` is before `a`.
///
/// Works on dates rather than instants, so DST shifts and time-of-day never
/// perturb the result.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    b.signed_duration_since(a).num_days()
}

/// Inclusive ascending range of dates from `start` to `end`.
pub fn enumerate_dates(start: NaiveDate, end: NaiveDate) -> DateRange {
    DateRange::new(start, end)
}

/// An inclusive range of calendar days.
///
/// The range is a plain value: iterating it does not consume it, so the same
/// dates can be walked any number of times. A range whose start is after its
/// end is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range covering `start..=end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// A single-day range.
    pub fn day(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    /// The `days` days ending at (and including) `end`, clamped to the
    /// earliest representable date.
    pub fn ending_at(end: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        let start = end
            .checked_sub_signed(Duration::days(span))
            .unwrap_or(NaiveDate::MIN);
        Self::new(start, end)
    }

    /// First day of the range.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            days_between(self.start, self.end) as usize + 1
        }
    }

    /// True when the range holds no days.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Whether `date` falls inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Iterate the days in ascending order.
    pub fn iter(&self) -> DateIter {
        DateIter {
            next: Some(self.start).filter(|_| !self.is_empty()),
            back: Some(self.end).filter(|_| !self.is_empty()),
        }
    }
}

impl IntoIterator for DateRange {
    type Item = NaiveDate;
    type IntoIter = DateIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for &DateRange {
    type Item = NaiveDate;
    type IntoIter = DateIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the days of a [`DateRange`].
#[derive(Debug, Clone)]
pub struct DateIter {
    next: Option<NaiveDate>,
    back: Option<NaiveDate>,
}

impl Iterator for DateIter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        let back = self.back?;
        if current > back {
            return None;
        }
        if current == back {
            self.next = None;
            self.back = None;
        } else {
            self.next = current.succ_opt();
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match (self.next, self.back) {
            (Some(a), Some(b)) if a <= b => {
                let n = days_between(a, b) as usize + 1;
                (n, Some(n))
            }
            _ => (0, Some(0)),
        }
    }
}

impl DoubleEndedIterator for DateIter {
    fn next_back(&mut self) -> Option<NaiveDate> {
        let current = self.back?;
        let front = self.next?;
        if current < front {
            return None;
        }
        if current == front {
            self.next = None;
            self.back = None;
        } else {
            self.back = current.pred_opt();
        }
        Some(current)
    }
}

impl ExactSizeIterator for DateIter {}

/// The configured local day boundary.
///
/// A timestamp belongs to the local calendar day it falls on after shifting it
/// by `offset`, with days starting at `day_starts_at` instead of midnight
/// (e.g. `04:00` so late-night completions still count for the evening
/// before).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalCalendar {
    /// UTC offset of the user's local time
    pub offset: FixedOffset,

    /// Local time of day at which a new calendar day begins
    pub day_starts_at: NaiveTime,
}

impl LocalCalendar {
    /// Calendar with a given UTC offset and midnight rollover.
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            day_starts_at: NaiveTime::MIN,
        }
    }

    /// Calendar in UTC with midnight rollover.
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Move the rollover to `time`.
    pub fn with_day_start(mut self, time: NaiveTime) -> Self {
        self.day_starts_at = time;
        self
    }

    /// Local calendar day containing `ts`.
    pub fn day_of(&self, ts: Time) -> NaiveDate {
        let local = ts.with_timezone(&self.offset).naive_local();
        let since_midnight = self.day_starts_at.signed_duration_since(NaiveTime::MIN);
        (local - since_midnight).date()
    }

    /// Whether two instants fall on the same local calendar day.
    pub fn is_same_calendar_day(&self, a: Time, b: Time) -> bool {
        self.day_of(a) == self.day_of(b)
    }

    /// UTC instant at which the local calendar day `date` begins.
    pub fn start_of_day(&self, date: NaiveDate) -> Time {
        let local = date.and_time(self.day_starts_at);
        (local - self.offset_duration()).and_utc()
    }

    /// Half-open UTC interval `[from, to)` covering every day of `range`.
    pub fn bounds(&self, range: &DateRange) -> (Time, Time) {
        let from = self.start_of_day(range.start());
        let to = self.start_of_day(range.end()) + Duration::days(1);
        (from, to.max(from))
    }

    fn offset_duration(&self) -> Duration {
        Duration::seconds(i64::from(self.offset.local_minus_utc()))
    }
}

impl Default for LocalCalendar {
    fn default() -> Self {
        Self::utc()
    }
}
