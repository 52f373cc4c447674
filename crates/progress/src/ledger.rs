//! In-memory view over a user's completion records.

use std::collections::BTreeMap;
use chrono::NaiveDate;
use routine_core::{Completion, Error, LocalCalendar, Result, RoutineId, Time, UserId};
use tracing::warn;

/// Completion records of one user, indexed by routine and local calendar day.
///
/// Owned by the caller for the duration of one request or session. Holds at
/// most one completion per (routine, day).
#[derive(Debug, Clone)]
pub struct CompletionLedger {
    user_id: UserId,
    calendar: LocalCalendar,
    entries: BTreeMap<(NaiveDate, RoutineId), Completion>,
}

impl CompletionLedger {
    /// Build a ledger from stored records.
    ///
    /// Records of other users are skipped. When storage holds several records
    /// for the same routine and day, the earliest one is kept.
    pub fn new(
        user_id: UserId,
        calendar: LocalCalendar,
        records: impl IntoIterator<Item = Completion>,
    ) -> Self {
        let mut entries: BTreeMap<(NaiveDate, RoutineId), Completion> = BTreeMap::new();
        for record in records {
            if record.user_id != user_id {
                warn!(
                    "Skipping completion of routine {} owned by user {}",
                    record.routine_id, record.user_id
                );
                continue;
            }
            let key = (calendar.day_of(record.completed_at), record.routine_id);
            match entries.get_mut(&key) {
                Some(existing) => {
                    warn!("Duplicate completion of routine {} on {}", key.1, key.0);
                    if record.completed_at < existing.completed_at {
                        *existing = record;
                    }
                }
                None => {
                    entries.insert(key, record);
                }
            }
        }
        Self {
            user_id,
            calendar,
            entries,
        }
    }

    /// An empty ledger.
    pub fn empty(user_id: UserId, calendar: LocalCalendar) -> Self {
        Self::new(user_id, calendar, Vec::new())
    }

    /// User this ledger belongs to.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Day boundary used to assign completions to days.
    pub fn calendar(&self) -> &LocalCalendar {
        &self.calendar
    }

    /// Whether `routine_id` was completed on `date`.
    pub fn is_completed_on(&self, routine_id: RoutineId, date: NaiveDate) -> bool {
        self.entries.contains_key(&(date, routine_id))
    }

    /// When `routine_id` was completed on `date`, if it was.
    pub fn completed_at_on(&self, routine_id: RoutineId, date: NaiveDate) -> Option<Time> {
        self.entries.get(&(date, routine_id)).map(|c| c.completed_at)
    }

    /// Mark `routine_id` completed on `date`, stamped at the start of that day.
    pub fn add(&mut self, routine_id: RoutineId, date: NaiveDate) -> Result<Completion> {
        let at = self.calendar.start_of_day(date);
        self.insert(routine_id, date, at)
    }

    /// Mark `routine_id` completed at `completed_at`, on whichever local day
    /// that instant falls.
    pub fn record(&mut self, routine_id: RoutineId, completed_at: Time) -> Result<Completion> {
        let date = self.calendar.day_of(completed_at);
        self.insert(routine_id, date, completed_at)
    }

    /// Remove the completion of `routine_id` on `date` and return it.
    ///
    /// Removing a completion that does not exist is an error, not a no-op.
    pub fn remove(&mut self, routine_id: RoutineId, date: NaiveDate) -> Result<Completion> {
        self.entries.remove(&(date, routine_id)).ok_or_else(|| {
            Error::NotFound(format!("completion of routine {} on {}", routine_id, date))
        })
    }

    /// Number of completions held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no completion is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Completions in (day, routine) order.
    pub fn iter(&self) -> impl Iterator<Item = &Completion> {
        self.entries.values()
    }

    fn insert(&mut self, routine_id: RoutineId, date: NaiveDate, at: Time) -> Result<Completion> {
        let key = (date, routine_id);
        if self.entries.contains_key(&key) {
            return Err(Error::DuplicateCompletion { routine_id, date });
        }
        let completion = Completion::new(routine_id, self.user_id, at);
        self.entries.insert(key, completion.clone());
        Ok(completion)
    }
}
