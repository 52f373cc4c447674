//! Daily aggregation: which routines are due on a day, and are they done.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use routine_core::{
    Completion, Error, Group, GroupId, RecurrenceRule, RepetitionSchedule, Result, Routine,
    RoutineId, Time, UserId, WeekdaySchedule,
};
use crate::ledger::CompletionLedger;
use crate::recurrence::RecurrenceEvaluator;

static NO_RULE: RecurrenceRule = RecurrenceRule::None;

/// Snapshot of a user's routines, their recurrence rules and groups.
///
/// Groups are looked up by id; a routine whose group is missing from the
/// snapshot counts as ungrouped.
#[derive(Debug, Clone, Default)]
pub struct RoutineCatalog {
    routines: BTreeMap<RoutineId, Routine>,
    rules: HashMap<RoutineId, RecurrenceRule>,
    groups: HashMap<GroupId, Group>,
}

impl RoutineCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a routine with whatever schedules it has.
    pub fn insert(
        &mut self,
        routine: Routine,
        weekday: Option<WeekdaySchedule>,
        repetition: Option<RepetitionSchedule>,
    ) -> Result<()> {
        let rule = RecurrenceEvaluator.rule_for(&routine, weekday.as_ref(), repetition.as_ref())?;
        self.rules.insert(routine.id, rule);
        self.routines.insert(routine.id, routine);
        Ok(())
    }

    /// Add a group.
    pub fn insert_group(&mut self, group: Group) {
        self.groups.insert(group.id, group);
    }

    /// Look up a routine.
    pub fn routine(&self, id: RoutineId) -> Option<&Routine> {
        self.routines.get(&id)
    }

    /// Recurrence rule of a routine; `None` for unknown routines.
    pub fn rule(&self, id: RoutineId) -> &RecurrenceRule {
        self.rules.get(&id).unwrap_or(&NO_RULE)
    }

    /// Look up a group.
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// Routines owned by `user_id`, in id order.
    pub fn routines_of(&self, user_id: UserId) -> impl Iterator<Item = &Routine> {
        self.routines.values().filter(move |r| r.owner_id == user_id)
    }

    /// Bucket a routine belongs to, resolving dangling group references.
    pub fn group_key(&self, routine: &Routine) -> GroupKey {
        match routine.group_id {
            Some(id) if self.groups.contains_key(&id) => GroupKey::Group(id),
            _ => GroupKey::Ungrouped,
        }
    }

    /// Number of routines.
    pub fn len(&self) -> usize {
        self.routines.len()
    }

    /// True when the catalog holds no routine.
    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}

/// Key of a display bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    /// An existing group
    Group(GroupId),
    /// No group, or a group that no longer exists
    Ungrouped,
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupKey::Group(id) => id.fmt(f),
            GroupKey::Ungrouped => f.write_str("ungrouped"),
        }
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A routine due on some day, with its completion status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueRoutine {
    /// The routine
    pub routine: Routine,
    /// Whether it was completed that day
    pub completed: bool,
    /// When it was completed, if it was
    pub completed_at: Option<Time>,
}

/// One display bucket of due routines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupBucket {
    /// Bucket key
    pub key: GroupKey,
    /// The group, absent for the ungrouped bucket
    pub group: Option<Group>,
    /// Due routines in display order
    pub routines: Vec<DueRoutine>,
}

/// Due routines of a day, bucketed by group.
///
/// Buckets are ordered by group display order, name and id, with the
/// ungrouped bucket last. Empty buckets are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupedDueRoutines {
    buckets: Vec<GroupBucket>,
}

impl GroupedDueRoutines {
    /// Bucket for `key`, if it has due routines.
    pub fn get(&self, key: &GroupKey) -> Option<&GroupBucket> {
        self.buckets.iter().find(|b| b.key == *key)
    }

    /// Buckets in display order.
    pub fn iter(&self) -> impl Iterator<Item = &GroupBucket> {
        self.buckets.iter()
    }

    /// Number of non-empty buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True when nothing is due.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Outcome of toggling a routine's completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    /// The routine is now completed; the new record
    Completed(Completion),
    /// The routine is no longer completed; the removed record
    Uncompleted(Completion),
}

/// Combines recurrence rules and completions into per-day due lists.
#[derive(Debug, Clone)]
pub struct DailyAggregator {
    catalog: RoutineCatalog,
    ledger: CompletionLedger,
    evaluator: RecurrenceEvaluator,
}

impl DailyAggregator {
    /// Create an aggregator over a catalog and the caller's ledger.
    pub fn new(catalog: RoutineCatalog, ledger: CompletionLedger) -> Self {
        Self {
            catalog,
            ledger,
            evaluator: RecurrenceEvaluator,
        }
    }

    /// The routine snapshot.
    pub fn catalog(&self) -> &RoutineCatalog {
        &self.catalog
    }

    /// The completion ledger.
    pub fn ledger(&self) -> &CompletionLedger {
        &self.ledger
    }

    /// Routines of `user_id` due on `date`, with completion flags.
    ///
    /// Ordered by priority (high first), then expected time, then id.
    pub fn due_routines_for(&self, user_id: UserId, date: NaiveDate) -> Result<Vec<DueRoutine>> {
        Ok(self
            .due_entries(user_id, date)?
            .into_iter()
            .map(|(routine, completed)| self.annotate(routine, completed, date))
            .collect())
    }

    /// Routines of `user_id` due on `date`, bucketed by group.
    pub fn due_routines_by_group(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<GroupedDueRoutines> {
        let mut by_key: BTreeMap<GroupKey, Vec<DueRoutine>> = BTreeMap::new();
        for (routine, completed) in self.due_entries(user_id, date)? {
            by_key
                .entry(self.catalog.group_key(routine))
                .or_default()
                .push(self.annotate(routine, completed, date));
        }

        let mut buckets: Vec<GroupBucket> = by_key
            .into_iter()
            .map(|(key, routines)| GroupBucket {
                key,
                group: match key {
                    GroupKey::Group(id) => self.catalog.group(id).cloned(),
                    GroupKey::Ungrouped => None,
                },
                routines,
            })
            .collect();
        buckets.sort_by(|a, b| match (&a.group, &b.group) {
            (Some(x), Some(y)) => x.display_key().cmp(&y.display_key()),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        Ok(GroupedDueRoutines { buckets })
    }

    /// Due routines of a day paired with their completion flag, in display
    /// order.
    ///
    /// Fails with `NotFound` for any user other than the ledger's, whose
    /// completions were never loaded.
    pub(crate) fn due_entries(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Vec<(&Routine, bool)>> {
        if user_id != self.ledger.user_id() {
            return Err(Error::NotFound(format!("user {}", user_id)));
        }
        let mut due = Vec::new();
        for routine in self.catalog.routines_of(user_id) {
            if self.evaluator.evaluate(self.catalog.rule(routine.id), date)? {
                due.push((routine, self.ledger.is_completed_on(routine.id, date)));
            }
        }
        due.sort_by_key(|(r, _)| (Reverse(r.priority), r.expected_time, r.id));
        Ok(due)
    }

    /// Mark a routine done at `at`.
    pub fn mark_completed(&mut self, routine_id: RoutineId, at: Time) -> Result<Completion> {
        self.known_routine(routine_id)?;
        self.ledger.record(routine_id, at)
    }

    /// Remove a routine's completion on `date`.
    pub fn unmark(&mut self, routine_id: RoutineId, date: NaiveDate) -> Result<Completion> {
        self.known_routine(routine_id)?;
        self.ledger.remove(routine_id, date)
    }

    /// Mark a routine done on `date`.
    ///
    /// The completion is stamped `at` when that instant falls on `date`,
    /// otherwise at the start of `date` (back-filling a past day).
    pub fn complete_on(&mut self, routine_id: RoutineId, date: NaiveDate, at: Time) -> Result<Completion> {
        self.known_routine(routine_id)?;
        if self.ledger.calendar().day_of(at) == date {
            self.ledger.record(routine_id, at)
        } else {
            self.ledger.add(routine_id, date)
        }
    }

    /// Flip a routine's completion on `date`, stamping new completions as
    /// [`DailyAggregator::complete_on`] does.
    pub fn toggle(&mut self, routine_id: RoutineId, date: NaiveDate, at: Time) -> Result<Toggle> {
        self.known_routine(routine_id)?;
        if self.ledger.is_completed_on(routine_id, date) {
            return self.ledger.remove(routine_id, date).map(Toggle::Uncompleted);
        }
        self.complete_on(routine_id, date, at).map(Toggle::Completed)
    }

    fn known_routine(&self, routine_id: RoutineId) -> Result<&Routine> {
        self.catalog
            .routine(routine_id)
            .filter(|r| r.owner_id == self.ledger.user_id())
            .ok_or_else(|| Error::NotFound(format!("routine {}", routine_id)))
    }

    fn annotate(&self, routine: &Routine, completed: bool, date: NaiveDate) -> DueRoutine {
        DueRoutine {
            routine: routine.clone(),
            completed,
            completed_at: self.ledger.completed_at_on(routine.id, date),
        }
    }
}
