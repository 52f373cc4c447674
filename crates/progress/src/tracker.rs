//! Progress tracking service.
//!
//! Loads a user's routines, schedules, groups and completions from a
//! [`Storage`] backend and runs the recurrence and completion engine over
//! them. Completion changes are written back through the same backend.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use routine_core::{DateRange, LocalCalendar, RoutineId, UserId};
use routine_storage::{Storage, StorageError};
use tracing::{debug, info};
use crate::aggregator::{DailyAggregator, GroupedDueRoutines, RoutineCatalog, Toggle};
use crate::ledger::CompletionLedger;
use crate::statistics::{ProgressStatistics, ProgressStats};

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors surfaced by the tracker service.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Recurrence or completion rule violated
    #[error(transparent)]
    Core(#[from] routine_core::Error),

    /// Storage backend failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Local day boundary
    pub calendar: LocalCalendar,

    /// Days covered by [`BasicProgressTracker::recent_stats`]
    pub stats_window_days: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            calendar: LocalCalendar::utc(),
            stats_window_days: 30,
        }
    }
}

/// Progress tracking service.
#[async_trait]
pub trait ProgressTracker: Send + Sync {
    /// Routines due on `date`, grouped, with completion flags.
    async fn due_routines(&self, user_id: UserId, date: NaiveDate) -> Result<GroupedDueRoutines>;

    /// Statistics over `range`.
    async fn stats(&self, user_id: UserId, range: DateRange) -> Result<ProgressStats>;

    /// Mark a routine done on `date`.
    async fn complete(&mut self, user_id: UserId, routine_id: RoutineId, date: NaiveDate) -> Result<()>;

    /// Remove a routine's completion on `date`.
    async fn uncomplete(&mut self, user_id: UserId, routine_id: RoutineId, date: NaiveDate) -> Result<()>;

    /// Flip a routine's completion on `date`.
    async fn toggle(&mut self, user_id: UserId, routine_id: RoutineId, date: NaiveDate) -> Result<Toggle>;
}

/// Basic progress tracker implementation.
pub struct BasicProgressTracker<S: Storage> {
    storage: S,
    config: TrackerConfig,
}

impl<S: Storage> BasicProgressTracker<S> {
    /// Create a new progress tracker.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            config: TrackerConfig::default(),
        }
    }

    /// Set configuration.
    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Underlying storage, mutably.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Today in the configured local calendar.
    pub fn today(&self) -> NaiveDate {
        self.config.calendar.day_of(Utc::now())
    }

    /// Statistics over the configured window ending at `end`.
    pub async fn recent_stats(&self, user_id: UserId, end: NaiveDate) -> Result<ProgressStats> {
        let range = DateRange::ending_at(end, self.config.stats_window_days);
        self.stats_over(user_id, range).await
    }

    async fn stats_over(&self, user_id: UserId, range: DateRange) -> Result<ProgressStats> {
        let aggregator = self.load(user_id, &range).await?;
        let stats = ProgressStatistics.compute_stats(&aggregator, user_id, &range)?;
        info!(
            "Stats for user {}: {}% complete, {} day streak",
            user_id, stats.completion_rate, stats.streak_days
        );
        Ok(stats)
    }

    /// Fetch everything the engine needs for `user_id` over `range`.
    pub async fn load(&self, user_id: UserId, range: &DateRange) -> Result<DailyAggregator> {
        let mut catalog = RoutineCatalog::new();
        for routine in self.storage.get_routines_by_user(user_id).await? {
            let weekday = self.storage.get_weekday_schedule(routine.id).await?;
            let repetition = self.storage.get_repetition_schedule(routine.id).await?;
            catalog.insert(routine, weekday, repetition)?;
        }
        for group in self.storage.list_groups(user_id).await? {
            catalog.insert_group(group);
        }

        let calendar = self.config.calendar;
        let (from, to) = calendar.bounds(range);
        let completions = self.storage.get_completions(user_id, from, to).await?;
        debug!(
            "Loaded {} routines and {} completions for user {} ({} to {})",
            catalog.len(),
            completions.len(),
            user_id,
            range.start(),
            range.end()
        );

        let ledger = CompletionLedger::new(user_id, calendar, completions);
        Ok(DailyAggregator::new(catalog, ledger))
    }
}

#[async_trait]
impl<S: Storage + 'static> ProgressTracker for BasicProgressTracker<S> {
    async fn due_routines(&self, user_id: UserId, date: NaiveDate) -> Result<GroupedDueRoutines> {
        let aggregator = self.load(user_id, &DateRange::day(date)).await?;
        Ok(aggregator.due_routines_by_group(user_id, date)?)
    }

    async fn stats(&self, user_id: UserId, range: DateRange) -> Result<ProgressStats> {
        self.stats_over(user_id, range).await
    }

    async fn complete(&mut self, user_id: UserId, routine_id: RoutineId, date: NaiveDate) -> Result<()> {
        let mut aggregator = self.load(user_id, &DateRange::day(date)).await?;
        let completion = aggregator.complete_on(routine_id, date, Utc::now())?;
        self.storage.save_completion(&completion).await?;
        info!("Completed routine {} on {}", routine_id, date);
        Ok(())
    }

    async fn uncomplete(&mut self, user_id: UserId, routine_id: RoutineId, date: NaiveDate) -> Result<()> {
        let mut aggregator = self.load(user_id, &DateRange::day(date)).await?;
        let removed = aggregator.unmark(routine_id, date)?;
        self.storage.delete_completion(&removed).await?;
        info!("Uncompleted routine {} on {}", routine_id, date);
        Ok(())
    }

    async fn toggle(&mut self, user_id: UserId, routine_id: RoutineId, date: NaiveDate) -> Result<Toggle> {
        let mut aggregator = self.load(user_id, &DateRange::day(date)).await?;
        let toggle = aggregator.toggle(routine_id, date, Utc::now())?;
        match &toggle {
            Toggle::Completed(c) => self.storage.save_completion(c).await?,
            Toggle::Uncompleted(c) => self.storage.delete_completion(c).await?,
        }
        info!("Toggled routine {} on {}: {:?}", routine_id, date, toggle);
        Ok(toggle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use chrono::{Duration, NaiveTime, Weekday};
    use routine_core::{
        Completion, Group, GroupId, Priority, RepetitionSchedule, Routine, Time, WeekdaySchedule,
    };
    use crate::aggregator::GroupKey;

    #[derive(Default)]
    struct MemoryStorage {
        routines: HashMap<RoutineId, Routine>,
        weekday: HashMap<RoutineId, WeekdaySchedule>,
        repetition: HashMap<RoutineId, RepetitionSchedule>,
        groups: HashMap<GroupId, Group>,
        completions: Vec<Completion>,
    }

    #[async_trait]
    impl Storage for MemoryStorage {
        async fn save_routine(&mut self, routine: &Routine) -> routine_storage::Result<()> {
            self.routines.insert(routine.id, routine.clone());
            Ok(())
        }
        async fn load_routine(&self, id: RoutineId) -> routine_storage::Result<Option<Routine>> {
            Ok(self.routines.get(&id).cloned())
        }
        async fn get_routines_by_user(&self, user_id: UserId) -> routine_storage::Result<Vec<Routine>> {
            Ok(self.routines.values().filter(|r| r.owner_id == user_id).cloned().collect())
        }
        async fn delete_routine(&mut self, id: RoutineId) -> routine_storage::Result<()> {
            self.routines.remove(&id);
            self.weekday.remove(&id);
            self.repetition.remove(&id);
            self.completions.retain(|c| c.routine_id != id);
            Ok(())
        }
        async fn get_weekday_schedule(&self, id: RoutineId) -> routine_storage::Result<Option<WeekdaySchedule>> {
            Ok(self.weekday.get(&id).cloned())
        }
        async fn save_weekday_schedule(&mut self, s: &WeekdaySchedule) -> routine_storage::Result<()> {
            self.weekday.insert(s.routine_id, s.clone());
            Ok(())
        }
        async fn get_repetition_schedule(&self, id: RoutineId) -> routine_storage::Result<Option<RepetitionSchedule>> {
            Ok(self.repetition.get(&id).cloned())
        }
        async fn save_repetition_schedule(&mut self, s: &RepetitionSchedule) -> routine_storage::Result<()> {
            self.repetition.insert(s.routine_id, s.clone());
            Ok(())
        }
        async fn save_group(&mut self, group: &Group) -> routine_storage::Result<()> {
            self.groups.insert(group.id, group.clone());
            Ok(())
        }
        async fn list_groups(&self, user_id: UserId) -> routine_storage::Result<Vec<Group>> {
            Ok(self.groups.values().filter(|g| g.owner_id == user_id).cloned().collect())
        }
        async fn delete_group(&mut self, id: GroupId) -> routine_storage::Result<()> {
            self.groups.remove(&id);
            Ok(())
        }
        async fn get_completions(&self, user_id: UserId, from: Time, to: Time) -> routine_storage::Result<Vec<Completion>> {
            Ok(self
                .completions
                .iter()
                .filter(|c| c.user_id == user_id && from <= c.completed_at && c.completed_at < to)
                .cloned()
                .collect())
        }
        async fn save_completion(&mut self, c: &Completion) -> routine_storage::Result<()> {
            self.completions.push(c.clone());
            Ok(())
        }
        async fn delete_completion(&mut self, c: &Completion) -> routine_storage::Result<()> {
            let pos = self
                .completions
                .iter()
                .position(|x| x == c)
                .ok_or_else(|| StorageError::NotFound("completion".into()))?;
            self.completions.remove(pos);
            Ok(())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seeded() -> (BasicProgressTracker<MemoryStorage>, UserId, Routine, Group) {
        let mut storage = MemoryStorage::default();
        let user = UserId::new();
        let group = Group::new(user, "Morning");
        let routine = Routine::new(user, "Stretch", Priority::High, NaiveTime::from_hms_opt(7, 0, 0).unwrap())
            .with_group(group.id);
        storage.save_group(&group).await.unwrap();
        storage.save_routine(&routine).await.unwrap();
        storage
            .save_weekday_schedule(&WeekdaySchedule::from_days(routine.id, &[Weekday::Mon, Weekday::Wed]))
            .await
            .unwrap();
        (BasicProgressTracker::new(storage), user, routine, group)
    }

    // 2024-01-08 is a Monday
    #[tokio::test]
    async fn due_routines_reflect_stored_completions() {
        let (mut tracker, user, routine, group) = seeded().await;

        let monday = tracker.due_routines(user, date(2024, 1, 8)).await.unwrap();
        let bucket = monday.get(&GroupKey::Group(group.id)).unwrap();
        assert!(!bucket.routines[0].completed);

        tracker.complete(user, routine.id, date(2024, 1, 8)).await.unwrap();
        assert_eq!(tracker.storage().completions.len(), 1);
        let monday = tracker.due_routines(user, date(2024, 1, 8)).await.unwrap();
        assert!(monday.get(&GroupKey::Group(group.id)).unwrap().routines[0].completed);

        assert!(tracker.due_routines(user, date(2024, 1, 9)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_and_missing_completions_are_reported() {
        let (mut tracker, user, routine, _) = seeded().await;

        tracker.complete(user, routine.id, date(2024, 1, 8)).await.unwrap();
        let err = tracker.complete(user, routine.id, date(2024, 1, 8)).await.unwrap_err();
        assert!(matches!(
            err,
            TrackerError::Core(routine_core::Error::DuplicateCompletion { .. })
        ));

        let err = tracker.uncomplete(user, routine.id, date(2024, 1, 10)).await.unwrap_err();
        assert!(matches!(err, TrackerError::Core(routine_core::Error::NotFound(_))));

        let err = tracker.complete(user, RoutineId::new(), date(2024, 1, 8)).await.unwrap_err();
        assert!(matches!(err, TrackerError::Core(routine_core::Error::NotFound(_))));
    }

    #[tokio::test]
    async fn toggle_round_trips_through_storage() {
        let (mut tracker, user, routine, _) = seeded().await;

        let first = tracker.toggle(user, routine.id, date(2024, 1, 10)).await.unwrap();
        assert!(matches!(first, Toggle::Completed(_)));
        assert_eq!(tracker.storage().completions.len(), 1);

        let second = tracker.toggle(user, routine.id, date(2024, 1, 10)).await.unwrap();
        assert!(matches!(second, Toggle::Uncompleted(_)));
        assert!(tracker.storage().completions.is_empty());
    }

    #[tokio::test]
    async fn stats_over_stored_week() {
        let (mut tracker, user, routine, group) = seeded().await;
        tracker.complete(user, routine.id, date(2024, 1, 8)).await.unwrap();
        tracker.complete(user, routine.id, date(2024, 1, 10)).await.unwrap();

        let week = DateRange::new(date(2024, 1, 8), date(2024, 1, 14));
        let stats = tracker.stats(user, week).await.unwrap();
        assert_eq!(stats.completion_rate, 100);
        assert_eq!(stats.streak_days, 2);
        assert_eq!(stats.per_group[&GroupKey::Group(group.id)].total, 2);

        // Deleting the group leaves the routine in place, now ungrouped.
        tracker.storage_mut().delete_group(group.id).await.unwrap();
        let stats = tracker.stats(user, week).await.unwrap();
        assert_eq!(stats.per_group[&GroupKey::Ungrouped].completed, 2);
    }

    #[tokio::test]
    async fn recent_stats_use_configured_window() {
        let (tracker, user, _, _) = seeded().await;
        let tracker = tracker.with_config(TrackerConfig {
            stats_window_days: 7,
            ..Default::default()
        });
        let end = date(2024, 1, 14);
        let stats = tracker.recent_stats(user, end).await.unwrap();
        assert_eq!(stats.range, DateRange::new(end - Duration::days(6), end));
        assert_eq!(stats.days.len(), 7);
        assert_eq!(stats.completion_rate, 0);
    }
}
