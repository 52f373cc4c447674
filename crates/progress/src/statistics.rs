//! Progress statistics over a date range.

use std::collections::BTreeMap;
use chrono::NaiveDate;
use serde::Serialize;
use routine_core::{DateRange, Priority, Result, UserId};
use crate::aggregator::{DailyAggregator, GroupKey};

/// Completed vs. due counts for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Due occurrences that were completed
    pub completed: u32,
    /// Due occurrences
    pub total: u32,
}

impl Tally {
    /// Completion percentage, rounded half up; 0 when nothing was due.
    pub fn rate(&self) -> u32 {
        percentage(self.completed, self.total)
    }

    fn count(&mut self, completed: bool) {
        self.total += 1;
        if completed {
            self.completed += 1;
        }
    }
}

/// Due and completed counts of a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayProgress {
    /// The day
    pub date: NaiveDate,
    /// Routines due that day
    pub due: u32,
    /// Of those, completed
    pub completed: u32,
}

impl DayProgress {
    /// Nothing was due; such days neither extend nor break a streak.
    pub fn is_rest_day(&self) -> bool {
        self.due == 0
    }

    /// Something was due and all of it was completed.
    pub fn is_perfect(&self) -> bool {
        self.due > 0 && self.completed == self.due
    }
}

/// Aggregate progress of a user over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressStats {
    /// Range the statistics cover
    pub range: DateRange,

    /// Percentage of due occurrences completed (0-100)
    pub completion_rate: u32,

    /// Perfect days in a row ending at the last day of the range
    pub streak_days: u32,

    /// Longest run of perfect days anywhere in the range
    pub longest_streak_days: u32,

    /// Counts by routine priority; every priority is present
    pub per_priority: BTreeMap<Priority, Tally>,

    /// Counts by group; dangling group references count as ungrouped
    pub per_group: BTreeMap<GroupKey, Tally>,

    /// Per-day breakdown, oldest first
    pub days: Vec<DayProgress>,
}

/// Computes completion rate, streaks and rollups from daily due sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressStatistics;

impl ProgressStatistics {
    /// Compute statistics for `user_id` over every day of `range`.
    pub fn compute_stats(
        &self,
        aggregator: &DailyAggregator,
        user_id: UserId,
        range: &DateRange,
    ) -> Result<ProgressStats> {
        let mut overall = Tally::default();
        let mut per_priority: BTreeMap<Priority, Tally> =
            Priority::ALL.iter().map(|p| (*p, Tally::default())).collect();
        let mut per_group: BTreeMap<GroupKey, Tally> = BTreeMap::new();
        let mut days = Vec::with_capacity(range.len());

        for date in range {
            let mut day = Tally::default();
            for (routine, completed) in aggregator.due_entries(user_id, date)? {
                day.count(completed);
                per_priority.entry(routine.priority).or_default().count(completed);
                per_group
                    .entry(aggregator.catalog().group_key(routine))
                    .or_default()
                    .count(completed);
            }
            overall.completed += day.completed;
            overall.total += day.total;
            days.push(DayProgress {
                date,
                due: day.total,
                completed: day.completed,
            });
        }

        Ok(ProgressStats {
            range: *range,
            completion_rate: overall.rate(),
            streak_days: current_streak(&days),
            longest_streak_days: longest_streak(&days),
            per_priority,
            per_group,
            days,
        })
    }
}

/// Perfect days walking back from the most recent day, skipping rest days.
fn current_streak(days: &[DayProgress]) -> u32 {
    let mut streak = 0;
    for day in days.iter().rev() {
        if day.is_rest_day() {
            continue;
        }
        if !day.is_perfect() {
            break;
        }
        streak += 1;
    }
    streak
}

fn longest_streak(days: &[DayProgress]) -> u32 {
    let mut best = 0;
    let mut run = 0;
    for day in days.iter().filter(|d| !d.is_rest_day()) {
        if day.is_perfect() {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

fn percentage(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (completed, total) = (u64::from(completed), u64::from(total));
    ((200 * completed + total) / (2 * total)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone, Utc, Weekday};
    use routine_core::{
        Completion, Group, GroupId, LocalCalendar, RepetitionSchedule, Routine, WeekdaySchedule,
    };
    use crate::aggregator::RoutineCatalog;
    use crate::ledger::CompletionLedger;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn done(r: &Routine, y: i32, m: u32, d: u32) -> Completion {
        Completion::new(r.id, r.owner_id, Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())
    }

    fn daily(r: &Routine, anchor: NaiveDate) -> Option<RepetitionSchedule> {
        Some(RepetitionSchedule::new(r.id, 1, anchor).unwrap())
    }

    fn aggregator(
        user: UserId,
        routines: Vec<(Routine, Option<WeekdaySchedule>, Option<RepetitionSchedule>)>,
        groups: Vec<Group>,
        completions: Vec<Completion>,
    ) -> DailyAggregator {
        let mut catalog = RoutineCatalog::new();
        for g in groups {
            catalog.insert_group(g);
        }
        for (r, w, rep) in routines {
            catalog.insert(r, w, rep).unwrap();
        }
        DailyAggregator::new(catalog, CompletionLedger::new(user, LocalCalendar::utc(), completions))
    }

    #[test]
    fn nothing_due_gives_zero_rate_and_streak() {
        let user = UserId::new();
        let r = Routine::new(user, "Never", Priority::High, NaiveTime::MIN);
        let agg = aggregator(user, vec![(r, None, None)], vec![], vec![]);
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 31));

        let stats = ProgressStatistics.compute_stats(&agg, user, &range).unwrap();
        assert_eq!(stats.completion_rate, 0);
        assert_eq!(stats.streak_days, 0);
        assert_eq!(stats.longest_streak_days, 0);
        assert_eq!(stats.days.len(), 31);
        assert_eq!(stats.per_priority[&Priority::High], Tally::default());
        assert!(stats.per_group.is_empty());
    }

    #[test]
    fn three_day_streak_and_broken_middle() {
        let user = UserId::new();
        let r = Routine::new(user, "Pushups", Priority::Medium, NaiveTime::MIN);
        let range = DateRange::new(date(2024, 3, 1), date(2024, 3, 3));

        let all_done = vec![done(&r, 2024, 3, 1), done(&r, 2024, 3, 2), done(&r, 2024, 3, 3)];
        let agg = aggregator(user, vec![(r.clone(), None, daily(&r, date(2024, 3, 1)))], vec![], all_done);
        let stats = ProgressStatistics.compute_stats(&agg, user, &range).unwrap();
        assert_eq!(stats.streak_days, 3);
        assert_eq!(stats.completion_rate, 100);

        let gap = vec![done(&r, 2024, 3, 1), done(&r, 2024, 3, 3)];
        let agg = aggregator(user, vec![(r.clone(), None, daily(&r, date(2024, 3, 1)))], vec![], gap);
        let stats = ProgressStatistics.compute_stats(&agg, user, &range).unwrap();
        assert_eq!(stats.streak_days, 1);
        assert_eq!(stats.longest_streak_days, 1);
        assert_eq!(stats.completion_rate, 67);
    }

    #[test]
    fn streak_is_zero_when_last_day_is_incomplete() {
        let user = UserId::new();
        let r = Routine::new(user, "Read", Priority::Low, NaiveTime::MIN);
        let completions = vec![done(&r, 2024, 3, 1), done(&r, 2024, 3, 2)];
        let agg = aggregator(user, vec![(r.clone(), None, daily(&r, date(2024, 3, 1)))], vec![], completions);
        let range = DateRange::new(date(2024, 3, 1), date(2024, 3, 3));

        let stats = ProgressStatistics.compute_stats(&agg, user, &range).unwrap();
        assert_eq!(stats.streak_days, 0);
        assert_eq!(stats.longest_streak_days, 2);
    }

    #[test]
    fn rest_days_are_skipped_transparently() {
        let user = UserId::new();
        // Due Mon/Wed/Fri; 2024-01-08 is a Monday.
        let r = Routine::new(user, "Swim", Priority::High, NaiveTime::MIN);
        let flags = WeekdaySchedule::from_days(r.id, &[Weekday::Mon, Weekday::Wed, Weekday::Fri]);
        let completions = vec![done(&r, 2024, 1, 8), done(&r, 2024, 1, 10), done(&r, 2024, 1, 12)];
        let agg = aggregator(user, vec![(r, Some(flags), None)], vec![], completions);

        // Range ends on Sunday: Sat and Sun are rest days and must not break it.
        let range = DateRange::new(date(2024, 1, 8), date(2024, 1, 14));
        let stats = ProgressStatistics.compute_stats(&agg, user, &range).unwrap();
        assert_eq!(stats.streak_days, 3);
        assert_eq!(stats.completion_rate, 100);
        assert!(stats.days[6].is_rest_day());
    }

    #[test]
    fn rollups_by_priority_and_group() {
        let user = UserId::new();
        let health = Group::new(user, "Health");
        let anchor = date(2024, 5, 1);

        let vitamins = Routine::new(user, "Vitamins", Priority::High, NaiveTime::MIN).with_group(health.id);
        let plants = Routine::new(user, "Plants", Priority::Low, NaiveTime::MIN).with_group(GroupId::new());
        let plants_rule = Some(RepetitionSchedule::new(plants.id, 2, anchor).unwrap());

        let completions = vec![
            done(&vitamins, 2024, 5, 1),
            done(&vitamins, 2024, 5, 2),
            done(&plants, 2024, 5, 3),
        ];
        let agg = aggregator(
            user,
            vec![
                (vitamins.clone(), None, daily(&vitamins, anchor)),
                (plants.clone(), None, plants_rule),
            ],
            vec![health.clone()],
            completions,
        );
        let range = DateRange::new(anchor, date(2024, 5, 4));
        let stats = ProgressStatistics.compute_stats(&agg, user, &range).unwrap();

        assert_eq!(stats.per_priority[&Priority::High], Tally { completed: 2, total: 4 });
        assert_eq!(stats.per_priority[&Priority::Low], Tally { completed: 1, total: 2 });
        assert_eq!(stats.per_priority[&Priority::Medium], Tally::default());
        assert_eq!(stats.per_group[&GroupKey::Group(health.id)], Tally { completed: 2, total: 4 });
        assert_eq!(stats.per_group[&GroupKey::Ungrouped], Tally { completed: 1, total: 2 });
        assert_eq!(stats.completion_rate, 50);
        assert_eq!(stats.days[2], DayProgress { date: date(2024, 5, 3), due: 2, completed: 1 });
    }

    #[test]
    fn stats_for_another_user_are_rejected() {
        let owner = UserId::new();
        let other = UserId::new();
        let r = Routine::new(other, "Swim", Priority::Low, NaiveTime::MIN);
        let completions = vec![done(&r, 2024, 1, 1)];
        let agg = aggregator(owner, vec![(r.clone(), None, daily(&r, date(2024, 1, 1)))], vec![], completions);

        let result = ProgressStatistics.compute_stats(&agg, other, &DateRange::day(date(2024, 1, 1)));
        assert!(matches!(result, Err(routine_core::Error::NotFound(_))));
    }

    #[test]
    fn rate_rounds_half_up() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(Tally { completed: 5, total: 5 }.rate(), 100);
    }

    #[test]
    fn stats_serialize_to_json() {
        let user = UserId::new();
        let r = Routine::new(user, "Tea", Priority::Medium, NaiveTime::MIN);
        let agg = aggregator(user, vec![(r.clone(), None, daily(&r, date(2024, 1, 1)))], vec![], vec![]);
        let stats = ProgressStatistics
            .compute_stats(&agg, user, &DateRange::day(date(2024, 1, 1)))
            .unwrap();

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["per_group"]["ungrouped"]["total"], 1);
        assert_eq!(json["per_priority"]["medium"]["completed"], 0);
    }
}
