//! Recurrence & completion engine.
//!
//! Due-date evaluation, completion bookkeeping, daily aggregation and
//! progress statistics, plus a storage-backed tracker service.

#![warn(missing_docs)]

pub mod recurrence;
pub mod ledger;
pub mod aggregator;
pub mod statistics;
pub mod tracker;

pub use recurrence::RecurrenceEvaluator;
pub use ledger::CompletionLedger;
pub use aggregator::{
    DailyAggregator, DueRoutine, GroupBucket, GroupKey, GroupedDueRoutines, RoutineCatalog, Toggle,
};
pub use statistics::{DayProgress, ProgressStatistics, ProgressStats, Tally};
pub use tracker::{BasicProgressTracker, ProgressTracker, TrackerConfig, TrackerError};
