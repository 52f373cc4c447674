//! routine CLI - track recurring habits from the terminal.

use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use chrono::{FixedOffset, Local, NaiveDate, NaiveTime, Weekday};
use clap::{ArgGroup, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;
use routine_core::{
    DateRange, Group, GroupId, LocalCalendar, Priority, RepetitionSchedule, Routine, RoutineId,
    RoutinePatch, UserId, WeekdaySchedule,
};
use routine_progress::{
    BasicProgressTracker, ProgressStats, ProgressTracker, RecurrenceEvaluator, Toggle,
    TrackerConfig,
};
use routine_storage::{JsonStorage, Storage};

#[derive(Parser)]
#[command(name = "routine")]
#[command(about = "Personal routine and habit tracker", long_about = None)]
struct Cli {
    /// Data directory
    #[arg(long, global = true, default_value = ".routine")]
    data_dir: PathBuf,

    /// Local UTC offset, e.g. +02:00 (defaults to the system offset)
    #[arg(long, global = true, value_parser = parse_offset)]
    utc_offset: Option<FixedOffset>,

    /// Local time at which a new day starts
    #[arg(long, global = true, value_parser = parse_time, default_value = "00:00")]
    day_starts_at: NaiveTime,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new routine
    #[command(group(ArgGroup::new("schedule").required(true).args(["days", "every"])))]
    Add {
        /// Routine name
        name: String,
        /// Priority (low, medium, high)
        #[arg(long, default_value = "medium")]
        priority: Priority,
        /// Expected time of day (HH:MM)
        #[arg(long, value_parser = parse_time, default_value = "09:00")]
        time: NaiveTime,
        /// Group ID
        #[arg(long)]
        group: Option<GroupId>,
        /// Icon tag
        #[arg(long, default_value = "")]
        icon: String,
        /// Weekdays, comma separated (mon,wed,fri)
        #[arg(long, value_delimiter = ',')]
        days: Vec<Weekday>,
        /// Repeat every N days
        #[arg(long)]
        every: Option<u32>,
        /// First day of the repetition (defaults to today)
        #[arg(long, requires = "every")]
        from: Option<NaiveDate>,
    },
    /// Edit a routine
    Edit {
        /// Routine ID
        id: RoutineId,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New priority
        #[arg(long)]
        priority: Option<Priority>,
        /// New expected time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        time: Option<NaiveTime>,
        /// Move to group
        #[arg(long, conflicts_with = "no_group")]
        group: Option<GroupId>,
        /// Remove from its group
        #[arg(long)]
        no_group: bool,
        /// New icon tag
        #[arg(long)]
        icon: Option<String>,
        /// Replace weekday flags
        #[arg(long, value_delimiter = ',')]
        days: Vec<Weekday>,
        /// Replace repetition interval (refused when scheduled by weekday)
        #[arg(long)]
        every: Option<u32>,
    },
    /// Remove a routine with its schedules and completions
    Remove {
        /// Routine ID
        id: RoutineId,
    },
    /// Add a group
    GroupAdd {
        /// Group name
        name: String,
        /// Display order
        #[arg(long)]
        order: Option<i32>,
    },
    /// Remove a group (its routines become ungrouped)
    GroupRemove {
        /// Group ID
        id: GroupId,
    },
    /// List routines and when they are next due
    List,
    /// Show routines due on a day
    Today {
        /// Day to show (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Mark a routine done
    Done {
        /// Routine ID
        id: RoutineId,
        /// Day (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Unmark a routine
    Undo {
        /// Routine ID
        id: RoutineId,
        /// Day (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Flip a routine's completion
    Toggle {
        /// Routine ID
        id: RoutineId,
        /// Day (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show progress statistics
    Stats {
        /// First day (defaults to the start of the window)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day (defaults to today)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize, Deserialize)]
struct Profile {
    user_id: UserId,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let storage = JsonStorage::new(&cli.data_dir).await?;
    let user = load_or_create_profile(&cli.data_dir).await?;
    let offset = cli.utc_offset.unwrap_or_else(|| *Local::now().offset());
    let config = TrackerConfig {
        calendar: LocalCalendar::new(offset).with_day_start(cli.day_starts_at),
        ..Default::default()
    };
    let mut tracker = BasicProgressTracker::new(storage).with_config(config);
    let today = tracker.today();

    match cli.command {
        Commands::Add { name, priority, time, group, icon, days, every, from } => {
            let mut routine = Routine::new(user, name, priority, time).with_icon(icon);
            routine.group_id = group;
            let storage = tracker.storage_mut();
            if let Some(every) = every {
                let schedule = RepetitionSchedule::new(routine.id, every, from.unwrap_or(today))?;
                storage.save_repetition_schedule(&schedule).await?;
            } else {
                storage
                    .save_weekday_schedule(&WeekdaySchedule::from_days(routine.id, &days))
                    .await?;
            }
            storage.save_routine(&routine).await?;
            println!("Added routine: {} - {}", routine.id, routine.name);
        }
        Commands::Edit { id, name, priority, time, group, no_group, icon, days, every } => {
            let storage = tracker.storage_mut();
            let mut routine = owned_routine(storage, user, id).await?;
            if every.is_some() {
                let has_weekdays =
                    !days.is_empty() || storage.get_weekday_schedule(id).await?.is_some();
                ensure_interval_applies(id, has_weekdays)?;
            }
            let patch = RoutinePatch {
                name,
                priority,
                group_id: if no_group { Some(None) } else { group.map(Some) },
                expected_time: time,
                icon,
            };
            if !patch.is_empty() {
                routine.apply(patch);
                storage.save_routine(&routine).await?;
            }
            if !days.is_empty() {
                let replacement = WeekdaySchedule::from_days(id, &days);
                let mut schedule = storage
                    .get_weekday_schedule(id)
                    .await?
                    .unwrap_or_else(|| WeekdaySchedule::empty(id));
                schedule.replace_flags(&replacement);
                storage.save_weekday_schedule(&schedule).await?;
            }
            if let Some(every) = every {
                let schedule = match storage.get_repetition_schedule(id).await? {
                    Some(mut schedule) => {
                        schedule.set_interval(every)?;
                        schedule
                    }
                    None => RepetitionSchedule::new(id, every, today)?,
                };
                storage.save_repetition_schedule(&schedule).await?;
            }
            println!("Updated routine: {} - {}", routine.id, routine.name);
        }
        Commands::Remove { id } => {
            let storage = tracker.storage_mut();
            let routine = owned_routine(storage, user, id).await?;
            storage.delete_routine(id).await?;
            println!("Removed routine: {} - {}", id, routine.name);
        }
        Commands::GroupAdd { name, order } => {
            let mut group = Group::new(user, name);
            group.order = order;
            tracker.storage_mut().save_group(&group).await?;
            println!("Added group: {} - {}", group.id, group.name);
        }
        Commands::GroupRemove { id } => {
            tracker.storage_mut().delete_group(id).await?;
            println!("Removed group: {}", id);
        }
        Commands::List => {
            let aggregator = tracker.load(user, &DateRange::day(today)).await?;
            let catalog = aggregator.catalog();
            println!("Routines ({})", catalog.len());
            for routine in catalog.routines_of(user) {
                let next = RecurrenceEvaluator.next_due_on_or_after(catalog.rule(routine.id), today)?;
                println!(
                    "  {} | {:6} | {} | {} - next: {}",
                    routine.id,
                    routine.priority,
                    routine.expected_time.format("%H:%M"),
                    routine.name,
                    next.map(|d| d.to_string()).unwrap_or_else(|| "never".to_string()),
                );
            }
        }
        Commands::Today { date } => {
            let date = date.unwrap_or(today);
            let grouped = tracker.due_routines(user, date).await?;
            println!("Due on {} ({})", date, date.format("%A"));
            if grouped.is_empty() {
                println!("  Nothing due");
            }
            for bucket in grouped.iter() {
                let title = bucket.group.as_ref().map(|g| g.name.as_str()).unwrap_or("Ungrouped");
                println!("  {}", title);
                for due in &bucket.routines {
                    println!(
                        "    [{}] {} {} ({}) {}",
                        if due.completed { "x" } else { " " },
                        due.routine.expected_time.format("%H:%M"),
                        due.routine.name,
                        due.routine.priority,
                        due.routine.id,
                    );
                }
            }
        }
        Commands::Done { id, date } => {
            let date = date.unwrap_or(today);
            tracker.complete(user, id, date).await?;
            println!("Done: {} on {}", id, date);
        }
        Commands::Undo { id, date } => {
            let date = date.unwrap_or(today);
            tracker.uncomplete(user, id, date).await?;
            println!("Undone: {} on {}", id, date);
        }
        Commands::Toggle { id, date } => {
            let date = date.unwrap_or(today);
            match tracker.toggle(user, id, date).await? {
                Toggle::Completed(_) => println!("Done: {} on {}", id, date),
                Toggle::Uncompleted(_) => println!("Undone: {} on {}", id, date),
            }
        }
        Commands::Stats { from, to, json } => {
            let to = to.unwrap_or(today);
            let stats = match from {
                Some(from) => {
                    if from > to {
                        bail!("--from {} is after --to {}", from, to);
                    }
                    tracker.stats(user, DateRange::new(from, to)).await?
                }
                None => tracker.recent_stats(user, to).await?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
        }
    }

    Ok(())
}

async fn load_or_create_profile(data_dir: &Path) -> Result<UserId> {
    let path = data_dir.join("user.json");
    match tokio::fs::read_to_string(&path).await {
        Ok(json) => {
            let profile: Profile = serde_json::from_str(&json)
                .with_context(|| format!("Invalid profile at {}", path.display()))?;
            Ok(profile.user_id)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let profile = Profile { user_id: UserId::new() };
            tokio::fs::write(&path, serde_json::to_string_pretty(&profile)?).await?;
            info!("Created profile {}", profile.user_id);
            Ok(profile.user_id)
        }
        Err(e) => Err(e.into()),
    }
}

async fn owned_routine(storage: &JsonStorage, user: UserId, id: RoutineId) -> Result<Routine> {
    match storage.load_routine(id).await? {
        Some(routine) if routine.owner_id == user => Ok(routine),
        _ => bail!("Routine not found: {}", id),
    }
}

/// A weekday schedule always takes precedence, so an interval saved next
/// to one would never be evaluated.
fn ensure_interval_applies(id: RoutineId, has_weekdays: bool) -> Result<()> {
    if has_weekdays {
        bail!(
            "Routine {} is scheduled by weekday; --every would have no effect",
            id
        );
    }
    Ok(())
}

fn print_stats(stats: &ProgressStats) {
    println!("Progress {} to {}", stats.range.start(), stats.range.end());
    println!("  Completion: {}%", stats.completion_rate);
    println!("  Streak: {} days (longest {})", stats.streak_days, stats.longest_streak_days);
    println!("  By priority:");
    for priority in Priority::ALL {
        if let Some(tally) = stats.per_priority.get(&priority) {
            println!("    {:6} {}/{} ({}%)", priority, tally.completed, tally.total, tally.rate());
        }
    }
    if !stats.per_group.is_empty() {
        println!("  By group:");
        for (key, tally) in &stats.per_group {
            println!("    {} {}/{} ({}%)", key, tally.completed, tally.total, tally.rate());
        }
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("expected HH:MM: {}", e))
}

fn parse_offset(s: &str) -> Result<FixedOffset, String> {
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(format!("expected +HH:MM or -HH:MM, got `{}`", s)),
    };
    let time = NaiveTime::parse_from_str(rest, "%H:%M")
        .map_err(|e| format!("expected +HH:MM or -HH:MM: {}", e))?;
    let seconds = time.signed_duration_since(NaiveTime::MIN).num_seconds() as i32;
    FixedOffset::east_opt(sign * seconds).ok_or_else(|| format!("offset out of range: `{}`", s))
}
