//! Recurrence evaluation: is a routine due on a given day.

use chrono::{Duration, NaiveDate};
use routine_core::calendar::{days_between, weekday_of};
use routine_core::{Error, RecurrenceRule, RepetitionSchedule, Result, Routine, WeekdaySchedule};

/// Decides whether routines are due on calendar days.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecurrenceEvaluator;

impl RecurrenceEvaluator {
    /// Whether `routine` is due on `date` given its schedules.
    ///
    /// A weekday schedule wins over a repetition schedule; with neither the
    /// routine is never due.
    pub fn is_due(
        &self,
        routine: &Routine,
        weekday: Option<&WeekdaySchedule>,
        repetition: Option<&RepetitionSchedule>,
        date: NaiveDate,
    ) -> Result<bool> {
        let rule = self.rule_for(routine, weekday, repetition)?;
        self.evaluate(&rule, date)
    }

    /// Resolve a routine's schedules into its rule, checking they belong to it.
    pub fn rule_for(
        &self,
        routine: &Routine,
        weekday: Option<&WeekdaySchedule>,
        repetition: Option<&RepetitionSchedule>,
    ) -> Result<RecurrenceRule> {
        let foreign = weekday
            .map(|w| w.routine_id)
            .into_iter()
            .chain(repetition.map(|r| r.routine_id))
            .find(|id| *id != routine.id);
        if let Some(other) = foreign {
            return Err(Error::InvalidConfiguration(format!(
                "schedule of routine {} supplied for routine {}",
                other, routine.id
            )));
        }
        Ok(RecurrenceRule::from_schedules(weekday, repetition))
    }

    /// Whether `rule` makes its routine due on `date`.
    pub fn evaluate(&self, rule: &RecurrenceRule, date: NaiveDate) -> Result<bool> {
        match rule {
            RecurrenceRule::Weekday(flags) => Ok(flags.is_set(weekday_of(date))),
            RecurrenceRule::Repetition(rep) => {
                rep.validate()?;
                if date < rep.anchor_date {
                    return Ok(false);
                }
                let elapsed = days_between(rep.anchor_date, date);
                Ok(elapsed % i64::from(rep.interval_days) == 0)
            }
            RecurrenceRule::None => Ok(false),
        }
    }

    /// First day on or after `from` on which `rule` is due, if any.
    pub fn next_due_on_or_after(
        &self,
        rule: &RecurrenceRule,
        from: NaiveDate,
    ) -> Result<Option<NaiveDate>> {
        match rule {
            RecurrenceRule::Weekday(_) => {
                for offset in 0..7 {
                    let date = from + Duration::days(offset);
                    if self.evaluate(rule, date)? {
                        return Ok(Some(date));
                    }
                }
                Ok(None)
            }
            RecurrenceRule::Repetition(rep) => {
                rep.validate()?;
                if from <= rep.anchor_date {
                    return Ok(Some(rep.anchor_date));
                }
                let interval = i64::from(rep.interval_days);
                let elapsed = days_between(rep.anchor_date, from);
                let periods = (elapsed + interval - 1) / interval;
                Ok(Some(rep.anchor_date + Duration::days(periods * interval)))
            }
            RecurrenceRule::None => Ok(None),
        }
    }
}
