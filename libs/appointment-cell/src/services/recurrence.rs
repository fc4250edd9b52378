// libs/appointment-cell/src/services/recurrence.rs
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

use crate::models::{Cadence, RecurrenceSpec};

/// Longest span a repeating series may cover, first to last occurrence.
pub const MAX_SERIES_LENGTH_DAYS: i64 = 365;

/// Date of the last occurrence of a series of `count` appointments starting on `start_date`.
///
/// Saturates at `NaiveDate::MAX` when the series runs past the end of the calendar.
pub fn calculate_last_occurrence(start_date: NaiveDate, cadence: Cadence, count: u32) -> NaiveDate {
    nth_occurrence(start_date, cadence, count.saturating_sub(1)).unwrap_or(NaiveDate::MAX)
}

/// Every date in the series, first to last.
pub fn occurrences(start_date: NaiveDate, cadence: Cadence, count: u32) -> Vec<NaiveDate> {
    (0..count)
        .map_while(|index| nth_occurrence(start_date, cadence, index))
        .collect()
}

pub fn series_end_date(start_date: NaiveDate, recurrence: &RecurrenceSpec) -> NaiveDate {
    calculate_last_occurrence(start_date, recurrence.cadence, recurrence.count)
}

/// Most occurrences of `cadence` that could fit inside `MAX_SERIES_LENGTH_DAYS`.
pub fn max_occurrences(cadence: Cadence) -> u32 {
    let days = MAX_SERIES_LENGTH_DAYS as u32;
    match cadence {
        Cadence::Daily => days + 1,
        Cadence::Weekdays => days / 7 * 5 + 2,
        Cadence::Weekly => days / 7 + 1,
        Cadence::Fortnightly => days / 14 + 1,
        Cadence::Monthly => 13,
    }
}

pub fn exceeds_max_series_length(start_date: NaiveDate, recurrence: &RecurrenceSpec) -> bool {
    recurrence.count > max_occurrences(recurrence.cadence)
        || (series_end_date(start_date, recurrence) - start_date).num_days() > MAX_SERIES_LENGTH_DAYS
}

fn nth_occurrence(start_date: NaiveDate, cadence: Cadence, steps: u32) -> Option<NaiveDate> {
    if steps == 0 {
        return Some(start_date);
    }

    let steps = u64::from(steps);
    match cadence {
        Cadence::Daily => start_date.checked_add_days(Days::new(steps)),
        Cadence::Weekly => start_date.checked_add_days(Days::new(7 * steps)),
        Cadence::Fortnightly => start_date.checked_add_days(Days::new(14 * steps)),
        Cadence::Weekdays => {
            // Five weekdays on from a weekday is always the same weekday a week later
            let (from, steps) = if is_weekend(start_date) {
                (next_weekday(start_date)?, steps - 1)
            } else {
                (start_date, steps)
            };
            let whole_weeks = from.checked_add_days(Days::new(7 * (steps / 5)))?;
            (0..steps % 5).try_fold(whole_weeks, |date, _| next_weekday(date))
        }
        // checked_add_months clamps the 29th-31st to the last day of a short month
        Cadence::Monthly => start_date.checked_add_months(Months::new(u32::try_from(steps).ok()?)),
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn next_weekday(date: NaiveDate) -> Option<NaiveDate> {
    let mut next = date.succ_opt()?;
    while is_weekend(next) {
        next = next.succ_opt()?;
    }
    Some(next)
}
