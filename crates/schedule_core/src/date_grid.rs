//! crates/schedule_core/src/date_grid.rs
//!
//! Calendar-date arithmetic: Monday-first month grids, week strips, and the
//! season-relative week index. Everything here works on `NaiveDate`, so a
//! time of day or a UTC offset can never shift a date onto its neighbour.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeZone};
use serde::Serialize;

use crate::domain::{DateRange, DAYS_PER_WEEK};
use crate::error::ValidationError;

/// One cell of a month grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridCell {
    pub date: NaiveDate,
    pub in_target_month: bool,
}

//=========================================================================================
// Canonical Date Keys
//=========================================================================================

/// The canonical `YYYY-MM-DD` key of a calendar date.
pub fn date_key(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// The key of the local calendar day a timestamp falls on in its own zone.
pub fn local_date_key<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> String {
    date_key(&timestamp.date_naive())
}

/// Parses a canonical date key. Anything but a zero-padded `YYYY-MM-DD`
/// naming a real calendar day is rejected.
pub fn parse_date_key(key: &str) -> Result<NaiveDate, ValidationError> {
    let bytes = key.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return Err(ValidationError::MalformedDate(key.to_string()));
    }
    NaiveDate::parse_from_str(key, "%Y-%m-%d")
        .map_err(|_| ValidationError::MalformedDate(key.to_string()))
}

//=========================================================================================
// Weeks
//=========================================================================================

/// Weekday slot of a date, Monday = 0 ... Sunday = 6.
pub fn weekday_slot(date: NaiveDate) -> usize {
    date.weekday().num_days_from_monday() as usize
}

/// The Monday on or before `date`.
pub fn monday_align(date: NaiveDate) -> NaiveDate {
    date - Days::new(weekday_slot(date) as u64)
}

/// Monday through Sunday of the week containing `date`.
pub fn week_of(date: NaiveDate) -> [NaiveDate; DAYS_PER_WEEK] {
    let monday = monday_align(date);
    std::array::from_fn(|offset| monday + Days::new(offset as u64))
}

/// Zero-based count of Monday-aligned weeks between the season start and `date`.
/// `None` when `date` falls before the Monday of the season's first week.
pub fn week_index(date: NaiveDate, season_start: NaiveDate) -> Option<u32> {
    let elapsed = date.signed_duration_since(monday_align(season_start)).num_days();
    if elapsed < 0 {
        return None;
    }
    u32::try_from(elapsed / DAYS_PER_WEEK as i64).ok()
}

//=========================================================================================
// Months
//=========================================================================================

/// First and last day of the month containing `anchor`.
pub fn month_bounds(anchor: NaiveDate) -> DateRange {
    let first = anchor - Days::new(anchor.day0() as u64);
    let last = first
        .checked_add_months(Months::new(1))
        .map(|next| next - Days::new(1))
        .unwrap_or(NaiveDate::MAX);
    DateRange {
        start: first,
        end: last,
    }
}

/// Monday before the first of the month through Sunday after its last day.
pub fn grid_bounds(anchor: NaiveDate) -> DateRange {
    let month = month_bounds(anchor);
    DateRange {
        start: monday_align(month.start),
        end: monday_align(month.end) + Days::new(DAYS_PER_WEEK as u64 - 1),
    }
}

/// The full Monday-first grid of the month containing `anchor`.
pub fn weeks_of_month(anchor: NaiveDate) -> Vec<[GridCell; DAYS_PER_WEEK]> {
    let month = month_bounds(anchor);
    let grid = grid_bounds(anchor);

    let mut weeks = Vec::with_capacity(6);
    let mut monday = grid.start;
    while monday <= grid.end {
        weeks.push(week_of(monday).map(|date| GridCell {
            date,
            in_target_month: month.contains(date),
        }));
        monday = monday + Days::new(DAYS_PER_WEEK as u64);
    }
    weeks
}

/// Moves `date` by whole calendar months. A day that does not exist in the
/// target month is clamped to its last day (Jan 31 + 1 month = Feb 28/29).
pub fn shift_months(date: NaiveDate, months: i32) -> NaiveDate {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}
