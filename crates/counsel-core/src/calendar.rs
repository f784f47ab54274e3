//! Month grid generation
//!
//! Pure functions: the same month, day and slot snapshot always produce the
//! same grid.

use chrono::{Datelike, Days};
use counsel_api::{CalendarDay, SlotBook};
use counsel_util::{DateKey, MonthRef};

/// Build the Sunday-first grid for `month`, padded with the trailing days of
/// the previous month and the leading days of the next one so that every
/// row holds seven days.
pub fn month_grid(month: MonthRef, today: DateKey, slots: &SlotBook) -> Vec<CalendarDay> {
    let first = month.first_day().date();
    let last = month.last_day().date();

    let lead = first.weekday().num_days_from_sunday() as u64;
    let trail = 6 - last.weekday().num_days_from_sunday() as u64;
    let in_month = (last - first).num_days() as u64 + 1;

    let start = first.checked_sub_days(Days::new(lead)).unwrap_or(first);
    let cells = if start == first { in_month + trail } else { lead + in_month + trail };

    start
        .iter_days()
        .take(cells as usize)
        .map(|date| describe_day(DateKey::from(date), month, today, slots))
        .collect()
}

/// Annotate a single grid cell.
pub fn describe_day(
    date: DateKey,
    month: MonthRef,
    today: DateKey,
    slots: &SlotBook,
) -> CalendarDay {
    let is_current_month = month.contains(date);
    let is_past = date < today;

    CalendarDay {
        date,
        day: date.date().day(),
        is_current_month,
        is_today: date == today,
        is_past,
        is_weekend: date.is_weekend(),
        active_slot_count: slots.active_count(date),
        is_selectable: is_current_month && !is_past,
    }
}
