//! Time utilities for counsel
//!
//! Provides the wall-clock source used by every view and the value types that
//! replace ad-hoc `YYYY-MM-DD` / `HH:MM` string keys: [`DateKey`],
//! [`WallClock`] and [`MonthRef`].
//!
//! # Mock Time for Development
//!
//! In debug builds, the `COUNSEL_MOCK_TIME` environment variable can be set
//! to override the system time. This is useful for checking which calendar
//! days are selectable or whether a session may start yet.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2024-06-15 09:30:00`)

use chrono::{
    DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::CounselError;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "COUNSEL_MOCK_TIME";

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Cached mock time offset from the real time when the process started.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // Internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => {
                        if let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() {
                            let offset = mock_dt.signed_duration_since(chrono::Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        );
                    }
                    Err(_) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = "%Y-%m-%d %H:%M:%S",
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // The wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Today's date according to [`now`].
pub fn today() -> DateKey {
    DateKey::from(now().date_naive())
}

/// Format a DateTime for display with full date and time.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Time of day used as a slot label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WallClock {
    hour: u8,
    minute: u8,
}

impl WallClock {
    pub const fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Constant label for use in `const` items.
    ///
    /// # Panics
    ///
    /// Panics when `hour` or `minute` is out of range, which fails the
    /// build for a `const`.
    pub const fn from_hm(hour: u8, minute: u8) -> Self {
        match Self::new(hour, minute) {
            Some(time) => time,
            None => panic!("time of day out of range"),
        }
    }

    pub const fn hour(&self) -> u8 {
        self.hour
    }

    pub const fn minute(&self) -> u8 {
        self.minute
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        if minutes >= MINUTES_PER_DAY {
            return None;
        }
        Some(Self {
            hour: (minutes / 60) as u8,
            minute: (minutes % 60) as u8,
        })
    }

    pub fn to_naive_time(self) -> NaiveTime {
        // hour and minute are range-checked on construction
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn minutes_from_midnight(&self) -> u32 {
        (self.hour as u32) * 60 + self.minute as u32
    }

    /// Advance by `minutes`, or `None` when the result would pass midnight
    pub fn add_minutes(self, minutes: u32) -> Option<Self> {
        Self::from_minutes(self.minutes_from_midnight().checked_add(minutes)?)
    }

    /// Labels `start, start + interval, ...` strictly before `end`
    pub fn range(start: WallClock, end: WallClock, interval_minutes: u32) -> Vec<WallClock> {
        let mut labels = Vec::new();
        if interval_minutes == 0 {
            return labels;
        }
        let mut current = Some(start);
        while let Some(label) = current {
            if label >= end {
                break;
            }
            labels.push(label);
            current = label.add_minutes(interval_minutes);
        }
        labels
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.minutes_from_midnight()
            .cmp(&other.minutes_from_midnight())
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for WallClock {
    type Err = CounselError;

    /// Parse `HH:MM`; a single-digit hour such as `9:00` is accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| CounselError::invalid_input(format!("time '{}': {}", s, why));

        let (hour, minute) = s.trim().split_once(':').ok_or_else(|| invalid("expected HH:MM"))?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid("expected HH:MM"));
        }
        let digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if !digits(hour) || !digits(minute) {
            return Err(invalid("expected HH:MM"));
        }
        let hour: u8 = hour.parse().map_err(|_| invalid("invalid hour"))?;
        let minute: u8 = minute.parse().map_err(|_| invalid("invalid minute"))?;

        if hour >= 24 {
            return Err(invalid("hour must be 0-23"));
        }
        if minute >= 60 {
            return Err(invalid("minute must be 0-59"));
        }
        Ok(Self { hour, minute })
    }
}

impl TryFrom<String> for WallClock {
    type Error = CounselError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<WallClock> for String {
    fn from(time: WallClock) -> Self {
        time.to_string()
    }
}

/// Calendar date used to key slots and sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Local date-time at which a slot labelled `time` starts on this date
    pub fn at(&self, time: WallClock) -> NaiveDateTime {
        self.0.and_time(time.to_naive_time())
    }

}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = CounselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|e| CounselError::invalid_input(format!("date '{}': {}", s, e)))
    }
}

impl TryFrom<String> for DateKey {
    type Error = CounselError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DateKey> for String {
    fn from(date: DateKey) -> Self {
        date.to_string()
    }
}

/// A calendar month (`month` is 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthRef {
    year: i32,
    month: u32,
}

impl MonthRef {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        // Rejects years chrono cannot represent as well as bad months
        NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(Self { year, month })
    }

    pub fn containing(date: DateKey) -> Self {
        Self {
            year: date.0.year(),
            month: date.0.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> DateKey {
        DateKey(NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN))
    }

    pub fn last_day(&self) -> DateKey {
        let first = self.first_day().0;
        let last = first
            .checked_add_months(chrono::Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX);
        DateKey(last)
    }

    pub fn contains(&self, date: DateKey) -> bool {
        date.0.year() == self.year && date.0.month() == self.month
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }
}

impl fmt::Display for MonthRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthRef {
    type Err = CounselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CounselError::invalid_input(format!("month '{}': expected YYYY-MM", s));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}
