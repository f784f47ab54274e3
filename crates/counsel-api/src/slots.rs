//! Slot availability document

use counsel_util::{CounselError, DateKey, Result, WallClock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-date, per-time-slot active flags.
///
/// A slot with no entry is inactive. The whole book is persisted as one
/// document, so every mutation here is applied to an in-memory copy and
/// committed in a single write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotBook {
    days: BTreeMap<DateKey, BTreeMap<WallClock, bool>>,
}

impl SlotBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, date: DateKey, time: WallClock) -> bool {
        self.days
            .get(&date)
            .and_then(|slots| slots.get(&time))
            .copied()
            .unwrap_or(false)
    }

    /// All slot entries for a date, active or not
    pub fn slots_for(&self, date: DateKey) -> BTreeMap<WallClock, bool> {
        self.days.get(&date).cloned().unwrap_or_default()
    }

    pub fn active_count(&self, date: DateKey) -> usize {
        self.days
            .get(&date)
            .map(|slots| slots.values().filter(|active| **active).count())
            .unwrap_or(0)
    }

    pub fn active_times(&self, date: DateKey) -> Vec<WallClock> {
        self.days
            .get(&date)
            .map(|slots| {
                slots
                    .iter()
                    .filter(|(_, active)| **active)
                    .map(|(time, _)| *time)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Dates that have at least one slot entry
    pub fn dates(&self) -> impl Iterator<Item = DateKey> + '_ {
        self.days.keys().copied()
    }

    pub fn set(&mut self, date: DateKey, time: WallClock, active: bool) {
        self.days.entry(date).or_default().insert(time, active);
    }

    pub fn set_many(&mut self, date: DateKey, times: &[WallClock], active: bool) {
        if times.is_empty() {
            return;
        }
        let slots = self.days.entry(date).or_default();
        for time in times {
            slots.insert(*time, active);
        }
    }

    /// Activate every label `start, start + interval, ...` before `end` and
    /// deactivate every other slot recorded for the date.
    ///
    /// Invalid arguments leave the book untouched.
    pub fn apply_working_hours(
        &mut self,
        date: DateKey,
        start: WallClock,
        end: WallClock,
        interval_minutes: u32,
    ) -> Result<usize> {
        if interval_minutes == 0 {
            return Err(CounselError::invalid_input("interval must be positive"));
        }
        if start >= end {
            return Err(CounselError::invalid_input(format!(
                "working hours start {} must be before end {}",
                start, end
            )));
        }

        let working = WallClock::range(start, end, interval_minutes);
        let slots = self.days.entry(date).or_default();
        for active in slots.values_mut() {
            *active = false;
        }
        for time in &working {
            slots.insert(*time, true);
        }
        Ok(working.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> DateKey {
        DateKey::from_ymd(2024, 6, 20).unwrap()
    }

    fn t(s: &str) -> WallClock {
        s.parse().unwrap()
    }

    fn hourly_day() -> Vec<WallClock> {
        (0..24).map(|h| WallClock::new(h, 0).unwrap()).collect()
    }

    #[test]
    fn test_missing_slots_are_inactive() {
        let book = SlotBook::new();
        assert!(!book.is_active(date(), t("10:00")));
        assert!(book.slots_for(date()).is_empty());
        assert_eq!(book.active_count(date()), 0);
    }

    #[test]
    fn test_set_creates_date_mapping() {
        let mut book = SlotBook::new();
        book.set(date(), t("10:00"), true);
        book.set(date(), t("11:00"), false);

        assert!(book.is_active(date(), t("10:00")));
        assert_eq!(book.slots_for(date()).len(), 2);
        assert_eq!(book.active_count(date()), 1);
        assert_eq!(book.dates().collect::<Vec<_>>(), vec![date()]);
    }

    #[test]
    fn test_working_hours_activate_window_only() {
        let mut book = SlotBook::new();
        let labels = hourly_day();
        // Half of the day defined as active, half inactive
        for (i, label) in labels.iter().enumerate() {
            book.set(date(), *label, i % 2 == 0);
        }

        let activated = book
            .apply_working_hours(date(), t("09:00"), t("18:00"), 60)
            .unwrap();
        assert_eq!(activated, 9);

        let expected: Vec<WallClock> = (9..18).map(|h| WallClock::new(h, 0).unwrap()).collect();
        assert_eq!(book.active_times(date()), expected);
        assert_eq!(book.slots_for(date()).len(), 24);
    }

    #[test]
    fn test_working_hours_deactivate_off_interval_labels() {
        let mut book = SlotBook::new();
        book.set(date(), t("09:30"), true);

        book.apply_working_hours(date(), t("09:00"), t("11:00"), 60)
            .unwrap();

        assert!(!book.is_active(date(), t("09:30")));
        assert_eq!(book.active_times(date()), vec![t("09:00"), t("10:00")]);
    }

    #[test]
    fn test_invalid_working_hours_leave_book_untouched() {
        let mut book = SlotBook::new();
        book.set(date(), t("10:00"), true);
        let before = book.clone();

        assert!(book.apply_working_hours(date(), t("09:00"), t("18:00"), 0).is_err());
        assert!(book.apply_working_hours(date(), t("18:00"), t("09:00"), 60).is_err());
        assert_eq!(book, before);
    }

    #[test]
    fn test_serializes_as_nested_label_maps() {
        let mut book = SlotBook::new();
        book.set(date(), t("10:00"), true);
        let json = serde_json::to_string(&book).unwrap();
        assert_eq!(json, r#"{"2024-06-20":{"10:00":true}}"#);
    }
}
