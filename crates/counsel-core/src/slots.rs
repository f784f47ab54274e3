//! Slot availability service

use counsel_api::{CalendarDay, SlotBook};
use counsel_store::{AuditEventType, Store};
use counsel_util::{DateKey, MonthRef, Result, WallClock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{audit, calendar};

/// Read-modify-write access to the shared slot document.
///
/// Every mutation re-reads the document, applies the change to that copy and
/// commits it with one save, so readers see either the old or the new book.
pub struct SlotAvailability {
    store: Arc<dyn Store>,
}

impl SlotAvailability {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current snapshot of the whole slot document
    pub fn snapshot(&self) -> Result<SlotBook> {
        Ok(self.store.load_slots()?)
    }

    pub fn set_slot(&self, date: DateKey, time: WallClock, active: bool) -> Result<()> {
        self.mutate(date, |book| {
            book.set(date, time, active);
            Ok(())
        })?;
        debug!(date = %date, time = %time, active, "Slot set");
        Ok(())
    }

    pub fn slots_for_date(&self, date: DateKey) -> Result<BTreeMap<WallClock, bool>> {
        Ok(self.snapshot()?.slots_for(date))
    }

    pub fn is_active(&self, date: DateKey, time: WallClock) -> Result<bool> {
        Ok(self.snapshot()?.is_active(date, time))
    }

    pub fn activate_all(&self, date: DateKey, labels: &[WallClock]) -> Result<()> {
        self.set_many(date, labels, true)
    }

    pub fn deactivate_all(&self, date: DateKey, labels: &[WallClock]) -> Result<()> {
        self.set_many(date, labels, false)
    }

    /// Activate the `[start, end)` grid for a date and deactivate everything
    /// else on it. Returns the number of active slots.
    pub fn apply_working_hours(
        &self,
        date: DateKey,
        start: WallClock,
        end: WallClock,
        interval_minutes: u32,
    ) -> Result<usize> {
        let active = self.mutate(date, |book| {
            book.apply_working_hours(date, start, end, interval_minutes)
        })?;

        info!(
            date = %date,
            start = %start,
            end = %end,
            interval_minutes,
            active,
            "Working hours applied"
        );
        Ok(active)
    }

    /// Month grid computed from a single snapshot of the slot document
    pub fn month_view(&self, month: MonthRef, today: DateKey) -> Result<Vec<CalendarDay>> {
        let book = self.snapshot()?;
        Ok(calendar::month_grid(month, today, &book))
    }

    fn set_many(&self, date: DateKey, labels: &[WallClock], active: bool) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }

        self.mutate(date, |book| {
            book.set_many(date, labels, active);
            Ok(())
        })?;
        info!(date = %date, count = labels.len(), active, "Slots updated");
        Ok(())
    }

    fn mutate<T>(&self, date: DateKey, f: impl FnOnce(&mut SlotBook) -> Result<T>) -> Result<T> {
        let mut book = self.store.load_slots()?;
        let out = f(&mut book)?;
        self.store.save_slots(&book)?;

        audit(
            self.store.as_ref(),
            AuditEventType::SlotsChanged {
                date,
                active_count: book.active_count(date),
            },
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use counsel_store::{Document, SqliteStore};
    use counsel_util::CounselError;

    fn service() -> (SlotAvailability, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        (SlotAvailability::new(store.clone()), store)
    }

    fn date() -> DateKey {
        "2024-06-20".parse().unwrap()
    }

    fn t(s: &str) -> WallClock {
        s.parse().unwrap()
    }

    fn half_hour_day() -> Vec<WallClock> {
        (0..24)
            .map(|i| WallClock::from_minutes(8 * 60 + i * 30).unwrap())
            .collect()
    }

    #[test]
    fn test_set_slot_persists() {
        let (slots, _) = service();
        slots.set_slot(date(), t("10:00"), true).unwrap();

        assert!(slots.is_active(date(), t("10:00")).unwrap());
        assert!(!slots.is_active(date(), t("11:00")).unwrap());
        assert_eq!(slots.slots_for_date(date()).unwrap().len(), 1);
    }

    #[test]
    fn test_bulk_activate_and_deactivate() {
        let (slots, _) = service();
        let labels = [t("09:00"), t("10:00"), t("11:00")];

        slots.activate_all(date(), &labels).unwrap();
        assert_eq!(slots.snapshot().unwrap().active_count(date()), 3);

        slots.deactivate_all(date(), &labels[..2]).unwrap();
        let book = slots.snapshot().unwrap();
        assert_eq!(book.active_times(date()), vec![t("11:00")]);
    }

    #[test]
    fn test_empty_label_list_does_not_write() {
        let (slots, store) = service();
        slots.activate_all(date(), &[]).unwrap();
        assert_eq!(store.revision(Document::Slots).unwrap(), 0);
    }

    #[test]
    fn test_working_hours_replace_day() {
        let (slots, _) = service();
        slots.activate_all(date(), &half_hour_day()).unwrap();

        let active = slots
            .apply_working_hours(date(), t("09:00"), t("18:00"), 60)
            .unwrap();
        assert_eq!(active, 9);

        let day = slots.slots_for_date(date()).unwrap();
        let on: Vec<String> = day
            .iter()
            .filter(|(_, active)| **active)
            .map(|(time, _)| time.to_string())
            .collect();
        assert_eq!(
            on,
            vec!["09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "17:00"]
        );
        assert!(!day[&t("09:30")]);
        assert!(!day[&t("18:00")]);
    }

    #[test]
    fn test_invalid_working_hours_leave_book_untouched() {
        let (slots, store) = service();
        slots.set_slot(date(), t("10:00"), true).unwrap();
        let revision = store.revision(Document::Slots).unwrap();

        let err = slots
            .apply_working_hours(date(), t("18:00"), t("09:00"), 60)
            .unwrap_err();
        assert!(matches!(err, CounselError::InvalidInput(_)));
        assert_eq!(store.revision(Document::Slots).unwrap(), revision);
        assert!(slots.is_active(date(), t("10:00")).unwrap());
    }

    #[test]
    fn test_month_view_counts_active_slots() {
        let (slots, _) = service();
        slots.activate_all(date(), &[t("10:00"), t("11:00")]).unwrap();

        let grid = slots
            .month_view(MonthRef::new(2024, 6).unwrap(), "2024-06-15".parse().unwrap())
            .unwrap();
        let day = grid.iter().find(|day| day.date == date()).unwrap();
        assert_eq!(day.active_slot_count, 2);
    }

    #[test]
    fn test_mutations_are_audited() {
        let (slots, store) = service();
        slots.set_slot(date(), t("10:00"), true).unwrap();

        let audits = store.get_recent_audits(10).unwrap();
        assert!(matches!(
            audits[0].event,
            AuditEventType::SlotsChanged { active_count: 1, .. }
        ));
    }
}
