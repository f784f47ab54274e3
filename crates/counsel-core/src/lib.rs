//! Scheduling and client access core for counsel
//!
//! This crate holds the behavior behind every booking view:
//! - Month grid generation with per-day slot counts
//! - Slot availability administration (single slots and bulk operations)
//! - Session booking and the status and payment state machines
//! - Client directory with phone-based authentication and login codes
//!
//! All state lives in a shared [`Store`]; each mutation re-reads the affected
//! document right before committing it.

mod calendar;
mod directory;
mod login_code;
mod password;
mod sessions;
mod slots;

pub use calendar::*;
pub use directory::*;
pub use login_code::{CodeRejection, LoginCodes, MAX_CODE_ATTEMPTS};
pub use password::*;
pub use sessions::*;
pub use slots::*;

use counsel_api::CalendarDay;
use counsel_config::{ScheduleSettings, Settings};
use counsel_ports::{SmsGateway, VideoLinkGenerator};
use counsel_store::{AuditEvent, AuditEventType, Store};
use counsel_util::{ClientId, DateKey, MonthRef, PsychologistId, Result, WallClock};
use std::sync::Arc;
use tracing::{info, warn};

/// Append an audit event; failures are logged and otherwise ignored
pub fn audit(store: &dyn Store, event: AuditEventType) {
    if let Err(e) = store.append_audit(AuditEvent::new(event)) {
        warn!(error = %e, "Failed to append audit event");
    }
}

/// The services of the core wired to one store
pub struct CounselCore {
    pub slots: SlotAvailability,
    pub sessions: SessionManager,
    pub directory: ClientDirectory,
    schedule: ScheduleSettings,
}

impl CounselCore {
    pub fn new(
        store: Arc<dyn Store>,
        settings: &Settings,
        links: Arc<dyn VideoLinkGenerator>,
        sms: Arc<dyn SmsGateway>,
    ) -> Self {
        info!(
            slot_labels = settings.schedule.slot_labels.len(),
            sms_login = settings.auth.sms_login,
            "Core initialized"
        );

        Self {
            slots: SlotAvailability::new(store.clone()),
            sessions: SessionManager::new(store.clone(), links),
            directory: ClientDirectory::new(store, sms, settings.auth.clone()),
            schedule: settings.schedule.clone(),
        }
    }

    pub fn schedule(&self) -> &ScheduleSettings {
        &self.schedule
    }

    /// Month grid for `month` as seen on `today`
    pub fn month_view(&self, month: MonthRef, today: DateKey) -> Result<Vec<CalendarDay>> {
        self.slots.month_view(month, today)
    }

    /// Activate every configured slot label on a date
    pub fn open_day(&self, date: DateKey) -> Result<()> {
        self.slots.activate_all(date, &self.schedule.slot_labels)
    }

    /// Deactivate every configured slot label on a date
    pub fn close_day(&self, date: DateKey) -> Result<()> {
        self.slots.deactivate_all(date, &self.schedule.slot_labels)
    }

    /// Apply the configured working hours to a date
    pub fn apply_default_hours(&self, date: DateKey) -> Result<usize> {
        self.slots.apply_working_hours(
            date,
            self.schedule.working_start,
            self.schedule.working_end,
            self.schedule.interval_minutes,
        )
    }

    /// A booking request priced at the configured default amount
    pub fn booking(
        &self,
        client: ClientId,
        psychologist: PsychologistId,
        date: DateKey,
        time: WallClock,
    ) -> BookingRequest {
        BookingRequest {
            client,
            psychologist,
            date,
            time,
            amount: self.schedule.default_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use counsel_ports::{MockSms, MockVideoLinks};
    use counsel_api::{ClientBook, SessionBook, SlotBook};
    use counsel_store::{Document, SqliteStore, StoreError, StoreResult};

    /// Store whose audit log rejects every write
    struct NoAuditStore(SqliteStore);

    impl Store for NoAuditStore {
        fn load_clients(&self) -> StoreResult<ClientBook> {
            self.0.load_clients()
        }
        fn save_clients(&self, clients: &ClientBook) -> StoreResult<()> {
            self.0.save_clients(clients)
        }
        fn load_slots(&self) -> StoreResult<SlotBook> {
            self.0.load_slots()
        }
        fn save_slots(&self, slots: &SlotBook) -> StoreResult<()> {
            self.0.save_slots(slots)
        }
        fn load_sessions(&self) -> StoreResult<SessionBook> {
            self.0.load_sessions()
        }
        fn save_sessions(&self, sessions: &SessionBook) -> StoreResult<()> {
            self.0.save_sessions(sessions)
        }
        fn revision(&self, document: Document) -> StoreResult<u64> {
            self.0.revision(document)
        }
        fn append_audit(&self, _event: AuditEvent) -> StoreResult<()> {
            Err(StoreError::Database("audit log is read-only".into()))
        }
        fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
            self.0.get_recent_audits(limit)
        }
        fn is_healthy(&self) -> bool {
            self.0.is_healthy()
        }
    }

    fn core() -> CounselCore {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        CounselCore::new(
            store,
            &Settings::default(),
            Arc::new(MockVideoLinks::default()),
            Arc::new(MockSms::new()),
        )
    }

    #[test]
    fn test_open_and_close_day_use_configured_labels() {
        let core = core();
        let date: DateKey = "2024-06-20".parse().unwrap();

        core.open_day(date).unwrap();
        assert_eq!(
            core.slots.snapshot().unwrap().active_count(date),
            core.schedule().slot_labels.len()
        );

        core.close_day(date).unwrap();
        assert_eq!(core.slots.snapshot().unwrap().active_count(date), 0);
    }

    #[test]
    fn test_default_hours_follow_settings() {
        let core = core();
        let date: DateKey = "2024-06-20".parse().unwrap();
        // 09:00 to 18:00 hourly
        assert_eq!(core.apply_default_hours(date).unwrap(), 9);
    }

    #[test]
    fn test_booking_uses_default_amount() {
        let core = core();
        let request = core.booking(
            ClientId::new(),
            PsychologistId::new("anna"),
            "2024-06-20".parse().unwrap(),
            WallClock::new(10, 0).unwrap(),
        );
        assert_eq!(request.amount, core.schedule().default_amount);
    }

    #[test]
    fn test_audit_failure_does_not_fail_operation() {
        let store: Arc<dyn Store> = Arc::new(NoAuditStore(SqliteStore::in_memory().unwrap()));
        audit(store.as_ref(), AuditEventType::StoreOpened);

        let core = CounselCore::new(
            store.clone(),
            &Settings::default(),
            Arc::new(MockVideoLinks::default()),
            Arc::new(MockSms::new()),
        );
        let date: DateKey = "2024-06-20".parse().unwrap();
        core.open_day(date).unwrap();

        assert!(core.slots.is_active(date, WallClock::new(9, 0).unwrap()).unwrap());
        assert!(store.get_recent_audits(10).unwrap().is_empty());
    }
}
