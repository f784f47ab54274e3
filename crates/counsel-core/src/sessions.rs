//! Session lifecycle manager

use chrono::{DateTime, Local};
use counsel_api::{PaymentStatus, Session, SessionStatus};
use counsel_ports::VideoLinkGenerator;
use counsel_store::{AuditEventType, Store};
use counsel_util::{ClientId, CounselError, DateKey, PsychologistId, Result, SessionId, WallClock};
use std::sync::Arc;
use tracing::{debug, info};

use crate::audit;

/// A booking request for one slot
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub client: ClientId,
    pub psychologist: PsychologistId,
    pub date: DateKey,
    pub time: WallClock,
    /// Price in minor currency units
    pub amount: u64,
}

/// Owns session records and enforces their state machines.
pub struct SessionManager {
    store: Arc<dyn Store>,
    links: Arc<dyn VideoLinkGenerator>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, links: Arc<dyn VideoLinkGenerator>) -> Self {
        Self { store, links }
    }

    /// Book a session.
    ///
    /// The slot must be active and no non-cancelled session may hold the same
    /// psychologist, date and time. The slot itself stays active.
    pub fn create_session(&self, request: BookingRequest, now: DateTime<Local>) -> Result<Session> {
        let slots = self.store.load_slots()?;
        if !slots.is_active(request.date, request.time) {
            return Err(CounselError::SlotUnavailable {
                date: request.date.to_string(),
                time: request.time.to_string(),
            });
        }

        let mut book = self.store.load_sessions()?;
        if let Some(existing) = book.occupant(&request.psychologist, request.date, request.time) {
            debug!(
                existing = %existing.id,
                psychologist = %request.psychologist,
                "Slot already booked"
            );
            return Err(CounselError::SlotAlreadyBooked {
                date: request.date.to_string(),
                time: request.time.to_string(),
            });
        }

        let session = Session {
            id: SessionId::new(),
            date: request.date,
            time: request.time,
            status: SessionStatus::Upcoming,
            psychologist: request.psychologist,
            client: request.client,
            amount: request.amount,
            payment_status: PaymentStatus::Pending,
            payment_id: None,
            notes: None,
            meeting_url: None,
            created_at: now,
        };
        book.sessions.push(session.clone());
        self.store.save_sessions(&book)?;

        audit(
            self.store.as_ref(),
            AuditEventType::SessionBooked {
                session_id: session.id,
                client_id: session.client,
                psychologist: session.psychologist.clone(),
                date: session.date,
                time: session.time,
            },
        );

        info!(
            session_id = %session.id,
            client_id = %session.client,
            psychologist = %session.psychologist,
            date = %session.date,
            time = %session.time,
            amount = session.amount,
            "Session booked"
        );

        Ok(session)
    }

    pub fn get(&self, id: SessionId) -> Result<Session> {
        self.store
            .load_sessions()?
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// All sessions in creation order
    pub fn list(&self) -> Result<Vec<Session>> {
        Ok(self.store.load_sessions()?.sessions)
    }

    /// Sessions owned by a client, in creation order
    pub fn sessions_for_client(&self, client: ClientId) -> Result<Vec<Session>> {
        self.filtered(|s| s.client == client)
    }

    /// A session, only if the client owns it
    pub fn session_for_client(&self, client: ClientId, id: SessionId) -> Result<Session> {
        let session = self.get(id)?;
        if session.client != client {
            return Err(not_found(id));
        }
        Ok(session)
    }

    pub fn sessions_for_psychologist(&self, psychologist: &PsychologistId) -> Result<Vec<Session>> {
        let mut sessions = self.filtered(|s| &s.psychologist == psychologist)?;
        sessions.sort_by_key(|s| (s.date, s.time));
        Ok(sessions)
    }

    /// Sessions on a date ordered by start time
    pub fn sessions_on(&self, date: DateKey) -> Result<Vec<Session>> {
        let mut sessions = self.filtered(|s| s.date == date)?;
        sessions.sort_by_key(|s| s.time);
        Ok(sessions)
    }

    /// Earliest upcoming session on or after `today`.
    ///
    /// Sessions at the same date and time are ordered by creation.
    pub fn next_session_for(&self, client: ClientId, today: DateKey) -> Result<Option<Session>> {
        let book = self.store.load_sessions()?;
        Ok(book
            .sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.client == client && s.status == SessionStatus::Upcoming && s.date >= today
            })
            .min_by_key(|(index, s)| (s.date, s.time, *index))
            .map(|(_, s)| s.clone()))
    }

    /// Enter `active`; fails before the scheduled start
    pub fn start(&self, id: SessionId, now: DateTime<Local>) -> Result<Session> {
        self.update(id, |s| s.start(now.naive_local()))
    }

    pub fn complete(&self, id: SessionId) -> Result<Session> {
        self.update(id, Session::complete)
    }

    pub fn cancel(&self, id: SessionId) -> Result<Session> {
        self.update(id, Session::cancel)
    }

    /// Cancel a session on behalf of its client
    pub fn cancel_for_client(&self, client: ClientId, id: SessionId) -> Result<Session> {
        self.update(id, |s| {
            if s.client != client {
                return Err(not_found(id));
            }
            s.cancel()
        })
    }

    pub fn record_payment(&self, id: SessionId, payment_id: Option<String>) -> Result<Session> {
        self.update(id, |s| s.mark_paid(payment_id))
    }

    pub fn fail_payment(&self, id: SessionId) -> Result<Session> {
        self.update(id, Session::mark_payment_failed)
    }

    pub fn refund(&self, id: SessionId) -> Result<Session> {
        self.update(id, Session::refund)
    }

    pub fn set_notes(&self, id: SessionId, notes: Option<String>) -> Result<Session> {
        self.update(id, |s| {
            s.notes = notes.filter(|n| !n.trim().is_empty());
            Ok(())
        })
    }

    /// Join URL for a session, generated on first use and kept afterwards
    pub fn join_link(&self, id: SessionId) -> Result<String> {
        let session = self.get(id)?;
        if let Some(url) = session.meeting_url {
            return Ok(url);
        }

        let room = self.links.room_for(&session.id, &session.psychologist);
        let updated = self.update(id, |s| {
            if s.meeting_url.is_none() {
                s.meeting_url = Some(room.join_url.clone());
            }
            Ok(())
        })?;

        debug!(session_id = %id, room_id = %room.room_id, "Meeting room assigned");
        updated
            .meeting_url
            .ok_or_else(|| CounselError::internal("meeting url missing after update"))
    }

    fn filtered(&self, keep: impl Fn(&Session) -> bool) -> Result<Vec<Session>> {
        Ok(self
            .store
            .load_sessions()?
            .sessions
            .into_iter()
            .filter(|s| keep(s))
            .collect())
    }

    /// Re-read the document, change one session and commit.
    fn update(&self, id: SessionId, f: impl FnOnce(&mut Session) -> Result<()>) -> Result<Session> {
        let mut book = self.store.load_sessions()?;
        let session = book.get_mut(id).ok_or_else(|| not_found(id))?;

        let before = (session.status, session.payment_status);
        f(session)?;
        let updated = session.clone();

        self.store.save_sessions(&book)?;

        if before.0 != updated.status {
            audit(
                self.store.as_ref(),
                AuditEventType::SessionStatusChanged {
                    session_id: id,
                    from: before.0,
                    to: updated.status,
                },
            );
            info!(session_id = %id, from = %before.0, to = %updated.status, "Session status changed");
        }
        if before.1 != updated.payment_status {
            audit(
                self.store.as_ref(),
                AuditEventType::PaymentStatusChanged {
                    session_id: id,
                    from: before.1,
                    to: updated.payment_status,
                },
            );
            info!(
                session_id = %id,
                from = %before.1,
                to = %updated.payment_status,
                "Payment status changed"
            );
        }

        Ok(updated)
    }
}

fn not_found(id: SessionId) -> CounselError {
    CounselError::not_found(format!("session {}", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SlotAvailability;
    use chrono::TimeZone;
    use counsel_ports::MockVideoLinks;
    use counsel_store::{Document, SqliteStore};

    struct Fixture {
        sessions: SessionManager,
        slots: SlotAvailability,
        store: Arc<dyn Store>,
        links: Arc<MockVideoLinks>,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let links = Arc::new(MockVideoLinks::default());
        Fixture {
            sessions: SessionManager::new(store.clone(), links.clone()),
            slots: SlotAvailability::new(store.clone()),
            store,
            links,
        }
    }

    fn d(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    fn t(s: &str) -> WallClock {
        s.parse().unwrap()
    }

    fn local(y: i32, m: u32, day: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, day, h, min, 0).unwrap()
    }

    fn booking(client: ClientId, date: &str, time: &str) -> BookingRequest {
        BookingRequest {
            client,
            psychologist: PsychologistId::new("anna"),
            date: d(date),
            time: t(time),
            amount: 3000,
        }
    }

    fn book_open(f: &Fixture, client: ClientId, date: &str, time: &str) -> Session {
        f.slots.set_slot(d(date), t(time), true).unwrap();
        f.sessions
            .create_session(booking(client, date, time), local(2024, 6, 1, 12, 0))
            .unwrap()
    }

    #[test]
    fn test_booking_requires_active_slot() {
        let f = fixture();
        let err = f
            .sessions
            .create_session(booking(ClientId::new(), "2024-06-20", "10:00"), local(2024, 6, 1, 12, 0))
            .unwrap_err();
        assert!(matches!(err, CounselError::SlotUnavailable { .. }));
        assert_eq!(f.store.revision(Document::Sessions).unwrap(), 0);
    }

    #[test]
    fn test_double_booking_rejected() {
        let f = fixture();
        let first = book_open(&f, ClientId::new(), "2024-06-20", "10:00");
        assert_eq!(first.status, SessionStatus::Upcoming);
        assert_eq!(first.payment_status, PaymentStatus::Pending);

        // Slot stays active after booking
        assert!(f.slots.is_active(d("2024-06-20"), t("10:00")).unwrap());

        let err = f
            .sessions
            .create_session(booking(ClientId::new(), "2024-06-20", "10:00"), local(2024, 6, 1, 13, 0))
            .unwrap_err();
        assert!(matches!(err, CounselError::SlotAlreadyBooked { .. }));

        // Deactivated slot is refused before occupancy is checked
        f.slots.set_slot(d("2024-06-20"), t("10:00"), false).unwrap();
        let err = f
            .sessions
            .create_session(booking(ClientId::new(), "2024-06-20", "10:00"), local(2024, 6, 1, 13, 0))
            .unwrap_err();
        assert!(matches!(err, CounselError::SlotUnavailable { .. }));
        assert_eq!(f.sessions.list().unwrap().len(), 1);
    }

    #[test]
    fn test_other_psychologist_may_take_same_time() {
        let f = fixture();
        book_open(&f, ClientId::new(), "2024-06-20", "10:00");

        let mut request = booking(ClientId::new(), "2024-06-20", "10:00");
        request.psychologist = PsychologistId::new("boris");
        assert!(f.sessions.create_session(request, local(2024, 6, 1, 12, 0)).is_ok());
    }

    #[test]
    fn test_cancelled_session_frees_the_triple() {
        let f = fixture();
        let first = book_open(&f, ClientId::new(), "2024-06-20", "10:00");
        f.sessions.cancel(first.id).unwrap();

        assert!(
            f.sessions
                .create_session(booking(ClientId::new(), "2024-06-20", "10:00"), local(2024, 6, 1, 12, 0))
                .is_ok()
        );
    }

    #[test]
    fn test_cancel_guard() {
        let f = fixture();
        let session = book_open(&f, ClientId::new(), "2024-06-20", "10:00");

        let cancelled = f.sessions.cancel(session.id).unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);

        let other = book_open(&f, ClientId::new(), "2024-06-20", "11:00");
        f.sessions.start(other.id, local(2024, 6, 20, 11, 0)).unwrap();
        f.sessions.complete(other.id).unwrap();

        let err = f.sessions.cancel(other.id).unwrap_err();
        assert!(matches!(err, CounselError::InvalidTransition { .. }));
        assert_eq!(f.sessions.get(other.id).unwrap().status, SessionStatus::Completed);
    }

    #[test]
    fn test_start_before_scheduled_time_fails() {
        let f = fixture();
        let session = book_open(&f, ClientId::new(), "2024-06-20", "10:00");

        let err = f.sessions.start(session.id, local(2024, 6, 20, 9, 59)).unwrap_err();
        assert!(matches!(err, CounselError::InvalidTransition { .. }));

        let active = f.sessions.start(session.id, local(2024, 6, 20, 10, 5)).unwrap();
        assert_eq!(active.status, SessionStatus::Active);

        let err = f.sessions.cancel(session.id).unwrap_err();
        assert!(matches!(err, CounselError::InvalidTransition { .. }));
    }

    #[test]
    fn test_payment_flow() {
        let f = fixture();
        let session = book_open(&f, ClientId::new(), "2024-06-20", "10:00");

        f.sessions.fail_payment(session.id).unwrap();
        let paid = f
            .sessions
            .record_payment(session.id, Some("pay-42".into()))
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.payment_id.as_deref(), Some("pay-42"));

        let refunded = f.sessions.refund(session.id).unwrap();
        assert_eq!(refunded.payment_status, PaymentStatus::Refunded);

        let err = f.sessions.record_payment(session.id, None).unwrap_err();
        assert!(matches!(err, CounselError::InvalidTransition { .. }));

        let audits = f.store.get_recent_audits(10).unwrap();
        let payment_changes = audits
            .iter()
            .filter(|a| matches!(a.event, AuditEventType::PaymentStatusChanged { .. }))
            .count();
        assert_eq!(payment_changes, 3);
    }

    #[test]
    fn test_refund_requires_payment() {
        let f = fixture();
        let session = book_open(&f, ClientId::new(), "2024-06-20", "10:00");
        assert!(matches!(
            f.sessions.refund(session.id),
            Err(CounselError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_unknown_session_not_found() {
        let f = fixture();
        assert!(matches!(
            f.sessions.cancel(SessionId::new()),
            Err(CounselError::NotFound(_))
        ));
    }

    #[test]
    fn test_next_session_prefers_earliest_then_creation_order() {
        let f = fixture();
        let client = ClientId::new();

        let later = book_open(&f, client, "2024-06-21", "09:00");
        let first = book_open(&f, client, "2024-06-20", "15:00");

        let mut tie = booking(client, "2024-06-20", "15:00");
        tie.psychologist = PsychologistId::new("boris");
        f.sessions.create_session(tie, local(2024, 6, 2, 12, 0)).unwrap();

        let next = f.sessions.next_session_for(client, d("2024-06-20")).unwrap().unwrap();
        assert_eq!(next.id, first.id);

        f.sessions.cancel(first.id).unwrap();
        let next = f.sessions.next_session_for(client, d("2024-06-20")).unwrap().unwrap();
        assert_eq!(next.psychologist.as_str(), "boris");

        let next = f.sessions.next_session_for(client, d("2024-06-21")).unwrap().unwrap();
        assert_eq!(next.id, later.id);

        assert!(f.sessions.next_session_for(client, d("2024-06-22")).unwrap().is_none());
        assert!(f.sessions.next_session_for(ClientId::new(), d("2024-06-01")).unwrap().is_none());
    }

    #[test]
    fn test_client_access_is_gated() {
        let f = fixture();
        let owner = ClientId::new();
        let stranger = ClientId::new();
        let session = book_open(&f, owner, "2024-06-20", "10:00");

        assert_eq!(f.sessions.sessions_for_client(owner).unwrap().len(), 1);
        assert!(f.sessions.sessions_for_client(stranger).unwrap().is_empty());
        assert!(f.sessions.session_for_client(owner, session.id).is_ok());
        assert!(matches!(
            f.sessions.session_for_client(stranger, session.id),
            Err(CounselError::NotFound(_))
        ));

        assert!(matches!(
            f.sessions.cancel_for_client(stranger, session.id),
            Err(CounselError::NotFound(_))
        ));
        assert_eq!(f.sessions.get(session.id).unwrap().status, SessionStatus::Upcoming);

        let cancelled = f.sessions.cancel_for_client(owner, session.id).unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);
    }

    #[test]
    fn test_queries_by_date_and_psychologist() {
        let f = fixture();
        book_open(&f, ClientId::new(), "2024-06-20", "15:00");
        book_open(&f, ClientId::new(), "2024-06-20", "10:00");
        book_open(&f, ClientId::new(), "2024-06-21", "10:00");

        let day: Vec<String> = f
            .sessions
            .sessions_on(d("2024-06-20"))
            .unwrap()
            .iter()
            .map(|s| s.time.to_string())
            .collect();
        assert_eq!(day, vec!["10:00", "15:00"]);

        let anna = f
            .sessions
            .sessions_for_psychologist(&PsychologistId::new("anna"))
            .unwrap();
        assert_eq!(anna.len(), 3);
        assert_eq!(anna[0].time, t("10:00"));
        assert_eq!(anna[2].date, d("2024-06-21"));
    }

    #[test]
    fn test_join_link_generated_once() {
        let f = fixture();
        let session = book_open(&f, ClientId::new(), "2024-06-20", "10:00");

        let url = f.sessions.join_link(session.id).unwrap();
        assert!(url.contains(&session.id.to_string()));
        assert!(url.contains("anna"));

        assert_eq!(f.sessions.join_link(session.id).unwrap(), url);
        assert_eq!(f.links.calls(), 1);
        assert_eq!(
            f.sessions.get(session.id).unwrap().meeting_url.as_deref(),
            Some(url.as_str())
        );
    }

    #[test]
    fn test_notes_can_be_set_and_cleared() {
        let f = fixture();
        let session = book_open(&f, ClientId::new(), "2024-06-20", "10:00");

        let updated = f
            .sessions
            .set_notes(session.id, Some("first meeting".into()))
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("first meeting"));

        let cleared = f.sessions.set_notes(session.id, Some("  ".into())).unwrap();
        assert!(cleared.notes.is_none());
    }
}
