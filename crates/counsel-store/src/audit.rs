//! Audit event types

use chrono::{DateTime, Local};
use counsel_api::{PaymentStatus, SessionStatus};
use counsel_util::{ClientId, DateKey, PsychologistId, SessionId, WallClock};
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Operator tool opened the store
    StoreOpened,

    /// Session booked
    SessionBooked {
        session_id: SessionId,
        client_id: ClientId,
        psychologist: PsychologistId,
        date: DateKey,
        time: WallClock,
    },

    /// Scheduling status changed
    SessionStatusChanged {
        session_id: SessionId,
        from: SessionStatus,
        to: SessionStatus,
    },

    /// Payment status changed
    PaymentStatusChanged {
        session_id: SessionId,
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Slots changed for a date
    SlotsChanged { date: DateKey, active_count: usize },

    /// Client inserted or updated
    ClientUpserted { client_id: ClientId, created: bool },

    /// Client enabled or disabled
    ClientActivationChanged { client_id: ClientId, is_active: bool },

    /// Successful login
    LoginSucceeded { client_id: ClientId, method: String },

    /// Failed login; the phone is masked
    LoginFailed { phone: String, reason: String },

    /// Phone login code issued
    LoginCodeIssued { client_id: ClientId, delivered: bool },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: counsel_util::now(),
            event,
        }
    }
}
