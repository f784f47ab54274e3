//! Shared record types for counsel

use chrono::{DateTime, Local, NaiveDateTime};
use counsel_util::{
    ClientId, CounselError, DateKey, PhoneNumber, PsychologistId, Result, SessionId, WallClock,
};
use serde::{Deserialize, Serialize};

use crate::{PaymentStatus, SessionStatus};

/// A client identity record owned by the client directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: ClientId,
    pub name: String,
    pub phone: PhoneNumber,
    /// Argon2 PHC string; never the plaintext password
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Local>,
    #[serde(default)]
    pub last_login: Option<DateTime<Local>>,
}

/// All client records, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientBook {
    pub clients: Vec<ClientRecord>,
}

impl ClientBook {
    pub fn get(&self, id: ClientId) -> Option<&ClientRecord> {
        self.clients.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut ClientRecord> {
        self.clients.iter_mut().find(|c| c.id == id)
    }

    /// Find the record for a phone, preferring an active record over a
    /// disabled one with the same normalized number.
    pub fn find_by_phone(&self, phone: &PhoneNumber) -> Option<&ClientRecord> {
        let mut matching = self.clients.iter().filter(|c| &c.phone == phone);
        let first = matching.next()?;
        if first.is_active {
            return Some(first);
        }
        matching.find(|c| c.is_active).or(Some(first))
    }

    pub fn position_by_phone(&self, phone: &PhoneNumber) -> Option<usize> {
        let found = self.find_by_phone(phone)?;
        self.clients.iter().position(|c| c.id == found.id)
    }
}

/// A scheduled counseling appointment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub date: DateKey,
    pub time: WallClock,
    pub status: SessionStatus,
    pub psychologist: PsychologistId,
    pub client: ClientId,
    /// Price in minor currency units
    pub amount: u64,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub meeting_url: Option<String>,
    pub created_at: DateTime<Local>,
}

impl Session {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.at(self.time)
    }

    /// True if this session holds the given psychologist/date/time triple
    pub fn occupies(&self, psychologist: &PsychologistId, date: DateKey, time: WallClock) -> bool {
        self.status != SessionStatus::Cancelled
            && &self.psychologist == psychologist
            && self.date == date
            && self.time == time
    }

    /// Enter `active`; only allowed at or after the scheduled start
    pub fn start(&mut self, now: NaiveDateTime) -> Result<()> {
        let next = self.status.transition(SessionStatus::Active)?;
        if now < self.starts_at() {
            return Err(CounselError::InvalidTransition {
                from: self.status.to_string(),
                to: format!("{} before {}", next, self.starts_at().format("%Y-%m-%d %H:%M")),
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.status = self.status.transition(SessionStatus::Completed)?;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.status = self.status.transition(SessionStatus::Cancelled)?;
        Ok(())
    }

    pub fn mark_paid(&mut self, payment_id: Option<String>) -> Result<()> {
        self.payment_status = self.payment_status.transition(PaymentStatus::Paid)?;
        if payment_id.is_some() {
            self.payment_id = payment_id;
        }
        Ok(())
    }

    pub fn mark_payment_failed(&mut self) -> Result<()> {
        self.payment_status = self.payment_status.transition(PaymentStatus::Failed)?;
        Ok(())
    }

    pub fn refund(&mut self) -> Result<()> {
        self.payment_status = self.payment_status.transition(PaymentStatus::Refunded)?;
        Ok(())
    }
}

/// All sessions, in creation order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionBook {
    pub sessions: Vec<Session>,
}

impl SessionBook {
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn occupant(
        &self,
        psychologist: &PsychologistId,
        date: DateKey,
        time: WallClock,
    ) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|s| s.occupies(psychologist, date, time))
    }
}

/// One cell of a month grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: DateKey,
    /// Day of the month (1-31)
    pub day: u32,
    pub is_current_month: bool,
    pub is_today: bool,
    pub is_past: bool,
    pub is_weekend: bool,
    pub active_slot_count: usize,
    pub is_selectable: bool,
}

/// Result of an authentication attempt as handed to the presentation layer
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub success: bool,
    pub client: Option<ClientRecord>,
    pub error: Option<CounselError>,
}

/// Message shown when the reason for a failed login is not revealed
pub const GENERIC_LOGIN_FAILURE: &str = "Phone number or password is incorrect";

impl AuthOutcome {
    pub fn from_result(result: Result<ClientRecord>) -> Self {
        match result {
            Ok(client) => Self {
                success: true,
                client: Some(client),
                error: None,
            },
            Err(error) => Self {
                success: false,
                client: None,
                error: Some(error),
            },
        }
    }

    /// User-facing message for a failed attempt.
    ///
    /// Unless `reveal_disabled` is set, disabled accounts, unknown phones and
    /// wrong passwords all share one message so the directory cannot be
    /// enumerated.
    pub fn user_message(&self, reveal_disabled: bool) -> Option<&'static str> {
        match self.error.as_ref()? {
            CounselError::Disabled if reveal_disabled => {
                Some("This account has been disabled. Please contact your counselor")
            }
            CounselError::Disabled
            | CounselError::NotFound(_)
            | CounselError::InvalidCredentials => Some(GENERIC_LOGIN_FAILURE),
            _ => Some("Login is temporarily unavailable. Please try again later"),
        }
    }
}

/// How a phone login code reached the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoginCodeDelivery {
    /// Delivered by SMS
    Sent { message_id: Option<String> },
    /// SMS delivery failed; the code is shown in-band instead
    Displayed { code: String },
}
