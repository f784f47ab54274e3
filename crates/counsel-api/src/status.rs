//! Session status and payment status state machines

use counsel_util::{CounselError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling status of a session
///
/// `upcoming -> active -> completed`, or `upcoming -> cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Upcoming,
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Upcoming => "upcoming",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Upcoming, SessionStatus::Active)
                | (SessionStatus::Active, SessionStatus::Completed)
                | (SessionStatus::Upcoming, SessionStatus::Cancelled)
        )
    }

    pub fn transition(self, next: SessionStatus) -> Result<SessionStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CounselError::transition(self, next))
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status of a session, independent of its scheduling status
///
/// `pending -> paid`, `pending -> failed`, `failed -> paid` (retry),
/// `paid -> refunded`. `refunded` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Paid)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Failed, PaymentStatus::Paid)
                | (PaymentStatus::Paid, PaymentStatus::Refunded)
        )
    }

    pub fn transition(self, next: PaymentStatus) -> Result<PaymentStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CounselError::transition(self, next))
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Refunded)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
