//! Collaborator traits

use counsel_util::{PsychologistId, SessionId};
use thiserror::Error;

/// Errors from collaborator operations
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

pub type PortResult<T> = Result<T, PortError>;

/// A video room for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRoom {
    pub room_id: String,
    pub join_url: String,
}

/// Produces a deterministic video room for a session.
///
/// The core never inspects or validates the returned URL.
pub trait VideoLinkGenerator: Send + Sync {
    fn room_for(&self, session_id: &SessionId, psychologist: &PsychologistId) -> VideoRoom;
}

/// Rooms named after the psychologist and session under a fixed base URL
#[derive(Debug, Clone)]
pub struct BaseUrlVideoLinks {
    base_url: String,
}

impl BaseUrlVideoLinks {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl VideoLinkGenerator for BaseUrlVideoLinks {
    fn room_for(&self, session_id: &SessionId, psychologist: &PsychologistId) -> VideoRoom {
        let room_id = format!("counsel-{}-{}", psychologist, session_id.as_uuid().simple());
        VideoRoom {
            join_url: format!("{}/{}", self.base_url, room_id),
            room_id,
        }
    }
}

/// Receipt for a delivered SMS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsReceipt {
    pub message_id: Option<String>,
}

/// Delivers a text message to a phone.
///
/// Provider fallback chains and timeouts live behind this interface.
pub trait SmsGateway: Send + Sync {
    fn send(&self, phone: &str, message: &str) -> PortResult<SmsReceipt>;

    /// Optional: check if the gateway is reachable
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Gateway used when SMS delivery is not configured; every send fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSmsGateway;

impl SmsGateway for NoSmsGateway {
    fn send(&self, _phone: &str, _message: &str) -> PortResult<SmsReceipt> {
        Err(PortError::Unavailable("no SMS gateway configured".into()))
    }

    fn is_healthy(&self) -> bool {
        false
    }
}
