//! Mock collaborators for testing

use counsel_util::{PsychologistId, SessionId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::{PortError, PortResult, SmsGateway, SmsReceipt, VideoLinkGenerator, VideoRoom};

/// Video link generator that derives the room from its inputs
#[derive(Debug, Clone)]
pub struct MockVideoLinks {
    base_url: String,
    calls: Arc<AtomicU64>,
}

impl MockVideoLinks {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of rooms generated so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockVideoLinks {
    fn default() -> Self {
        Self::new("https://meet.example.test")
    }
}

impl VideoLinkGenerator for MockVideoLinks {
    fn room_for(&self, session_id: &SessionId, psychologist: &PsychologistId) -> VideoRoom {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let room_id = format!("{}-{}", psychologist, session_id);
        VideoRoom {
            join_url: format!("{}/{}", self.base_url, room_id),
            room_id,
        }
    }
}

/// A message captured by [`MockSms`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSms {
    pub phone: String,
    pub message: String,
}

/// SMS gateway that records messages instead of sending them
pub struct MockSms {
    next_id: AtomicU64,
    sent: Arc<Mutex<Vec<SentSms>>>,

    /// Configure sends to fail
    pub fail_send: Arc<Mutex<bool>>,
}

impl MockSms {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_send: Arc::new(Mutex::new(false)),
        }
    }

    pub fn failing() -> Self {
        let sms = Self::new();
        *sms.fail_send.lock().unwrap() = true;
        sms
    }

    /// Messages delivered so far
    pub fn sent(&self) -> Vec<SentSms> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockSms {
    fn default() -> Self {
        Self::new()
    }
}

impl SmsGateway for MockSms {
    fn send(&self, phone: &str, message: &str) -> PortResult<SmsReceipt> {
        if *self.fail_send.lock().unwrap() {
            return Err(PortError::DeliveryFailed("Mock send failure".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(SentSms {
            phone: phone.to_string(),
            message: message.to_string(),
        });
        tracing::debug!(message_id = id, "Mock SMS recorded");

        Ok(SmsReceipt {
            message_id: Some(format!("mock-{}", id)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_links_are_deterministic() {
        let links = MockVideoLinks::default();
        let session_id = SessionId::new();
        let psychologist = PsychologistId::new("anna");

        let first = links.room_for(&session_id, &psychologist);
        let second = links.room_for(&session_id, &psychologist);

        assert_eq!(first, second);
        assert!(first.join_url.ends_with(&first.room_id));
        assert_eq!(links.calls(), 2);
    }

    #[test]
    fn test_mock_sms_records_messages() {
        let sms = MockSms::new();
        let receipt = sms.send("79991234567", "code 1234").unwrap();

        assert_eq!(receipt.message_id.as_deref(), Some("mock-1"));
        assert_eq!(
            sms.sent(),
            vec![SentSms {
                phone: "79991234567".into(),
                message: "code 1234".into()
            }]
        );
    }

    #[test]
    fn test_mock_sms_failure() {
        let sms = MockSms::failing();
        assert!(sms.send("79991234567", "code").is_err());
        assert!(sms.sent().is_empty());
    }
}
