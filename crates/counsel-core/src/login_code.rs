//! One-time phone login codes

use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{DateTime, Local};
use counsel_util::ClientId;
use std::collections::HashMap;

/// Wrong guesses allowed before a code is discarded
pub const MAX_CODE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
struct PendingCode {
    code: String,
    client_id: ClientId,
    expires_at: DateTime<Local>,
    attempts: u32,
}

/// Why a code was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRejection {
    NoPendingCode,
    Expired,
    Mismatch,
    TooManyAttempts,
}

impl CodeRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeRejection::NoPendingCode => "no_pending_code",
            CodeRejection::Expired => "expired",
            CodeRejection::Mismatch => "mismatch",
            CodeRejection::TooManyAttempts => "too_many_attempts",
        }
    }
}

/// Outstanding codes keyed by normalized phone; at most one per phone.
#[derive(Debug, Default)]
pub struct LoginCodes {
    pending: HashMap<String, PendingCode>,
}

impl LoginCodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh code, replacing any earlier one for the phone
    pub fn issue(
        &mut self,
        normalized_phone: &str,
        client_id: ClientId,
        expires_at: DateTime<Local>,
    ) -> String {
        let code = generate_code();
        self.pending.insert(
            normalized_phone.to_string(),
            PendingCode {
                code: code.clone(),
                client_id,
                expires_at,
                attempts: 0,
            },
        );
        code
    }

    /// Consume a code; a code is accepted at most once
    pub fn redeem(
        &mut self,
        normalized_phone: &str,
        code: &str,
        now: DateTime<Local>,
    ) -> Result<ClientId, CodeRejection> {
        let pending = self
            .pending
            .get_mut(normalized_phone)
            .ok_or(CodeRejection::NoPendingCode)?;

        if now >= pending.expires_at {
            self.pending.remove(normalized_phone);
            return Err(CodeRejection::Expired);
        }

        if pending.code != code.trim() {
            pending.attempts += 1;
            if pending.attempts >= MAX_CODE_ATTEMPTS {
                self.pending.remove(normalized_phone);
                return Err(CodeRejection::TooManyAttempts);
            }
            return Err(CodeRejection::Mismatch);
        }

        let client_id = pending.client_id;
        self.pending.remove(normalized_phone);
        Ok(client_id)
    }

    /// Drop codes that expired before `now`
    pub fn purge_expired(&mut self, now: DateTime<Local>) {
        self.pending.retain(|_, pending| pending.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Four decimal digits, never starting with zero
fn generate_code() -> String {
    (OsRng.next_u32() % 9000 + 1000).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_codes_are_four_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_code_redeems_once() {
        let mut codes = LoginCodes::new();
        let client = ClientId::new();
        let code = codes.issue("79991234567", client, now() + Duration::minutes(5));

        assert_eq!(codes.redeem("79991234567", &code, now()), Ok(client));
        assert_eq!(
            codes.redeem("79991234567", &code, now()),
            Err(CodeRejection::NoPendingCode)
        );
    }

    #[test]
    fn test_expired_code_rejected() {
        let mut codes = LoginCodes::new();
        let code = codes.issue("79991234567", ClientId::new(), now());

        assert_eq!(
            codes.redeem("79991234567", &code, now()),
            Err(CodeRejection::Expired)
        );
        assert!(codes.is_empty());
    }

    #[test]
    fn test_repeated_wrong_guesses_discard_code() {
        let mut codes = LoginCodes::new();
        let code = codes.issue("79991234567", ClientId::new(), now() + Duration::minutes(5));
        let wrong = if code == "1000" { "1001" } else { "1000" };

        for _ in 0..MAX_CODE_ATTEMPTS - 1 {
            assert_eq!(
                codes.redeem("79991234567", wrong, now()),
                Err(CodeRejection::Mismatch)
            );
        }
        assert_eq!(
            codes.redeem("79991234567", wrong, now()),
            Err(CodeRejection::TooManyAttempts)
        );
        assert_eq!(
            codes.redeem("79991234567", &code, now()),
            Err(CodeRejection::NoPendingCode)
        );
    }

    #[test]
    fn test_purge_drops_only_expired() {
        let mut codes = LoginCodes::new();
        codes.issue("70000000001", ClientId::new(), now() - Duration::minutes(1));
        codes.issue("70000000002", ClientId::new(), now() + Duration::minutes(1));

        codes.purge_expired(now());
        assert_eq!(codes.len(), 1);
    }
}
