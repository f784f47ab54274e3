//! Salted password hashing

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use counsel_util::{CounselError, Result};
use std::sync::OnceLock;
use tracing::{error, warn};

/// Hash a plaintext password into an Argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(CounselError::invalid_input("password must not be empty"));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            CounselError::internal("failed to hash password")
        })
}

/// Check a plaintext password against a stored PHC string.
///
/// An unreadable stored hash never matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Failed to parse stored password hash: {:?}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Run a full verification against a hash no password is known for.
///
/// Used where there is no stored hash to check, so a missing or disabled
/// account costs the same as a wrong password. Always `false` in practice.
pub fn verify_placeholder(password: &str) -> bool {
    static PLACEHOLDER: OnceLock<Option<String>> = OnceLock::new();
    let hash = PLACEHOLDER.get_or_init(|| {
        let secret = SaltString::generate(&mut OsRng);
        hash_password(secret.as_str()).ok()
    });
    match hash {
        Some(hash) => verify_password(password, hash),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("anna123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(!hash.contains("anna123"));
        assert!(verify_password("anna123", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("anna123").unwrap();
        let b = hash_password("anna123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_plaintext_stored_value_never_matches() {
        assert!(!verify_password("anna123", "anna123"));
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(
            hash_password(""),
            Err(CounselError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_placeholder_never_matches() {
        assert!(!verify_placeholder("anna123"));
        assert!(!verify_placeholder(""));
    }
}
