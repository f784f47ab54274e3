//! Phone number normalization
//!
//! Two phone strings denote the same identity iff their normalized forms are
//! equal. Normalization strips every non-digit character and rewrites a
//! leading `8` to `7`, so `+7 (999) 123-45-67` and `89991234567` match.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Canonicalize a phone string for equality comparison.
pub fn normalize_phone(input: &str) -> String {
    let mut digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.starts_with('8') {
        digits.replace_range(0..1, "7");
    }
    digits
}

/// Returns true if both inputs denote the same phone identity.
pub fn same_phone(a: &str, b: &str) -> bool {
    normalize_phone(a) == normalize_phone(b)
}

/// Mask a phone number for logs, keeping only the last four digits.
pub fn mask_phone(input: &str) -> String {
    let normalized = normalize_phone(input);
    let keep = normalized.len().min(4);
    let tail = &normalized[normalized.len() - keep..];
    format!("{}{}", "*".repeat(normalized.len() - keep), tail)
}

/// A phone number as entered, compared by its normalized digits only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PhoneNumber {
    raw: String,
    normalized: String,
}

impl PhoneNumber {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize_phone(&raw);
        Self { raw, normalized }
    }

    /// The number exactly as it was entered
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// True when the input contained no digits at all
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    pub fn matches(&self, other: &str) -> bool {
        self.normalized == normalize_phone(other)
    }

    pub fn masked(&self) -> String {
        mask_phone(&self.normalized)
    }
}

impl PartialEq for PhoneNumber {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for PhoneNumber {}

impl Hash for PhoneNumber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<String> for PhoneNumber {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for PhoneNumber {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.raw
    }
}
