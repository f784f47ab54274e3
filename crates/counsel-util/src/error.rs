//! Error types for counsel

use thiserror::Error;

/// Core error type for counsel operations
///
/// Every variant is a recoverable outcome the caller is expected to branch on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounselError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Client is disabled")]
    Disabled,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Slot {date} {time} is not available")]
    SlotUnavailable { date: String, time: String },

    #[error("Slot {date} {time} is already booked")]
    SlotAlreadyBooked { date: String, time: String },

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Too many requests, try again later")]
    RateLimited,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CounselError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Stable machine-readable code for the presentation layer
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Disabled => "disabled",
            Self::InvalidCredentials => "invalid_credentials",
            Self::SlotUnavailable { .. } => "slot_unavailable",
            Self::SlotAlreadyBooked { .. } => "slot_already_booked",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::RateLimited => "rate_limited",
            Self::InvalidInput(_) => "invalid_input",
            Self::StoreError(_) => "store_error",
            Self::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, CounselError>;
