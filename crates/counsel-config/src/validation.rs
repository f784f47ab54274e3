//! Configuration validation

use crate::schema::{RawAuth, RawConfig, RawSchedule};
use counsel_util::WallClock;
use std::collections::HashSet;
use thiserror::Error;

/// Longest allowed slot interval (one day)
pub const MAX_INTERVAL_MINUTES: u32 = 24 * 60;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid time format '{value}': {message}")]
    InvalidTimeFormat { value: String, message: String },

    #[error("Duplicate slot label: {0}")]
    DuplicateSlotLabel(String),

    #[error("Working hours start {start} must be before end {end}")]
    EmptyWorkingHours { start: String, end: String },

    #[error("Interval must be between 1 and {max} minutes, got {value}")]
    InvalidInterval { value: u32, max: u32 },

    #[error("Auth config error: {0}")]
    AuthError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    errors.extend(validate_schedule(&config.schedule));
    errors.extend(validate_auth(&config.auth));
    errors
}

fn validate_schedule(schedule: &RawSchedule) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(labels) = &schedule.slot_labels {
        let mut seen = HashSet::new();
        for label in labels {
            match parse_time(label) {
                Ok(time) => {
                    if !seen.insert(time) {
                        errors.push(ValidationError::DuplicateSlotLabel(label.clone()));
                    }
                }
                Err(e) => errors.push(e),
            }
        }
    }

    let start = schedule.working_start.as_deref().map(parse_time);
    let end = schedule.working_end.as_deref().map(parse_time);
    for parsed in [&start, &end].into_iter().flatten() {
        if let Err(e) = parsed {
            errors.push(e.clone());
        }
    }

    let start = match start {
        Some(Ok(time)) => Some(time),
        Some(Err(_)) => None,
        None => Some(crate::DEFAULT_WORKING_START),
    };
    let end = match end {
        Some(Ok(time)) => Some(time),
        Some(Err(_)) => None,
        None => Some(crate::DEFAULT_WORKING_END),
    };
    if let (Some(start), Some(end)) = (start, end)
        && start >= end
    {
        errors.push(ValidationError::EmptyWorkingHours {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    if let Some(interval) = schedule.interval_minutes
        && (interval == 0 || interval > MAX_INTERVAL_MINUTES)
    {
        errors.push(ValidationError::InvalidInterval {
            value: interval,
            max: MAX_INTERVAL_MINUTES,
        });
    }

    errors
}

fn validate_auth(auth: &RawAuth) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if auth.login_code_ttl_seconds == Some(0) {
        errors.push(ValidationError::AuthError(
            "login_code_ttl_seconds must be positive".into(),
        ));
    }

    if auth.login_code_requests == Some(0) {
        errors.push(ValidationError::AuthError(
            "login_code_requests must be positive".into(),
        ));
    }

    if auth.login_code_window_seconds == Some(0) {
        errors.push(ValidationError::AuthError(
            "login_code_window_seconds must be positive".into(),
        ));
    }

    errors
}

/// Parse HH:MM time format
pub fn parse_time(s: &str) -> Result<WallClock, ValidationError> {
    s.parse::<WallClock>()
        .map_err(|e| ValidationError::InvalidTimeFormat {
            value: s.to_string(),
            message: e.to_string(),
        })
}
