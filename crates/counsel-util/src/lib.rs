//! Shared utilities for counsel
//!
//! This crate provides:
//! - ID types (ClientId, SessionId, PsychologistId)
//! - Date and time-of-day value types (DateKey, WallClock, MonthRef)
//! - Phone number normalization
//! - Per-key rate limiting
//! - Error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod phone;
mod rate_limit;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use phone::*;
pub use rate_limit::*;
pub use time::*;
