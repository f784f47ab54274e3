//! Validated settings

use crate::schema::{RawAuth, RawConfig, RawSchedule, RawServiceConfig};
use crate::validation::parse_time;
use crate::{ConfigError, ConfigResult};
use counsel_util::WallClock;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WORKING_START: WallClock = WallClock::from_hm(9, 0);
pub const DEFAULT_WORKING_END: WallClock = WallClock::from_hm(18, 0);
pub const DEFAULT_INTERVAL_MINUTES: u32 = 60;
pub const DEFAULT_AMOUNT: u64 = 3000;
pub const DEFAULT_LOGIN_CODE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_LOGIN_CODE_REQUESTS: u32 = 3;
pub const DEFAULT_LOGIN_CODE_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Validated settings ready for use by the core
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceConfig,
    pub schedule: ScheduleSettings,
    pub auth: AuthSettings,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> ConfigResult<Self> {
        Ok(Self {
            service: ServiceConfig::from_raw(raw.service),
            schedule: ScheduleSettings::from_raw(raw.schedule)?,
            auth: AuthSettings::from_raw(raw.auth),
        })
    }
}

/// Storage settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw
                .data_dir
                .unwrap_or_else(counsel_util::data_dir_without_env),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: counsel_util::data_dir_without_env(),
        }
    }
}

/// Scheduling defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    /// Day template for bulk slot operations, sorted
    pub slot_labels: Vec<WallClock>,
    pub working_start: WallClock,
    pub working_end: WallClock,
    pub interval_minutes: u32,
    pub default_amount: u64,
}

impl ScheduleSettings {
    fn from_raw(raw: RawSchedule) -> ConfigResult<Self> {
        let defaults = Self::default();
        let parse = |s: &str| {
            parse_time(s).map_err(|e| ConfigError::ValidationFailed { errors: vec![e] })
        };

        let slot_labels = match raw.slot_labels {
            Some(labels) => {
                let mut parsed = labels
                    .iter()
                    .map(|label| parse(label.as_str()))
                    .collect::<ConfigResult<Vec<_>>>()?;
                parsed.sort();
                parsed.dedup();
                parsed
            }
            None => defaults.slot_labels,
        };

        Ok(Self {
            slot_labels,
            working_start: match raw.working_start {
                Some(s) => parse(s.as_str())?,
                None => defaults.working_start,
            },
            working_end: match raw.working_end {
                Some(s) => parse(s.as_str())?,
                None => defaults.working_end,
            },
            interval_minutes: raw.interval_minutes.unwrap_or(defaults.interval_minutes),
            default_amount: raw.default_amount.unwrap_or(defaults.default_amount),
        })
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            // Hourly from 09:00 through 20:00
            slot_labels: (9..=20).filter_map(|hour| WallClock::new(hour, 0)).collect(),
            working_start: DEFAULT_WORKING_START,
            working_end: DEFAULT_WORKING_END,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            default_amount: DEFAULT_AMOUNT,
        }
    }
}

/// Authentication policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// Whether failed-login messages distinguish a disabled account
    pub reveal_disabled: bool,
    /// Whether phone login codes may be requested
    pub sms_login: bool,
    pub login_code_ttl: Duration,
    /// Codes one phone may request per `login_code_window`
    pub login_code_requests: u32,
    pub login_code_window: Duration,
}

impl AuthSettings {
    fn from_raw(raw: RawAuth) -> Self {
        Self {
            reveal_disabled: raw.reveal_disabled.unwrap_or(false),
            sms_login: raw.sms_login.unwrap_or(false),
            login_code_ttl: raw
                .login_code_ttl_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_LOGIN_CODE_TTL),
            login_code_requests: raw
                .login_code_requests
                .unwrap_or(DEFAULT_LOGIN_CODE_REQUESTS),
            login_code_window: raw
                .login_code_window_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_LOGIN_CODE_WINDOW),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            reveal_disabled: false,
            sms_login: false,
            login_code_ttl: DEFAULT_LOGIN_CODE_TTL,
            login_code_requests: DEFAULT_LOGIN_CODE_REQUESTS,
            login_code_window: DEFAULT_LOGIN_CODE_WINDOW,
        }
    }
}
