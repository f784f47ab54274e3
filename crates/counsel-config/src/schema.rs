//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Storage settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Scheduling defaults
    #[serde(default)]
    pub schedule: RawSchedule,

    /// Authentication policy
    #[serde(default)]
    pub auth: RawAuth,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the store
    pub data_dir: Option<PathBuf>,
}

/// Scheduling defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSchedule {
    /// Day template used by bulk slot operations (HH:MM labels)
    pub slot_labels: Option<Vec<String>>,

    /// Start of working hours (HH:MM)
    pub working_start: Option<String>,

    /// End of working hours, exclusive (HH:MM)
    pub working_end: Option<String>,

    /// Spacing of working-hour slots
    pub interval_minutes: Option<u32>,

    /// Price of a session in minor currency units
    pub default_amount: Option<u64>,
}

/// Authentication policy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAuth {
    /// Tell users their account is disabled instead of a generic failure
    pub reveal_disabled: Option<bool>,

    /// Allow login with a code sent by SMS
    pub sms_login: Option<bool>,

    /// Lifetime of a login code
    pub login_code_ttl_seconds: Option<u64>,

    /// Login codes a phone may request per window
    pub login_code_requests: Option<u32>,

    /// Length of the login code request window
    pub login_code_window_seconds: Option<u64>,
}
