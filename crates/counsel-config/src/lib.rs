//! Configuration parsing and validation for counsel
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Schedule defaults (slot labels, working hours, session price)
//! - Authentication policy (message disclosure, phone login codes)
//! - Validation with clear error messages

mod schema;
mod settings;
mod validation;

pub use schema::*;
pub use settings::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "Loading config");
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Settings> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Settings::from_raw(raw)
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_config() {
        let settings = parse_config("config_version = 1").unwrap();
        assert_eq!(settings.schedule.interval_minutes, 60);
        assert_eq!(settings.schedule.slot_labels.len(), 12);
        assert!(!settings.auth.reveal_disabled);
        assert!(!settings.auth.sms_login);
    }

    #[test]
    fn test_reject_wrong_version() {
        let result = parse_config("config_version = 99");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn test_reject_invalid_schedule() {
        let config = r#"
            config_version = 1

            [schedule]
            working_start = "18:00"
            working_end = "09:00"
            interval_minutes = 0
        "#;

        match parse_config(config) {
            Err(ConfigError::ValidationFailed { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "config_version = 1\n[auth]\nsms_login = true\nlogin_code_ttl_seconds = 120\nlogin_code_requests = 5"
        )
        .unwrap();

        let settings = load_config(file.path()).unwrap();
        assert!(settings.auth.sms_login);
        assert_eq!(settings.auth.login_code_ttl.as_secs(), 120);
        assert_eq!(settings.auth.login_code_requests, 5);
        assert_eq!(settings.auth.login_code_window.as_secs(), 15 * 60);
    }
}
