//! Config validation CLI tool
//!
//! Validates a counsel configuration file and reports any errors.

use counsel_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a counsel configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match counsel_config::load_config(&config_path) {
        Ok(settings) => {
            let schedule = &settings.schedule;
            let labels: Vec<String> = schedule.slot_labels.iter().map(|t| t.to_string()).collect();

            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", counsel_config::CURRENT_CONFIG_VERSION);
            println!("  Data directory: {}", settings.service.data_dir.display());
            println!("  Slot labels: {}", labels.join(", "));
            println!(
                "  Working hours: {}-{} every {} min",
                schedule.working_start, schedule.working_end, schedule.interval_minutes
            );
            println!("  Default amount: {}", schedule.default_amount);
            println!(
                "  SMS login: {}",
                if settings.auth.sms_login { "enabled" } else { "disabled" }
            );

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                counsel_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                counsel_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                counsel_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                counsel_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        counsel_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
