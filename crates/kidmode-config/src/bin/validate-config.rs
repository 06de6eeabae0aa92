//! Config validation CLI tool
//!
//! Validates a kidmoded configuration file and reports any errors.

use kidmode_util::{default_config_path, format_minutes};
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
            eprintln!("Validates a kidmoded configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match kidmode_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", kidmode_config::CURRENT_CONFIG_VERSION);
            println!("  Socket: {}", settings.service.socket_path.display());
            println!("  Data dir: {}", settings.service.data_dir.display());
            println!(
                "  Secret length: setup >= {}, change >= {}",
                settings.secret.min_length_setup, settings.secret.min_length_change
            );
            match settings.challenge_timeout {
                Some(timeout) => println!("  Challenge timeout: {}s", timeout.as_secs()),
                None => println!("  Challenge timeout: never"),
            }
            let presets: Vec<String> = settings
                .timer
                .presets_minutes
                .iter()
                .map(|m| format_minutes(*m))
                .collect();
            println!("  Timer presets: {}", presets.join(", "));
            println!(
                "  Notifications: {}",
                if settings.notifications_enabled { "on" } else { "off" }
            );

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                kidmode_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                kidmode_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                kidmode_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                kidmode_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        kidmode_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
