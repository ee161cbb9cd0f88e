use std::env;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{time::UtcTime, writer::BoxMakeWriter},
    EnvFilter,
};

use crate::constants::*;

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
    /// Whether to log to a daily-rolling file instead of stdout
    pub log_to_file: bool,
    /// Directory for log files
    pub log_dir: String,
    /// Log file prefix
    pub log_file_prefix: String,
    /// Whether to include file and line numbers in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
            json_format: env::var("LOG_JSON")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            log_to_file: env::var("LOG_TO_FILE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string()),
            log_file_prefix: env::var("LOG_FILE_PREFIX")
                .unwrap_or_else(|_| DEFAULT_LOG_FILE_PREFIX.to_string()),
            include_location: env::var("LOG_INCLUDE_LOCATION")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        }
    }
}

/// Initialize the logging system with the given configuration
///
/// When file logging is on, the returned guard flushes the background writer
/// on drop and must live as long as the process logs.
pub fn init_logging(config: LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let (writer, guard) = if config.log_to_file {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        (BoxMakeWriter::new(non_blocking), Some(guard))
    } else {
        (BoxMakeWriter::new(std::io::stdout), None)
    };

    // Create environment filter
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let builder = tracing_subscriber::fmt()
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_ansi(!config.log_to_file)
        .with_writer(writer)
        .with_env_filter(env_filter);

    let result = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    // Handle the case where a global subscriber is already set
    if let Err(e) = result {
        if e.to_string().contains("already been set") {
            eprintln!("Warning: Global subscriber already set: {}", e);
        } else {
            return Err(anyhow::anyhow!("Failed to initialize logging: {}", e));
        }
    }

    if config.log_to_file {
        info!(
            "File logging enabled: {}/{}.<date>",
            config.log_dir, config.log_file_prefix
        );
    }

    Ok(guard)
}

/// Initialize logging with default configuration
pub fn init_default_logging() -> anyhow::Result<Option<WorkerGuard>> {
    init_logging(LoggingConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    const LOG_VARS: [&str; 6] = [
        "RUST_LOG",
        "LOG_JSON",
        "LOG_TO_FILE",
        "LOG_DIR",
        "LOG_FILE_PREFIX",
        "LOG_INCLUDE_LOCATION",
    ];

    fn with_cleared_env<F: FnOnce()>(f: F) {
        let saved: Vec<(&str, Option<String>)> =
            LOG_VARS.iter().map(|k| (*k, env::var(k).ok())).collect();
        for key in LOG_VARS {
            env::remove_var(key);
        }

        f();

        for (key, value) in saved {
            match value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_default_config() {
        with_cleared_env(|| {
            let config = LoggingConfig::default();
            assert_eq!(config.level, "info");
            assert!(!config.json_format);
            assert!(!config.log_to_file);
            assert_eq!(config.log_dir, "logs");
            assert_eq!(config.log_file_prefix, "warmgate");
            assert!(!config.include_location);
        });
    }

    #[test]
    #[serial_test::serial]
    fn test_config_from_env_vars() {
        with_cleared_env(|| {
            env::set_var("RUST_LOG", "debug");
            env::set_var("LOG_JSON", "true");
            env::set_var("LOG_TO_FILE", "true");
            env::set_var("LOG_DIR", "custom_logs");
            env::set_var("LOG_FILE_PREFIX", "custom_prefix");
            env::set_var("LOG_INCLUDE_LOCATION", "true");

            let config = LoggingConfig::default();

            assert_eq!(config.level, "debug");
            assert!(config.json_format);
            assert!(config.log_to_file);
            assert_eq!(config.log_dir, "custom_logs");
            assert_eq!(config.log_file_prefix, "custom_prefix");
            assert!(config.include_location);
        });
    }

    #[test]
    #[serial_test::serial]
    fn test_config_with_invalid_boolean_env_vars() {
        with_cleared_env(|| {
            env::set_var("LOG_JSON", "invalid");
            env::set_var("LOG_TO_FILE", "not_a_bool");
            env::set_var("LOG_INCLUDE_LOCATION", "maybe");

            let config = LoggingConfig::default();

            assert!(!config.json_format);
            assert!(!config.log_to_file);
            assert!(!config.include_location);
        });
    }

    #[test]
    #[serial_test::serial]
    fn test_init_logging_to_stdout() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            json_format: true,
            log_to_file: false,
            log_dir: "unused".to_string(),
            log_file_prefix: "test".to_string(),
            include_location: true,
        };

        let guard = init_logging(config).unwrap();
        assert!(guard.is_none());
    }

    #[test]
    #[serial_test::serial]
    fn test_init_logging_with_file_output() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("nested").to_str().unwrap().to_string();

        let config = LoggingConfig {
            level: "info".to_string(),
            json_format: false,
            log_to_file: true,
            log_dir: log_dir.clone(),
            log_file_prefix: "test".to_string(),
            include_location: false,
        };

        let guard = init_logging(config).unwrap();
        assert!(guard.is_some());
        assert!(std::path::Path::new(&log_dir).exists());
    }

    #[test]
    fn test_create_log_directory_error_handling() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let config = LoggingConfig {
            level: "info".to_string(),
            json_format: false,
            log_to_file: true,
            log_dir: blocker.join("logs").to_str().unwrap().to_string(),
            log_file_prefix: "test".to_string(),
            include_location: false,
        };

        assert!(init_logging(config).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn test_invalid_level_falls_back() {
        let config = LoggingConfig {
            level: "invalid_level[".to_string(),
            json_format: false,
            log_to_file: false,
            log_dir: "logs".to_string(),
            log_file_prefix: "test".to_string(),
            include_location: false,
        };

        assert!(init_logging(config).is_ok());
    }
}
