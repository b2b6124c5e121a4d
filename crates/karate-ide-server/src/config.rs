//! Server configuration parsed from environment variables.
//!
//! This module provides configuration types and parsing for the server. All
//! settings can be overridden via environment variables prefixed with
//! `KARATE_IDE_`; a subset can be overridden again on the command line.

use std::env;
use std::str::FromStr;

use crate::error::ServerError;

/// Log level enumeration matching tracing crate levels.
///
/// Defaults to `Info` when not specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Most verbose logging, includes all trace spans.
    Trace,
    /// Debug-level information for development.
    Debug,
    /// Standard informational messages.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for failures.
    Error,
}

impl FromStr for LogLevel {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ServerError::InvalidConfig(format!(
                "unknown log level '{s}', expected one of: trace, debug, info, warn, error"
            ))),
        }
    }
}

impl LogLevel {
    /// Convert to a tracing filter directive string.
    #[must_use]
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Default debounce interval in milliseconds.
const DEFAULT_DEBOUNCE_MS: u64 = 300;

const LOG_LEVEL_VAR: &str = "KARATE_IDE_LOG_LEVEL";
const DEBOUNCE_VAR: &str = "KARATE_IDE_DEBOUNCE_MS";
const USE_TEST_SERVER_VAR: &str = "KARATE_IDE_USE_TEST_SERVER";
const KARATE_ENV_VAR: &str = "KARATE_IDE_KARATE_ENV";
const ROOT_MODULE_MARKER_VAR: &str = "KARATE_IDE_ROOT_MODULE_MARKER";

/// Configuration for the server.
///
/// # Environment Variables
///
/// - `KARATE_IDE_LOG_LEVEL`: Sets the log level (trace, debug, info, warn,
///   error)
/// - `KARATE_IDE_DEBOUNCE_MS`: Delay before re-parsing edited feature files
/// - `KARATE_IDE_USE_TEST_SERVER`: Keep a persistent Karate test server alive
///   between runs (`true`/`false`)
/// - `KARATE_IDE_KARATE_ENV`: Environment label passed to the runner; a change
///   forces a fresh process
/// - `KARATE_IDE_ROOT_MODULE_MARKER`: File name marking a module root in
///   multi-module workspaces (for example `pom.xml`)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: LogLevel,
    /// Debounce interval for document change events in milliseconds.
    pub debounce_ms: u64,
    /// Whether runs go through a persistent test server process.
    pub use_test_server: bool,
    /// Karate environment label for spawned processes.
    pub karate_env: String,
    /// Marker file used to locate module roots, if configured.
    pub root_module_marker: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            use_test_server: false,
            karate_env: String::new(),
            root_module_marker: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Falls back to defaults for missing values.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::InvalidConfig` if an environment variable contains
    /// an invalid value.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::InvalidConfig` if a variable contains an invalid
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = match lookup(LOG_LEVEL_VAR) {
            Some(val) => val.parse()?,
            None => LogLevel::default(),
        };

        let debounce_ms = match lookup(DEBOUNCE_VAR) {
            Some(val) => val.parse().map_err(|_| {
                ServerError::InvalidConfig(format!(
                    "invalid debounce value '{val}', expected a positive integer"
                ))
            })?,
            None => DEFAULT_DEBOUNCE_MS,
        };

        let use_test_server = match lookup(USE_TEST_SERVER_VAR) {
            Some(val) => parse_bool(&val)?,
            None => false,
        };

        let karate_env = lookup(KARATE_ENV_VAR).unwrap_or_default();
        let root_module_marker = lookup(ROOT_MODULE_MARKER_VAR)
            .map(|marker| marker.trim().to_owned())
            .filter(|marker| !marker.is_empty());

        Ok(Self {
            log_level,
            debounce_ms,
            use_test_server,
            karate_env,
            root_module_marker,
        })
    }

    /// Apply optional overrides to an existing configuration.
    ///
    /// This is intended for CLI overrides that should take precedence over
    /// environment-based defaults.
    #[must_use]
    pub fn apply_overrides(
        mut self,
        log_level: Option<LogLevel>,
        use_test_server: Option<bool>,
    ) -> Self {
        if let Some(level) = log_level {
            self.log_level = level;
        }

        if let Some(enabled) = use_test_server {
            self.use_test_server = enabled;
        }

        self
    }

    /// Create a new configuration with the specified log level.
    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Create a new configuration with persistent test-server mode toggled.
    #[must_use]
    pub fn with_test_server(mut self, enabled: bool) -> Self {
        self.use_test_server = enabled;
        self
    }
}

fn parse_bool(value: &str) -> Result<bool, ServerError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ServerError::InvalidConfig(format!(
            "invalid boolean '{value}', expected true or false"
        ))),
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests require explicit panic messages for debugging failures"
)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn log_level_parses_valid_values() {
        assert_eq!("trace".parse::<LogLevel>().ok(), Some(LogLevel::Trace));
        assert_eq!("debug".parse::<LogLevel>().ok(), Some(LogLevel::Debug));
        assert_eq!("info".parse::<LogLevel>().ok(), Some(LogLevel::Info));
        assert_eq!("warn".parse::<LogLevel>().ok(), Some(LogLevel::Warn));
        assert_eq!("warning".parse::<LogLevel>().ok(), Some(LogLevel::Warn));
        assert_eq!("error".parse::<LogLevel>().ok(), Some(LogLevel::Error));
    }

    #[test]
    fn log_level_rejects_invalid_values() {
        let result = "invalid".parse::<LogLevel>();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("unknown log level"));
    }

    #[test]
    fn server_config_default_values() {
        let config = ServerConfig::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.debounce_ms, 300);
        assert!(!config.use_test_server);
        assert!(config.karate_env.is_empty());
        assert!(config.root_module_marker.is_none());
    }

    #[test]
    fn from_lookup_reads_every_variable() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("KARATE_IDE_LOG_LEVEL", "debug"),
            ("KARATE_IDE_DEBOUNCE_MS", "50"),
            ("KARATE_IDE_USE_TEST_SERVER", "true"),
            ("KARATE_IDE_KARATE_ENV", "qa"),
            ("KARATE_IDE_ROOT_MODULE_MARKER", " pom.xml "),
        ]))
        .unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.debounce_ms, 50);
        assert!(config.use_test_server);
        assert_eq!(config.karate_env, "qa");
        assert_eq!(config.root_module_marker.as_deref(), Some("pom.xml"));
    }

    #[test]
    fn from_lookup_rejects_bad_values() {
        let debounce = ServerConfig::from_lookup(lookup_from(&[("KARATE_IDE_DEBOUNCE_MS", "soon")]));
        assert!(debounce.unwrap_err().to_string().contains("debounce"));

        let flag = ServerConfig::from_lookup(lookup_from(&[("KARATE_IDE_USE_TEST_SERVER", "maybe")]));
        assert!(flag.unwrap_err().to_string().contains("boolean"));
    }

    #[test]
    fn blank_marker_is_treated_as_unset() {
        let config =
            ServerConfig::from_lookup(lookup_from(&[("KARATE_IDE_ROOT_MODULE_MARKER", "  ")]))
                .unwrap();
        assert!(config.root_module_marker.is_none());
    }

    #[test]
    fn server_config_apply_overrides_updates_selected_fields() {
        let config = ServerConfig::default().apply_overrides(Some(LogLevel::Error), Some(true));
        assert_eq!(config.log_level, LogLevel::Error);
        assert!(config.use_test_server);

        let config = ServerConfig::default().apply_overrides(None, None);
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(!config.use_test_server);
    }
}
