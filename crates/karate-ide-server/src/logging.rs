//! Structured logging with environment variable configuration.
//!
//! Logs are written to stderr so they never mix with JSON-RPC traffic on
//! stdout. Runner output is not logged here; it is forwarded to the client as
//! `karate/output` notifications.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::config::ServerConfig;

/// Crates whose own logging is only interesting when something breaks.
const QUIET_TARGETS: [&str; 3] = ["hyper", "reqwest", "async_lsp"];

fn filter_from_config(config: &ServerConfig) -> EnvFilter {
    let level = config.log_level.as_filter_str();
    let mut directives = vec![level.to_owned()];
    if !matches!(config.log_level, crate::config::LogLevel::Trace) {
        directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    }
    EnvFilter::new(directives.join(","))
}

/// Initialise the logging subsystem based on configuration.
///
/// Log level precedence (highest to lowest):
///
/// 1. CLI `--log-level` (parsed into `config.log_level`)
/// 2. `KARATE_IDE_LOG_LEVEL` (parsed into `config.log_level`)
/// 3. Default configuration value
///
/// Returns `false` when a global subscriber was already installed, which is
/// expected in tests; the first subscriber wins.
pub fn init_logging(config: &ServerConfig) -> bool {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_from_config(config))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
