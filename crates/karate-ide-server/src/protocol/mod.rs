//! Structured execution events emitted by the external test runner.
//!
//! The runner writes one event per stdout line as `##vscode {json}`. Every
//! other line is plain process output. This module owns the event vocabulary
//! and the line framing used to recover events from chunked stdout.
//!
//! Events are processed strictly in emission order; that ordering is the only
//! thing keeping nested feature, outline, and example state consistent.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod framing;

pub use framing::{
    EVENT_SENTINEL, LineFramer, OutputLine, classify_output, feature_name, readiness_port,
};

/// The lifecycle event carried by a structured output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// The runner process began executing.
    TestSuiteStarted,
    /// A feature began.
    FeatureStarted,
    /// A scenario began.
    TestStarted,
    /// A scenario outline began.
    TestOutlineStarted,
    /// A scenario passed.
    TestFinished,
    /// A scenario or example row failed.
    TestFailed,
    /// All examples of an outline are done.
    TestOutlineFinished,
    /// A feature ended.
    FeatureFinished,
    /// The runner finished; always the last event of a run.
    TestSuiteFinished,
    /// An event kind this server does not know about.
    #[serde(other)]
    Unknown,
}

/// A decoded execution event.
///
/// Field names follow the runner's camelCase JSON. Fields not relevant to a
/// given [`EventKind`] are simply absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEvent {
    /// What happened.
    pub event: EventKind,
    /// Scope identifier: a path relative to `cwd`, optionally `:line`.
    #[serde(default)]
    pub location_hint: String,
    /// Working directory the event is scoped to; set by the supervisor.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Feature or scenario name.
    #[serde(default)]
    pub name: Option<String>,
    /// Failure summary for `testFailed`.
    #[serde(default)]
    pub message: Option<String>,
    /// Failure details for `testFailed`.
    #[serde(default)]
    pub details: Option<String>,
    /// Elapsed milliseconds for terminal events.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Feature selection the suite was started with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<String>,
    /// Number of features the runner found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features_found: Option<serde_json::Value>,
    /// Whether a scenario belongs to an outline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<bool>,
    /// Whether an outline's examples were generated at runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<bool>,
}

impl ExecutionEvent {
    /// Build an event carrying only its kind and location.
    #[must_use]
    pub fn new(event: EventKind, location_hint: impl Into<String>) -> Self {
        Self {
            event,
            location_hint: location_hint.into(),
            cwd: None,
            name: None,
            message: None,
            details: None,
            duration: None,
            features: None,
            features_found: None,
            outline: None,
            dynamic: None,
        }
    }

    /// The event the consumer synthesises when a run ends without one.
    #[must_use]
    pub fn suite_finished() -> Self {
        Self::new(EventKind::TestSuiteFinished, "")
    }

    /// Attach the working directory the event is scoped to.
    #[must_use]
    pub fn with_cwd(mut self, cwd: &Path) -> Self {
        self.cwd = Some(cwd.to_path_buf());
        self
    }

    /// Attach a name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach failure text.
    #[must_use]
    pub fn with_failure(mut self, message: impl Into<String>, details: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self.details = Some(details.into());
        self
    }

    /// Attach a duration in milliseconds.
    #[must_use]
    pub fn with_duration(mut self, millis: f64) -> Self {
        self.duration = Some(millis);
        self
    }

    /// Failure text rendered as `"<message>: <details>"`.
    #[must_use]
    pub fn failure_message(&self) -> String {
        format!(
            "{}: {}",
            self.message.as_deref().unwrap_or_default(),
            self.details.as_deref().unwrap_or_default()
        )
    }
}

/// Errors raised while decoding a structured output line.
#[derive(Debug, Error)]
pub enum EventDecodeError {
    /// The JSON payload did not describe an execution event.
    #[error("malformed execution event: {0}")]
    Json(#[from] serde_json::Error),
    /// The sentinel was present but no JSON object followed it.
    #[error("execution event line has no JSON object")]
    MissingPayload,
}

#[cfg(test)]
#[expect(
    clippy::expect_used,
    reason = "tests require explicit panic messages for debugging failures"
)]
mod tests {
    use super::*;

    #[test]
    fn decodes_failure_event_with_camel_case_fields() {
        let event: ExecutionEvent = serde_json::from_str(
            r#"{"event":"testFailed","locationHint":"a/b.feature:7","name":"s","message":"boom","details":"trace","duration":12.5}"#,
        )
        .expect("decode");

        assert_eq!(event.event, EventKind::TestFailed);
        assert_eq!(event.location_hint, "a/b.feature:7");
        assert_eq!(event.failure_message(), "boom: trace");
        assert_eq!(event.duration, Some(12.5));
    }

    #[test]
    fn unknown_kinds_and_fields_are_tolerated() {
        let event: ExecutionEvent =
            serde_json::from_str(r#"{"event":"stepStarted","extra":1}"#).expect("decode");
        assert_eq!(event.event, EventKind::Unknown);
        assert!(event.location_hint.is_empty());
    }

    #[test]
    fn failure_message_renders_missing_parts_as_empty() {
        let event = ExecutionEvent::new(EventKind::TestFailed, "x.feature");
        assert_eq!(event.failure_message(), ": ");
    }
}
