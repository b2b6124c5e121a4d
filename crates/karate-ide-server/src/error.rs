//! Semantic error types for the Karate IDE server.
//!
//! This module defines error types that provide meaningful context about
//! failures during server operations. Errors raised inside the execution
//! pipeline are contained by the supervisor; the variants here cover the
//! surrounding host (configuration, lifecycle, workspace scanning).

use thiserror::Error;

/// Errors that can occur during server operations.
///
/// Each variant provides specific context about the failure, enabling
/// appropriate error handling and user-facing messages.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to scan the workspace for feature files.
    #[error("workspace discovery failed: {0}")]
    WorkspaceDiscovery(String),

    /// Server received a request before initialisation completed.
    #[error("server not initialised")]
    NotInitialised,

    /// Server received a duplicate initialisation request.
    #[error("server already initialised")]
    AlreadyInitialised,

    /// An invalid configuration value was provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
