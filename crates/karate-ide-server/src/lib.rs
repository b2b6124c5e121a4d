//! Test explorer and execution backend for Karate feature files.
//!
//! This crate turns a workspace of Karate `.feature` files into a test tree,
//! starts runner processes for a selection of that tree, and folds the
//! runner's `##vscode {json}` event stream back into per-item results.
//!
//! # Overview
//!
//! - [`tree`]: the test tree built from parsed feature files
//! - [`protocol`]: line framing and decoding of runner events
//! - [`run`]: the per-run state machine and session summary
//! - [`supervisor`]: spawning, reusing and cancelling runner processes
//! - [`server`] and [`handlers`]: the language server hosting all of the
//!   above behind JSON-RPC on stdin/stdout
//!
//! # Configuration
//!
//! The server can be configured via environment variables:
//!
//! - `KARATE_IDE_LOG_LEVEL`: Log verbosity (trace, debug, info, warn,
//!   error)
//! - `KARATE_IDE_DEBOUNCE_MS`: Delay before re-parsing edited files
//! - `KARATE_IDE_USE_TEST_SERVER`: Reuse a persistent Karate test server
//! - `KARATE_IDE_KARATE_ENV`: Environment label for runner processes
//! - `KARATE_IDE_ROOT_MODULE_MARKER`: File marking module roots
//!
//! # Example
//!
//! ```ignore
//! use async_lsp::ClientSocket;
//! use karate_ide_server::config::ServerConfig;
//! use karate_ide_server::server::ServerState;
//!
//! let config = ServerConfig::from_env()?;
//! let state = ServerState::new(config, ClientSocket::new_closed());
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod lsp_ext;
pub mod protocol;
pub mod run;
pub mod server;
pub mod supervisor;
pub mod tree;

/// Test support utilities for unit and integration tests.
///
/// This module is hidden from documentation as it's intended for internal
/// test use only.
#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;
