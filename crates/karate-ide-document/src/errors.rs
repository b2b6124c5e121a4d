//! Error types for document loading.

use thiserror::Error;

/// Errors raised while loading a feature document.
///
/// Parsing itself never fails; only reading the source can.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The feature file could not be read from disk.
    #[error("failed to read feature file: {0}")]
    Read(#[from] std::io::Error),
}
