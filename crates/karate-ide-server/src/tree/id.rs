//! Stable identity keys for test items.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Identity key of a node in the test tree.
///
/// Folders and features use their absolute path; scenarios append `:line`;
/// example rows append `:line:title` so several rows stay distinct. Keys are
/// stable across re-parses as long as line numbers do not move.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestItemId(String);

impl TestItemId {
    /// Key for a folder or feature file.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        Self(path.display().to_string())
    }

    /// Key for a scenario or outline header at `line`.
    #[must_use]
    pub fn for_scenario(path: &Path, line: u32) -> Self {
        Self(format!("{}:{line}", path.display()))
    }

    /// Key for an example row at `line` with the given row title.
    #[must_use]
    pub fn for_example(path: &Path, line: u32, title: &str) -> Self {
        Self(format!("{}:{line}:{title}", path.display()))
    }

    /// Borrow the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestItemId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for TestItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lexically normalise a path: drop `.` segments and fold `..` into the
/// preceding segment. The file system is never consulted.
#[must_use]
pub fn normalise_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
