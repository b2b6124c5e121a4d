//! Shared test support utilities for karate-ide-server tests.
//!
//! This module provides common infrastructure for both unit and integration
//! tests, including:
//! - Temporary feature workspaces and the tree built from them
//! - A [`RunObserver`] that records everything a run reports
//! - A driver that feeds runner messages back into a supervisor

use std::path::{Path, PathBuf};
use std::time::Duration;

use karate_ide_document::parse_file;
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::run::{RunUpdate, Summary};
use crate::supervisor::{ProcessMessage, RunObserver, Supervisor};
use crate::tree::TestTree;

/// Newtype wrapper for test file names to improve type safety.
#[derive(Debug, Clone)]
pub struct Filename(pub(crate) String);

impl From<&str> for Filename {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

/// Newtype wrapper for file contents to improve type safety.
#[derive(Debug, Clone)]
pub struct FileContent(pub(crate) String);

impl From<&str> for FileContent {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

/// Everything a run reported, in order of arrival per kind.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    /// Item transitions.
    pub updates: Vec<RunUpdate>,
    /// Summary notifications.
    pub summaries: Vec<Summary>,
    /// Concatenated output log.
    pub output: String,
    /// Progress messages.
    pub progress: Vec<String>,
    /// User-facing errors.
    pub errors: Vec<String>,
    /// Debug ports announced.
    pub debug_ports: Vec<u16>,
}

impl RecordingObserver {
    /// Number of summaries reporting no open session.
    #[must_use]
    pub fn closed_summaries(&self) -> usize {
        self.summaries.iter().filter(|summary| !summary.running).count()
    }

    /// The last summary reported, if any.
    #[must_use]
    pub fn last_summary(&self) -> Option<Summary> {
        self.summaries.last().copied()
    }
}

impl RunObserver for RecordingObserver {
    fn item_updated(&mut self, update: &RunUpdate) {
        self.updates.push(update.clone());
    }

    fn summary_changed(&mut self, summary: Summary) {
        self.summaries.push(summary);
    }

    fn output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn progress(&mut self, message: &str) {
        self.progress.push(message.to_owned());
    }

    fn show_error(&mut self, message: &str) {
        self.errors.push(message.to_owned());
    }

    fn debug_server_ready(&mut self, port: u16) {
        self.debug_ports.push(port);
    }
}

/// A temporary workspace of feature files and the tree built from them.
pub struct TestWorkspace {
    /// Temporary directory holding the files.
    pub dir: TempDir,
    /// Tree built from every written feature.
    pub tree: TestTree,
}

impl TestWorkspace {
    /// Workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a workspace-relative file.
    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }
}

/// Builder for temporary feature workspaces.
pub struct WorkspaceBuilder {
    dir: TempDir,
    features: Vec<(Filename, FileContent)>,
}

impl WorkspaceBuilder {
    /// Start a builder with a fresh temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[expect(clippy::expect_used, reason = "builder panics on temp dir failure")]
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
            features: Vec::new(),
        }
    }

    /// Add a feature file at a workspace-relative path.
    #[must_use]
    pub fn with_feature(
        mut self,
        filename: impl Into<Filename>,
        content: impl Into<FileContent>,
    ) -> Self {
        self.features.push((filename.into(), content.into()));
        self
    }

    /// Write every file and build the tree.
    ///
    /// # Panics
    ///
    /// Panics if any file cannot be written.
    #[expect(clippy::expect_used, reason = "builder panics on write failure")]
    #[must_use]
    pub fn build(self) -> TestWorkspace {
        let root = self.dir.path().to_path_buf();
        let mut parsed = Vec::new();
        for (filename, content) in &self.features {
            let path = root.join(&filename.0);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("create feature dir");
            }
            std::fs::write(&path, &content.0).expect("write feature file");
            parsed.push((path.clone(), parse_file(&path).ok().flatten()));
        }
        TestWorkspace {
            tree: TestTree::from_features(root, parsed),
            dir: self.dir,
        }
    }
}

impl Default for WorkspaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Feed runner messages into `supervisor` until `done` holds.
///
/// # Panics
///
/// Panics if no message arrives within `timeout` while waiting.
#[expect(clippy::expect_used, reason = "test driver panics on stalls")]
pub async fn drive_until<F>(
    supervisor: &mut Supervisor<mpsc::UnboundedSender<ProcessMessage>>,
    messages: &mut mpsc::UnboundedReceiver<ProcessMessage>,
    tree: &TestTree,
    observer: &mut RecordingObserver,
    timeout: Duration,
    done: F,
) where
    F: Fn(&Supervisor<mpsc::UnboundedSender<ProcessMessage>>) -> bool,
{
    while !done(supervisor) {
        let message = tokio::time::timeout(timeout, messages.recv())
            .await
            .expect("runner message before timeout")
            .expect("message channel open");
        supervisor.handle_message(message, tree, observer);
    }
}
