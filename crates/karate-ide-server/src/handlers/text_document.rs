//! Text document and file watcher notification handlers.
//!
//! Feature files are re-parsed when they are saved, edited, created or
//! deleted, and the updated tree is published to the client. Edits are
//! coalesced: each `didChange` bumps a per-file generation and schedules a
//! [`ReparseFeature`] event after the debounce interval; only the event
//! carrying the latest generation re-parses.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lsp_types::{
    DidChangeTextDocumentParams, DidChangeWatchedFilesParams, DidCloseTextDocumentParams,
    DidSaveTextDocumentParams, FileChangeType,
};
use tracing::{debug, warn};

use crate::discovery::is_feature_file;
use crate::server::{PendingEdit, ServerState};

use super::util::{load_feature, url_to_path};

/// Router event asking for a debounced re-parse of an edited file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReparseFeature {
    /// The edited feature file.
    pub path: PathBuf,
    /// Generation of the edit that scheduled this event.
    pub generation: u64,
}

/// Handle `textDocument/didSave` notifications.
///
/// Saved feature files are re-parsed from the included text (or from disk
/// when the client omits it) and any pending edit is discarded.
pub fn handle_did_save_text_document(state: &mut ServerState, params: DidSaveTextDocumentParams) {
    let Some(path) = feature_path(&params.text_document.uri) else {
        return;
    };
    state.pending_edits.remove(&path);
    reparse(state, &path, params.text.as_deref());
}

/// Handle `textDocument/didChange` notifications.
///
/// The server asks for full synchronisation, so the last content change
/// holds the whole document.
pub fn handle_did_change_text_document(
    state: &mut ServerState,
    params: DidChangeTextDocumentParams,
) {
    let Some(path) = feature_path(&params.text_document.uri) else {
        return;
    };
    let Some(change) = params.content_changes.into_iter().last() else {
        return;
    };
    let generation = state
        .pending_edits
        .get(&path)
        .map_or(1, |pending| pending.generation + 1);
    state.pending_edits.insert(
        path.clone(),
        PendingEdit {
            generation,
            text: change.text,
        },
    );

    let client = state.client.clone();
    let delay = Duration::from_millis(state.config.debounce_ms);
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if client.emit(ReparseFeature { path, generation }).is_err() {
            debug!("main loop gone before debounced re-parse");
        }
    });
}

/// Handle a debounced [`ReparseFeature`] event.
///
/// Events from superseded edits are ignored.
pub fn handle_reparse_feature(state: &mut ServerState, event: ReparseFeature) {
    let is_latest = state
        .pending_edits
        .get(&event.path)
        .is_some_and(|pending| pending.generation == event.generation);
    if !is_latest {
        debug!(path = %event.path.display(), generation = event.generation, "skipping superseded edit");
        return;
    }
    if let Some(pending) = state.pending_edits.remove(&event.path) {
        reparse(state, &event.path, Some(&pending.text));
    }
}

/// Handle `textDocument/didClose` notifications.
///
/// Unsaved edits are dropped and the file is re-read from disk.
pub fn handle_did_close_text_document(
    state: &mut ServerState,
    params: DidCloseTextDocumentParams,
) {
    let Some(path) = feature_path(&params.text_document.uri) else {
        return;
    };
    if state.pending_edits.remove(&path).is_some() && path.is_file() {
        reparse(state, &path, None);
    }
}

/// Handle `workspace/didChangeWatchedFiles` notifications.
///
/// Created and changed feature files are re-parsed from disk; deleted ones
/// are removed. The tree is published once for the whole batch.
pub fn handle_did_change_watched_files(
    state: &mut ServerState,
    params: DidChangeWatchedFilesParams,
) {
    let mut changed = false;
    for event in params.changes {
        let Some(path) = feature_path(&event.uri) else {
            continue;
        };
        state.pending_edits.remove(&path);
        if event.typ == FileChangeType::DELETED {
            changed |= state.tree.remove_feature(&path);
        } else {
            changed |= apply_feature(state, &path, None);
        }
    }
    if changed {
        state.publish_tree();
    }
}

fn feature_path(uri: &lsp_types::Url) -> Option<PathBuf> {
    let Some(path) = url_to_path(uri) else {
        debug!(%uri, "ignoring non-file URI");
        return None;
    };
    is_feature_file(&path).then_some(path)
}

fn reparse(state: &mut ServerState, path: &Path, text: Option<&str>) {
    if apply_feature(state, path, text) {
        state.publish_tree();
    }
}

/// Parse `path` and replace it in the tree; `false` when it could not be read.
fn apply_feature(state: &mut ServerState, path: &Path, text: Option<&str>) -> bool {
    if !path.starts_with(state.tree.root()) {
        debug!(path = %path.display(), "ignoring feature outside the workspace");
        return false;
    }
    match load_feature(path, text) {
        Ok(feature) => {
            debug!(
                path = %path.display(),
                scenarios = feature.as_ref().map_or(0, |f| f.scenarios.len()),
                "parsed feature file"
            );
            state.tree.replace_feature(path, feature.as_ref());
            true
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read feature file");
            false
        }
    }
}

#[cfg(test)]
#[expect(
    clippy::expect_used,
    reason = "tests require explicit panic messages for debugging failures"
)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::test_support::{TestWorkspace, WorkspaceBuilder};
    use crate::tree::TestItemId;
    use async_lsp::ClientSocket;
    use lsp_types::{
        FileEvent, TextDocumentContentChangeEvent, TextDocumentIdentifier, Url,
        VersionedTextDocumentIdentifier,
    };
    use rstest::{fixture, rstest};

    const USERS: &str = "Feature: Users\n  Scenario: get\n    * print 1\n";

    struct Documents {
        workspace: TestWorkspace,
        state: ServerState,
    }

    #[fixture]
    fn documents() -> Documents {
        let workspace = WorkspaceBuilder::new()
            .with_feature("users.feature", USERS)
            .build();
        let mut state = ServerState::new(ServerConfig::default(), ClientSocket::new_closed());
        state.tree = workspace.tree.clone();
        Documents { workspace, state }
    }

    fn uri(path: &Path) -> Url {
        Url::from_file_path(path).expect("absolute path")
    }

    fn change(path: &Path, version: i32, text: &str) -> DidChangeTextDocumentParams {
        DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier::new(uri(path), version),
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: text.to_owned(),
            }],
        }
    }

    fn scenario(path: &Path, line: u32) -> TestItemId {
        TestItemId::for_scenario(path, line)
    }

    #[rstest]
    fn save_reparses_from_included_text(mut documents: Documents) {
        let path = documents.workspace.path("users.feature");
        handle_did_save_text_document(
            &mut documents.state,
            DidSaveTextDocumentParams {
                text_document: TextDocumentIdentifier::new(uri(&path)),
                text: Some("Feature: Users\n\n  Scenario: moved\n".to_owned()),
            },
        );

        assert!(documents.state.tree.get(&scenario(&path, 2)).is_none());
        assert!(documents.state.tree.get(&scenario(&path, 3)).is_some());
    }

    #[rstest]
    fn save_of_other_files_is_ignored(mut documents: Documents) {
        let before = documents.state.tree.snapshot();
        handle_did_save_text_document(
            &mut documents.state,
            DidSaveTextDocumentParams {
                text_document: TextDocumentIdentifier::new(uri(&documents.workspace.path("pom.xml"))),
                text: Some("<project/>".to_owned()),
            },
        );
        assert_eq!(documents.state.tree.snapshot(), before);
    }

    #[rstest]
    #[tokio::test]
    async fn only_the_latest_edit_is_reparsed(mut documents: Documents) {
        let path = documents.workspace.path("users.feature");
        handle_did_change_text_document(
            &mut documents.state,
            change(&path, 1, "Feature: Users\n\n  Scenario: first\n"),
        );
        handle_did_change_text_document(
            &mut documents.state,
            change(&path, 2, "Feature: Users\n\n\n  Scenario: second\n"),
        );

        handle_reparse_feature(
            &mut documents.state,
            ReparseFeature {
                path: path.clone(),
                generation: 1,
            },
        );
        assert!(documents.state.tree.get(&scenario(&path, 2)).is_some());

        handle_reparse_feature(
            &mut documents.state,
            ReparseFeature {
                path: path.clone(),
                generation: 2,
            },
        );
        assert!(documents.state.tree.get(&scenario(&path, 4)).is_some());
        assert!(documents.state.pending_edits.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn close_discards_unsaved_edits(mut documents: Documents) {
        let path = documents.workspace.path("users.feature");
        handle_did_change_text_document(
            &mut documents.state,
            change(&path, 1, "Feature: Users\n\n  Scenario: unsaved\n"),
        );
        handle_did_close_text_document(
            &mut documents.state,
            DidCloseTextDocumentParams {
                text_document: TextDocumentIdentifier::new(uri(&path)),
            },
        );
        handle_reparse_feature(
            &mut documents.state,
            ReparseFeature {
                path: path.clone(),
                generation: 1,
            },
        );

        assert!(documents.state.tree.get(&scenario(&path, 2)).is_some());
        assert!(documents.state.tree.get(&scenario(&path, 3)).is_none());
    }

    #[rstest]
    fn watched_files_add_and_remove_features(mut documents: Documents) {
        let created = documents.workspace.path("orders/orders.feature");
        std::fs::create_dir_all(created.parent().expect("parent")).expect("mkdir");
        std::fs::write(&created, "Feature: Orders\n  Scenario: list\n").expect("write");
        let deleted = documents.workspace.path("users.feature");

        handle_did_change_watched_files(
            &mut documents.state,
            DidChangeWatchedFilesParams {
                changes: vec![
                    FileEvent::new(uri(&created), FileChangeType::CREATED),
                    FileEvent::new(uri(&deleted), FileChangeType::DELETED),
                ],
            },
        );

        assert!(documents.state.tree.get(&scenario(&created, 2)).is_some());
        assert!(documents.state.tree.get(&TestItemId::for_path(&deleted)).is_none());
    }

    #[rstest]
    fn features_outside_the_workspace_are_ignored(mut documents: Documents) {
        let outside = tempfile::TempDir::new().expect("temp dir");
        let path = outside.path().join("stray.feature");
        std::fs::write(&path, "Feature: Stray\n  Scenario: s\n").expect("write");

        handle_did_change_watched_files(
            &mut documents.state,
            DidChangeWatchedFilesParams {
                changes: vec![FileEvent::new(uri(&path), FileChangeType::CREATED)],
            },
        );
        assert!(documents.state.tree.get(&TestItemId::for_path(&path)).is_none());
    }
}
