//! LSP lifecycle handlers for initialization and shutdown.
//!
//! This module implements the core lifecycle protocol handlers required by
//! the language server protocol: `initialize`, `initialized`, and `shutdown`.
//! Initialisation is where the workspace is scanned and the test tree built.

use std::path::{Path, PathBuf};

use async_lsp::ResponseError;
use lsp_types::{InitializeParams, InitializeResult, InitializedParams, ServerInfo, Url};
use tracing::{info, warn};

use crate::discovery::find_feature_files;
use crate::error::ServerError;
use crate::server::{ClientObserver, ServerState, build_server_capabilities};
use crate::tree::TestTree;

use super::util::{load_feature, url_to_path};

/// Name reported to the client in `serverInfo`.
pub const SERVER_NAME: &str = "karate-ide-lsp";

/// Handle the `initialize` request from the client.
///
/// Discovers every `.feature` file under the first workspace folder (or the
/// root URI for single-root clients), parses them and builds the test tree.
///
/// # Errors
///
/// Returns a `ResponseError` when the server is already initialized.
///
/// Discovery and parse failures are logged as warnings and do not fail the
/// request; the affected files are left out of the tree.
pub fn handle_initialise(
    state: &mut ServerState,
    params: InitializeParams,
) -> Result<InitializeResult, ResponseError> {
    if state.is_initialised() {
        return Err(response_error(
            &ServerError::AlreadyInitialised,
            async_lsp::ErrorCode::INVALID_REQUEST,
        ));
    }

    #[expect(
        deprecated,
        reason = "Some clients still populate root_uri instead of workspace_folders."
    )]
    let InitializeParams {
        workspace_folders,
        root_uri,
        ..
    } = params;

    if let Some(folders) = workspace_folders {
        state.workspace_folders = folders;
    }

    if let Some(root) = extract_workspace_path(&state.workspace_folders, root_uri.as_ref()) {
        state.tree = build_tree(&root);
        info!(
            root = %root.display(),
            tests = state.tree.len(),
            mocks = state.tree.mocks().len(),
            "discovered workspace"
        );
    }

    Ok(InitializeResult {
        capabilities: build_server_capabilities(),
        server_info: Some(ServerInfo {
            name: SERVER_NAME.to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }),
    })
}

/// Handle the `initialized` notification from the client.
///
/// Marks the server ready and sends the client its first test tree.
pub fn handle_initialised(state: &mut ServerState, _params: InitializedParams) {
    state.mark_initialised();
    state.publish_tree();
    info!("server initialised");
}

/// Handle the `shutdown` request from the client.
///
/// Kills every runner process so none outlives the editor session.
///
/// # Errors
///
/// Currently always returns `Ok(())`.
pub fn handle_shutdown(state: &mut ServerState) -> Result<(), ResponseError> {
    info!("shutdown request received");
    let mut observer = ClientObserver::new(&state.client);
    state
        .supervisor
        .stop_test_processes(&state.tree, &mut observer);
    Ok(())
}

/// Scan `root` and parse every feature file found.
fn build_tree(root: &Path) -> TestTree {
    let files = match find_feature_files(root) {
        Ok(files) => files,
        Err(err) => {
            warn!(error = %err, "workspace discovery failed");
            return TestTree::new(root);
        }
    };
    let features = files.into_iter().filter_map(|path| match load_feature(&path, None) {
        Ok(feature) => Some((path, feature)),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read feature file");
            None
        }
    });
    TestTree::from_features(root, features)
}

/// Extract a workspace path from workspace folders.
///
/// Returns the path of the first workspace folder with a file:// scheme. When
/// no folders are provided, the root URI is used (for single-root clients).
fn extract_workspace_path(
    workspace_folders: &[lsp_types::WorkspaceFolder],
    root_uri: Option<&Url>,
) -> Option<PathBuf> {
    workspace_folders
        .first()
        .and_then(|f| url_to_path(&f.uri))
        .or_else(|| root_uri.and_then(url_to_path))
}

/// Convert a server error to an LSP response error.
fn response_error(err: &ServerError, code: async_lsp::ErrorCode) -> ResponseError {
    ResponseError::new(code, err.to_string())
}

#[cfg(test)]
#[expect(
    clippy::expect_used,
    reason = "tests require explicit panic messages for debugging failures"
)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::test_support::WorkspaceBuilder;
    use async_lsp::ClientSocket;
    use lsp_types::ClientCapabilities;
    use rstest::{fixture, rstest};

    #[fixture]
    fn create_test_state() -> ServerState {
        ServerState::new(ServerConfig::default(), ClientSocket::new_closed())
    }

    #[fixture]
    fn create_init_params() -> InitializeParams {
        InitializeParams {
            capabilities: ClientCapabilities::default(),
            workspace_folders: None,
            ..Default::default()
        }
    }

    fn folder_params(root: &Path) -> InitializeParams {
        InitializeParams {
            workspace_folders: Some(vec![lsp_types::WorkspaceFolder {
                uri: Url::from_file_path(root).expect("valid path"),
                name: "workspace".to_string(),
            }]),
            ..Default::default()
        }
    }

    #[rstest]
    fn handle_initialise_returns_server_info(
        mut create_test_state: ServerState,
        create_init_params: InitializeParams,
    ) {
        let init_result = handle_initialise(&mut create_test_state, create_init_params)
            .expect("initialization should succeed");

        let info = init_result.server_info.expect("should have server info");
        assert_eq!(info.name, "karate-ide-lsp");
        assert!(info.version.is_some());
        assert!(init_result.capabilities.text_document_sync.is_some());
    }

    #[rstest]
    fn handle_initialise_fails_when_already_initialised(
        mut create_test_state: ServerState,
        create_init_params: InitializeParams,
    ) {
        create_test_state.mark_initialised();

        let result = handle_initialise(&mut create_test_state, create_init_params);

        assert!(result.is_err());
    }

    #[rstest]
    fn handle_initialise_builds_the_tree(mut create_test_state: ServerState) {
        let workspace = WorkspaceBuilder::new()
            .with_feature(
                "api/users.feature",
                "Feature: Users\n  Scenario: get\n    * print 1\n",
            )
            .with_feature("mocks/users.feature", "@mock\nFeature: Mock\n  Scenario: m\n")
            .build();

        handle_initialise(&mut create_test_state, folder_params(workspace.root()))
            .expect("initialization should succeed");

        assert_eq!(create_test_state.workspace_root(), workspace.root());
        assert_eq!(create_test_state.workspace_folders().len(), 1);
        assert_eq!(create_test_state.tree().mocks().len(), 1);
        assert_eq!(
            create_test_state.tree().snapshot(),
            workspace.tree.snapshot()
        );
    }

    #[rstest]
    fn handle_initialised_marks_state_as_initialised(mut create_test_state: ServerState) {
        assert!(!create_test_state.is_initialised());

        handle_initialised(&mut create_test_state, InitializedParams {});

        assert!(create_test_state.is_initialised());
    }

    #[rstest]
    fn handle_shutdown_returns_ok(mut create_test_state: ServerState) {
        let result = handle_shutdown(&mut create_test_state);

        assert!(result.is_ok());
        assert!(!create_test_state.supervisor().is_executing());
    }

    #[test]
    fn missing_workspace_yields_an_empty_tree() {
        let tree = build_tree(Path::new("/definitely/not/a/workspace"));
        assert!(tree.is_empty());
    }

    #[test]
    fn extract_workspace_path_from_folders() {
        #[cfg(windows)]
        let test_path = PathBuf::from("C:\\folder\\path");
        #[cfg(not(windows))]
        let test_path = PathBuf::from("/folder/path");

        let folders = vec![lsp_types::WorkspaceFolder {
            uri: Url::from_file_path(&test_path).expect("valid path"),
            name: "folder".to_string(),
        }];

        assert_eq!(extract_workspace_path(&folders, None), Some(test_path));
    }

    #[test]
    fn extract_workspace_path_returns_none_when_empty() {
        assert!(extract_workspace_path(&[], None).is_none());
    }

    #[test]
    fn extract_workspace_path_uses_root_uri_when_no_folders() {
        #[cfg(windows)]
        let test_path = PathBuf::from("C:\\folder\\path");
        #[cfg(not(windows))]
        let test_path = PathBuf::from("/folder/path");

        let root_uri = Url::from_file_path(&test_path).expect("valid path");
        assert_eq!(
            extract_workspace_path(&[], Some(&root_uri)),
            Some(test_path)
        );
    }
}
