//! Core language server state and service construction.
//!
//! This module defines the central state shared across all LSP handlers: the
//! test tree of the workspace, the process supervisor and the socket used to
//! notify the client. Everything here is owned by the main loop; background
//! work reports back through [`ClientSocket::emit`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_lsp::ClientSocket;
use lsp_types::notification::ShowMessage;
use lsp_types::{
    MessageType, SaveOptions, ServerCapabilities, ShowMessageParams, TextDocumentSyncCapability,
    TextDocumentSyncKind, TextDocumentSyncOptions, TextDocumentSyncSaveOptions, WorkspaceFolder,
};
use tracing::warn;

use crate::config::ServerConfig;
use crate::lsp_ext::{
    DebugServerReady, DebugServerReadyParams, RunOutput, RunOutputParams, RunProgress,
    RunProgressParams, RunSummary, TestStateChanged, TestTreeChanged,
};
use crate::run::{RunUpdate, Summary};
use crate::supervisor::{MessageSink, ProcessMessage, RunObserver, Supervisor, SupervisorSettings};
use crate::tree::TestTree;

/// An edit waiting for the debounce interval to pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingEdit {
    /// Bumped on every change; only the latest generation is re-parsed.
    pub(crate) generation: u64,
    /// Full document text as of that change.
    pub(crate) text: String,
}

/// Central state shared across all LSP handlers.
///
/// The router owns one instance and hands it to each handler by mutable
/// reference, so handlers never race each other.
pub struct ServerState {
    /// Socket for notifications and requests to the client.
    pub(crate) client: ClientSocket,
    /// Configuration loaded from environment and command line.
    pub(crate) config: ServerConfig,
    /// Workspace folders from the client.
    pub(crate) workspace_folders: Vec<WorkspaceFolder>,
    /// Whether the server has been initialised.
    pub(crate) initialised: bool,
    /// Executable tests and mocks of the workspace.
    pub(crate) tree: TestTree,
    /// Runner processes and the current run.
    pub(crate) supervisor: Supervisor<ClientSocket>,
    /// Unsaved edits by file, keyed for debouncing.
    pub(crate) pending_edits: HashMap<PathBuf, PendingEdit>,
}

impl fmt::Debug for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("workspace_root", &self.tree.root())
            .field("initialised", &self.initialised)
            .field("tests", &self.tree.len())
            .field("executing", &self.supervisor.is_executing())
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// Create a new server state with the given configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_lsp::ClientSocket;
    /// use karate_ide_server::config::ServerConfig;
    /// use karate_ide_server::server::ServerState;
    ///
    /// let state = ServerState::new(ServerConfig::default(), ClientSocket::new_closed());
    /// assert!(!state.is_initialised());
    /// ```
    #[must_use]
    pub fn new(config: ServerConfig, client: ClientSocket) -> Self {
        let supervisor = Supervisor::new(client.clone(), supervisor_settings(&config));
        Self {
            client,
            config,
            workspace_folders: Vec::new(),
            initialised: false,
            tree: TestTree::default(),
            supervisor,
            pending_edits: HashMap::new(),
        }
    }

    /// Access the current server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Access the workspace folders provided by the client.
    #[must_use]
    pub fn workspace_folders(&self) -> &[WorkspaceFolder] {
        &self.workspace_folders
    }

    /// Root directory of the workspace the tree was built from.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        self.tree.root()
    }

    /// The current test tree.
    #[must_use]
    pub fn tree(&self) -> &TestTree {
        &self.tree
    }

    /// The process supervisor.
    #[must_use]
    pub fn supervisor(&self) -> &Supervisor<ClientSocket> {
        &self.supervisor
    }

    /// Mark the server as initialised.
    pub fn mark_initialised(&mut self) {
        self.initialised = true;
    }

    /// Check if the server is initialised.
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Send the whole test tree to the client.
    pub fn publish_tree(&self) {
        if let Err(err) = self.client.notify::<TestTreeChanged>(self.tree.snapshot()) {
            warn!(error = %err, "failed to publish test tree");
        }
    }
}

/// Derive supervisor settings from the server configuration.
#[must_use]
pub fn supervisor_settings(config: &ServerConfig) -> SupervisorSettings {
    SupervisorSettings {
        use_test_server: config.use_test_server,
        karate_env: config.karate_env.clone(),
    }
}

/// Build the server capabilities to advertise to the client.
///
/// Feature files are synchronised in full so edits can be re-parsed without
/// keeping a rope; saves include the text.
#[must_use]
pub fn build_server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::FULL),
                save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                    include_text: Some(true),
                })),
                ..TextDocumentSyncOptions::default()
            },
        )),
        ..ServerCapabilities::default()
    }
}

impl MessageSink for ClientSocket {
    fn deliver(&self, message: ProcessMessage) -> bool {
        self.emit(message).is_ok()
    }
}

/// Forwards run reports to the client as notifications.
#[derive(Debug)]
pub struct ClientObserver<'a> {
    client: &'a ClientSocket,
}

impl<'a> ClientObserver<'a> {
    /// Observe on behalf of `client`.
    #[must_use]
    pub fn new(client: &'a ClientSocket) -> Self {
        Self { client }
    }

    fn notify<N: lsp_types::notification::Notification>(&self, params: N::Params) {
        if let Err(err) = self.client.notify::<N>(params) {
            warn!(method = N::METHOD, error = %err, "failed to notify client");
        }
    }
}

impl RunObserver for ClientObserver<'_> {
    fn item_updated(&mut self, update: &RunUpdate) {
        self.notify::<TestStateChanged>(update.clone());
    }

    fn summary_changed(&mut self, summary: Summary) {
        self.notify::<RunSummary>(summary);
    }

    fn output(&mut self, text: &str) {
        self.notify::<RunOutput>(RunOutputParams {
            text: text.to_owned(),
        });
    }

    fn progress(&mut self, message: &str) {
        self.notify::<RunProgress>(RunProgressParams {
            message: message.to_owned(),
        });
    }

    fn show_error(&mut self, message: &str) {
        self.notify::<ShowMessage>(ShowMessageParams {
            typ: MessageType::ERROR,
            message: message.to_owned(),
        });
    }

    fn debug_server_ready(&mut self, port: u16) {
        self.notify::<DebugServerReady>(DebugServerReadyParams { port });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn state() -> ServerState {
        ServerState::new(ServerConfig::default(), ClientSocket::new_closed())
    }

    #[rstest]
    fn new_state_is_not_initialised(state: ServerState) {
        assert!(!state.is_initialised());
        assert!(state.workspace_folders().is_empty());
        assert!(state.tree().is_empty());
        assert!(!state.supervisor().is_executing());
    }

    #[rstest]
    fn mark_initialised_sets_flag(mut state: ServerState) {
        state.mark_initialised();
        assert!(state.is_initialised());
    }

    #[test]
    fn supervisor_settings_follow_config() {
        let config = ServerConfig {
            karate_env: "qa".to_owned(),
            ..ServerConfig::default()
        }
        .with_test_server(true);
        let settings = supervisor_settings(&config);
        assert!(settings.use_test_server);
        assert_eq!(settings.karate_env, "qa");
    }

    #[test]
    fn capabilities_request_full_sync_with_saved_text() {
        let capabilities = build_server_capabilities();
        let Some(TextDocumentSyncCapability::Options(sync)) = capabilities.text_document_sync
        else {
            panic!("expected sync options");
        };
        assert_eq!(sync.change, Some(TextDocumentSyncKind::FULL));
        assert_eq!(
            sync.save,
            Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                include_text: Some(true),
            }))
        );
    }

    #[test]
    fn closed_socket_refuses_messages() {
        use crate::supervisor::{Mode, ProcessEvent, ProcessId};

        let delivered = ClientSocket::new_closed().deliver(ProcessMessage {
            mode: Mode::Run,
            id: ProcessId(1),
            event: ProcessEvent::Exited(Some(0)),
        });
        assert!(!delivered);
    }
}
