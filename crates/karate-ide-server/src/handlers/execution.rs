//! Test execution handlers.
//!
//! `karate/runTests` turns a selection of tree items into a runner command
//! and hands it to the supervisor. Runner output re-enters the main loop as
//! [`ProcessMessage`] events, so every state change happens here, in order.

use std::collections::HashMap;
use std::path::PathBuf;

use async_lsp::{ClientSocket, ResponseError};
use lsp_types::request::ShowMessageRequest;
use lsp_types::{MessageActionItem, MessageType, ShowMessageRequestParams};
use tracing::{debug, info, warn};

use crate::discovery::resolve_module_root;
use crate::lsp_ext::{FEATURE_PLACEHOLDER, RunStatus, RunTestsParams, RunTestsResult};
use crate::run::TestRun;
use crate::server::{ClientObserver, ServerState};
use crate::supervisor::{ExecuteOutcome, Mode, ProcessMessage, RunObserver};
use crate::tree::{TestItemId, TreeSnapshot};

const BUSY_MESSAGE: &str = "Karate is already running";
const CANCEL_ACTION: &str = "Cancel";

/// Router event: the user chose to cancel the run that made a request busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelBusy {
    /// Mode of the executing run.
    pub mode: Mode,
}

/// Handle the `karate/runTests` request.
///
/// `${feature}` in the command is replaced by the launch paths of the
/// selected items. Without an explicit working directory the run starts in
/// the module root of the first selected item.
///
/// # Errors
///
/// Never fails at the protocol level; a runner that cannot be started is
/// reported to the user and answered with [`RunStatus::Failed`].
pub fn handle_run_tests(
    state: &mut ServerState,
    params: RunTestsParams,
) -> Result<RunTestsResult, ResponseError> {
    let RunTestsParams {
        mode,
        cwd,
        command,
        include,
    } = params;
    let cwd = cwd.unwrap_or_else(|| default_cwd(state, &include));
    let command = command.replace(FEATURE_PLACEHOLDER, &state.tree.launch_target(&include));
    let run = TestRun::new(&include, &state.tree);

    let mut observer = ClientObserver::new(&state.client);
    let status = match state
        .supervisor
        .execute(mode, &cwd, &command, run, &mut observer)
    {
        Ok(ExecuteOutcome::Started) => RunStatus::Started,
        Ok(ExecuteOutcome::Busy { running }) => {
            prompt_cancel(state.client.clone(), running);
            RunStatus::Busy
        }
        Err(err) => {
            warn!(error = %err, "failed to start runner");
            observer.show_error(&err.to_string());
            RunStatus::Failed
        }
    };
    Ok(RunTestsResult { status })
}

/// Handle the `karate/cancel` request: stop every runner.
///
/// # Errors
///
/// Currently always returns `Ok(())`.
pub fn handle_cancel(state: &mut ServerState) -> Result<(), ResponseError> {
    info!("cancel requested");
    let mut observer = ClientObserver::new(&state.client);
    state
        .supervisor
        .stop_test_processes(&state.tree, &mut observer);
    Ok(())
}

/// Handle the `karate/testTree` request.
///
/// # Errors
///
/// Currently always returns the tree.
pub fn handle_test_tree(state: &mut ServerState) -> Result<TreeSnapshot, ResponseError> {
    Ok(state.tree.snapshot())
}

/// Feed one runner message into the supervisor.
pub fn handle_process_message(state: &mut ServerState, message: ProcessMessage) {
    let mut observer = ClientObserver::new(&state.client);
    state
        .supervisor
        .handle_message(message, &state.tree, &mut observer);
}

/// Cancel the run the user chose to stop from the busy prompt.
pub fn handle_cancel_busy(state: &mut ServerState, event: CancelBusy) {
    info!(mode = ?event.mode, "cancelling busy run");
    let mut observer = ClientObserver::new(&state.client);
    state
        .supervisor
        .cancel_busy(event.mode, &state.tree, &mut observer);
}

fn default_cwd(state: &ServerState, include: &[TestItemId]) -> PathBuf {
    let root = state.tree.root();
    include
        .first()
        .and_then(|id| state.tree.get(id))
        .map_or_else(
            || root.to_path_buf(),
            |item| {
                resolve_module_root(root, &item.path, state.config.root_module_marker.as_deref()).0
            },
        )
}

/// Ask whether to cancel the executing run; a `Cancel` answer comes back as
/// a [`CancelBusy`] event.
fn prompt_cancel(client: ClientSocket, running: Mode) {
    tokio::spawn(async move {
        let params = ShowMessageRequestParams {
            typ: MessageType::INFO,
            message: BUSY_MESSAGE.to_owned(),
            actions: Some(vec![MessageActionItem {
                title: CANCEL_ACTION.to_owned(),
                properties: HashMap::new(),
            }]),
        };
        match client.request::<ShowMessageRequest>(params).await {
            Ok(Some(action)) if action.title == CANCEL_ACTION => {
                if client.emit(CancelBusy { mode: running }).is_err() {
                    debug!("main loop gone before cancelling busy run");
                }
            }
            Ok(_) => debug!("busy prompt dismissed"),
            Err(err) => warn!(error = %err, "busy prompt failed"),
        }
    });
}

#[cfg(all(test, unix))]
#[expect(
    clippy::expect_used,
    reason = "tests require explicit panic messages for debugging failures"
)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::run::ItemState;
    use crate::test_support::{TestWorkspace, WorkspaceBuilder};
    use rstest::{fixture, rstest};

    const ORDERS: &str = "Feature: Orders\n  Scenario: list\n    * print 1\n";

    struct Session {
        workspace: TestWorkspace,
        state: ServerState,
    }

    #[fixture]
    fn session() -> Session {
        let workspace = WorkspaceBuilder::new()
            .with_feature("api/src/test/orders.feature", ORDERS)
            .build();
        std::fs::write(workspace.path("api/pom.xml"), "").expect("write pom");
        let config = ServerConfig {
            root_module_marker: Some("pom.xml".to_owned()),
            ..ServerConfig::default()
        };
        let mut state = ServerState::new(config, ClientSocket::new_closed());
        state.tree = workspace.tree.clone();
        Session { workspace, state }
    }

    fn scenario(session: &Session) -> TestItemId {
        TestItemId::for_scenario(&session.workspace.path("api/src/test/orders.feature"), 2)
    }

    fn params(include: Vec<TestItemId>) -> RunTestsParams {
        RunTestsParams {
            mode: Mode::Run,
            cwd: None,
            command: "sleep 30 # ${feature}".to_owned(),
            include,
        }
    }

    #[rstest]
    fn default_cwd_is_the_module_root(session: Session) {
        let include = vec![scenario(&session)];
        assert_eq!(
            default_cwd(&session.state, &include),
            session.workspace.path("api")
        );
        assert_eq!(
            default_cwd(&session.state, &[]),
            session.workspace.root().to_path_buf()
        );
    }

    #[rstest]
    #[tokio::test]
    async fn run_queues_selection_and_reports_busy(mut session: Session) {
        let id = scenario(&session);
        let first = handle_run_tests(&mut session.state, params(vec![id.clone()]))
            .expect("run request");
        assert_eq!(first.status, RunStatus::Started);
        assert!(session.state.supervisor().is_executing());
        assert_eq!(
            session.state.supervisor().run().map(|run| run.state(&id)),
            Some(ItemState::Queued)
        );

        let second =
            handle_run_tests(&mut session.state, params(vec![id])).expect("second request");
        assert_eq!(second.status, RunStatus::Busy);

        handle_cancel_busy(&mut session.state, CancelBusy { mode: Mode::Run });
        assert!(!session.state.supervisor().is_executing());
        assert!(session.state.supervisor().process_id(Mode::Run).is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn cancel_stops_every_runner(mut session: Session) {
        let id = scenario(&session);
        handle_run_tests(&mut session.state, params(vec![id])).expect("run request");

        handle_cancel(&mut session.state).expect("cancel");

        assert!(!session.state.supervisor().is_executing());
        assert!(
            session
                .state
                .supervisor()
                .run()
                .is_some_and(TestRun::is_finished)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn unstartable_runner_is_reported_as_failed(mut session: Session) {
        let mut request = params(vec![scenario(&session)]);
        request.cwd = Some(session.workspace.path("missing"));

        let result = handle_run_tests(&mut session.state, request).expect("run request");

        assert_eq!(result.status, RunStatus::Failed);
        assert!(!session.state.supervisor().is_executing());
    }

    #[rstest]
    fn test_tree_returns_the_snapshot(mut session: Session) {
        let snapshot = handle_test_tree(&mut session.state).expect("tree");
        assert_eq!(snapshot, session.workspace.tree.snapshot());
    }
}
