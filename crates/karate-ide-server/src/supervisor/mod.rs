//! Runner process supervision.
//!
//! The [`Supervisor`] owns the per-mode process handles, the `executing` flag
//! and the [`TestRun`] of the current session. It never blocks: processes
//! report through a [`MessageSink`], and the owner feeds each
//! [`ProcessMessage`] back through [`Supervisor::handle_message`] on the same
//! loop that handles client requests. That keeps every state change on one
//! task and every stdout line in emission order.
//!
//! Only one run executes at a time. A request while busy is answered with
//! [`ExecuteOutcome::Busy`] and no process is spawned.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::{
    EventKind, ExecutionEvent, OutputLine, classify_output, feature_name, readiness_port,
};
use crate::run::{ItemState, RunUpdate, Summary, TestRun};
use crate::tree::TestTree;

mod command;
mod observer;
mod process;
mod trigger;

pub use command::{CRASH_SIGNATURE, KARATE_MAIN, TEST_SERVER_MAIN, prepare_command, trigger_path};
pub use observer::RunObserver;
pub use process::{MessageSink, ProcessEvent, ProcessId, ProcessMessage};
pub use trigger::trigger_run;

/// Delay before the classpath remediation note is written.
const REMEDIATION_DELAY: Duration = Duration::from_millis(100);

const REMEDIATION_NOTE: &str = "\nNOTE: the runner could not load com.intuit.karate.Main, so the \
configured Karate classpath is probably wrong.\nCheck the classpath used by the run command and \
try again.\n";

/// Errors raised while starting or triggering a runner.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The shell could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// The command line.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A piped stream was not available on the child.
    #[error("runner process has no {0} pipe")]
    MissingPipe(&'static str),

    /// The test server could not be reached.
    #[error("failed to reach Karate test server: {0}")]
    Trigger(#[from] reqwest::Error),

    /// The test server answered with a non-2xx status.
    #[error("Karate test server returned {status}\n {body}")]
    TriggerStatus {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// Whether a run executes normally or under a debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// Plain execution, optionally through a persistent test server.
    Run,
    /// Execution under the Karate debug server.
    Debug,
}

/// Result of asking the supervisor to start a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// The run was handed to a process.
    Started,
    /// Another run is executing; nothing was started.
    Busy {
        /// Mode of the run that is executing.
        running: Mode,
    },
}

/// Settings that decide how runner processes are started and reused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Route runs through a persistent test server.
    pub use_test_server: bool,
    /// Environment label; a change forces a fresh process.
    pub karate_env: String,
}

/// A live runner process for one mode.
#[derive(Debug)]
struct ProcessHandle {
    id: ProcessId,
    cwd: PathBuf,
    env: String,
    command: String,
    port: Option<u16>,
    cancel: CancellationToken,
}

impl ProcessHandle {
    fn reusable_for(&self, cwd: &Path, env: &str) -> Option<u16> {
        (self.cwd == cwd && self.env == env).then_some(self.port).flatten()
    }
}

/// Owner of runner processes and the current run session.
#[derive(Debug)]
pub struct Supervisor<S> {
    sink: S,
    settings: SupervisorSettings,
    http: reqwest::Client,
    handles: HashMap<Mode, ProcessHandle>,
    next_id: u64,
    active: Option<Mode>,
    executing: watch::Sender<bool>,
    run: Option<TestRun>,
}

impl<S: MessageSink> Supervisor<S> {
    /// Create a supervisor that reports process output to `sink`.
    #[must_use]
    pub fn new(sink: S, settings: SupervisorSettings) -> Self {
        let (executing, _) = watch::channel(false);
        Self {
            sink,
            settings,
            http: reqwest::Client::new(),
            handles: HashMap::new(),
            next_id: 0,
            active: None,
            executing,
            run: None,
        }
    }

    /// Current process settings.
    #[must_use]
    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Replace the process settings; live processes are reused or replaced on
    /// the next run.
    #[cfg(test)]
    pub(crate) fn set_settings(&mut self, settings: SupervisorSettings) {
        self.settings = settings;
    }

    /// Whether a run is executing.
    #[must_use]
    pub fn is_executing(&self) -> bool {
        *self.executing.borrow()
    }

    /// The run session, if one has been started.
    #[must_use]
    pub fn run(&self) -> Option<&TestRun> {
        self.run.as_ref()
    }

    /// The live process for `mode`, if any.
    #[must_use]
    pub fn process_id(&self, mode: Mode) -> Option<ProcessId> {
        self.handles.get(&mode).map(|handle| handle.id)
    }

    /// Resolves once no run is executing.
    ///
    /// The returned future does not borrow the supervisor.
    pub fn wait_idle(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut executing = self.executing.subscribe();
        async move {
            if executing.wait_for(|busy| !*busy).await.is_err() {
                debug!("supervisor dropped while waiting for idle");
            }
        }
    }

    /// Start a normal run, through the persistent test server when enabled.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Spawn`] when a fresh process cannot be
    /// started. The session is not left executing in that case.
    pub fn execute_in_test_server(
        &mut self,
        cwd: &Path,
        command: &str,
        run: TestRun,
        observer: &mut impl RunObserver,
    ) -> Result<ExecuteOutcome, SupervisorError> {
        self.execute(Mode::Run, cwd, command, run, observer)
    }

    /// Start a debug run; the observer hears about the debug port.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::execute_in_test_server`].
    pub fn execute_in_debug_server(
        &mut self,
        cwd: &Path,
        command: &str,
        run: TestRun,
        observer: &mut impl RunObserver,
    ) -> Result<ExecuteOutcome, SupervisorError> {
        self.execute(Mode::Debug, cwd, command, run, observer)
    }

    /// Start a run in `mode`.
    ///
    /// A live process for the mode is reused when it has the same working
    /// directory and environment label and is already listening on a port;
    /// otherwise it is killed and a new one is spawned.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::execute_in_test_server`].
    pub fn execute(
        &mut self,
        mode: Mode,
        cwd: &Path,
        command: &str,
        run: TestRun,
        observer: &mut impl RunObserver,
    ) -> Result<ExecuteOutcome, SupervisorError> {
        if let Some(running) = self.active.filter(|_| self.is_executing()) {
            info!(?mode, ?running, "run requested while busy");
            return Ok(ExecuteOutcome::Busy { running });
        }
        let command = prepare_command(command, self.settings.use_test_server, mode == Mode::Debug);

        observer.output(&format!(
            "cwd: {}\nExecuting: {command}\n\n",
            cwd.display()
        ));
        for update in run.updates() {
            observer.item_updated(&update);
        }
        observer.summary_changed(run.summary());
        self.run = Some(run);
        self.active = Some(mode);
        self.executing.send_replace(true);

        let env = self.settings.karate_env.clone();
        let reused = self.handles.get_mut(&mode).and_then(|handle| {
            let port = handle.reusable_for(cwd, &env)?;
            handle.command.clone_from(&command);
            Some((handle.id, port))
        });
        if let Some((id, port)) = reused {
            debug!(?mode, ?id, port, "reusing runner process");
            self.port_ready(mode, id, port, &command, observer);
            return Ok(ExecuteOutcome::Started);
        }

        self.kill(mode);
        self.next_id += 1;
        let id = ProcessId(self.next_id);
        let cancel = CancellationToken::new();
        if let Err(err) = process::spawn(&self.sink, mode, id, cwd, &command, cancel.clone()) {
            self.executing.send_replace(false);
            self.active = None;
            if let Some(run) = self.run.take() {
                for queued in run.updates() {
                    observer.item_updated(&RunUpdate {
                        id: queued.id,
                        state: ItemState::NotRun,
                    });
                }
            }
            observer.summary_changed(Summary::default());
            return Err(err);
        }
        info!(?mode, ?id, cwd = %cwd.display(), "started runner");
        self.handles.insert(
            mode,
            ProcessHandle {
                id,
                cwd: cwd.to_path_buf(),
                env,
                command,
                port: None,
                cancel,
            },
        );
        Ok(ExecuteOutcome::Started)
    }

    /// Process one message from a runner or trigger.
    ///
    /// Messages from a process that is no longer the mode's current handle
    /// are dropped.
    pub fn handle_message(
        &mut self,
        message: ProcessMessage,
        tree: &TestTree,
        observer: &mut impl RunObserver,
    ) {
        let ProcessMessage { mode, id, event } = message;
        if let ProcessEvent::Notice(text) = event {
            observer.output(&text);
            return;
        }
        if self.process_id(mode) != Some(id) {
            debug!(?mode, ?id, "dropping message from stale process");
            return;
        }
        match event {
            ProcessEvent::Stdout(line) => self.on_stdout(mode, id, &line, tree, observer),
            ProcessEvent::Stderr(line) => self.on_stderr(mode, id, &line, tree, observer),
            ProcessEvent::Exited(code) => {
                info!(?mode, ?id, ?code, "runner exited");
                self.handles.remove(&mode);
                if self.active != Some(mode) {
                    // An idle persistent server of the other mode.
                    return;
                }
                observer.output(".\n");
                self.finish_run(tree, observer);
                self.executing.send_replace(false);
            }
            ProcessEvent::TriggerFailed(message) => {
                warn!(?mode, %message, "test server trigger failed");
                observer.show_error(&message);
                self.finish_run(tree, observer);
                self.executing.send_replace(false);
            }
            ProcessEvent::Notice(_) => {}
        }
    }

    /// Kill every runner and close the session.
    ///
    /// Safe to call when nothing is running.
    pub fn stop_test_processes(&mut self, tree: &TestTree, observer: &mut impl RunObserver) {
        let was_executing = self.is_executing();
        for mode in [Mode::Run, Mode::Debug] {
            self.kill(mode);
        }
        self.unwind(was_executing, tree, observer);
    }

    /// Cancel the executing run of `mode` after a busy prompt.
    pub fn cancel_busy(&mut self, mode: Mode, tree: &TestTree, observer: &mut impl RunObserver) {
        if !self.is_executing() {
            return;
        }
        self.kill(mode);
        self.unwind(true, tree, observer);
    }

    fn unwind(&mut self, was_executing: bool, tree: &TestTree, observer: &mut impl RunObserver) {
        self.finish_run(tree, observer);
        self.executing.send_replace(false);
        if was_executing {
            observer.output("[Canceled]\n");
        }
        observer.summary_changed(Summary::default());
    }

    fn kill(&mut self, mode: Mode) {
        if let Some(handle) = self.handles.remove(&mode) {
            debug!(?mode, id = ?handle.id, "cancelling runner");
            handle.cancel.cancel();
        }
    }

    fn on_stdout(
        &mut self,
        mode: Mode,
        id: ProcessId,
        line: &str,
        tree: &TestTree,
        observer: &mut impl RunObserver,
    ) {
        if let Some(port) = readiness_port(line) {
            let command = self.handles.get_mut(&mode).and_then(|handle| {
                handle.port.is_none().then(|| {
                    handle.port = Some(port);
                    handle.command.clone()
                })
            });
            if let Some(command) = command {
                info!(?mode, port, "runner listening");
                self.port_ready(mode, id, port, &command, observer);
            }
        }

        match classify_output(line) {
            OutputLine::Event(mut event) => {
                event.cwd = self.handles.get(&mode).map(|handle| handle.cwd.clone());
                self.dispatch(&event, tree, observer);
            }
            OutputLine::Raw(text) => {
                if self.is_executing() {
                    observer.output(&format!("{text}\n"));
                }
            }
            OutputLine::Malformed(err) => {
                warn!(?mode, error = %err, %line, "malformed runner event");
            }
        }
    }

    fn on_stderr(
        &mut self,
        mode: Mode,
        id: ProcessId,
        line: &str,
        tree: &TestTree,
        observer: &mut impl RunObserver,
    ) {
        observer.output(&format!("{line}\n"));
        if !line.contains(CRASH_SIGNATURE) {
            return;
        }
        warn!(?mode, ?id, "runner classpath is misconfigured");
        self.executing.send_replace(false);
        self.finish_run(tree, observer);
        self.kill(mode);

        let sink = self.sink.clone();
        tokio::spawn(async move {
            tokio::time::sleep(REMEDIATION_DELAY).await;
            sink.deliver(ProcessMessage {
                mode,
                id,
                event: ProcessEvent::Notice(REMEDIATION_NOTE.to_owned()),
            });
        });
    }

    fn port_ready(
        &self,
        mode: Mode,
        id: ProcessId,
        port: u16,
        command: &str,
        observer: &mut impl RunObserver,
    ) {
        match mode {
            Mode::Debug => observer.debug_server_ready(port),
            Mode::Run => {
                let Some(path) = trigger_path(command).map(str::to_owned) else {
                    debug!(port, "runner is not a test server; nothing to trigger");
                    return;
                };
                let client = self.http.clone();
                let sink = self.sink.clone();
                tokio::spawn(async move {
                    if let Err(err) = trigger_run(&client, port, &path).await {
                        sink.deliver(ProcessMessage {
                            mode,
                            id,
                            event: ProcessEvent::TriggerFailed(err.to_string()),
                        });
                    }
                });
            }
        }
    }

    /// Apply `event` to the session and report what changed.
    fn dispatch(&mut self, event: &ExecutionEvent, tree: &TestTree, observer: &mut impl RunObserver) {
        let feature = feature_name(&event.location_hint);
        let name = event.name.as_deref().unwrap_or_default();
        match event.event {
            EventKind::FeatureStarted => observer.progress(name),
            EventKind::TestStarted => observer.progress(&format!("{feature} {name}")),
            EventKind::TestOutlineStarted => observer.progress(&format!("{feature} / {name}")),
            _ => {}
        }

        let Some(run) = self.run.as_mut() else {
            debug!(event = ?event.event, "event outside a run session");
            return;
        };
        if run.is_finished() {
            return;
        }
        for update in run.apply(event, tree) {
            observer.item_updated(&update);
        }
        match event.event {
            EventKind::TestFinished | EventKind::TestFailed => observer.summary_changed(run.summary()),
            EventKind::TestSuiteFinished => {
                observer.summary_changed(run.summary());
                self.executing.send_replace(false);
            }
            _ => {}
        }
    }

    /// Close the session with a synthetic `testSuiteFinished` if still open.
    fn finish_run(&mut self, tree: &TestTree, observer: &mut impl RunObserver) {
        if self.run.as_ref().is_some_and(|run| !run.is_finished()) {
            debug!("synthesising testSuiteFinished");
            self.dispatch(&ExecutionEvent::suite_finished(), tree, observer);
        }
    }
}
