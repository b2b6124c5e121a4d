//! Custom LSP requests and notifications spoken with the test explorer.
//!
//! All methods live under the `karate/` prefix. Requests are sent by the
//! client; notifications flow from the server to the client.

use std::path::PathBuf;

use lsp_types::notification::Notification;
use lsp_types::request::Request;
use serde::{Deserialize, Serialize};

use crate::run::{RunUpdate, Summary};
use crate::supervisor::Mode;
use crate::tree::{TestItemId, TreeSnapshot};

/// Placeholder in a run command replaced by the selected launch paths.
pub const FEATURE_PLACEHOLDER: &str = "${feature}";

/// Start a run of the selected items.
#[derive(Debug)]
pub enum RunTests {}

impl Request for RunTests {
    type Params = RunTestsParams;
    type Result = RunTestsResult;
    const METHOD: &'static str = "karate/runTests";
}

/// Parameters of `karate/runTests`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTestsParams {
    /// Run or debug.
    pub mode: Mode,
    /// Working directory; defaults to the module root of the first item.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Shell command that starts the runner. `${feature}` is replaced by the
    /// launch paths of `include`.
    pub command: String,
    /// Items to run.
    #[serde(default)]
    pub include: Vec<TestItemId>,
}

/// Whether `karate/runTests` started anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// A runner process is executing the request.
    Started,
    /// Another run is executing; the user was asked whether to cancel it.
    Busy,
    /// The runner could not be started; the user was shown why.
    Failed,
}

/// Result of `karate/runTests`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTestsResult {
    /// Outcome of the request.
    pub status: RunStatus,
}

/// Stop every runner process.
#[derive(Debug)]
pub enum CancelRun {}

impl Request for CancelRun {
    type Params = ();
    type Result = ();
    const METHOD: &'static str = "karate/cancel";
}

/// Fetch the current test tree.
#[derive(Debug)]
pub enum GetTestTree {}

impl Request for GetTestTree {
    type Params = ();
    type Result = TreeSnapshot;
    const METHOD: &'static str = "karate/testTree";
}

/// The test tree changed.
#[derive(Debug)]
pub enum TestTreeChanged {}

impl Notification for TestTreeChanged {
    type Params = TreeSnapshot;
    const METHOD: &'static str = "karate/testTree";
}

/// A test item changed state.
#[derive(Debug)]
pub enum TestStateChanged {}

impl Notification for TestStateChanged {
    type Params = RunUpdate;
    const METHOD: &'static str = "karate/testState";
}

/// The session summary changed.
#[derive(Debug)]
pub enum RunSummary {}

impl Notification for RunSummary {
    type Params = Summary;
    const METHOD: &'static str = "karate/runSummary";
}

/// Text for the run output log.
#[derive(Debug)]
pub enum RunOutput {}

impl Notification for RunOutput {
    type Params = RunOutputParams;
    const METHOD: &'static str = "karate/output";
}

/// Parameters of `karate/output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutputParams {
    /// Text to append, terminators included.
    pub text: String,
}

/// Progress of the executing run.
#[derive(Debug)]
pub enum RunProgress {}

impl Notification for RunProgress {
    type Params = RunProgressParams;
    const METHOD: &'static str = "karate/progress";
}

/// Parameters of `karate/progress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgressParams {
    /// What is executing.
    pub message: String,
}

/// A debug server is ready for the debug adapter to attach.
#[derive(Debug)]
pub enum DebugServerReady {}

impl Notification for DebugServerReady {
    type Params = DebugServerReadyParams;
    const METHOD: &'static str = "karate/debugServerReady";
}

/// Parameters of `karate/debugServerReady`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugServerReadyParams {
    /// Port the debug server listens on.
    pub port: u16,
}
