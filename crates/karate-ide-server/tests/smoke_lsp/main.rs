//! End-to-end smoke tests for the `karate-ide-lsp` binary.
//!
//! These tests start the language server as a child process, send JSON-RPC
//! messages over stdin/stdout, and verify responses and notifications. They
//! validate the full stack: CLI argument parsing, server startup, workspace
//! discovery, runner execution through the shell, and graceful shutdown.

#![cfg(unix)]

mod wire;

use std::io::BufReader;
use std::path::Path;
use std::process::{Child, ChildStdin};

use serde_json::{Value, json};
use tempfile::TempDir;

use wire::{
    MessageReceiver, initialize, is_notification, notify, request, shutdown_and_exit,
    spawn_server,
};

const USERS: &str = "Feature: Users\n  Scenario: get user\n    * print 1\n";

/// Runner stand-in: prints the events of one passing scenario.
const PASSING_RUN: &str = concat!(
    "printf '%s\\n' ",
    r#"'##vscode {"event":"testSuiteStarted","locationHint":""}' "#,
    r#"'##vscode {"event":"featureStarted","locationHint":"users.feature","name":"Users"}' "#,
    r#"'##vscode {"event":"testStarted","locationHint":"users.feature:2","name":"get user"}' "#,
    "'plain output' ",
    r#"'##vscode {"event":"testFinished","locationHint":"users.feature:2","duration":12}' "#,
    r#"'##vscode {"event":"testSuiteFinished","locationHint":""}' "#,
    "# ${feature}",
);

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Write `users.feature` into `dir`.
#[expect(
    clippy::expect_used,
    reason = "file-write failures are test-fatal I/O errors"
)]
fn create_feature(dir: &TempDir) {
    std::fs::write(dir.path().join("users.feature"), USERS).expect("write feature");
}

/// Spawn the LSP server, perform the initialize handshake, and return the
/// child process, its stdin handle, the message receiver and the first
/// published tree.
#[expect(
    clippy::expect_used,
    reason = "server setup failures are test-fatal environment errors"
)]
fn setup_server(root: &Path) -> (Child, ChildStdin, MessageReceiver, Value) {
    let root_uri = lsp_types::Url::from_directory_path(root).expect("dir URI");
    let mut child = spawn_server(&[]);
    let mut stdin = child.stdin.take().expect("stdin");
    let stdout = child.stdout.take().expect("stdout");
    let receiver = MessageReceiver::spawn(BufReader::new(stdout));

    initialize(&mut stdin, &receiver, root_uri.as_str());
    let tree = receiver
        .recv_notification_matching(|msg| is_notification(msg, "karate/testTree"), 10)
        .expect("tree published after initialized");

    (child, stdin, receiver, tree)
}

fn feature_uri(root: &Path) -> String {
    lsp_types::Url::from_file_path(root.join("users.feature"))
        .map(|uri| uri.to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Smoke tests
// ---------------------------------------------------------------------------

#[test]
#[expect(
    clippy::expect_used,
    clippy::indexing_slicing,
    reason = "test assertions use .expect() and indexing for clear failure messages"
)]
fn smoke_initialize_and_shutdown() {
    let dir = TempDir::new().expect("temp dir");
    let root_uri = lsp_types::Url::from_directory_path(dir.path()).expect("dir URI");

    let mut child = spawn_server(&[]);
    let mut stdin = child.stdin.take().expect("stdin");
    let stdout = child.stdout.take().expect("stdout");
    let receiver = MessageReceiver::spawn(BufReader::new(stdout));

    let response = initialize(&mut stdin, &receiver, root_uri.as_str());

    assert_eq!(response["result"]["serverInfo"]["name"], "karate-ide-lsp");
    assert_eq!(
        response["result"]["capabilities"]["textDocumentSync"]["change"],
        1,
        "server should request full document sync"
    );

    shutdown_and_exit(&mut stdin, &receiver, &mut child, 2);
}

#[test]
#[expect(
    clippy::expect_used,
    clippy::indexing_slicing,
    reason = "test assertions use .expect() and indexing for clear failure messages"
)]
fn smoke_publishes_and_serves_the_test_tree() {
    let dir = TempDir::new().expect("temp dir");
    create_feature(&dir);
    let (mut child, mut stdin, receiver, published) = setup_server(dir.path());

    let tests = &published["params"]["tests"];
    assert_eq!(tests[0]["label"], "users.feature");
    assert_eq!(tests[0]["kind"], "feature");
    assert_eq!(tests[0]["children"][0]["label"], "Scenario: get user");
    assert_eq!(tests[0]["children"][0]["line"], 2);

    request(&mut stdin, 2, "karate/testTree", Value::Null);
    let (response, _) = receiver.recv_response_for_id(2, 10);
    assert_eq!(response["result"], published["params"]);

    shutdown_and_exit(&mut stdin, &receiver, &mut child, 3);
}

#[test]
#[expect(
    clippy::expect_used,
    clippy::indexing_slicing,
    reason = "test assertions use .expect() and indexing for clear failure messages"
)]
fn smoke_run_reports_results() {
    let dir = TempDir::new().expect("temp dir");
    create_feature(&dir);
    let (mut child, mut stdin, receiver, published) = setup_server(dir.path());
    let scenario_id = published["params"]["tests"][0]["children"][0]["id"].clone();

    request(
        &mut stdin,
        2,
        "karate/runTests",
        json!({
            "mode": "run",
            "cwd": dir.path(),
            "command": PASSING_RUN,
            "include": [scenario_id],
        }),
    );
    let (response, _) = receiver.recv_response_for_id(2, 20);
    assert_eq!(response["result"]["status"], "started");

    let passed = receiver
        .recv_notification_matching(
            |msg| {
                is_notification(msg, "karate/testState")
                    && msg["params"]["id"] == scenario_id
                    && msg["params"]["state"] == "passed"
            },
            30,
        )
        .expect("scenario reported as passed");
    assert_eq!(passed["params"]["duration"], 12.0);

    let summary = receiver
        .recv_notification_matching(
            |msg| {
                is_notification(msg, "karate/runSummary") && msg["params"]["running"] == false
            },
            30,
        )
        .expect("closing run summary");
    assert_eq!(summary["params"]["passed"], 1);
    assert_eq!(summary["params"]["failed"], 0);

    shutdown_and_exit(&mut stdin, &receiver, &mut child, 3);
}

#[test]
#[expect(
    clippy::expect_used,
    clippy::indexing_slicing,
    reason = "test assertions use .expect() and indexing for clear failure messages"
)]
fn smoke_edits_republish_the_tree() {
    let dir = TempDir::new().expect("temp dir");
    create_feature(&dir);
    let (mut child, mut stdin, receiver, _) = setup_server(dir.path());

    notify(
        &mut stdin,
        "textDocument/didChange",
        json!({
            "textDocument": { "uri": feature_uri(dir.path()), "version": 2 },
            "contentChanges": [
                { "text": "Feature: Users\n  Scenario: get user\n  Scenario: delete user\n" }
            ],
        }),
    );

    let republished = receiver
        .recv_notification_matching(|msg| is_notification(msg, "karate/testTree"), 10)
        .expect("tree republished after edit");
    let scenarios = republished["params"]["tests"][0]["children"]
        .as_array()
        .expect("scenario list");
    assert_eq!(scenarios.len(), 2);
    assert_eq!(scenarios[1]["label"], "Scenario: delete user");

    shutdown_and_exit(&mut stdin, &receiver, &mut child, 2);
}
