//! Per-run test item state, driven by execution events.
//!
//! A [`TestRun`] is created when the client asks for a run: every requested
//! item and its descendants are queued up front. Events from the runner then
//! move items through `running` into `passed` or `failed`, and the run keeps
//! the session summary shown in the client status bar.
//!
//! Events must be applied in emission order. Outline aggregation relies on
//! `testOutlineStarted` resetting the outline's failure list before its rows
//! report in.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::protocol::{EventKind, ExecutionEvent};
use crate::tree::{TestItemId, TestTree};

/// Where a test item is in its run lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ItemState {
    /// Not part of the current run.
    NotRun,
    /// Requested, waiting for the runner to reach it.
    Queued,
    /// The runner reported that it started.
    Running,
    /// Finished successfully.
    Passed {
        /// Elapsed milliseconds, when the runner reported them.
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    /// Finished with at least one failure.
    Failed {
        /// Failure messages as `"<message>: <details>"`.
        messages: Vec<String>,
    },
}

impl ItemState {
    /// Whether the item has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed { .. } | Self::Failed { .. })
    }
}

/// Session counters for the run in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Whether a run session is still open.
    pub running: bool,
    /// Scenarios reported as passed.
    pub passed: u32,
    /// Scenarios or rows reported as failed.
    pub failed: u32,
}

impl Summary {
    /// The summary published when a run starts.
    #[must_use]
    pub fn started() -> Self {
        Self {
            running: true,
            ..Self::default()
        }
    }
}

/// A single item transition produced by a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunUpdate {
    /// The item that changed.
    pub id: TestItemId,
    /// Its new state.
    #[serde(flatten)]
    pub state: ItemState,
}

/// State of one test run session.
#[derive(Debug, Default)]
pub struct TestRun {
    states: HashMap<TestItemId, ItemState>,
    summary: Summary,
    feature_failures: Vec<String>,
    outline_failures: Vec<String>,
    finished: bool,
}

impl TestRun {
    /// Open a run for `include`, queueing each item and all its descendants.
    ///
    /// Identifiers missing from `tree` are skipped.
    #[must_use]
    pub fn new(include: &[TestItemId], tree: &TestTree) -> Self {
        let states = include
            .iter()
            .flat_map(|id| tree.descendants(id))
            .map(|id| (id, ItemState::Queued))
            .collect();
        Self {
            states,
            summary: Summary::started(),
            ..Self::default()
        }
    }

    /// Every tracked item and its current state.
    #[must_use]
    pub fn updates(&self) -> Vec<RunUpdate> {
        let mut updates: Vec<RunUpdate> = self
            .states
            .iter()
            .map(|(id, state)| RunUpdate {
                id: id.clone(),
                state: state.clone(),
            })
            .collect();
        updates.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        updates
    }

    /// Current state of `id`; untracked items are [`ItemState::NotRun`].
    #[must_use]
    pub fn state(&self, id: &TestItemId) -> ItemState {
        self.states.get(id).cloned().unwrap_or(ItemState::NotRun)
    }

    /// The session counters.
    #[must_use]
    pub fn summary(&self) -> Summary {
        self.summary
    }

    /// Whether `testSuiteFinished` has been applied.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Failures recorded since the last `featureStarted`.
    #[must_use]
    pub fn feature_failures(&self) -> &[String] {
        &self.feature_failures
    }

    /// Apply one event and return the item transitions it caused.
    ///
    /// Events whose location does not resolve to a tree item still update
    /// counters and failure lists; only the item transition is skipped.
    pub fn apply(&mut self, event: &ExecutionEvent, tree: &TestTree) -> Vec<RunUpdate> {
        if self.finished {
            debug!(event = ?event.event, "ignoring event after run finished");
            return Vec::new();
        }

        let state = match event.event {
            EventKind::FeatureStarted => {
                self.feature_failures.clear();
                None
            }
            EventKind::TestOutlineStarted => {
                self.outline_failures.clear();
                Some(ItemState::Running)
            }
            EventKind::TestStarted => Some(ItemState::Running),
            EventKind::TestFinished => {
                self.summary.passed += 1;
                Some(ItemState::Passed {
                    duration: event.duration,
                })
            }
            EventKind::TestFailed => {
                let message = event.failure_message();
                self.feature_failures.push(message.clone());
                self.outline_failures.push(message.clone());
                self.summary.failed += 1;
                Some(ItemState::Failed {
                    messages: vec![message],
                })
            }
            EventKind::TestOutlineFinished => Some(if self.outline_failures.is_empty() {
                ItemState::Passed {
                    duration: event.duration,
                }
            } else {
                ItemState::Failed {
                    messages: self.outline_failures.clone(),
                }
            }),
            EventKind::TestSuiteFinished => {
                self.finished = true;
                self.summary.running = false;
                None
            }
            EventKind::TestSuiteStarted | EventKind::FeatureFinished | EventKind::Unknown => None,
        };

        let Some(state) = state else {
            return Vec::new();
        };
        let cwd = event.cwd.as_deref().unwrap_or_else(|| tree.root());
        let Some(id) = tree.resolve(cwd, &event.location_hint) else {
            debug!(hint = %event.location_hint, "no test item for location");
            return Vec::new();
        };
        self.states.insert(id.clone(), state.clone());
        vec![RunUpdate {
            id: id.clone(),
            state,
        }]
    }
}
