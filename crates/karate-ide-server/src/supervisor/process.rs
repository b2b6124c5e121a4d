//! Spawning runner processes and pumping their output into a message sink.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::command::shell;
use super::{Mode, SupervisorError};
use crate::protocol::LineFramer;

/// How long to keep draining pipes after the child has gone away.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 8 * 1024;

/// Identifies one spawned process; newer processes get larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u64);

/// Something a runner process (or its trigger) reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// One line of stdout, without its terminator.
    Stdout(String),
    /// One line of stderr, without its terminator.
    Stderr(String),
    /// The process closed; `None` when killed or terminated by a signal.
    Exited(Option<i32>),
    /// The persistent-server HTTP trigger failed.
    TriggerFailed(String),
    /// Text for the output log that is not tied to a live process.
    Notice(String),
}

/// A [`ProcessEvent`] tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessMessage {
    /// Mode the process was started for.
    pub mode: Mode,
    /// The process that produced the event.
    pub id: ProcessId,
    /// What happened.
    pub event: ProcessEvent,
}

/// Destination for process messages.
///
/// Implementations forward messages onto the single loop that owns the
/// supervisor, preserving send order.
pub trait MessageSink: Clone + Send + 'static {
    /// Deliver a message; returns `false` when the receiver is gone.
    fn deliver(&self, message: ProcessMessage) -> bool;
}

impl MessageSink for mpsc::UnboundedSender<ProcessMessage> {
    fn deliver(&self, message: ProcessMessage) -> bool {
        self.send(message).is_ok()
    }
}

/// Spawn `command` through the platform shell in `cwd`.
///
/// Stdout and stderr are framed into lines and delivered in order. Once the
/// process exits (or `cancel` fires and it is killed) the remaining output is
/// drained and a final [`ProcessEvent::Exited`] is delivered.
pub(super) fn spawn<S: MessageSink>(
    sink: &S,
    mode: Mode,
    id: ProcessId,
    cwd: &Path,
    command: &str,
    cancel: CancellationToken,
) -> Result<(), SupervisorError> {
    let mut child = shell(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| SupervisorError::Spawn {
            command: command.to_owned(),
            source,
        })?;
    debug!(?mode, pid = child.id(), cwd = %cwd.display(), "spawned runner");

    let stdout = child
        .stdout
        .take()
        .ok_or(SupervisorError::MissingPipe("stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or(SupervisorError::MissingPipe("stderr"))?;
    let stdout_task = tokio::spawn(pump(stdout, sink.clone(), mode, id, ProcessEvent::Stdout));
    let stderr_task = tokio::spawn(pump(stderr, sink.clone(), mode, id, ProcessEvent::Stderr));

    let sink = sink.clone();
    tokio::spawn(async move {
        let code = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => status.code(),
                Err(err) => {
                    warn!(?mode, error = %err, "failed to wait for runner");
                    None
                }
            },
            () = cancel.cancelled() => {
                debug!(?mode, "killing runner");
                if let Err(err) = child.kill().await {
                    warn!(?mode, error = %err, "failed to kill runner");
                }
                None
            }
        };
        for task in [stdout_task, stderr_task] {
            if tokio::time::timeout(DRAIN_TIMEOUT, task).await.is_err() {
                debug!(?mode, "runner output still open after exit");
            }
        }
        sink.deliver(ProcessMessage {
            mode,
            id,
            event: ProcessEvent::Exited(code),
        });
    });
    Ok(())
}

async fn pump<R, S>(mut reader: R, sink: S, mode: Mode, id: ProcessId, wrap: fn(String) -> ProcessEvent)
where
    R: AsyncRead + Unpin,
    S: MessageSink,
{
    let mut framer = LineFramer::new();
    let mut buf = vec![0_u8; READ_CHUNK];
    loop {
        let read = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) => {
                warn!(?mode, error = %err, "failed to read runner output");
                break;
            }
        };
        for line in framer.push(buf.get(..read).unwrap_or_default()) {
            if !sink.deliver(ProcessMessage {
                mode,
                id,
                event: wrap(line),
            }) {
                return;
            }
        }
    }
    if let Some(tail) = framer.finish() {
        sink.deliver(ProcessMessage {
            mode,
            id,
            event: wrap(tail),
        });
    }
}
