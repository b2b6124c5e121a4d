//! Callbacks through which the supervisor reports a run.

use crate::run::{RunUpdate, Summary};

/// Receives everything a run produces that the user should see.
///
/// The language server forwards these as notifications; tests record them.
pub trait RunObserver {
    /// A test item changed state.
    fn item_updated(&mut self, update: &RunUpdate);

    /// The session counters changed.
    fn summary_changed(&mut self, summary: Summary);

    /// Text for the run's output log. Line terminators are included.
    fn output(&mut self, text: &str);

    /// A short progress message naming what is executing.
    fn progress(&mut self, message: &str);

    /// An error the user should be told about.
    fn show_error(&mut self, message: &str);

    /// A debug server is listening on `port`.
    fn debug_server_ready(&mut self, port: u16);
}
