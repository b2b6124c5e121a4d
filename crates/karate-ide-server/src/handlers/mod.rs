//! LSP request, notification and event handlers.
//!
//! Handlers take the [`ServerState`](crate::server::ServerState) by mutable
//! reference from the router. Lifecycle handlers build the test tree, text
//! document handlers keep it current, and execution handlers drive runs.

mod execution;
mod lifecycle;
mod text_document;
pub mod util;

pub use execution::{
    CancelBusy, handle_cancel, handle_cancel_busy, handle_process_message, handle_run_tests,
    handle_test_tree,
};
pub use lifecycle::{SERVER_NAME, handle_initialise, handle_initialised, handle_shutdown};
pub use text_document::{
    ReparseFeature, handle_did_change_text_document, handle_did_change_watched_files,
    handle_did_close_text_document, handle_did_save_text_document, handle_reparse_feature,
};
