//! Workspace discovery and file scanning.
//!
//! This module locates Karate feature files in a workspace and maps a file
//! to the module directory its runner command must execute in.

mod workspace;

pub use workspace::{find_feature_files, is_feature_file, resolve_module_root};
