//! Feature file discovery and module-root resolution.
//!
//! Feature files are found by walking the workspace. Build output and tool
//! directories are skipped, since Maven and Gradle copy test resources into
//! them and the copies would show up as duplicate tests.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::ServerError;

/// Directory names never descended into.
const SKIPPED_DIRS: [&str; 3] = ["target", "build", "node_modules"];

/// Find all `.feature` files below `workspace_root`, sorted by path.
///
/// Hidden directories and build output directories are skipped. Symbolic
/// links are not followed. Unreadable directories are logged and skipped.
///
/// # Errors
///
/// Returns `ServerError::WorkspaceDiscovery` when `workspace_root` is not a
/// directory.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use karate_ide_server::discovery::find_feature_files;
///
/// let features = find_feature_files(Path::new("/path/to/project"))?;
/// for path in features {
///     println!("Found feature: {}", path.display());
/// }
/// # Ok::<(), karate_ide_server::error::ServerError>(())
/// ```
pub fn find_feature_files(workspace_root: &Path) -> Result<Vec<PathBuf>, ServerError> {
    if !workspace_root.is_dir() {
        return Err(ServerError::WorkspaceDiscovery(format!(
            "{} is not a directory",
            workspace_root.display()
        )));
    }
    let walker = WalkDir::new(workspace_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));

    let mut features = Vec::new();
    for next in walker {
        match next {
            Ok(entry) => {
                if !entry.file_type().is_dir() && is_feature_file(entry.path()) {
                    features.push(entry.into_path());
                }
            }
            Err(err) => log_walk_error(&err),
        }
    }
    features.sort();
    Ok(features)
}

/// Unreadable entries are skipped; symlink loops are expected and silent.
fn log_walk_error(err: &walkdir::Error) {
    if err.loop_ancestor().is_some() {
        return;
    }
    debug!(
        path = ?err.path(),
        error = %err,
        "skipping unreadable entry"
    );
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || SKIPPED_DIRS.contains(&name))
}

/// Whether `path` names a feature file.
#[must_use]
pub fn is_feature_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "feature")
}

/// Find the module a feature file belongs to.
///
/// Walks up from the file's directory towards `workspace_root` and stops at
/// the first directory containing `marker`. Returns that directory and the
/// file's path relative to it. Without a marker, or when no directory up to
/// the workspace root has one, the workspace root is the module root.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use karate_ide_server::discovery::resolve_module_root;
///
/// let (root, file) = resolve_module_root(
///     Path::new("/ws"),
///     Path::new("/ws/api/src/test/users.feature"),
///     None,
/// );
/// assert_eq!(root, Path::new("/ws"));
/// assert_eq!(file, Path::new("api/src/test/users.feature"));
/// ```
#[must_use]
pub fn resolve_module_root(
    workspace_root: &Path,
    file: &Path,
    marker: Option<&str>,
) -> (PathBuf, PathBuf) {
    let module_root = marker
        .and_then(|marker| {
            file.ancestors()
                .skip(1)
                .take_while(|dir| dir.starts_with(workspace_root))
                .find(|dir| dir.join(marker).is_file())
        })
        .unwrap_or(workspace_root);
    let relative = file
        .strip_prefix(module_root)
        .map_or_else(|_| file.to_path_buf(), Path::to_path_buf);
    (module_root.to_path_buf(), relative)
}

#[cfg(test)]
#[expect(
    clippy::expect_used,
    reason = "tests require explicit panic messages for debugging failures"
)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    /// Creates a workspace containing a feature file at `relative`.
    fn create_workspace_with_feature(relative: &str) -> (TempDir, Vec<PathBuf>) {
        let workspace = TempDir::new().expect("failed to create temp dir");
        let path = workspace.path().join(relative);
        fs::create_dir_all(path.parent().expect("feature has a parent"))
            .expect("failed to create feature dir");
        fs::write(&path, "Feature: Test\n").expect("failed to write feature file");

        let features = find_feature_files(workspace.path()).expect("workspace is a directory");
        (workspace, features)
    }

    #[rstest]
    #[case("users.feature")]
    #[case("src/test/java/api/users.feature")]
    fn finds_feature_files_in_various_locations(#[case] relative: &str) {
        let (workspace, features) = create_workspace_with_feature(relative);
        assert_eq!(features, vec![workspace.path().join(relative)]);
    }

    #[rstest]
    #[case("target/test-classes/users.feature")]
    #[case("build/resources/users.feature")]
    #[case("node_modules/pkg/users.feature")]
    #[case(".git/users.feature")]
    #[case("src/users.feature.txt")]
    fn skips_build_output_and_other_files(#[case] relative: &str) {
        let (_workspace, features) = create_workspace_with_feature(relative);
        assert!(features.is_empty());
    }

    #[test]
    fn results_are_sorted() {
        let workspace = TempDir::new().expect("failed to create temp dir");
        for name in ["b.feature", "a/z.feature", "a.feature"] {
            let path = workspace.path().join(name);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(path, "Feature: x\n").expect("write");
        }
        let features = find_feature_files(workspace.path()).expect("discover");
        let names: Vec<PathBuf> = features
            .iter()
            .map(|path| path.strip_prefix(workspace.path()).expect("inside").to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.feature"),
                PathBuf::from("a/z.feature"),
                PathBuf::from("b.feature"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loops_do_not_duplicate_features() {
        let workspace = TempDir::new().expect("failed to create temp dir");
        let dir = workspace.path().join("a");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("x.feature"), "Feature: x\n").expect("write");
        std::os::unix::fs::symlink(workspace.path(), dir.join("loop")).expect("symlink");
        std::os::unix::fs::symlink(workspace.path(), dir.join("loop2")).expect("symlink");

        let features = find_feature_files(workspace.path()).expect("discover");
        assert_eq!(features, vec![dir.join("x.feature")]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let workspace = TempDir::new().expect("failed to create temp dir");
        let err = find_feature_files(&workspace.path().join("missing"))
            .expect_err("missing root should fail");
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn module_root_is_the_nearest_marker_directory() {
        let workspace = TempDir::new().expect("failed to create temp dir");
        let module = workspace.path().join("services/users");
        let feature = module.join("src/test/users.feature");
        fs::create_dir_all(feature.parent().expect("parent")).expect("mkdir");
        fs::write(workspace.path().join("pom.xml"), "").expect("write root pom");
        fs::write(module.join("pom.xml"), "").expect("write module pom");

        let (root, relative) = resolve_module_root(workspace.path(), &feature, Some("pom.xml"));
        assert_eq!(root, module);
        assert_eq!(relative, PathBuf::from("src/test/users.feature"));
    }

    #[test]
    fn module_root_falls_back_to_the_workspace_root() {
        let workspace = TempDir::new().expect("failed to create temp dir");
        let feature = workspace.path().join("api/users.feature");

        let (root, relative) = resolve_module_root(workspace.path(), &feature, Some("pom.xml"));
        assert_eq!(root, workspace.path());
        assert_eq!(relative, PathBuf::from("api/users.feature"));
    }
}
