//! Helpers shared by the handlers.

use std::path::{Path, PathBuf};

use karate_ide_document::{DocumentError, Feature, parse, parse_file};
use lsp_types::Url;

/// Convert a URL to a file system path.
///
/// Only handles `file://` URLs; returns `None` for other schemes.
#[must_use]
pub fn url_to_path(url: &Url) -> Option<PathBuf> {
    url.to_file_path().ok()
}

/// Parse a feature from text the client sent, or from disk without it.
///
/// # Errors
///
/// Returns `DocumentError::Read` when the file has to be read and cannot be.
pub fn load_feature(path: &Path, text: Option<&str>) -> Result<Option<Feature>, DocumentError> {
    text.map_or_else(|| parse_file(path), |source| Ok(parse(source)))
}

#[cfg(test)]
#[expect(
    clippy::expect_used,
    reason = "tests require explicit panic messages for debugging failures"
)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tempfile::TempDir;

    #[test]
    fn url_to_path_handles_file_url() {
        #[cfg(windows)]
        let test_path = PathBuf::from("C:\\test\\path");
        #[cfg(not(windows))]
        let test_path = PathBuf::from("/test/path");

        let url = Url::from_file_path(&test_path).expect("valid path");
        assert_eq!(url_to_path(&url), Some(test_path));
    }

    #[test]
    fn url_to_path_returns_none_for_non_file_url() {
        let url = Url::from_str("https://example.com/path").expect("valid URL");
        assert!(url_to_path(&url).is_none());
    }

    #[test]
    fn load_feature_prefers_supplied_text() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("missing.feature");
        let feature = load_feature(&path, Some("Feature: Orders\n  Scenario: list\n"))
            .expect("text needs no read");
        assert_eq!(feature.map(|f| f.title), Some("Feature: Orders".to_owned()));
    }

    #[test]
    fn load_feature_reads_from_disk() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("users.feature");
        assert!(load_feature(&path, None).is_err());

        std::fs::write(&path, "Feature: Users\n  Scenario: get\n").expect("write");
        let feature = load_feature(&path, None).expect("readable");
        assert_eq!(feature.map(|f| f.title), Some("Feature: Users".to_owned()));
    }
}
