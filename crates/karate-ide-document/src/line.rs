//! Line classification for feature documents.
//!
//! Each source line maps to exactly one [`LineKind`]. Classification looks at
//! the trimmed line only, so indentation never matters.

/// The shape of a single feature-file line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// A line starting with `@`; holds the `@`-prefixed tokens in order.
    Tags(Vec<&'a str>),
    /// A `Feature:` header.
    Feature,
    /// A plain `Scenario:` header.
    Scenario,
    /// A `Scenario Outline:` header.
    ScenarioOutline,
    /// An `Examples:` header.
    Examples,
    /// A `|`-prefixed table row.
    TableRow,
    /// An empty or whitespace-only line.
    Blank,
    /// A `#`-prefixed comment.
    Comment,
    /// Anything else (steps, doc strings, descriptions).
    Other,
}

/// Classify `line`, ignoring leading and trailing whitespace.
///
/// # Examples
///
/// ```
/// use karate_ide_document::{LineKind, classify};
///
/// assert_eq!(classify("  @smoke @slow"), LineKind::Tags(vec!["@smoke", "@slow"]));
/// assert_eq!(classify("Scenario Outline: many"), LineKind::ScenarioOutline);
/// assert_eq!(classify("    | a | b |"), LineKind::TableRow);
/// ```
#[must_use]
pub fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        LineKind::Blank
    } else if trimmed.starts_with('@') {
        LineKind::Tags(
            trimmed
                .split_whitespace()
                .filter(|token| token.starts_with('@'))
                .collect(),
        )
    } else if trimmed.starts_with("Feature:") {
        LineKind::Feature
    } else if trimmed.starts_with("Scenario Outline:") {
        LineKind::ScenarioOutline
    } else if trimmed.starts_with("Scenario:") {
        LineKind::Scenario
    } else if trimmed.starts_with("Examples:") {
        LineKind::Examples
    } else if trimmed.starts_with('|') {
        LineKind::TableRow
    } else if trimmed.starts_with('#') {
        LineKind::Comment
    } else {
        LineKind::Other
    }
}

impl LineKind<'_> {
    /// Whether the line may appear inside an `Examples:` block without
    /// ending it.
    #[must_use]
    pub fn continues_examples(&self) -> bool {
        matches!(self, Self::TableRow | Self::Blank | Self::Comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Feature: checkout", LineKind::Feature)]
    #[case("   Scenario: pay", LineKind::Scenario)]
    #[case("Scenario Outline: pay <n>", LineKind::ScenarioOutline)]
    #[case("\tExamples:", LineKind::Examples)]
    #[case("| a |", LineKind::TableRow)]
    #[case("# note", LineKind::Comment)]
    #[case("   ", LineKind::Blank)]
    #[case("Given url 'x'", LineKind::Other)]
    #[case("Background:", LineKind::Other)]
    fn classifies_header_lines(#[case] line: &str, #[case] expected: LineKind<'static>) {
        assert_eq!(classify(line), expected);
    }

    #[test]
    fn tag_lines_keep_only_tag_tokens() {
        assert_eq!(
            classify("@a   @b # trailing"),
            LineKind::Tags(vec!["@a", "@b"])
        );
    }

    #[test]
    fn scenario_keyword_is_case_sensitive() {
        assert_eq!(classify("scenario: lower"), LineKind::Other);
    }

    #[test]
    fn only_rows_blanks_and_comments_continue_examples() {
        assert!(classify("| x |").continues_examples());
        assert!(classify("").continues_examples());
        assert!(classify("# c").continues_examples());
        assert!(!classify("@tag").continues_examples());
        assert!(!classify("Examples:").continues_examples());
    }
}
