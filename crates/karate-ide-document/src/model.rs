//! Structured document produced by the parser.
//!
//! A document is rebuilt from scratch on every parse; nothing here is mutated
//! incrementally once returned.

/// A parsed `Feature:` block and the scenarios it contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feature {
    /// Tags declared on the lines preceding the `Feature:` line.
    pub tags: Vec<String>,
    /// The trimmed header line, keyword included (for example `Feature: F`).
    pub title: String,
    /// Scenarios in source order.
    pub scenarios: Vec<Scenario>,
}

/// A `Scenario:` or `Scenario Outline:` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scenario {
    /// Tags declared on the lines preceding the scenario header.
    pub tags: Vec<String>,
    /// The trimmed header line, keyword included.
    pub title: String,
    /// 1-based line of the scenario header.
    pub line: u32,
    /// Example rows; only ever populated for outlines.
    pub examples: Vec<Example>,
    outline: bool,
}

/// A single row of an `Examples:` table attached to an outline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Example {
    /// Tags pending when the enclosing `Examples:` block started.
    pub tags: Vec<String>,
    /// The row text with whitespace runs collapsed to a single space.
    pub title: String,
    /// 1-based line of the row.
    pub line: u32,
}

impl Feature {
    /// Return `true` when the feature carries `tag` (including the `@`).
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl Scenario {
    /// Create a scenario from its header line.
    #[must_use]
    pub fn new(title: impl Into<String>, line: u32, tags: Vec<String>, outline: bool) -> Self {
        Self {
            tags,
            title: title.into(),
            line,
            examples: Vec::new(),
            outline,
        }
    }

    /// Whether the header used the `Scenario Outline:` keyword.
    #[must_use]
    pub fn is_outline(&self) -> bool {
        self.outline
    }

    /// Return `true` when the scenario carries `tag` (including the `@`).
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl Example {
    /// Return `true` when the example carries `tag` (including the `@`).
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
