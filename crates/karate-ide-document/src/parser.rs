//! Single-pass feature parser.

use std::iter::Peekable;
use std::path::Path;

use crate::errors::DocumentError;
use crate::line::{LineKind, classify};
use crate::model::{Example, Feature, Scenario};

/// A collected `Examples:` table row: trimmed text and 1-based line.
type Row<'a> = (&'a str, u32);

#[derive(Debug, Default)]
struct DocumentBuilder {
    feature: Option<Feature>,
    /// Index into `feature.scenarios` of the outline receiving examples.
    outline: Option<usize>,
    pending_tags: Vec<String>,
}

impl DocumentBuilder {
    fn take_tags(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_tags)
    }

    fn start_feature(&mut self, line: &str) {
        let tags = self.take_tags();
        self.feature = Some(Feature {
            tags,
            title: line.trim().to_owned(),
            scenarios: Vec::new(),
        });
        // Scenario indices belong to the replaced feature.
        self.outline = None;
    }

    fn start_scenario(&mut self, line: &str, number: u32, outline: bool) {
        let tags = self.take_tags();
        let Some(feature) = self.feature.as_mut() else {
            // A scenario before any `Feature:` line has nowhere to live.
            return;
        };
        feature
            .scenarios
            .push(Scenario::new(line.trim(), number, tags, outline));
        if outline {
            self.outline = Some(feature.scenarios.len().saturating_sub(1));
        }
    }

    fn attach_examples(&mut self, tags: &[String], rows: &[Row<'_>]) {
        // Header plus data rows, or a single scalar row.
        let data = match rows.split_first() {
            Some((_, rest)) if !rest.is_empty() => rest,
            _ => rows,
        };
        let Some(outline) = self
            .outline
            .and_then(|idx| self.feature.as_mut()?.scenarios.get_mut(idx))
        else {
            return;
        };
        outline
            .examples
            .extend(data.iter().map(|&(text, line)| Example {
                tags: tags.to_vec(),
                title: collapse_whitespace(text),
                line,
            }));
    }
}

/// Parse feature text into a [`Feature`].
///
/// Returns `None` when the text never declares a `Feature:`. Parsing is
/// otherwise total: unrecognised lines are skipped.
///
/// Tags accumulate across consecutive `@` lines and are consumed by the next
/// `Feature:`, `Scenario:`/`Scenario Outline:`, or `Examples:` block. Rows of
/// an `Examples:` table attach to the most recent `Scenario Outline:`, even
/// when plain `Scenario:` blocks sit between them.
///
/// # Examples
///
/// ```
/// use karate_ide_document::parse;
///
/// let text = "Feature: F\nScenario Outline: O\nExamples:\n| n |\n| 1 |\n| 2 |\n";
/// let feature = parse(text);
/// let rows: Vec<_> = feature
///     .iter()
///     .flat_map(|f| &f.scenarios)
///     .flat_map(|s| &s.examples)
///     .map(|e| e.line)
///     .collect();
/// assert_eq!(rows, vec![5, 6]);
/// ```
#[must_use]
pub fn parse(text: &str) -> Option<Feature> {
    let mut builder = DocumentBuilder::default();
    let mut lines = text.lines().zip(1_u32..).peekable();

    while let Some((line, number)) = lines.next() {
        match classify(line) {
            LineKind::Tags(tags) => builder
                .pending_tags
                .extend(tags.into_iter().map(str::to_owned)),
            LineKind::Feature => builder.start_feature(line),
            LineKind::Scenario => builder.start_scenario(line, number, false),
            LineKind::ScenarioOutline => builder.start_scenario(line, number, true),
            LineKind::Examples => {
                let rows = collect_rows(&mut lines);
                // Tags stay pending for the whole block and are dropped once it
                // ends, so a tag line after the table belongs to what follows.
                let tags = builder.take_tags();
                builder.attach_examples(&tags, &rows);
            }
            LineKind::TableRow | LineKind::Blank | LineKind::Comment | LineKind::Other => {}
        }
    }

    builder.feature
}

/// Read and parse a feature file from disk.
///
/// # Errors
///
/// Returns [`DocumentError::Read`] when the file cannot be read.
pub fn parse_file(path: &Path) -> Result<Option<Feature>, DocumentError> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse(&text))
}

/// Consume the body of an `Examples:` block.
///
/// Stops before the first line that is not a row, blank, or comment so the
/// caller processes that line normally.
fn collect_rows<'a, I>(lines: &mut Peekable<I>) -> Vec<Row<'a>>
where
    I: Iterator<Item = Row<'a>>,
{
    let mut rows = Vec::new();
    while let Some(&(line, number)) = lines.peek() {
        let kind = classify(line);
        if !kind.continues_examples() {
            break;
        }
        if kind == LineKind::TableRow {
            rows.push((line.trim(), number));
        }
        lines.next();
    }
    rows
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
