//! Behavioural tests for feature parsing.

use karate_ide_document::{Feature, Scenario, parse, parse_file};
use rstest::rstest;
use tempfile::TempDir;

fn scenario(feature: Option<&Feature>, idx: usize) -> Option<&Scenario> {
    feature.and_then(|f| f.scenarios.get(idx))
}

#[expect(clippy::expect_used, reason = "behavioural tests use explicit panics")]
#[test]
fn parses_tagged_feature_with_single_scenario() {
    let feature = parse("@slow\nFeature: F\n  Scenario: S\n    Given x\n").expect("feature");

    assert_eq!(feature.title, "Feature: F");
    assert_eq!(feature.tags, vec!["@slow".to_string()]);
    assert_eq!(feature.scenarios.len(), 1);
    let scenario = feature.scenarios.first().expect("scenario");
    assert_eq!(scenario.title, "Scenario: S");
    assert_eq!(scenario.line, 3);
    assert!(scenario.tags.is_empty());
    assert!(scenario.examples.is_empty());
    assert!(!scenario.is_outline());
}

#[test]
fn consecutive_tag_lines_concatenate_in_order() {
    let text = concat!(
        "@a @b\n",
        "@c\n",
        "Feature: tags\n",
        "\n",
        "  @first\n",
        "  @second\n",
        "  Scenario Outline: o\n",
        "  Scenario: plain\n",
    );
    let feature = parse(text);

    assert_eq!(
        feature.as_ref().map(|f| f.tags.clone()),
        Some(vec!["@a".into(), "@b".into(), "@c".into()])
    );
    assert_eq!(
        scenario(feature.as_ref(), 0).map(|s| s.tags.clone()),
        Some(vec!["@first".into(), "@second".into()])
    );
    assert_eq!(
        scenario(feature.as_ref(), 1).map(|s| s.tags.is_empty()),
        Some(true)
    );
}

#[rstest]
#[case::header_and_two_rows("| n |\n| 1 |\n| 2 |\n", vec![(5, "| 1 |"), (6, "| 2 |")])]
#[case::scalar_row("| read('data.json') |\n", vec![(4, "| read('data.json') |")])]
#[case::no_rows("\n", vec![])]
fn examples_tables_emit_rows(#[case] table: &str, #[case] expected: Vec<(u32, &str)>) {
    let text = format!("Feature: F\nScenario Outline: O\nExamples:\n{table}");
    let feature = parse(&text);
    let rows: Vec<(u32, String)> = scenario(feature.as_ref(), 0)
        .map(|s| s.examples.iter().map(|e| (e.line, e.title.clone())).collect())
        .unwrap_or_default();
    let expected: Vec<(u32, String)> = expected
        .into_iter()
        .map(|(line, title)| (line, title.to_string()))
        .collect();
    assert_eq!(rows, expected);
}

#[test]
fn example_titles_collapse_whitespace_and_skip_comments() {
    let text = concat!(
        "Feature: F\n",
        "  Scenario Outline: O\n",
        "    Examples:\n",
        "      | name   |  age |\n",
        "      # disabled row\n",
        "\n",
        "      | bob    |   42 |\n",
    );
    let feature = parse(text);
    let titles: Vec<(u32, String)> = scenario(feature.as_ref(), 0)
        .map(|s| s.examples.iter().map(|e| (e.line, e.title.clone())).collect())
        .unwrap_or_default();
    assert_eq!(titles, vec![(7, "| bob | 42 |".to_string())]);
}

#[test]
fn examples_attach_to_most_recent_outline() {
    let text = concat!(
        "Feature: F\n",
        "Scenario Outline: first\n",
        "Examples:\n",
        "| n |\n",
        "| 1 |\n",
        "Scenario Outline: second\n",
        "Scenario Outline: third\n",
        "Examples:\n",
        "| n |\n",
        "| 2 |\n",
        "| 3 |\n",
    );
    let feature = parse(text);
    let counts: Vec<usize> = feature
        .iter()
        .flat_map(|f| &f.scenarios)
        .map(|s| s.examples.len())
        .collect();
    assert_eq!(counts, vec![1, 0, 2]);
}

#[test]
fn examples_after_plain_scenario_attach_to_the_open_outline() {
    let text = concat!(
        "Feature: F\n",
        "Scenario Outline: outline\n",
        "Examples:\n",
        "| n |\n",
        "| 1 |\n",
        "Scenario: plain\n",
        "Examples:\n",
        "| n |\n",
        "| 2 |\n",
    );
    let feature = parse(text);
    let counts: Vec<usize> = feature
        .iter()
        .flat_map(|f| &f.scenarios)
        .map(|s| s.examples.len())
        .collect();
    assert_eq!(counts, vec![2, 0]);
}

#[test]
fn examples_take_tags_pending_at_block_start() {
    let text = concat!(
        "Feature: F\n",
        "Scenario Outline: O\n",
        "  @smoke\n",
        "  Examples:\n",
        "  | n |\n",
        "  | 1 |\n",
        "  @regression\n",
        "  Scenario: next\n",
    );
    let feature = parse(text);

    let example_tags = scenario(feature.as_ref(), 0)
        .and_then(|s| s.examples.first())
        .map(|e| e.tags.clone());
    assert_eq!(example_tags, Some(vec!["@smoke".to_string()]));

    // The tag line after the table belongs to the following scenario only.
    let next_tags = scenario(feature.as_ref(), 1).map(|s| s.tags.clone());
    assert_eq!(next_tags, Some(vec!["@regression".to_string()]));
}

#[test]
fn ignored_scenarios_are_kept_in_the_document() {
    let feature = parse("Feature: F\n@ignore\nScenario: skip me\n");
    assert_eq!(
        scenario(feature.as_ref(), 0).map(|s| s.has_tag("@ignore")),
        Some(true)
    );
}

#[test]
fn reparsing_identical_text_is_structurally_equal() {
    let text = concat!(
        "@mock\n",
        "Feature: F\n",
        "Scenario Outline: O\n",
        "Examples:\n",
        "| a | b |\n",
        "| 1 | 2 |\n",
    );
    assert_eq!(parse(text), parse(text));
}

#[test]
fn crlf_line_endings_are_accepted() {
    let feature = parse("Feature: F\r\n  Scenario: S\r\n");
    assert_eq!(
        scenario(feature.as_ref(), 0).map(|s| (s.title.clone(), s.line)),
        Some(("Scenario: S".to_string(), 2))
    );
}

#[expect(clippy::expect_used, reason = "behavioural tests use explicit panics")]
#[test]
fn parse_file_reads_from_disk_and_reports_missing_files() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("demo.feature");
    std::fs::write(&path, "Feature: on disk\n").expect("write feature file");

    let feature = parse_file(&path).expect("readable file");
    assert_eq!(feature.map(|f| f.title), Some("Feature: on disk".to_string()));

    let missing = parse_file(&dir.path().join("missing.feature"));
    assert!(missing.is_err());
}
