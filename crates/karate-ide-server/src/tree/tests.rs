//! Tests for test tree construction and lookup.

use super::*;
use karate_ide_document::parse;
use rstest::{fixture, rstest};

const OUTLINE: &str = concat!(
    "@smoke\n",
    "Feature: users\n",
    "\n",
    "  Scenario: create\n",
    "    Given url 'x'\n",
    "\n",
    "  @ignore\n",
    "  Scenario: skipped\n",
    "\n",
    "  Scenario Outline: lookup\n",
    "    Examples:\n",
    "      | id |\n",
    "      | 1  |\n",
    "      | 2  |\n",
);

fn ws() -> PathBuf {
    PathBuf::from("/ws")
}

#[fixture]
fn tree() -> TestTree {
    TestTree::from_features(
        ws(),
        [(ws().join("features/api/users.feature"), parse(OUTLINE))],
    )
}

fn ids(tree: &TestTree, parent: &str) -> Vec<String> {
    tree.get(&TestItemId::from(parent))
        .map(|item| item.children.iter().map(|c| c.to_string()).collect())
        .unwrap_or_default()
}

#[rstest]
fn builds_folders_feature_scenarios_and_rows(tree: TestTree) {
    let roots: Vec<&str> = tree.roots().map(|item| item.id.as_str()).collect();
    assert_eq!(roots, vec!["/ws/features"]);
    assert_eq!(ids(&tree, "/ws/features"), vec!["/ws/features/api"]);
    assert_eq!(
        ids(&tree, "/ws/features/api"),
        vec!["/ws/features/api/users.feature"]
    );
    assert_eq!(
        ids(&tree, "/ws/features/api/users.feature"),
        vec![
            "/ws/features/api/users.feature:4",
            "/ws/features/api/users.feature:10",
        ]
    );
    assert_eq!(
        ids(&tree, "/ws/features/api/users.feature:10"),
        vec![
            "/ws/features/api/users.feature:13:| 1 |",
            "/ws/features/api/users.feature:14:| 2 |",
        ]
    );
}

#[rstest]
fn feature_label_is_file_name_and_tags_are_kept(tree: TestTree) {
    let feature = tree.get(&TestItemId::from("/ws/features/api/users.feature"));
    assert_eq!(feature.map(|f| f.label.as_str()), Some("users.feature"));
    assert_eq!(
        feature.map(|f| f.tags.clone()),
        Some(vec!["@smoke".to_string()])
    );
}

#[rstest]
fn ignored_scenarios_are_excluded(tree: TestTree) {
    assert!(tree
        .get(&TestItemId::from("/ws/features/api/users.feature:8"))
        .is_none());
}

#[test]
fn mock_features_go_to_the_mock_list() {
    let tree = TestTree::from_features(
        ws(),
        [(
            ws().join("mocks/users-mock.feature"),
            parse("@mock\nFeature: mock\nScenario: pathMatches('/x')\n"),
        )],
    );
    assert!(tree.is_empty());
    let mocks: Vec<&str> = tree.mocks().iter().map(|m| m.label.as_str()).collect();
    assert_eq!(mocks, vec!["users-mock.feature"]);
}

#[rstest]
#[case::ignored_feature("@ignore\nFeature: F\nScenario: S\n")]
#[case::only_ignored_scenarios("Feature: F\n@ignore\nScenario: S\n")]
#[case::no_scenarios("Feature: F\n")]
fn features_without_runnable_scenarios_are_excluded(#[case] text: &str) {
    let tree = TestTree::from_features(ws(), [(ws().join("a/b.feature"), parse(text))]);
    assert!(tree.is_empty());
    assert_eq!(tree.roots().count(), 0);
}

#[test]
fn folders_sort_before_files_then_by_label() {
    let feature = || parse("Feature: F\nScenario: S\n");
    let tree = TestTree::from_features(
        ws(),
        [
            (ws().join("z.feature"), feature()),
            (ws().join("b/x.feature"), feature()),
            (ws().join("a.feature"), feature()),
            (ws().join("a/x.feature"), feature()),
        ],
    );
    let roots: Vec<&str> = tree.roots().map(|item| item.label.as_str()).collect();
    assert_eq!(roots, vec!["a", "b", "a.feature", "z.feature"]);
}

#[rstest]
fn replacing_a_feature_updates_it_in_place(mut tree: TestTree) {
    let path = ws().join("features/api/users.feature");
    tree.replace_feature(&path, parse("Feature: users\n\n\nScenario: moved\n").as_ref());

    assert_eq!(
        ids(&tree, "/ws/features/api/users.feature"),
        vec!["/ws/features/api/users.feature:4"]
    );
    assert!(tree
        .get(&TestItemId::from("/ws/features/api/users.feature:10"))
        .is_none());
    assert!(tree
        .resolve(&ws(), "features/api/users.feature:13")
        .is_none());
}

#[rstest]
fn removing_the_last_feature_prunes_empty_folders(mut tree: TestTree) {
    assert!(tree.remove_feature(&ws().join("features/api/users.feature")));
    assert!(tree.is_empty());
    assert_eq!(tree.roots().count(), 0);
    assert!(!tree.remove_feature(&ws().join("features/api/users.feature")));
}

#[rstest]
#[case::feature_hint_with_line_one("features/api/users.feature:1", Some("/ws/features/api/users.feature"))]
#[case::scenario("features/api/users.feature:4", Some("/ws/features/api/users.feature:4"))]
#[case::dotted("./features/api/../api/users.feature:10", Some("/ws/features/api/users.feature:10"))]
#[case::example_row("features/api/users.feature:13", Some("/ws/features/api/users.feature:13:| 1 |"))]
#[case::untracked_line("features/api/users.feature:5", None)]
#[case::other_file("features/nope.feature", None)]
fn resolve_maps_location_hints(
    tree: TestTree,
    #[case] hint: &str,
    #[case] expected: Option<&str>,
) {
    assert_eq!(
        tree.resolve(&ws(), hint).map(TestItemId::as_str),
        expected
    );
}

#[rstest]
fn descendants_walk_parents_before_children(tree: TestTree) {
    let all = tree.descendants(&TestItemId::from("/ws/features/api/users.feature:10"));
    let all: Vec<&str> = all.iter().map(TestItemId::as_str).collect();
    assert_eq!(
        all,
        vec![
            "/ws/features/api/users.feature:10",
            "/ws/features/api/users.feature:13:| 1 |",
            "/ws/features/api/users.feature:14:| 2 |",
        ]
    );
}

#[rstest]
fn launch_target_joins_paths_with_semicolons(tree: TestTree) {
    let target = tree.launch_target(&[
        TestItemId::from("/ws/features/api/users.feature"),
        TestItemId::from("/ws/features/api/users.feature:13:| 1 |"),
        TestItemId::from("/ws/missing.feature"),
    ]);
    assert_eq!(
        target,
        "/ws/features/api/users.feature;/ws/features/api/users.feature:13"
    );
}

#[rstest]
fn snapshot_marks_example_rows_terminal(tree: TestTree) {
    let snapshot = tree.snapshot();
    let row = snapshot
        .tests
        .first()
        .and_then(|f| f.children.as_ref()?.first())
        .and_then(|api| api.children.as_ref()?.first())
        .and_then(|feature| feature.children.as_ref()?.get(1))
        .and_then(|outline| outline.children.as_ref()?.first());
    assert_eq!(row.map(|r| r.kind), Some(TestItemKind::Example));
    assert_eq!(row.and_then(|r| r.children.as_ref()), None);
}
