//! Test item tree derived from parsed feature documents.
//!
//! The tree mirrors the workspace layout: folders, then feature files, then
//! scenarios, then example rows of outlines. It is the model the test explorer
//! renders and the lookup table the run-state machine uses to map
//! `locationHint`s back onto items.
//!
//! Filtering happens here rather than in the parser:
//!
//! - scenarios tagged `@ignore` are left out;
//! - features tagged `@ignore`, or with no remaining scenarios, are left out;
//! - features tagged `@mock` go to a separate mock list and never run as
//!   tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use karate_ide_document::Feature;
use serde::{Deserialize, Serialize};

mod id;

pub use id::{TestItemId, normalise_path};

const IGNORE_TAG: &str = "@ignore";
const MOCK_TAG: &str = "@mock";

/// The role a node plays in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestItemKind {
    /// A directory containing features.
    Folder,
    /// A `.feature` file.
    Feature,
    /// A scenario or scenario outline.
    Scenario,
    /// One example row of an outline.
    Example,
    /// A feature tagged `@mock`, listed apart from executable tests.
    Mock,
}

/// A node of the test tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestItem {
    /// Identity key.
    pub id: TestItemId,
    /// Display label: file or folder name, scenario header, or row text.
    pub label: String,
    /// Node role.
    pub kind: TestItemKind,
    /// File or folder the node lives in.
    pub path: PathBuf,
    /// 1-based source line for scenarios and example rows.
    pub line: Option<u32>,
    /// Tags declared on the node.
    pub tags: Vec<String>,
    /// Child keys in display order.
    pub children: Vec<TestItemId>,
    /// Parent key; `None` for top-level nodes.
    pub parent: Option<TestItemId>,
    launch_path: String,
}

impl TestItem {
    fn new(id: TestItemId, label: String, kind: TestItemKind, path: &Path) -> Self {
        Self {
            launch_path: path.display().to_string(),
            id,
            label,
            kind,
            path: path.to_path_buf(),
            line: None,
            tags: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    fn at_line(mut self, line: u32) -> Self {
        self.launch_path = format!("{}:{line}", self.path.display());
        self.line = Some(line);
        self
    }

    fn with_tags(mut self, tags: &[String]) -> Self {
        self.tags = tags.to_vec();
        self
    }

    /// Path handed to the runner to execute this node alone.
    #[must_use]
    pub fn launch_path(&self) -> &str {
        &self.launch_path
    }
}

/// Serialisable view of a subtree, as sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Identity key.
    pub id: TestItemId,
    /// Display label.
    pub label: String,
    /// Node role.
    pub kind: TestItemKind,
    /// File or folder the node lives in.
    pub path: PathBuf,
    /// 1-based source line, when the node has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Declared tags.
    pub tags: Vec<String>,
    /// Children; `None` for terminal example rows.
    pub children: Option<Vec<TreeNode>>,
}

/// Serialisable view of the whole tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    /// Executable tests.
    pub tests: Vec<TreeNode>,
    /// Mock definitions.
    pub mocks: Vec<TreeNode>,
}

/// The materialised test tree and its lookup tables.
#[derive(Debug, Clone, Default)]
pub struct TestTree {
    root: PathBuf,
    items: HashMap<TestItemId, TestItem>,
    roots: Vec<TestItemId>,
    mocks: Vec<TestItem>,
    /// Example rows keyed by their launch path, for hints naming a row line.
    rows: HashMap<String, TestItemId>,
}

impl TestTree {
    /// Create an empty tree rooted at the workspace directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Build a tree from parsed features keyed by absolute path.
    ///
    /// Unparseable files (`None`) are skipped.
    #[must_use]
    pub fn from_features<I>(root: impl Into<PathBuf>, features: I) -> Self
    where
        I: IntoIterator<Item = (PathBuf, Option<Feature>)>,
    {
        let mut tree = Self::new(root);
        for (path, feature) in features {
            tree.replace_feature(&path, feature.as_ref());
        }
        tree
    }

    /// Workspace directory the folder hierarchy is relative to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Replace everything derived from the feature at `path`.
    ///
    /// Existing items for the file are dropped first; `None` (an unreadable
    /// file) leaves the file out of the tree.
    pub fn replace_feature(&mut self, path: &Path, feature: Option<&Feature>) {
        self.remove_feature(path);
        let Some(feature) = feature else {
            return;
        };
        let feature_id = TestItemId::for_path(path);
        let label = file_label(path);

        if feature.has_tag(MOCK_TAG) {
            let mock = TestItem::new(feature_id, label, TestItemKind::Mock, path)
                .with_tags(&feature.tags);
            self.mocks.push(mock);
            self.mocks.sort_by(|a, b| a.label.cmp(&b.label));
            return;
        }
        if feature.has_tag(IGNORE_TAG) {
            return;
        }

        let mut subtree = Vec::new();
        let mut scenario_ids = Vec::new();
        for scenario in feature
            .scenarios
            .iter()
            .filter(|scenario| !scenario.has_tag(IGNORE_TAG))
        {
            let scenario_id = TestItemId::for_scenario(path, scenario.line);
            let mut item = TestItem::new(
                scenario_id.clone(),
                scenario.title.clone(),
                TestItemKind::Scenario,
                path,
            )
            .at_line(scenario.line)
            .with_tags(&scenario.tags);
            item.parent = Some(feature_id.clone());

            for example in &scenario.examples {
                let example_id = TestItemId::for_example(path, example.line, &example.title);
                let mut row = TestItem::new(
                    example_id.clone(),
                    example.title.clone(),
                    TestItemKind::Example,
                    path,
                )
                .at_line(example.line)
                .with_tags(&example.tags);
                row.parent = Some(scenario_id.clone());
                item.children.push(example_id);
                subtree.push(row);
            }
            scenario_ids.push(scenario_id);
            subtree.push(item);
        }
        if scenario_ids.is_empty() {
            return;
        }

        let parent = path.parent().and_then(|dir| self.ensure_folders(dir));
        let mut item = TestItem::new(feature_id.clone(), label, TestItemKind::Feature, path)
            .with_tags(&feature.tags);
        item.children = scenario_ids;
        item.parent.clone_from(&parent);

        for node in subtree {
            if node.kind == TestItemKind::Example {
                self.rows.insert(node.launch_path.clone(), node.id.clone());
            }
            self.items.insert(node.id.clone(), node);
        }
        self.items.insert(feature_id.clone(), item);
        self.link(parent.as_ref(), feature_id);
    }

    /// Remove the feature at `path` and prune folders left empty.
    ///
    /// Returns `true` when anything was removed.
    pub fn remove_feature(&mut self, path: &Path) -> bool {
        let feature_id = TestItemId::for_path(path);
        let mocks_before = self.mocks.len();
        self.mocks.retain(|mock| mock.id != feature_id);
        let removed_mock = self.mocks.len() != mocks_before;

        if !self
            .items
            .get(&feature_id)
            .is_some_and(|item| item.kind == TestItemKind::Feature)
        {
            return removed_mock;
        }
        for id in self.descendants(&feature_id) {
            if let Some(item) = self.items.remove(&id) {
                if item.kind == TestItemKind::Example {
                    self.rows.remove(&item.launch_path);
                }
                if id == feature_id {
                    self.unlink_and_prune(item.parent, &id);
                }
            }
        }
        true
    }

    /// Look up an item by key.
    #[must_use]
    pub fn get(&self, id: &TestItemId) -> Option<&TestItem> {
        self.items.get(id)
    }

    /// Top-level items in display order.
    pub fn roots(&self) -> impl Iterator<Item = &TestItem> {
        self.roots.iter().filter_map(|id| self.items.get(id))
    }

    /// Features tagged `@mock`, sorted by label.
    #[must_use]
    pub fn mocks(&self) -> &[TestItem] {
        &self.mocks
    }

    /// Number of executable items (folders included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the tree holds no executable items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Map a runner `locationHint` onto an item.
    ///
    /// A single trailing `:1` is stripped (feature-level hints), the hint is
    /// joined onto `cwd`, and the result is looked up by key. Hints naming an
    /// example row line resolve to that row. Anything else yields `None`,
    /// which callers treat as an untracked node.
    #[must_use]
    pub fn resolve(&self, cwd: &Path, location_hint: &str) -> Option<&TestItemId> {
        let hint = location_hint.strip_suffix(":1").unwrap_or(location_hint);
        let key = normalise_path(&cwd.join(hint)).display().to_string();
        self.items
            .get_key_value(&TestItemId::from(key.as_str()))
            .map(|(id, _)| id)
            .or_else(|| self.rows.get(&key))
    }

    /// `id` and every node below it, parents before children.
    #[must_use]
    pub fn descendants(&self, id: &TestItemId) -> Vec<TestItemId> {
        let mut out = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(next) = stack.pop() {
            let Some(item) = self.items.get(&next) else {
                continue;
            };
            stack.extend(item.children.iter().rev().cloned());
            out.push(next);
        }
        out
    }

    /// Runner selection for `ids`: their launch paths joined with `;`.
    ///
    /// Unknown keys are skipped.
    #[must_use]
    pub fn launch_target(&self, ids: &[TestItemId]) -> String {
        ids.iter()
            .filter_map(|id| self.items.get(id))
            .map(TestItem::launch_path)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Nested, serialisable copy of the tree.
    #[must_use]
    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            tests: self
                .roots
                .iter()
                .filter_map(|id| self.node(id))
                .collect(),
            mocks: self
                .mocks
                .iter()
                .map(|mock| TreeNode {
                    id: mock.id.clone(),
                    label: mock.label.clone(),
                    kind: mock.kind,
                    path: mock.path.clone(),
                    line: None,
                    tags: mock.tags.clone(),
                    children: Some(Vec::new()),
                })
                .collect(),
        }
    }

    fn node(&self, id: &TestItemId) -> Option<TreeNode> {
        let item = self.items.get(id)?;
        let children = (item.kind != TestItemKind::Example)
            .then(|| item.children.iter().filter_map(|c| self.node(c)).collect());
        Some(TreeNode {
            id: item.id.clone(),
            label: item.label.clone(),
            kind: item.kind,
            path: item.path.clone(),
            line: item.line,
            tags: item.tags.clone(),
            children,
        })
    }

    /// Create any missing folder items between the root and `dir`.
    ///
    /// Returns the key of `dir`'s folder, or `None` when `dir` is the root or
    /// lies outside it.
    fn ensure_folders(&mut self, dir: &Path) -> Option<TestItemId> {
        let relative = dir.strip_prefix(&self.root).ok()?.to_path_buf();
        let mut current = self.root.clone();
        let mut parent: Option<TestItemId> = None;
        for component in relative.components() {
            current.push(component);
            let id = TestItemId::for_path(&current);
            if !self.items.contains_key(&id) {
                let mut folder =
                    TestItem::new(id.clone(), file_label(&current), TestItemKind::Folder, &current);
                folder.parent.clone_from(&parent);
                self.items.insert(id.clone(), folder);
                self.link(parent.as_ref(), id.clone());
            }
            parent = Some(id);
        }
        parent
    }

    fn link(&mut self, parent: Option<&TestItemId>, id: TestItemId) {
        let mut siblings = match parent {
            Some(parent) => self
                .items
                .get_mut(parent)
                .map(|item| std::mem::take(&mut item.children))
                .unwrap_or_default(),
            None => std::mem::take(&mut self.roots),
        };
        siblings.push(id);
        siblings.sort_by_cached_key(|sibling| {
            self.items
                .get(sibling)
                .map(|item| (item.kind != TestItemKind::Folder, item.label.clone()))
        });
        self.store_children(parent, siblings);
    }

    fn store_children(&mut self, parent: Option<&TestItemId>, children: Vec<TestItemId>) {
        match parent {
            Some(parent) => {
                if let Some(item) = self.items.get_mut(parent) {
                    item.children = children;
                }
            }
            None => self.roots = children,
        }
    }

    fn unlink_and_prune(&mut self, mut parent: Option<TestItemId>, id: &TestItemId) {
        let mut removed = id.clone();
        loop {
            match parent {
                None => {
                    self.roots.retain(|root| *root != removed);
                    return;
                }
                Some(folder_id) => {
                    let Some(folder) = self.items.get_mut(&folder_id) else {
                        return;
                    };
                    folder.children.retain(|child| *child != removed);
                    if !folder.children.is_empty() {
                        return;
                    }
                    parent = folder.parent.clone();
                    self.items.remove(&folder_id);
                    removed = folder_id;
                }
            }
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

#[cfg(all(test, unix))]
mod tests;
