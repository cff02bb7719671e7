//! Core data models shared by the coordinator, the stores, and the CLI.
//!
//! These types describe a registered document, its staged cache state, the
//! hierarchy tree produced by parsing, and the derived artifacts that flow
//! through the build pipeline.

use serde::{Deserialize, Serialize};

/// Ordered build stages. A later stage cannot be committed while an earlier
/// one is incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Parsed,
    Indexed,
    Embedded,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Parsed, Stage::Indexed, Stage::Embedded];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Parsed => "parsed",
            Stage::Indexed => "indexed",
            Stage::Embedded => "embedded",
        }
    }

    /// The stage that must be complete before this one may be committed.
    pub fn predecessor(&self) -> Option<Stage> {
        match self {
            Stage::Parsed => None,
            Stage::Indexed => Some(Stage::Parsed),
            Stage::Embedded => Some(Stage::Indexed),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Large-object artifact kinds, one slot per `(doc_id, kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    HierarchyTree,
    IndexStructures,
    Summaries,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::HierarchyTree,
        ArtifactKind::IndexStructures,
        ArtifactKind::Summaries,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::HierarchyTree => "hierarchy_tree",
            ArtifactKind::IndexStructures => "index_structures",
            ArtifactKind::Summaries => "summaries",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural node kinds in a parsed document, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Part,
    Chapter,
    Section,
    Article,
    Clause,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Part,
        NodeKind::Chapter,
        NodeKind::Section,
        NodeKind::Article,
        NodeKind::Clause,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Part => "part",
            NodeKind::Chapter => "chapter",
            NodeKind::Section => "section",
            NodeKind::Article => "article",
            NodeKind::Clause => "clause",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the parsed hierarchy tree.
///
/// `node_ref` is a stable path-like identifier (e.g. `"p0/c1/a12"`) used as
/// the weak reference from vector records back into the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub node_ref: String,
    pub kind: NodeKind,
    pub heading: String,
    /// Body text; non-empty only for leaf (clause) nodes.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Total node count of the subtree rooted here, including self.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::count).sum::<usize>()
    }
}

/// The full parsed hierarchy of one document. Serialized wholesale as the
/// `hierarchy_tree` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTree {
    pub title: String,
    pub roots: Vec<TreeNode>,
}

impl DocumentTree {
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(TreeNode::count).sum()
    }

    /// Counts of nodes by kind, used for the redundant summary rows in the
    /// metadata store.
    pub fn counts_by_kind(&self) -> Vec<(NodeKind, i64)> {
        fn walk(node: &TreeNode, acc: &mut [i64; 5]) {
            let idx = NodeKind::ALL
                .iter()
                .position(|k| *k == node.kind)
                .unwrap_or(0);
            acc[idx] += 1;
            for child in &node.children {
                walk(child, acc);
            }
        }
        let mut acc = [0i64; 5];
        for root in &self.roots {
            walk(root, &mut acc);
        }
        NodeKind::ALL
            .iter()
            .zip(acc)
            .filter(|(_, n)| *n > 0)
            .map(|(k, n)| (*k, n))
            .collect()
    }

    /// Depth-first traversal over all nodes.
    pub fn walk(&self) -> Vec<&TreeNode> {
        fn push<'a>(node: &'a TreeNode, out: &mut Vec<&'a TreeNode>) {
            out.push(node);
            for child in &node.children {
                push(child, out);
            }
        }
        let mut out = Vec::new();
        for root in &self.roots {
            push(root, &mut out);
        }
        out
    }
}

/// One routing entry of the `index_structures` artifact: enough to route a
/// query to an article without deserializing the whole tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub node_ref: String,
    pub kind: NodeKind,
    pub heading: String,
    pub excerpt: String,
}

/// The `index_structures` artifact: a flat routing table over the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStructures {
    pub entries: Vec<IndexEntry>,
}

/// One branch summary of the `summaries` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchSummary {
    pub node_ref: String,
    pub heading: String,
    pub summary: String,
}

/// The `summaries` artifact: per-branch summary texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarySet {
    pub branches: Vec<BranchSummary>,
}

/// One embedding record stored in a document's vector collection.
///
/// `node_ref` is identifier-only — a lookup miss against the tree at query
/// time is recoverable, never a dangling owned reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub node_ref: String,
    pub vector: Vec<f32>,
    pub excerpt: String,
}

/// One ranked similarity-search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub node_ref: String,
    pub score: f32,
    pub excerpt: String,
}

/// A registered document row from the metadata store.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: i64,
    pub source_path: String,
    pub content_fingerprint: String,
    pub display_name: String,
    pub registered_at: i64,
    pub last_built_at: Option<i64>,
}

/// Per-stage completion flags for one document.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageStatus {
    pub parsed: bool,
    pub indexed: bool,
    pub embedded: bool,
}

impl StageStatus {
    pub fn is_complete(&self) -> bool {
        self.parsed && self.indexed && self.embedded
    }

    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::Parsed => self.parsed,
            Stage::Indexed => self.indexed,
            Stage::Embedded => self.embedded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(node_ref: &str, kind: NodeKind) -> TreeNode {
        TreeNode {
            node_ref: node_ref.to_string(),
            kind,
            heading: node_ref.to_string(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    #[test]
    fn stage_order_is_total() {
        assert_eq!(Stage::Parsed.predecessor(), None);
        assert_eq!(Stage::Indexed.predecessor(), Some(Stage::Parsed));
        assert_eq!(Stage::Embedded.predecessor(), Some(Stage::Indexed));
    }

    #[test]
    fn counts_by_kind_skips_absent_kinds() {
        let tree = DocumentTree {
            title: "t".into(),
            roots: vec![TreeNode {
                node_ref: "p0".into(),
                kind: NodeKind::Part,
                heading: "PART ONE".into(),
                text: String::new(),
                children: vec![
                    leaf("p0/a0", NodeKind::Article),
                    leaf("p0/a1", NodeKind::Article),
                ],
            }],
        };
        let counts = tree.counts_by_kind();
        assert_eq!(counts, vec![(NodeKind::Part, 1), (NodeKind::Article, 2)]);
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn status_complete_requires_all_stages() {
        let mut status = StageStatus::default();
        assert!(!status.is_complete());
        status.parsed = true;
        status.indexed = true;
        assert!(!status.is_complete());
        assert!(status.get(Stage::Parsed));
        assert!(!status.get(Stage::Embedded));
        status.embedded = true;
        assert!(status.is_complete());
    }
}
