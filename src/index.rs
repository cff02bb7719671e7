//! Index structure builder: derives the `index_structures` and `summaries`
//! artifacts from a parsed hierarchy tree, bottom-up.
//!
//! The routing table carries one entry per article so a query can be routed
//! without deserializing the whole tree; branch summaries compress each
//! part/chapter/section down to its heading plus child headings.

use crate::models::{
    BranchSummary, DocumentTree, IndexEntry, IndexStructures, NodeKind, SummarySet, TreeNode,
};

/// Maximum length of a routing excerpt or branch summary.
const EXCERPT_CHARS: usize = 240;

/// Build the flat article routing table.
pub fn build_index_structures(tree: &DocumentTree) -> IndexStructures {
    let entries = tree
        .walk()
        .into_iter()
        .filter(|n| n.kind == NodeKind::Article)
        .map(|article| IndexEntry {
            node_ref: article.node_ref.clone(),
            kind: article.kind,
            heading: article.heading.clone(),
            excerpt: truncate(&article_text(article), EXCERPT_CHARS),
        })
        .collect();

    IndexStructures { entries }
}

/// Build per-branch summaries for every part, chapter, and section.
pub fn build_summaries(tree: &DocumentTree) -> SummarySet {
    let branches = tree
        .walk()
        .into_iter()
        .filter(|n| {
            matches!(
                n.kind,
                NodeKind::Part | NodeKind::Chapter | NodeKind::Section
            )
        })
        .map(|branch| {
            let children: Vec<&str> = branch
                .children
                .iter()
                .map(|c| c.heading.as_str())
                .collect();
            BranchSummary {
                node_ref: branch.node_ref.clone(),
                heading: branch.heading.clone(),
                summary: truncate(&children.join("; "), EXCERPT_CHARS),
            }
        })
        .collect();

    SummarySet { branches }
}

/// Texts to embed: one per clause, prefixed with its article heading so the
/// embedded text is self-describing, keyed by the clause's node reference.
pub fn embedding_inputs(tree: &DocumentTree) -> Vec<(String, String)> {
    let mut inputs = Vec::new();
    for article in tree
        .walk()
        .into_iter()
        .filter(|n| n.kind == NodeKind::Article)
    {
        for clause in &article.children {
            if clause.text.trim().is_empty() {
                continue;
            }
            inputs.push((
                clause.node_ref.clone(),
                format!("{} - {}: {}", article.heading, clause.heading, clause.text),
            ));
        }
    }
    inputs
}

/// Full text of an article: every clause body joined in order.
fn article_text(article: &TreeNode) -> String {
    article
        .children
        .iter()
        .map(|c| c.text.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncate on a char boundary.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_text;

    const SAMPLE: &str = "\
CIVIL CODE 2015
PART ONE
CHAPTER I
Article 1. Scope
1. This Code governs civil relations.
2. Personal and property relations are included.
Article 2. Principles
All persons are equal before civil law.
";

    #[test]
    fn index_has_one_entry_per_article() {
        let tree = parse_text(SAMPLE);
        let index = build_index_structures(&tree);
        assert_eq!(index.entries.len(), 2);
        assert_eq!(index.entries[0].node_ref, "p0/c0/a0");
        assert!(index.entries[0].excerpt.contains("civil relations"));
    }

    #[test]
    fn summaries_cover_branches_only() {
        let tree = parse_text(SAMPLE);
        let summaries = build_summaries(&tree);
        let refs: Vec<&str> = summaries
            .branches
            .iter()
            .map(|b| b.node_ref.as_str())
            .collect();
        assert_eq!(refs, vec!["p0", "p0/c0"]);
        // Chapter summary lists its article headings
        assert!(summaries.branches[1].summary.contains("Article 1. Scope"));
    }

    #[test]
    fn embedding_inputs_are_per_clause() {
        let tree = parse_text(SAMPLE);
        let inputs = embedding_inputs(&tree);
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[0].0, "p0/c0/a0/k0");
        assert!(inputs[0].1.starts_with("Article 1. Scope - 1:"));
    }
}
