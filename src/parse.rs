//! Hierarchy parser: turns the flat text of a structured legal document into
//! a [`DocumentTree`].
//!
//! A line-oriented state machine recognizes headings at four levels —
//! part, chapter, section (optional), article — and splits article bodies
//! into numbered clauses. Both Vietnamese markers (`PHẦN THỨ`, `CHƯƠNG`,
//! `Mục N`, `Điều N.`) and English markers (`PART`, `CHAPTER`, `Section N`,
//! `Article N.`) are recognized.
//!
//! Article content outside a part/chapter context (preambles, signature
//! blocks) is skipped, matching how such documents are actually laid out.

use anyhow::Result;
use std::path::Path;

use crate::extract::read_source_text;
use crate::models::{DocumentTree, NodeKind, TreeNode};

/// Parse a source file into a hierarchy tree.
pub fn parse_source(path: &Path) -> Result<DocumentTree> {
    let text = read_source_text(path)?;
    Ok(parse_text(&text))
}

/// Parse document text into a hierarchy tree.
pub fn parse_text(text: &str) -> DocumentTree {
    let mut parser = Parser::default();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if is_part_heading(line) {
            parser.flush_article();
            parser.start_part(line);
        } else if is_chapter_heading(line) {
            parser.flush_article();
            parser.start_chapter(line);
        } else if is_section_heading(line) {
            parser.flush_article();
            parser.start_section(line);
        } else if is_article_heading(line) {
            parser.flush_article();
            parser.start_article(line);
        } else if parser.in_article() {
            parser.push_content(line);
        }
    }
    parser.flush_article();

    DocumentTree {
        title: extract_title(text),
        roots: parser.roots,
    }
}

/// Scan the first lines for a law-title marker; fall back to the first
/// non-empty line.
fn extract_title(text: &str) -> String {
    const MARKERS: [&str; 8] = [
        "BỘ LUẬT", "LUẬT", "NGHỊ ĐỊNH", "THÔNG TƯ", "LAW", "CODE", "DECREE", "ACT",
    ];

    let mut first_line = None;
    for line in text.lines().take(10) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if first_line.is_none() {
            first_line = Some(line);
        }
        if MARKERS.iter().any(|m| line.starts_with(m)) {
            return line.to_string();
        }
    }
    first_line.unwrap_or("Untitled document").to_string()
}

#[derive(Default)]
struct Parser {
    roots: Vec<TreeNode>,
    /// Heading and body lines of the article currently being read.
    article: Option<(String, Vec<String>)>,
    /// True if the current chapter has an open section; new articles attach
    /// to it instead of directly to the chapter.
    section_open: bool,
}

impl Parser {
    fn in_article(&self) -> bool {
        self.article.is_some()
    }

    fn start_part(&mut self, heading: &str) {
        let node_ref = format!("p{}", self.roots.len());
        self.roots.push(node(node_ref, NodeKind::Part, heading));
        self.section_open = false;
    }

    fn start_chapter(&mut self, heading: &str) {
        let Some(part) = self.roots.last_mut() else {
            return;
        };
        let node_ref = format!("{}/c{}", part.node_ref, part.children.len());
        part.children.push(node(node_ref, NodeKind::Chapter, heading));
        self.section_open = false;
    }

    fn start_section(&mut self, heading: &str) {
        let Some(chapter) = self
            .roots
            .last_mut()
            .and_then(|p| p.children.last_mut())
        else {
            return;
        };
        let node_ref = format!("{}/s{}", chapter.node_ref, chapter.children.len());
        chapter
            .children
            .push(node(node_ref, NodeKind::Section, heading));
        self.section_open = true;
    }

    fn start_article(&mut self, heading: &str) {
        self.article = Some((heading.to_string(), Vec::new()));
    }

    fn push_content(&mut self, line: &str) {
        if let Some((_, content)) = &mut self.article {
            content.push(line.to_string());
        }
    }

    /// Attach the pending article (with its clauses) under the current
    /// section or chapter. Dropped silently when no chapter context exists.
    fn flush_article(&mut self) {
        let Some((heading, content)) = self.article.take() else {
            return;
        };

        let section_open = self.section_open;
        let Some(chapter) = self
            .roots
            .last_mut()
            .and_then(|p| p.children.last_mut())
        else {
            return;
        };

        let parent = if section_open {
            match chapter.children.last_mut() {
                Some(section) => section,
                None => chapter,
            }
        } else {
            chapter
        };

        let node_ref = format!("{}/a{}", parent.node_ref, parent.children.len());
        let mut article = node(node_ref.clone(), NodeKind::Article, &heading);
        for (i, (clause_no, clause_text)) in split_clauses(&content).into_iter().enumerate() {
            let mut clause = node(format!("{}/k{}", node_ref, i), NodeKind::Clause, &clause_no);
            clause.text = clause_text;
            article.children.push(clause);
        }
        parent.children.push(article);
    }
}

fn node(node_ref: String, kind: NodeKind, heading: &str) -> TreeNode {
    TreeNode {
        node_ref,
        kind,
        heading: heading.to_string(),
        text: String::new(),
        children: Vec::new(),
    }
}

fn is_part_heading(line: &str) -> bool {
    line.starts_with("PHẦN THỨ ") || line.starts_with("PART ")
}

fn is_chapter_heading(line: &str) -> bool {
    line.starts_with("CHƯƠNG ") || line.starts_with("CHAPTER ")
}

fn is_section_heading(line: &str) -> bool {
    numbered_heading(line, &["Mục ", "Section "], false)
}

fn is_article_heading(line: &str) -> bool {
    numbered_heading(line, &["Điều ", "Article "], true)
}

/// True if the line is `<prefix><digits>` (and, when `dot_required`, a `.`
/// directly after the digits).
fn numbered_heading(line: &str, prefixes: &[&str], dot_required: bool) -> bool {
    for prefix in prefixes {
        if let Some(rest) = line.strip_prefix(prefix) {
            let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                continue;
            }
            if !dot_required || rest[digits..].starts_with('.') {
                return true;
            }
        }
    }
    false
}

/// Split article body lines into numbered clauses. A clause begins at a line
/// starting with `<digits>.`; text before the first marker (or a body with
/// no markers at all) becomes clause "1".
fn split_clauses(content: &[String]) -> Vec<(String, String)> {
    if content.is_empty() {
        return Vec::new();
    }

    let mut clauses: Vec<(String, Vec<&str>)> = Vec::new();

    for line in content {
        if let Some((number, rest)) = clause_marker(line) {
            clauses.push((number, if rest.is_empty() { vec![] } else { vec![rest] }));
        } else {
            match clauses.last_mut() {
                Some((_, lines)) => lines.push(line),
                None => clauses.push(("1".to_string(), vec![line])),
            }
        }
    }

    clauses
        .into_iter()
        .map(|(number, lines)| (number, lines.join(" ")))
        .collect()
}

/// Parse a leading `<digits>. ` clause marker, returning the number and the
/// remainder of the line.
fn clause_marker(line: &str) -> Option<(String, &str)> {
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let rest = line[digits.len()..].strip_prefix('.')?;
    Some((digits, rest.trim()))
}
