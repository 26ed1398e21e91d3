//! Structural extraction using tree-sitter.
//!
//! Walks the whole tree and emits one snippet per function, async function
//! and class-like definition (nested ones included), then recovers top-level
//! statements outside those definitions as module blocks.
//!
//! Returns `None` when:
//! - Language has no grammar
//! - Parse fails or the tree contains syntax errors

use tree_sitter::Node;

use super::{line_span, source_lines, Language, RawSnippet};
use crate::models::SnippetKind;

/// Module blocks need at least this many lines.
const MIN_MODULE_BLOCK_LINES: usize = 2;

/// Module blocks shorter than this (stripped) are dropped.
const MIN_MODULE_BLOCK_CHARS: usize = 10;

/// Extract definitions and module blocks from a file in a language with a grammar.
pub fn extract_structural(content: &str, language: Language) -> Option<Vec<RawSnippet>> {
    let mut parser = tree_sitter::Parser::new();
    let ts_language = language.tree_sitter_language()?;
    parser.set_language(&ts_language).ok()?;

    let tree = parser.parse(content, None)?;
    let root = tree.root_node();
    if root.has_error() {
        tracing::debug!(language = language.name(), "syntax errors in parse tree");
        return None;
    }

    let source = content.as_bytes();
    let mut out = Vec::new();
    collect_definitions(root, source, language, &mut out);

    // Rows covered by top-level definitions, module blocks fill the rest.
    let mut covered = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if is_top_level_item(child.kind(), language) {
            covered.push(child.start_position().row..=child.end_position().row);
        }
    }
    out.extend(module_blocks(content, language, &covered));

    Some(out)
}

fn collect_definitions(node: Node, source: &[u8], language: Language, out: &mut Vec<RawSnippet>) {
    let found = match language {
        Language::Python => python_definition(node, source),
        Language::Rust => rust_definition(node, source),
        _ => None,
    };
    if let Some(raw) = found {
        out.push(raw);
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_definitions(child, source, language, out);
    }
}

fn is_top_level_item(kind: &str, language: Language) -> bool {
    match language {
        Language::Python => matches!(
            kind,
            "function_definition" | "class_definition" | "decorated_definition"
        ),
        Language::Rust => matches!(
            kind,
            "function_item" | "struct_item" | "enum_item" | "trait_item" | "impl_item"
        ),
        _ => false,
    }
}

fn text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn field_text(node: Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| text(n, source).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn raw_for(node: Node, kind: SnippetKind, name: Option<String>) -> RawSnippet {
    let mut raw = RawSnippet::block(
        kind,
        node.start_position().row + 1,
        node.end_position().row + 1,
    );
    raw.name = name;
    raw
}

// ── Python ──────────────────────────────────────────

fn python_definition(node: Node, source: &[u8]) -> Option<RawSnippet> {
    let kind = match node.kind() {
        "function_definition" => {
            if has_child_kind(node, "async") {
                SnippetKind::AsyncFunction
            } else {
                SnippetKind::Function
            }
        }
        "class_definition" => SnippetKind::Class,
        _ => return None,
    };

    let mut raw = raw_for(node, kind, field_text(node, "name", source));
    raw.docstring = python_docstring(node, source);
    raw.complexity_score = Some(python_complexity(node));
    if kind.is_function() {
        raw.parameters = node
            .child_by_field_name("parameters")
            .map(|params| python_parameters(params, source))
            .unwrap_or_default();
        raw.return_type = field_text(node, "return_type", source);
    }
    Some(raw)
}

fn has_child_kind(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == kind);
    found
}

fn python_docstring(node: Node, source: &[u8]) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    let doc = strip_string_quotes(text(string, source));
    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

fn strip_string_quotes(literal: &str) -> String {
    literal
        .trim_start_matches(|c: char| matches!(c, 'r' | 'R' | 'u' | 'U' | 'b' | 'B' | 'f' | 'F'))
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

fn python_parameters(params: Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        let raw = text(param, source);
        let name = raw
            .split([':', '='])
            .next()
            .unwrap_or("")
            .trim();
        if !name.is_empty() && name != "self" && name != "cls" {
            out.push(name.to_string());
        }
    }
    out
}

fn python_complexity(node: Node) -> u32 {
    let own = match node.kind() {
        "if_statement" | "elif_clause" | "for_statement" | "while_statement" | "try_statement"
        | "except_clause" => 1,
        "function_definition" => 2,
        "class_definition" => 3,
        _ => 0,
    };
    let mut cursor = node.walk();
    let nested: u32 = node.children(&mut cursor).map(python_complexity).sum();
    own + nested
}

// ── Rust ────────────────────────────────────────────

fn rust_definition(node: Node, source: &[u8]) -> Option<RawSnippet> {
    let (kind, name) = match node.kind() {
        "function_item" => {
            let is_async = node
                .children(&mut node.walk())
                .filter(|c| c.kind() == "function_modifiers")
                .any(|m| text(m, source).split_whitespace().any(|w| w == "async"));
            let kind = if is_async {
                SnippetKind::AsyncFunction
            } else {
                SnippetKind::Function
            };
            (kind, field_text(node, "name", source))
        }
        "struct_item" | "enum_item" | "trait_item" => {
            (SnippetKind::Class, field_text(node, "name", source))
        }
        "impl_item" => (SnippetKind::Class, field_text(node, "type", source)),
        _ => return None,
    };

    let mut raw = raw_for(node, kind, name);
    raw.docstring = rust_doc_comment(node, source);
    raw.complexity_score = Some(rust_complexity(node));
    if kind.is_function() {
        raw.parameters = node
            .child_by_field_name("parameters")
            .map(|params| rust_parameters(params, source))
            .unwrap_or_default();
        raw.return_type = field_text(node, "return_type", source);
    }
    Some(raw)
}

/// Collect the `///` lines directly above an item, skipping attributes.
fn rust_doc_comment(node: Node, source: &[u8]) -> Option<String> {
    let mut lines = Vec::new();
    let mut prev = node.prev_sibling();
    while let Some(sibling) = prev {
        match sibling.kind() {
            "attribute_item" => {}
            "line_comment" => {
                let comment = text(sibling, source);
                match comment.strip_prefix("///") {
                    Some(doc) => lines.push(doc.trim().to_string()),
                    None => break,
                }
            }
            _ => break,
        }
        prev = sibling.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    let doc = lines.join(" ").trim().to_string();
    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

fn rust_parameters(params: Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        if param.kind() != "parameter" {
            continue;
        }
        if let Some(pattern) = field_text(param, "pattern", source) {
            out.push(pattern);
        }
    }
    out
}

fn rust_complexity(node: Node) -> u32 {
    let own = match node.kind() {
        "if_expression" | "for_expression" | "while_expression" | "loop_expression"
        | "match_expression" => 1,
        "function_item" => 2,
        "struct_item" | "enum_item" | "trait_item" | "impl_item" => 3,
        _ => 0,
    };
    let mut cursor = node.walk();
    let nested: u32 = node.children(&mut cursor).map(rust_complexity).sum();
    own + nested
}

// ── Module blocks ───────────────────────────────────

/// Consecutive non-blank, non-comment lines outside any covered row range.
fn module_blocks(
    content: &str,
    language: Language,
    covered: &[std::ops::RangeInclusive<usize>],
) -> Vec<RawSnippet> {
    let lines = source_lines(content);
    let prefixes = language.comment_prefixes();
    let mut blocks = Vec::new();
    let mut start: Option<usize> = None;

    let flush = |start: usize, end: usize, blocks: &mut Vec<RawSnippet>| {
        let len = end - start + 1;
        let body = line_span(&lines, start + 1, end + 1);
        if len >= MIN_MODULE_BLOCK_LINES && body.trim().len() >= MIN_MODULE_BLOCK_CHARS {
            blocks.push(RawSnippet::block(SnippetKind::ModuleBlock, start + 1, end + 1));
        }
    };

    for (row, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        let is_code = !trimmed.is_empty()
            && !prefixes.iter().any(|p| trimmed.starts_with(p))
            && !covered.iter().any(|r| r.contains(&row));
        match (is_code, start) {
            (true, None) => start = Some(row),
            (false, Some(s)) => {
                flush(s, row - 1, &mut blocks);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        flush(s, lines.len() - 1, &mut blocks);
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(raw: &[RawSnippet]) -> Vec<&str> {
        raw.iter().filter_map(|r| r.name.as_deref()).collect()
    }

    #[test]
    fn test_python_functions_and_classes() {
        let source = r#"import os
import sys

class Greeter:
    """Says hello."""

    def greet(self, name: str) -> str:
        return "hi " + name

async def fetch(url, timeout=10):
    return await get(url)
"#;
        let raw = extract_structural(source, Language::Python).unwrap();
        assert_eq!(names(&raw), vec!["Greeter", "greet", "fetch"]);

        let class = &raw[0];
        assert_eq!(class.kind, SnippetKind::Class);
        assert_eq!((class.start_line, class.end_line), (4, 8));
        assert_eq!(class.docstring.as_deref(), Some("Says hello."));

        let greet = &raw[1];
        assert_eq!(greet.parameters, vec!["name"]);
        assert_eq!(greet.return_type.as_deref(), Some("str"));

        let fetch = &raw[2];
        assert_eq!(fetch.kind, SnippetKind::AsyncFunction);
        assert_eq!(fetch.parameters, vec!["url", "timeout"]);
    }

    #[test]
    fn test_python_module_block() {
        let source = "import os\nimport sys\n\ndef main():\n    pass\n";
        let raw = extract_structural(source, Language::Python).unwrap();
        let block = raw
            .iter()
            .find(|r| r.kind == SnippetKind::ModuleBlock)
            .unwrap();
        assert_eq!((block.start_line, block.end_line), (1, 2));
    }

    #[test]
    fn test_single_line_module_statement_is_dropped() {
        let source = "import os\n\ndef main():\n    pass\n";
        let raw = extract_structural(source, Language::Python).unwrap();
        assert!(raw.iter().all(|r| r.kind != SnippetKind::ModuleBlock));
    }

    #[test]
    fn test_python_complexity_counts_structure() {
        let source = "def f(x):\n    if x:\n        for i in x:\n            pass\n    elif y:\n        pass\n";
        let raw = extract_structural(source, Language::Python).unwrap();
        // def +2, if +1, for +1, elif +1
        assert_eq!(raw[0].complexity_score, Some(5));
    }

    #[test]
    fn test_rust_items() {
        let source = r#"use std::io;

/// A point in space.
#[derive(Debug)]
struct Point {
    x: i32,
}

impl Point {
    fn norm(&self, scale: i32) -> i32 {
        if self.x > 0 { self.x * scale } else { 0 }
    }
}

async fn load(path: &str) -> io::Result<String> {
    todo!()
}
"#;
        let raw = extract_structural(source, Language::Rust).unwrap();
        assert_eq!(names(&raw), vec!["Point", "Point", "norm", "load"]);

        assert_eq!(raw[0].docstring.as_deref(), Some("A point in space."));
        let norm = &raw[2];
        assert_eq!(norm.kind, SnippetKind::Function);
        assert_eq!(norm.parameters, vec!["scale"]);
        assert_eq!(norm.return_type.as_deref(), Some("i32"));
        assert_eq!(norm.complexity_score, Some(3));

        let load = &raw[3];
        assert_eq!(load.kind, SnippetKind::AsyncFunction);
        assert_eq!(load.parameters, vec!["path"]);
    }

    #[test]
    fn test_syntax_error_returns_none() {
        assert!(extract_structural("def broken(:\n    pass\n", Language::Python).is_none());
        assert!(extract_structural("fn broken( {", Language::Rust).is_none());
    }

    #[test]
    fn test_unsupported_language_returns_none() {
        assert!(extract_structural("package main", Language::Go).is_none());
    }
}
