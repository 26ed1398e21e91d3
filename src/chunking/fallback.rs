//! Line-grouping fallback for languages without a grammar or declaration
//! patterns, and for structurally parsed files that contain syntax errors.

use super::{line_span, source_lines, Language, RawSnippet};
use crate::models::SnippetKind;

/// Blocks whose stripped text is this short or shorter are discarded.
const MIN_BLOCK_CHARS: usize = 20;

/// Group consecutive non-blank, non-comment lines into generic blocks.
pub fn group_lines(content: &str, language: Language) -> Vec<RawSnippet> {
    let lines = source_lines(content);
    let prefixes = language.comment_prefixes();

    let mut blocks = Vec::new();
    let mut start: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        let is_code = !trimmed.is_empty() && !prefixes.iter().any(|p| trimmed.starts_with(p));
        match (is_code, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                push_block(&lines, s, i - 1, &mut blocks);
                start = None;
            }
            _ => {}
        }
    }

    if let Some(s) = start {
        push_block(&lines, s, lines.len() - 1, &mut blocks);
    }

    blocks
}

fn push_block(lines: &[&str], start: usize, end: usize, blocks: &mut Vec<RawSnippet>) {
    if line_span(lines, start + 1, end + 1).trim().len() <= MIN_BLOCK_CHARS {
        return;
    }
    blocks.push(RawSnippet::block(SnippetKind::GenericBlock, start + 1, end + 1));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_lines_empty() {
        assert!(group_lines("", Language::Go).is_empty());
        assert!(group_lines("   \n\n  ", Language::Go).is_empty());
    }

    #[test]
    fn test_group_lines_splits_on_blank_and_comment_lines() {
        let content = "package main\nimport \"fmt\"\n\n// entry point\nfunc main() {\n    fmt.Println(\"hello world\")\n}\n";
        let blocks = group_lines(content, Language::Go);
        assert_eq!(blocks.len(), 2);
        assert_eq!((blocks[0].start_line, blocks[0].end_line), (1, 2));
        assert_eq!((blocks[1].start_line, blocks[1].end_line), (5, 7));
        assert!(blocks.iter().all(|b| b.kind == SnippetKind::GenericBlock));
    }

    #[test]
    fn test_group_lines_drops_short_blocks() {
        let content = "x := 1\n\ny := computeTheAnswer(x, 42)\n";
        let blocks = group_lines(content, Language::Go);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start_line, 3);
    }

    #[test]
    fn test_group_lines_uses_language_comment_marker() {
        let content = "# compute totals for the report\ntotal <- sum(values) + offset\n";
        let blocks = group_lines(content, Language::R);
        assert_eq!(blocks.len(), 1);
        assert_eq!((blocks[0].start_line, blocks[0].end_line), (2, 2));
    }
}
