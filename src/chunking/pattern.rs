//! Declaration-pattern extraction for JavaScript and TypeScript.
//!
//! Regexes find function, arrow-function and class headers anywhere in the
//! file; the body is then closed by brace matching so nested blocks are kept
//! whole. Spans are widened to full lines.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::{source_lines, RawSnippet};
use crate::models::SnippetKind;

static FUNCTION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:export\s+(?:default\s+)?)?(?P<async>async\s+)?function\s*\*?\s*(?P<name>[A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\((?P<params>[^)]*)\)",
    )
    .unwrap()
});

static ARROW_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)\s*(?::[^=\n]+)?=\s*(?P<async>async\s+)?(?:\((?P<params>[^)]*)\)|(?P<param>[A-Za-z_$][\w$]*))\s*(?::\s*[^=\n]+?)?\s*=>",
    )
    .unwrap()
});

static CLASS_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:export\s+(?:default\s+)?)?(?:abstract\s+)?class\s+(?P<name>[A-Za-z_$][\w$]*)",
    )
    .unwrap()
});

/// Extract function, arrow-function and class declarations.
pub fn extract_declarations(content: &str) -> Vec<RawSnippet> {
    let lines = source_lines(content);
    let mut out = Vec::new();

    for caps in FUNCTION_DECL.captures_iter(content) {
        if let Some(raw) = function_snippet(content, &lines, &caps) {
            out.push(raw);
        }
    }
    for caps in ARROW_DECL.captures_iter(content) {
        if let Some(raw) = function_snippet(content, &lines, &caps) {
            out.push(raw);
        }
    }
    for caps in CLASS_DECL.captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(end) = find_block_end(content, whole.end()) else {
            continue;
        };
        let start_line = line_of(content, whole.start() + leading_ws(whole.as_str()));
        let mut raw = RawSnippet::block(SnippetKind::Class, start_line, line_of(content, end));
        raw.name = caps.name("name").map(|m| m.as_str().to_string());
        raw.docstring = jsdoc_above(&lines, start_line);
        out.push(raw);
    }

    out
}

fn function_snippet(content: &str, lines: &[&str], caps: &Captures) -> Option<RawSnippet> {
    let whole = caps.get(0)?;
    let end = find_body_end(content, whole.end())?;
    let start_line = line_of(content, whole.start() + leading_ws(whole.as_str()));

    let kind = if caps.name("async").is_some() {
        SnippetKind::AsyncFunction
    } else {
        SnippetKind::Function
    };
    let mut raw = RawSnippet::block(kind, start_line, line_of(content, end));
    raw.name = caps.name("name").map(|m| m.as_str().to_string());
    raw.parameters = match (caps.name("params"), caps.name("param")) {
        (Some(list), _) => split_params(list.as_str()),
        (None, Some(single)) => vec![single.as_str().to_string()],
        (None, None) => Vec::new(),
    };
    raw.return_type = return_annotation(&content[whole.end()..]);
    raw.docstring = jsdoc_above(lines, start_line);
    Some(raw)
}

/// Parameter names without type annotations or default values.
fn split_params(list: &str) -> Vec<String> {
    list.split(',')
        .filter_map(|p| {
            let name = p
                .trim()
                .trim_start_matches("...")
                .split([':', '=', '?'])
                .next()
                .unwrap_or("")
                .trim();
            if name.is_empty() || name.starts_with('{') || name.starts_with('[') {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}

/// TypeScript `): Type {` annotation following a function header.
fn return_annotation(rest: &str) -> Option<String> {
    let rest = rest.trim_start();
    let annotation = rest.strip_prefix(':')?;
    let end = annotation.find(['{', '\n']).unwrap_or(annotation.len());
    let ty = annotation[..end].trim().trim_end_matches("=>").trim();
    if ty.is_empty() {
        None
    } else {
        Some(ty.to_string())
    }
}

/// Byte offset where a function body ends. Arrow functions with an
/// expression body end at the end of their line.
fn find_body_end(content: &str, from: usize) -> Option<usize> {
    let rest = &content[from..];
    let trimmed = rest.trim_start();
    let skipped = rest.len() - trimmed.len();

    if trimmed.starts_with('{') {
        return matching_brace(content, from + skipped);
    }
    if content[..from].trim_end().ends_with("=>") {
        let line_end = trimmed.find('\n').unwrap_or(trimmed.len());
        return Some(from + skipped + line_end.saturating_sub(1));
    }
    find_block_end(content, from)
}

/// Offset of the brace closing the first block opened after `from`.
fn find_block_end(content: &str, from: usize) -> Option<usize> {
    let open = content[from..].find('{')? + from;
    matching_brace(content, open)
}

/// Match braces from the `{` at `open`, skipping string, template and comment text.
fn matching_brace(content: &str, open: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            quote @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// 1-based line number of a byte offset.
fn line_of(content: &str, offset: usize) -> usize {
    content.as_bytes()[..offset.min(content.len())]
        .iter()
        .filter(|b| **b == b'\n')
        .count()
        + 1
}

fn leading_ws(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

/// Text of a `/** ... */` block ending on the line right above `start_line`.
fn jsdoc_above(lines: &[&str], start_line: usize) -> Option<String> {
    if start_line < 2 {
        return None;
    }
    let mut idx = start_line - 2;
    if !lines.get(idx)?.trim_end().ends_with("*/") {
        return None;
    }

    let mut doc = Vec::new();
    loop {
        let line = lines[idx].trim();
        let opens = line.starts_with("/**");
        let cleaned = line
            .trim_start_matches("/**")
            .trim_end_matches("*/")
            .trim_start_matches('*')
            .trim();
        if !cleaned.is_empty() && !cleaned.starts_with('@') {
            doc.push(cleaned.to_string());
        }
        if opens {
            break;
        }
        if idx == 0 {
            return None;
        }
        idx -= 1;
    }

    doc.reverse();
    let text = doc.join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(raw: &'a [RawSnippet], name: &str) -> &'a RawSnippet {
        raw.iter()
            .find(|r| r.name.as_deref() == Some(name))
            .unwrap_or_else(|| panic!("no snippet named {name}"))
    }

    #[test]
    fn test_function_with_nested_braces() {
        let source = r#"
function linearSearch(items, target) {
    for (let i = 0; i < items.length; i++) {
        if (items[i] === target) {
            return i;
        }
    }
    return -1;
}
"#;
        let raw = extract_declarations(source);
        let f = find(&raw, "linearSearch");
        assert_eq!(f.kind, SnippetKind::Function);
        assert_eq!((f.start_line, f.end_line), (2, 9));
        assert_eq!(f.parameters, vec!["items", "target"]);
    }

    #[test]
    fn test_arrow_functions() {
        let source = "export const fetchUser = async (id) => {\n  return api.get(`/users/${id}`);\n};\nconst double = x => x * 2;\n";
        let raw = extract_declarations(source);

        let fetch = find(&raw, "fetchUser");
        assert_eq!(fetch.kind, SnippetKind::AsyncFunction);
        assert_eq!((fetch.start_line, fetch.end_line), (1, 3));
        assert_eq!(fetch.parameters, vec!["id"]);

        let double = find(&raw, "double");
        assert_eq!((double.start_line, double.end_line), (4, 4));
        assert_eq!(double.parameters, vec!["x"]);
    }

    #[test]
    fn test_class_with_extends_and_jsdoc() {
        let source = r#"/**
 * Renders a user card.
 * @param props card props
 */
export class UserCard extends Component {
    render() {
        return "{}";
    }
}
"#;
        let raw = extract_declarations(source);
        let class = find(&raw, "UserCard");
        assert_eq!(class.kind, SnippetKind::Class);
        assert_eq!((class.start_line, class.end_line), (5, 9));
        assert_eq!(class.docstring.as_deref(), Some("Renders a user card."));
    }

    #[test]
    fn test_typescript_annotations() {
        let source = "function parse(input: string, strict?: boolean): Config {\n  return load(input);\n}\n";
        let raw = extract_declarations(source);
        let f = find(&raw, "parse");
        assert_eq!(f.parameters, vec!["input", "strict"]);
        assert_eq!(f.return_type.as_deref(), Some("Config"));
    }

    #[test]
    fn test_unclosed_body_is_skipped() {
        let raw = extract_declarations("function broken() {\n  if (x) {\n");
        assert!(raw.is_empty());
    }
}
