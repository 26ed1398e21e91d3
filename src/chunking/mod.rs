//! Snippet extraction: tree-sitter for Python and Rust, declaration patterns for
//! JavaScript/TypeScript, line grouping for everything else.

pub mod ast;
pub mod fallback;
pub mod metrics;
pub mod pattern;

use std::collections::HashMap;
use std::path::Path;

use crate::models::{ComplexityLevel, SourceFile, SourceMeta, Snippet, SnippetKind};

/// A span found by one of the extraction strategies, before metrics are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSnippet {
    pub kind: SnippetKind,
    pub name: Option<String>,
    /// 1-based start line in the original file.
    pub start_line: usize,
    /// 1-based end line in the original file.
    pub end_line: usize,
    pub docstring: Option<String>,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    /// Set when the strategy counted control flow on the syntax tree.
    pub complexity_score: Option<u32>,
}

impl RawSnippet {
    pub fn block(kind: SnippetKind, start_line: usize, end_line: usize) -> Self {
        Self {
            kind,
            name: None,
            start_line,
            end_line,
            docstring: None,
            parameters: Vec::new(),
            return_type: None,
            complexity_score: None,
        }
    }
}

/// How a language is split into snippets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Walk a tree-sitter parse tree.
    Structural,
    /// Match declaration regexes over the whole file text.
    Pattern,
    /// Group consecutive non-blank, non-comment lines.
    LineGroup,
}

/// Supported source languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Cpp,
    C,
    Go,
    Rust,
    Php,
    Ruby,
    Swift,
    Kotlin,
    Scala,
    R,
    Matlab,
}

impl Language {
    pub const ALL: [Language; 15] = [
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Java,
        Language::Cpp,
        Language::C,
        Language::Go,
        Language::Rust,
        Language::Php,
        Language::Ruby,
        Language::Swift,
        Language::Kotlin,
        Language::Scala,
        Language::R,
        Language::Matlab,
    ];

    /// Map a file extension (without the dot) to a language.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "py" => Some(Language::Python),
            "js" => Some(Language::JavaScript),
            "ts" => Some(Language::TypeScript),
            "java" => Some(Language::Java),
            "cpp" => Some(Language::Cpp),
            "c" => Some(Language::C),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            "php" => Some(Language::Php),
            "rb" => Some(Language::Ruby),
            "swift" => Some(Language::Swift),
            "kt" => Some(Language::Kotlin),
            "scala" => Some(Language::Scala),
            "r" => Some(Language::R),
            "m" => Some(Language::Matlab),
            _ => None,
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Scala => "scala",
            Language::R => "r",
            Language::Matlab => "matlab",
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Language::Python | Language::Rust => Strategy::Structural,
            Language::JavaScript | Language::TypeScript => Strategy::Pattern,
            _ => Strategy::LineGroup,
        }
    }

    /// Return the tree-sitter Language for this variant, or None if unsupported.
    pub fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            _ => None,
        }
    }

    /// Line prefixes that mark a whole-line comment.
    pub fn comment_prefixes(&self) -> &'static [&'static str] {
        match self {
            Language::Python | Language::Ruby | Language::R => &["#"],
            Language::Matlab => &["%"],
            Language::Php => &["//", "/*", "#"],
            _ => &["//", "/*"],
        }
    }
}

/// Extract snippets from a repository file, attaching its metadata.
pub fn extract(file: &SourceFile) -> Vec<Snippet> {
    let mut snippets = extract_snippets(&file.path, &file.content);
    for snippet in &mut snippets {
        apply_meta(snippet, &file.meta);
    }
    snippets
}

/// Extract snippets from raw file content. Unsupported extensions yield nothing.
///
/// Never fails: a file the structural pass cannot parse cleanly is regrouped
/// by lines instead.
pub fn extract_snippets(file_path: &str, content: &str) -> Vec<Snippet> {
    if content.trim().is_empty() {
        return Vec::new();
    }
    let Some(language) = Language::from_path(file_path) else {
        tracing::debug!(path = file_path, "unsupported file type");
        return Vec::new();
    };

    let raw = match language.strategy() {
        Strategy::Structural => match ast::extract_structural(content, language) {
            Some(raw) => raw,
            None => {
                tracing::warn!(
                    path = file_path,
                    language = language.name(),
                    "structural parse failed, falling back to line grouping"
                );
                fallback::group_lines(content, language)
            }
        },
        Strategy::Pattern => pattern::extract_declarations(content),
        Strategy::LineGroup => fallback::group_lines(content, language),
    };

    let lines = source_lines(content);
    // One snippet per span. When two items share a span, a function beats a
    // class or block, otherwise the first one found is kept.
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut snippets: Vec<Snippet> = Vec::with_capacity(raw.len());
    for item in raw {
        let Some(snippet) = build_snippet(file_path, language, &lines, item) else {
            continue;
        };
        match by_id.get(&snippet.id) {
            Some(&pos) => {
                if span_rank(snippet.kind) < span_rank(snippets[pos].kind) {
                    snippets[pos] = snippet;
                }
            }
            None => {
                by_id.insert(snippet.id.clone(), snippets.len());
                snippets.push(snippet);
            }
        }
    }
    snippets.sort_by(|a, b| {
        a.start_line
            .cmp(&b.start_line)
            .then(a.end_line.cmp(&b.end_line))
    });
    snippets
}

/// Split `content` on `\n` only, so a `\r` before the break stays part of its
/// line. A trailing newline does not open an extra empty line.
pub fn source_lines(content: &str) -> Vec<&str> {
    let body = content.strip_suffix('\n').unwrap_or(content);
    body.split('\n').collect()
}

/// Slice lines `start..=end` (1-based) back into text.
pub fn line_span(lines: &[&str], start_line: usize, end_line: usize) -> String {
    lines[start_line - 1..end_line].join("\n")
}

fn build_snippet(
    file_path: &str,
    language: Language,
    lines: &[&str],
    raw: RawSnippet,
) -> Option<Snippet> {
    if raw.start_line == 0 || lines.is_empty() {
        return None;
    }
    let end_line = raw.end_line.min(lines.len());
    if raw.start_line > end_line {
        return None;
    }

    let content = line_span(lines, raw.start_line, end_line);
    let complexity_score = raw
        .complexity_score
        .unwrap_or_else(|| metrics::keyword_complexity(&content));
    let complexity = ComplexityLevel::from_score(complexity_score);
    let quality_score = metrics::quality_score(&content, complexity);
    let tags = metrics::extract_tags(&content, language.name());
    let description = match &raw.docstring {
        Some(doc) => doc.clone(),
        None => synthesize_description(raw.kind, raw.name.as_deref(), raw.start_line),
    };

    Some(Snippet {
        id: Snippet::make_id(file_path, raw.start_line, end_line),
        file_path: file_path.to_string(),
        content,
        language: language.name().to_string(),
        kind: raw.kind,
        name: raw.name,
        start_line: raw.start_line,
        end_line,
        description,
        docstring: raw.docstring,
        parameters: raw.parameters,
        return_type: raw.return_type,
        tags,
        complexity_score,
        complexity,
        quality_score,
        repository: None,
        created_at: None,
        stars: 0,
    })
}

/// Lower wins when two snippets cover the same lines.
fn span_rank(kind: SnippetKind) -> u8 {
    match kind {
        SnippetKind::Function | SnippetKind::AsyncFunction => 0,
        SnippetKind::Class => 1,
        SnippetKind::ModuleBlock | SnippetKind::GenericBlock => 2,
    }
}

fn synthesize_description(kind: SnippetKind, name: Option<&str>, start_line: usize) -> String {
    match (kind, name) {
        (SnippetKind::Function, Some(name)) => format!("Function {name}"),
        (SnippetKind::AsyncFunction, Some(name)) => format!("Async function {name}"),
        (SnippetKind::Class, Some(name)) => format!("Class {name}"),
        (SnippetKind::ModuleBlock, _) => {
            format!("Module-level code block starting at line {start_line}")
        }
        _ => format!("Code block starting at line {start_line}"),
    }
}

fn apply_meta(snippet: &mut Snippet, meta: &SourceMeta) {
    snippet.repository = meta.repository.clone();
    snippet.created_at = meta.created_at;
    snippet.stars = meta.stars;
}
