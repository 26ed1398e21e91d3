use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::chunking::Language;
use crate::config::IndexingConfig;
use crate::models::{SourceFile, SourceMeta};

/// Walk `root` and read every supported source file.
///
/// Hidden directories are skipped, exclusion globs are matched against the
/// root-relative path, and files over the size cap or not valid UTF-8 are
/// left out. Paths in the result are root-relative with `/` separators.
pub fn walk_sources(root: &Path, config: &IndexingConfig) -> Result<Vec<SourceFile>> {
    let excluded = exclusion_set(&config.excluded_patterns)?;
    let repository = root
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()));

    let mut files = Vec::new();
    let mut skipped = 0usize;

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = relative_path(root, path);

        if excluded.is_match(&relative) {
            continue;
        }
        if Language::from_path(&relative).is_none() {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %relative, "cannot stat file: {e}");
                skipped += 1;
                continue;
            }
        };
        if metadata.len() > config.max_file_size {
            tracing::debug!(path = %relative, size = metadata.len(), "file over size cap, skipped");
            skipped += 1;
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(path = %relative, "unreadable file skipped: {e}");
                skipped += 1;
                continue;
            }
        };

        let created_at = metadata
            .created()
            .or_else(|_| metadata.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        files.push(SourceFile {
            path: relative,
            content,
            meta: SourceMeta {
                repository: repository.clone(),
                created_at,
                stars: 0,
            },
        });
    }

    tracing::info!(
        root = %root.display(),
        files = files.len(),
        skipped,
        "collected source files"
    );
    Ok(files)
}

pub fn exclusion_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).with_context(|| format!("invalid exclusion glob {pattern}"))?;
        builder.add(glob);
    }
    builder.build().context("failed to build exclusion globs")
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_walk_filters_and_relativizes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/app.py", "def main():\n    pass\n");
        write(root, "src/lib.rs", "fn main() {}\n");
        write(root, "README.md", "# readme\n");
        write(root, ".hidden/secret.py", "x = 1\n");
        write(root, "node_modules/pkg/index.js", "function f() {}\n");
        write(root, "web/app.min.js", "function f(){}\n");

        let files = walk_sources(root, &IndexingConfig::default()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/app.py", "src/lib.rs"]);
        assert!(files[0].meta.repository.is_some());
    }

    #[test]
    fn test_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.py", &"x = 1\n".repeat(100));
        write(dir.path(), "small.py", "x = 1\n");

        let config = IndexingConfig {
            max_file_size: 64,
            ..Default::default()
        };
        let files = walk_sources(dir.path(), &config).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "small.py");
    }

    #[test]
    fn test_non_utf8_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.py"), [0xff, 0xfe, 0x00, 0x41]).unwrap();
        let files = walk_sources(dir.path(), &IndexingConfig::default()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_invalid_glob_is_error() {
        assert!(exclusion_set(&["a/[".to_string()]).is_err());
    }
}
