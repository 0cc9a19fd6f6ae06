//! Knowledge file discovery.
//!
//! Walks the knowledge directory and returns every whitelisted text file,
//! skipping hidden directories, build output and excluded subtrees (the
//! canon directory is injected separately and must not be chunked twice).

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directory names that never contain knowledge.
const BUILD_DIRS: [&str; 5] = ["node_modules", "target", "dist", "build", ".next"];

/// Which files the loader picks up.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Lowercase extensions without the leading dot
    pub extensions: Vec<String>,
    /// Subtrees to skip entirely
    pub exclude_dirs: Vec<PathBuf>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["txt".into(), "md".into(), "markdown".into()],
            exclude_dirs: Vec::new(),
        }
    }
}

impl LoaderOptions {
    fn is_excluded(&self, path: &Path) -> bool {
        self.exclude_dirs.iter().any(|ex| {
            path == ex
                || matches!(
                    (path.canonicalize(), ex.canonicalize()),
                    (Ok(a), Ok(b)) if a == b
                )
        })
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|allowed| *allowed == e))
    }
}

/// List knowledge files under `root`, sorted by path.
///
/// A missing root is not an error: it simply yields no files.
pub fn list_knowledge_files(root: &Path, options: &LoaderOptions) -> Vec<PathBuf> {
    if !root.is_dir() {
        debug!(root = %root.display(), "Knowledge directory not found");
        return Vec::new();
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e, options));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable knowledge entry");
                continue;
            }
        };
        if entry.file_type().is_file() && options.accepts(entry.path()) {
            files.push(entry.into_path());
        }
    }

    debug!(root = %root.display(), files = files.len(), "Listed knowledge files");
    files
}

fn is_skipped_dir(entry: &DirEntry, options: &LoaderOptions) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || BUILD_DIRS.contains(&name.as_ref()) || options.is_excluded(entry.path())
}

/// Read a knowledge file, returning an empty string on any error.
pub fn read_knowledge_file(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Failed to read knowledge file");
            String::new()
        }
    }
}

/// `/`-separated path of `path` relative to `root`, used in chunk ids.
pub fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn names(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files.iter().map(|f| relative_name(root, f)).collect()
    }

    #[test]
    fn missing_root_yields_nothing() {
        let files = list_knowledge_files(Path::new("/nonexistent/knowledge"), &LoaderOptions::default());
        assert!(files.is_empty());
    }

    #[test]
    fn lists_whitelisted_files_recursively_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("faq/setup")).unwrap();
        fs::write(root.join("b.md"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("faq/setup/vps.markdown"), "vps").unwrap();
        fs::write(root.join("faq/index.json"), "{}").unwrap();
        fs::write(root.join("notes.MD"), "upper").unwrap();

        let files = list_knowledge_files(root, &LoaderOptions::default());
        assert_eq!(
            names(root, &files),
            vec!["a.txt", "b.md", "faq/setup/vps.markdown", "notes.MD"]
        );
    }

    #[test]
    fn skips_hidden_build_and_excluded_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for dir in [".git", "node_modules", ".next", "canon", "raw"] {
            fs::create_dir_all(root.join(dir)).unwrap();
            fs::write(root.join(dir).join("file.md"), dir).unwrap();
        }

        let options = LoaderOptions {
            exclude_dirs: vec![root.join("canon")],
            ..LoaderOptions::default()
        };
        let files = list_knowledge_files(root, &options);
        assert_eq!(names(root, &files), vec!["raw/file.md"]);
    }

    #[test]
    fn unreadable_file_reads_as_empty() {
        assert_eq!(read_knowledge_file(Path::new("/nonexistent/file.md")), "");
    }

    #[test]
    fn relative_name_uses_forward_slashes() {
        let root = Path::new("/kb");
        let path = Path::new("/kb/products/vistax.md");
        assert_eq!(relative_name(root, path), "products/vistax.md");
    }
}
