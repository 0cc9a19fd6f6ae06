//! Canon loading.
//!
//! The canon is a small, ordered set of rule files that is injected into
//! every request ahead of retrieved knowledge. Files are read in the
//! configured order; missing or blank files are skipped.

use serde::Serialize;
use std::path::Path;
use tracing::debug;

const CANON_SEPARATOR: &str = "\n\n---\n\n";

/// The assembled canon text plus diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CanonBundle {
    /// Non-empty canon files joined in order
    pub text: String,
    /// Files that contributed text
    pub loaded_files: Vec<String>,
    /// Files that were missing, unreadable or blank
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

impl CanonBundle {
    /// Read `files` from `dir` in order.
    pub fn load(dir: &Path, files: &[String]) -> Self {
        let mut sections = Vec::new();
        let mut bundle = Self::default();

        for name in files {
            let path = dir.join(name);
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(_) => {
                    debug!(file = %path.display(), "Canon file not found, skipping");
                    bundle.missing.push(name.clone());
                    continue;
                }
            };
            let trimmed = content.trim();
            if trimmed.is_empty() {
                bundle.missing.push(name.clone());
                continue;
            }
            sections.push(trimmed.to_string());
            bundle.loaded_files.push(name.clone());
        }

        bundle.text = sections.join(CANON_SEPARATOR);
        debug!(
            loaded = bundle.loaded_files.len(),
            missing = bundle.missing.len(),
            "Loaded canon"
        );
        bundle
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Just the joined canon text of `files` in `dir`.
pub fn load_canon_text(dir: &Path, files: &[String]) -> String {
    CanonBundle::load(dir, files).text
}
