//! Time-bounded in-memory knowledge snapshot.
//!
//! The snapshot (chunks + canon) is built from disk on first use and rebuilt
//! on the first access after its TTL has elapsed. Readers hold an `Arc` to
//! the snapshot they started with, so a rebuild never mutates data that a
//! request is still using.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::canon::CanonBundle;
use crate::chunker::{Chunk, ChunkStrategy};
use crate::error::KnowledgeError;
use crate::loader::{self, LoaderOptions};

/// Everything needed to build a snapshot from disk.
#[derive(Debug, Clone)]
pub struct KnowledgeSettings {
    pub root: PathBuf,
    pub canon_dir: PathBuf,
    pub canon_files: Vec<String>,
    pub extensions: Vec<String>,
    pub strategy: ChunkStrategy,
    pub ttl: Duration,
}

impl KnowledgeSettings {
    pub fn from_config(config: &kazpa_config::KnowledgeConfig) -> Result<Self, KnowledgeError> {
        Ok(Self {
            root: config.dir.clone(),
            canon_dir: config.resolved_canon_dir(),
            canon_files: config.canon_files.clone(),
            extensions: config.extensions.iter().map(|e| e.to_lowercase()).collect(),
            strategy: ChunkStrategy::from_config(config)?,
            ttl: Duration::from_secs(config.cache_ttl_secs),
        })
    }

    fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            extensions: self.extensions.clone(),
            exclude_dirs: vec![self.canon_dir.clone()],
        }
    }
}

/// An immutable view of the knowledge tree at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeSnapshot {
    pub chunks: Vec<Chunk>,
    pub canon: CanonBundle,
    pub file_count: usize,
    pub loaded_at: DateTime<Utc>,
    #[serde(skip)]
    built_at: Instant,
}

impl KnowledgeSnapshot {
    /// Read and chunk every knowledge file, and load the canon.
    pub fn build(settings: &KnowledgeSettings) -> Self {
        Self::build_at(settings, Instant::now())
    }

    fn build_at(settings: &KnowledgeSettings, now: Instant) -> Self {
        let files = loader::list_knowledge_files(&settings.root, &settings.loader_options());
        let mut chunks = Vec::new();
        for path in &files {
            let name = loader::relative_name(&settings.root, path);
            let text = loader::read_knowledge_file(path);
            chunks.extend(settings.strategy.chunk_file(&name, &text));
        }

        let canon = CanonBundle::load(&settings.canon_dir, &settings.canon_files);

        info!(
            files = files.len(),
            chunks = chunks.len(),
            canon_files = canon.loaded_files.len(),
            "Knowledge snapshot built"
        );

        Self {
            chunks,
            canon,
            file_count: files.len(),
            loaded_at: Utc::now(),
            built_at: now,
        }
    }

    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.built_at) < ttl
    }
}

/// Process-wide knowledge cache with a time-to-live.
#[derive(Debug)]
pub struct KnowledgeCache {
    settings: KnowledgeSettings,
    current: RwLock<Option<Arc<KnowledgeSnapshot>>>,
}

impl KnowledgeCache {
    pub fn new(settings: KnowledgeSettings) -> Self {
        Self {
            settings,
            current: RwLock::new(None),
        }
    }

    /// The current snapshot, rebuilt from disk if missing or expired.
    ///
    /// This does blocking file IO on rebuild; async callers should run it
    /// on a blocking thread.
    pub fn snapshot(&self) -> Arc<KnowledgeSnapshot> {
        self.snapshot_at(Instant::now())
    }

    /// Same as [`snapshot`](Self::snapshot) with an explicit clock.
    pub fn snapshot_at(&self, now: Instant) -> Arc<KnowledgeSnapshot> {
        {
            let current = self.current.read().unwrap_or_else(|e| e.into_inner());
            if let Some(snapshot) = current.as_ref()
                && snapshot.is_fresh(self.settings.ttl, now)
            {
                return Arc::clone(snapshot);
            }
        }

        debug!(root = %self.settings.root.display(), "Rebuilding knowledge snapshot");
        let fresh = Arc::new(KnowledgeSnapshot::build_at(&self.settings, now));
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Some(Arc::clone(&fresh));
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn settings(root: &Path, ttl_secs: u64) -> KnowledgeSettings {
        let config = kazpa_config::KnowledgeConfig {
            dir: root.to_path_buf(),
            cache_ttl_secs: ttl_secs,
            ..Default::default()
        };
        KnowledgeSettings::from_config(&config).unwrap()
    }

    #[test]
    fn missing_root_builds_empty_snapshot() {
        let cache = KnowledgeCache::new(settings(Path::new("/nonexistent/kb"), 60));
        let snapshot = cache.snapshot();
        assert!(snapshot.chunks.is_empty());
        assert!(snapshot.canon.is_empty());
        assert_eq!(snapshot.file_count, 0);
    }

    #[test]
    fn canon_is_not_chunked() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("canon")).unwrap();
        fs::write(root.join("canon/identity.md"), "You are kazpaGPT.").unwrap();
        fs::write(root.join("setup.md"), "Enable AutoTrading in MT5.").unwrap();

        let snapshot = KnowledgeCache::new(settings(root, 60)).snapshot();
        assert_eq!(snapshot.file_count, 1);
        assert_eq!(snapshot.chunks.len(), 1);
        assert_eq!(snapshot.chunks[0].id, "setup.md#1");
        assert_eq!(snapshot.canon.text, "You are kazpaGPT.");
    }

    #[test]
    fn serves_cached_snapshot_within_ttl() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join("a.md"), "first").unwrap();

        let cache = KnowledgeCache::new(settings(root, 60));
        let start = Instant::now();
        let first = cache.snapshot_at(start);

        fs::write(root.join("b.md"), "second").unwrap();
        let again = cache.snapshot_at(start + Duration::from_secs(59));
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(again.file_count, 1);
    }

    #[test]
    fn rebuilds_after_ttl() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join("a.md"), "first").unwrap();

        let cache = KnowledgeCache::new(settings(root, 60));
        let start = Instant::now();
        let first = cache.snapshot_at(start);

        fs::write(root.join("b.md"), "second").unwrap();
        let later = cache.snapshot_at(start + Duration::from_secs(61));
        assert!(!Arc::ptr_eq(&first, &later));
        assert_eq!(later.file_count, 2);
        // the old snapshot is untouched
        assert_eq!(first.file_count, 1);
    }

    #[test]
    fn zero_ttl_rebuilds_every_time() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = KnowledgeCache::new(settings(tmp.path(), 0));
        let a = cache.snapshot();
        let b = cache.snapshot();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
