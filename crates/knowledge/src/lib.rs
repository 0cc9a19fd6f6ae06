//! Knowledge retrieval for kazpaGPT.
//!
//! A deliberately small pipeline that picks a handful of text snippets to
//! inject into the system prompt:
//!
//! 1. **Loader**: list `.txt`/`.md` files under the knowledge directory
//! 2. **Chunker**: split each file into bounded, paragraph-aligned chunks
//! 3. **Scorer**: keyword containment score of every chunk against a query
//! 4. **Selector**: top-K by score within a character budget
//!
//! The canon bundle (fixed, ordered override files) is loaded alongside the
//! chunks, and both live in a [`KnowledgeCache`] snapshot that is rebuilt
//! from disk once its time-to-live has elapsed.
//!
//! Scoring is plain substring matching: no stemming, no proximity, and
//! short common tokens can produce false positives.

pub mod cache;
pub mod canon;
pub mod chunker;
pub mod error;
pub mod loader;
pub mod scorer;
pub mod selector;

pub use cache::{KnowledgeCache, KnowledgeSettings, KnowledgeSnapshot};
pub use canon::{CanonBundle, load_canon_text};
pub use chunker::{Chunk, ChunkStrategy};
pub use error::KnowledgeError;
pub use scorer::{Query, Scorer};
pub use selector::{NO_KNOWLEDGE_PLACEHOLDER, Retriever, ScoredChunk, SelectionLimits};
