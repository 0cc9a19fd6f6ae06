//! Top-K snippet selection under a character budget.

use serde::Serialize;

use crate::chunker::Chunk;
use crate::scorer::Scorer;

/// Injected instead of snippets when nothing relevant was found.
pub const NO_KNOWLEDGE_PLACEHOLDER: &str = "No internal knowledge provided.";

const SNIPPET_SEPARATOR: &str = "\n\n---\n\n";

/// Caps applied when picking snippets for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionLimits {
    pub max_snippets: usize,
    pub char_budget: usize,
}

impl Default for SelectionLimits {
    fn default() -> Self {
        Self {
            max_snippets: 12,
            char_budget: 8000,
        }
    }
}

impl SelectionLimits {
    pub fn from_config(config: &kazpa_config::KnowledgeConfig) -> Self {
        Self {
            max_snippets: config.max_snippets,
            char_budget: config.char_budget,
        }
    }
}

/// A chunk with its relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: u32,
}

/// Keep the highest-scoring chunks until either limit is hit.
///
/// Ties keep corpus order. Selection stops at the first chunk that would
/// overflow the budget, even if a shorter one further down would fit.
pub fn select(mut scored: Vec<ScoredChunk<'_>>, limits: SelectionLimits) -> Vec<ScoredChunk<'_>> {
    scored.retain(|s| s.score > 0);
    // sort_by is stable
    scored.sort_by(|a, b| b.score.cmp(&a.score));

    let mut used = 0usize;
    let mut picked = Vec::new();
    for candidate in scored.into_iter().take(limits.max_snippets) {
        let len = candidate.chunk.char_len();
        if used + len > limits.char_budget {
            break;
        }
        used += len;
        picked.push(candidate);
    }
    picked
}

/// Render selected snippets as `K1:\n<text>` blocks, or the placeholder.
pub fn render_snippets(selected: &[ScoredChunk<'_>]) -> String {
    if selected.is_empty() {
        return NO_KNOWLEDGE_PLACEHOLDER.to_string();
    }
    selected
        .iter()
        .enumerate()
        .map(|(i, s)| format!("K{}:\n{}", i + 1, s.chunk.text))
        .collect::<Vec<_>>()
        .join(SNIPPET_SEPARATOR)
}

/// Scores a corpus against a query and picks what to inject.
#[derive(Debug, Clone, Default)]
pub struct Retriever {
    scorer: Scorer,
    limits: SelectionLimits,
}

impl Retriever {
    pub fn new(scorer: Scorer, limits: SelectionLimits) -> Self {
        Self { scorer, limits }
    }

    pub fn from_config(config: &kazpa_config::KnowledgeConfig) -> Self {
        Self::new(Scorer::from_config(config), SelectionLimits::from_config(config))
    }

    pub fn limits(&self) -> SelectionLimits {
        self.limits
    }

    /// Ranked chunks for `query`. Blank queries select nothing.
    pub fn retrieve<'a>(&self, chunks: &'a [Chunk], query: &str) -> Vec<ScoredChunk<'a>> {
        let query = self.scorer.query(query);
        if query.is_empty() {
            return Vec::new();
        }
        let scored = chunks
            .iter()
            .map(|chunk| ScoredChunk {
                score: self.scorer.score(&query, chunk),
                chunk,
            })
            .collect();
        select(scored, self.limits)
    }

    /// The knowledge block for `query`, placeholder included.
    pub fn snippets_for(&self, chunks: &[Chunk], query: &str) -> String {
        render_snippets(&self.retrieve(chunks, query))
    }
}
