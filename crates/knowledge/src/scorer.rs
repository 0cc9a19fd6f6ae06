//! Keyword relevance scoring.
//!
//! - +1 for every query token contained anywhere in the chunk
//! - +2 for every bonus term present in both query and chunk
//! - +3 when the whole query appears verbatim (queries of 6+ chars)
//!
//! A token counts once no matter how often it occurs in the chunk.

use std::collections::HashSet;

use crate::chunker::Chunk;

const MIN_TOKEN_CHARS: usize = 3;
const MIN_PHRASE_CHARS: usize = 6;
const BONUS_TERM_SCORE: u32 = 2;
const PHRASE_SCORE: u32 = 3;

/// A tokenized query, ready to score chunks against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Lowercased, trimmed query text
    pub phrase: String,
    /// Distinct query tokens in first-seen order
    pub tokens: Vec<String>,
}

impl Query {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.phrase.is_empty()
    }
}

/// Lowercase, keep `[a-z0-9]` runs, drop tokens shorter than three chars,
/// deduplicate and cap at `max_tokens`.
pub fn tokenize(query: &str, max_tokens: usize) -> Vec<String> {
    let cleaned: String = query
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();

    let mut seen = HashSet::new();
    cleaned
        .split_whitespace()
        .filter(|t| t.len() >= MIN_TOKEN_CHARS)
        .filter(|t| seen.insert(*t))
        .take(max_tokens)
        .map(String::from)
        .collect()
}

/// Scores chunks against queries.
#[derive(Debug, Clone)]
pub struct Scorer {
    bonus_terms: Vec<String>,
    phrase_bonus: bool,
    max_query_tokens: usize,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::from_config(&kazpa_config::KnowledgeConfig::default())
    }
}

impl Scorer {
    pub fn new(bonus_terms: Vec<String>, phrase_bonus: bool, max_query_tokens: usize) -> Self {
        Self {
            bonus_terms: bonus_terms.into_iter().map(|t| t.to_lowercase()).collect(),
            phrase_bonus,
            max_query_tokens,
        }
    }

    pub fn from_config(config: &kazpa_config::KnowledgeConfig) -> Self {
        Self::new(
            config.bonus_terms.clone(),
            config.phrase_bonus,
            config.max_query_tokens,
        )
    }

    pub fn query(&self, text: &str) -> Query {
        Query {
            phrase: text.trim().to_lowercase(),
            tokens: tokenize(text, self.max_query_tokens),
        }
    }

    /// Score already-lowercased chunk text.
    pub fn score_text(&self, query: &Query, lowered: &str) -> u32 {
        let mut score = query
            .tokens
            .iter()
            .filter(|t| lowered.contains(t.as_str()))
            .count() as u32;

        score += self
            .bonus_terms
            .iter()
            .filter(|b| query.tokens.contains(b) && lowered.contains(b.as_str()))
            .count() as u32
            * BONUS_TERM_SCORE;

        if self.phrase_bonus
            && query.phrase.chars().count() >= MIN_PHRASE_CHARS
            && lowered.contains(&query.phrase)
        {
            score += PHRASE_SCORE;
        }

        score
    }

    pub fn score(&self, query: &Query, chunk: &Chunk) -> u32 {
        self.score_text(query, chunk.lowered())
    }
}
