//! Text chunking.
//!
//! Two strategies are supported and selected by configuration:
//!
//! - **Paragraph** (default): greedy accumulation of blank-line separated
//!   paragraphs up to `max_chars`, with a hard split for anything longer
//!   than `1.5 × max_chars`.
//! - **Sliding window**: fixed-size windows with overlap, capped per file.
//!
//! All lengths are counted in `char`s.

use serde::Serialize;

use crate::error::KnowledgeError;

const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// A retrievable span of a knowledge file.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    /// `<relative path>#<1-based ordinal>`
    pub id: String,
    /// Relative path of the source file
    pub file: String,
    /// Chunk text
    pub text: String,
    #[serde(skip)]
    lowered: String,
}

impl Chunk {
    pub fn new(file: &str, ordinal: usize, text: String) -> Self {
        Self {
            id: format!("{file}#{ordinal}"),
            file: file.to_string(),
            lowered: text.to_lowercase(),
            text,
        }
    }

    /// Lowercased text, precomputed for scoring.
    pub fn lowered(&self) -> &str {
        &self.lowered
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// How file text is cut into chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStrategy {
    Paragraph {
        max_chars: usize,
    },
    SlidingWindow {
        window_chars: usize,
        overlap_chars: usize,
        max_chunks: usize,
    },
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        Self::Paragraph { max_chars: 1200 }
    }
}

impl ChunkStrategy {
    /// Build a strategy from its configuration name.
    pub fn from_config(config: &kazpa_config::KnowledgeConfig) -> Result<Self, KnowledgeError> {
        match config.strategy.as_str() {
            "paragraph" => {
                if config.max_chunk_chars == 0 {
                    return Err(KnowledgeError::InvalidChunkSize(
                        "max_chunk_chars must be > 0".into(),
                    ));
                }
                Ok(Self::Paragraph {
                    max_chars: config.max_chunk_chars,
                })
            }
            "sliding_window" => {
                if config.window_chars == 0 || config.window_overlap >= config.window_chars {
                    return Err(KnowledgeError::InvalidChunkSize(format!(
                        "window_overlap ({}) must be smaller than window_chars ({})",
                        config.window_overlap, config.window_chars
                    )));
                }
                if config.max_chunks_per_file == 0 {
                    return Err(KnowledgeError::InvalidChunkSize(
                        "max_chunks_per_file must be > 0".into(),
                    ));
                }
                Ok(Self::SlidingWindow {
                    window_chars: config.window_chars,
                    overlap_chars: config.window_overlap,
                    max_chunks: config.max_chunks_per_file,
                })
            }
            other => Err(KnowledgeError::UnknownStrategy(other.to_string())),
        }
    }

    /// Split `text` into chunk bodies. Empty or blank input yields none.
    pub fn split(&self, text: &str) -> Vec<String> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Vec::new();
        }
        match *self {
            Self::Paragraph { max_chars } => split_paragraphs(&normalized, max_chars),
            Self::SlidingWindow {
                window_chars,
                overlap_chars,
                max_chunks,
            } => split_windows(&normalized, window_chars, overlap_chars, max_chunks),
        }
    }

    /// Chunk a whole file into identified [`Chunk`]s.
    pub fn chunk_file(&self, file: &str, text: &str) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(i, body)| Chunk::new(file, i + 1, body))
            .collect()
    }
}

/// Normalize line endings, strip trailing blanks per line, collapse runs of
/// blank lines to a single blank line and trim the result.
pub fn normalize_text(text: &str) -> String {
    let unix = text.replace("\r\n", "\n");
    let mut out = String::with_capacity(unix.len());
    let mut blank_run = 0usize;

    for line in unix.split('\n').map(|l| l.trim_end_matches([' ', '\t'])) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim().to_string()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let separator_len = char_len(PARAGRAPH_SEPARATOR);
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;

    for para in text.split(PARAGRAPH_SEPARATOR).filter(|p| !p.is_empty()) {
        let para_len = char_len(para);
        if buf.is_empty() {
            buf.push_str(para);
            buf_len = para_len;
        } else if buf_len + separator_len + para_len <= max_chars {
            buf.push_str(PARAGRAPH_SEPARATOR);
            buf.push_str(para);
            buf_len += separator_len + para_len;
        } else {
            chunks.push(std::mem::take(&mut buf));
            buf.push_str(para);
            buf_len = para_len;
        }
    }
    if !buf.is_empty() {
        chunks.push(buf);
    }

    // Oversized paragraphs are tolerated up to 1.5x before a hard split.
    let tolerance = max_chars + max_chars / 2;
    chunks
        .into_iter()
        .flat_map(|chunk| {
            if char_len(&chunk) <= tolerance {
                vec![chunk]
            } else {
                hard_split(&chunk, max_chars)
            }
        })
        .collect()
}

fn hard_split(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|piece| piece.iter().collect()).collect()
}

fn split_windows(text: &str, window: usize, overlap: usize, max_chunks: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = window.saturating_sub(overlap).max(1);
    let mut out = Vec::new();
    let mut start = 0usize;

    while start < chars.len() && out.len() < max_chunks {
        let end = (start + window).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    out
}
