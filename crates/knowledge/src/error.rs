use thiserror::Error;

/// Errors raised while turning configuration into retrieval settings.
///
/// Disk problems are never errors here: unreadable files and missing
/// directories degrade to "no knowledge".
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Unknown chunk strategy: {0} (expected 'paragraph' or 'sliding_window')")]
    UnknownStrategy(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),
}
