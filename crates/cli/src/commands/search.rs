//! `kazpagpt search`: show what retrieval picks for a query.

use kazpa_knowledge::{KnowledgeCache, KnowledgeSettings, Retriever};
use std::path::Path;

const PREVIEW_CHARS: usize = 160;

pub async fn run(config_path: Option<&Path>, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let settings = KnowledgeSettings::from_config(&config.knowledge)?;
    let cache = KnowledgeCache::new(settings);
    let snapshot = tokio::task::spawn_blocking(move || cache.snapshot()).await?;

    let retriever = Retriever::from_config(&config.knowledge);
    let selected = retriever.retrieve(&snapshot.chunks, query);

    println!(
        "🔎 {} file(s), {} chunk(s) in {}",
        snapshot.file_count,
        snapshot.chunks.len(),
        config.knowledge.dir.display()
    );

    if selected.is_empty() {
        println!("   {}", kazpa_knowledge::NO_KNOWLEDGE_PLACEHOLDER);
        return Ok(());
    }

    let limits = retriever.limits();
    let used: usize = selected.iter().map(|s| s.chunk.char_len()).sum();
    println!(
        "   {} selected (max {}), {} / {} chars\n",
        selected.len(),
        limits.max_snippets,
        used,
        limits.char_budget
    );

    for (i, scored) in selected.iter().enumerate() {
        let preview: String = scored
            .chunk
            .text
            .chars()
            .take(PREVIEW_CHARS)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        println!("  K{}  score {:>3}  {}", i + 1, scored.score, scored.chunk.id);
        println!("       {preview}");
    }

    Ok(())
}
