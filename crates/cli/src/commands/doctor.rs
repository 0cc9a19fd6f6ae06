//! `kazpagpt doctor`: diagnose configuration and knowledge.

use kazpa_config::AppConfig;
use kazpa_knowledge::{KnowledgeCache, KnowledgeSettings};
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 kazpaGPT Doctor: System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let path = super::config_path(config_path);
    if path.exists() {
        println!("  ✅ Config file found: {}", path.display());
    } else {
        println!("  ⚠️  No config file at {}; using defaults (run `kazpagpt init`)", path.display());
    }

    let config = match AppConfig::load_with_env(&path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config file and re-run.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured");
    } else {
        println!("  ❌ No API key: set OPENAI_API_KEY or [provider].api_key");
        issues += 1;
    }

    match kazpa_providers::build_from_config(&config) {
        Ok(Some(provider)) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider reachable: {}", config.provider.base_url),
            Ok(false) => {
                println!(
                    "  ❌ Provider at {} rejected the request (check the API key)",
                    config.provider.base_url
                );
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider unreachable: {e}");
                issues += 1;
            }
        },
        Ok(None) => {}
        Err(e) => {
            println!("  ❌ Provider setup failed: {e}");
            issues += 1;
        }
    }

    let knowledge_dir = &config.knowledge.dir;
    if knowledge_dir.is_dir() {
        println!("  ✅ Knowledge directory: {}", knowledge_dir.display());
    } else {
        println!("  ⚠️  Knowledge directory missing: {}", knowledge_dir.display());
        issues += 1;
    }

    let settings = KnowledgeSettings::from_config(&config.knowledge)?;
    let cache = KnowledgeCache::new(settings);
    let snapshot = tokio::task::spawn_blocking(move || cache.snapshot()).await?;

    if snapshot.file_count > 0 {
        println!(
            "  ✅ {} knowledge file(s), {} chunk(s) ({} strategy)",
            snapshot.file_count,
            snapshot.chunks.len(),
            config.knowledge.strategy
        );
    } else {
        println!("  ⚠️  No knowledge files found; replies will use canon and rules only");
        issues += 1;
    }

    let canon = &snapshot.canon;
    if canon.loaded_files.is_empty() {
        println!(
            "  ⚠️  No canon files in {}",
            config.knowledge.resolved_canon_dir().display()
        );
        issues += 1;
    } else {
        println!("  ✅ Canon: {}", canon.loaded_files.join(", "));
        for missing in &canon.missing {
            println!("  ⚠️  Canon file missing or empty: {missing}");
        }
    }

    if let Some(rules) = &config.assistant.rules_file {
        if rules.is_file() {
            println!("  ✅ Rules file: {}", rules.display());
        } else {
            println!("  ❌ Rules file not found: {}", rules.display());
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
