//! `kazpagpt init`: write a default config file.

use kazpa_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(config_path);

    println!("💬 kazpaGPT: setup");
    println!("==================\n");

    if path.exists() && !force {
        println!("⚠️  Config already exists at: {}", path.display());
        println!("   Edit it manually or re-run with --force.\n");
        return Ok(());
    }

    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }

    std::fs::write(&path, AppConfig::default_toml())?;
    println!("✅ Created config at: {}", path.display());
    println!("\n📝 Next steps:");
    println!("   1. export OPENAI_API_KEY=sk-...");
    println!("   2. Put your .md/.txt files under ./knowledge (canon files in ./knowledge/canon)");
    println!("   3. Run: kazpagpt serve\n");

    Ok(())
}
