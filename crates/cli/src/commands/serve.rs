//! `kazpagpt serve`: start the HTTP chat server.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("💬 kazpaGPT server");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.model);
    println!("   Knowledge: {}", config.knowledge.dir.display());
    if !config.has_api_key() {
        println!("   ⚠️  No API key set; chat requests will fail until OPENAI_API_KEY is set");
    }

    kazpa_gateway::start(config).await?;

    Ok(())
}
