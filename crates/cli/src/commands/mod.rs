pub mod ask;
pub mod doctor;
pub mod init;
pub mod search;
pub mod serve;

use kazpa_config::AppConfig;
use std::path::{Path, PathBuf};

/// The config file in use: `--config` if given, else the default location.
pub fn config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load config plus environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load_with_env(&config_path(path))
        .map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}
