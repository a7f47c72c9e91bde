use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::ChaosConfig;

pub const CONFIG_FILE_NAME: &str = "chaosforge.toml";

/// `chaosforge.toml` in the platform configuration directory
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "chaosforge", "chaosforge")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Pick the configuration file: an explicit path (which must exist), then
/// `./chaosforge.toml`, then the platform config directory
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(anyhow!("Config file not found: {}", path.display()));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Ok(Some(local));
    }
    Ok(default_config_path().filter(|path| path.is_file()))
}

/// Load, apply environment overrides and validate
pub async fn load_config(explicit: Option<&Path>) -> Result<ChaosConfig> {
    let mut config = match resolve_config_path(explicit)? {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str::<ChaosConfig>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => {
            debug!("No configuration file found, using defaults");
            ChaosConfig::default()
        }
    };

    config.merge_env_vars()?;
    config.validate()?;
    Ok(config)
}
