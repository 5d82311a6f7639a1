//! Hearth Configuration
//!
//! Loads and saves the host configuration from `~/.hearth/hearth.json`.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::types::{default_config, HostConfig};

/// Config file name within the hearth directory.
const CONFIG_FILENAME: &str = "hearth.json";

/// Returns the hearth data directory: `~/.hearth`.
pub fn get_hearth_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/root"))
        .join(".hearth")
}

/// Returns the full path to the config file: `~/.hearth/hearth.json`.
pub fn get_config_path() -> PathBuf {
    get_hearth_dir().join(CONFIG_FILENAME)
}

/// Load the host config from disk, merging missing fields with defaults.
///
/// Returns `None` if the config file does not exist or cannot be parsed.
pub fn load_config() -> Option<HostConfig> {
    let config_path = get_config_path();
    if !config_path.exists() {
        return None;
    }

    let contents = fs::read_to_string(&config_path).ok()?;
    let mut config: HostConfig = serde_json::from_str(&contents).ok()?;

    // Merge defaults for unset fields
    let defaults = default_config();

    if config.model_path.is_empty() {
        config.model_path = defaults.model_path;
    }
    if config.system_prompt.is_empty() {
        config.system_prompt = defaults.system_prompt;
    }
    if config.max_length == 0 {
        config.max_length = defaults.max_length;
    }

    Some(config)
}

/// Save the host config to disk at `~/.hearth/hearth.json`, creating the
/// directory if needed.
pub fn save_config(config: &HostConfig) -> Result<()> {
    let dir = get_hearth_dir();
    if !dir.exists() {
        fs::create_dir_all(&dir).context("Failed to create hearth directory")?;
    }

    let config_path = get_config_path();
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(&config_path, &json).context("Failed to write config file")?;

    Ok(())
}

/// Resolve a path that may start with `~` to an absolute path.
pub fn resolve_path(p: &str) -> String {
    if let Some(rest) = p.strip_prefix('~') {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        home.join(rest).to_string_lossy().to_string()
    } else {
        p.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path_with_tilde() {
        let resolved = resolve_path("~/some/path");
        assert!(!resolved.starts_with('~'));
        assert!(resolved.ends_with("some/path"));
    }

    #[test]
    fn test_resolve_path_without_tilde() {
        let path = "/absolute/path/to/file";
        assert_eq!(resolve_path(path), path);
    }

    #[test]
    fn test_config_path_is_under_hearth_dir() {
        let path = get_config_path();
        assert!(path.ends_with(".hearth/hearth.json"));
    }
}
