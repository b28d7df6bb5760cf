pub mod schema;

pub use schema::AssistantConfig;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Default assistant home directory (~/.homelab-assistant).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".homelab-assistant"))
        .unwrap_or_else(|| PathBuf::from(".homelab-assistant"))
}

/// Resolve a path that may start with `~`.
pub fn resolve_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<AssistantConfig> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {} as TOML", path.display()))
    } else {
        Ok(AssistantConfig::default())
    }
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &AssistantConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize assistant config")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_reports_the_target_path() {
        let dir = std::env::temp_dir().join(format!("homelab-assistant-ro-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        // A directory where the file should go makes the write fail
        let path = dir.join("assistant.toml");
        std::fs::create_dir_all(&path).unwrap();
        let err = save_config(&AssistantConfig::default(), &path).unwrap_err();
        assert!(err.to_string().contains("assistant.toml"), "{}", err);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("homelab-assistant-missing/none.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.model, AssistantConfig::default().model);
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("homelab-assistant-cfg-{}", std::process::id()));
        let path = dir.join("assistant.toml");
        let config = AssistantConfig {
            model: "mistral".into(),
            mcp_url: Some("http://10.0.0.5:3000/mcp".into()),
            ..Default::default()
        };
        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.model, "mistral");
        assert_eq!(loaded.mcp_url.as_deref(), Some("http://10.0.0.5:3000/mcp"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("homelab-assistant-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("assistant.toml");
        std::fs::write(&path, "model = [").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
        assert!(err.to_string().contains("assistant.toml"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
