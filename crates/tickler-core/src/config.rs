use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tracing::{debug, info, warn};

const CONFIG_ENV_VAR: &str = "TICKLER_CONFIG";
const DATA_ENV_VAR: &str = "TICKLER_DATA";

/// `tickler.toml`. Every key is optional; the timezone key is also read
/// separately by the datetime module during zone resolution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub data: Option<String>,
    pub timezone: Option<String>,
    pub color: Option<bool>,
}

impl Config {
    #[tracing::instrument(skip(override_path))]
    pub fn load(override_path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = resolve_config_path(override_path) else {
            warn!("no config file found; using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            debug!(config = %path.display(), "config file not found; using defaults");
            return Ok(Self::default());
        }

        info!(config = %path.display(), "loading config");
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(cfg)
    }
}

/// The config file path without checking existence: explicit override,
/// `TICKLER_CONFIG`, then `~/.config/tickler/tickler.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    resolve_config_path(None)
}

fn resolve_config_path(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    if let Ok(raw) = std::env::var(CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(expand_tilde(Path::new(trimmed)));
        }
    }

    dirs::config_dir().map(|dir| dir.join("tickler").join("tickler.toml"))
}

#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(path) = override_dir {
        path.to_path_buf()
    } else if let Ok(env_dir) = std::env::var(DATA_ENV_VAR)
        && !env_dir.trim().is_empty()
    {
        expand_tilde(Path::new(env_dir.trim()))
    } else if let Some(cfg_value) = &cfg.data {
        expand_tilde(Path::new(cfg_value))
    } else {
        default_data_dir()?
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".tickler"))
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}
