use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fetch::TransferOptions;

pub const DEFAULT_CONCURRENCY: usize = 2;
pub const DEFAULT_HISTORY_COMMAND: &str = "slack-history-export";
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Global configuration loaded from `~/.config/sma/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmaConfig {
    /// Number of attachments fetched at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Package the archive as `{name}.zip` instead of a folder.
    #[serde(default)]
    pub zip: bool,
    /// Send log output to stderr instead of the log file.
    #[serde(default)]
    pub log_to_console: bool,
    /// Program that exports channel history as JSON.
    #[serde(default = "default_history_command")]
    pub history_command: String,
    /// Web API base used for `users.list`.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Output directory; the current directory when unset.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Custom stylesheet copied into the archive instead of the bundled one.
    #[serde(default)]
    pub xsl: Option<PathBuf>,
    #[serde(default)]
    pub transfer: TransferOptions,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_history_command() -> String {
    DEFAULT_HISTORY_COMMAND.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for SmaConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            zip: false,
            log_to_console: false,
            history_command: default_history_command(),
            api_base: default_api_base(),
            output_dir: None,
            xsl: None,
            transfer: TransferOptions::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sma")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SmaConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<SmaConfig> {
    if !path.exists() {
        let default_cfg = SmaConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: SmaConfig =
        toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(cfg)
}
