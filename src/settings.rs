use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{BudgetError, Result};
use crate::models::AccountType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_category_cache")]
    pub category_cache: String,
    #[serde(default = "default_ask_tags")]
    pub ask_tags: bool,
    /// Account type key used when `import` gets no `--account`.
    #[serde(default)]
    pub default_account: Option<String>,
}

fn default_category_cache() -> String {
    config_dir().join("categories.json").to_string_lossy().to_string()
}

fn default_ask_tags() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            category_cache: default_category_cache(),
            ask_tags: default_ask_tags(),
            default_account: None,
        }
    }
}

impl Settings {
    pub fn category_cache_path(&self) -> PathBuf {
        PathBuf::from(shellexpand_path(&self.category_cache))
    }

    pub fn default_account(&self) -> Result<Option<AccountType>> {
        self.default_account.as_deref().map(str::parse).transpose()
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("budget")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    let Ok(content) = std::fs::read_to_string(&path) else {
        return Settings::default();
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!("ignoring unreadable settings {}: {e}", path.display());
        Settings::default()
    })
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| BudgetError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
