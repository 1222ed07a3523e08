use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ConfigManager;
use crate::scm::BackendKind;

/// Branch used when the settings leave the branch blank.
pub const DEFAULT_BRANCH: &str = "main";

/// Remote name every operation in the host talks to.
pub const DEFAULT_REMOTE: &str = "origin";

const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 60;

/// Host settings record.
///
/// Loaded fresh by the host before each operation and handed to the engine by
/// reference, so edits take effect on the next call without any shared state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// URL of the shared origin repository
    pub remote_url: String,

    /// Branch to publish to and pull from (blank means [`DEFAULT_BRANCH`])
    pub branch: String,

    /// Pull from origin whenever settings are applied at startup
    pub auto_pull_on_start: bool,

    /// Root directory holding one sub-directory per dashboard
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboards_path: Option<PathBuf>,

    /// Dashboards to commit; empty means everything
    pub selected_dashboards: Vec<String>,

    pub git_username: String,

    pub git_token: String,

    /// Repository backend to drive
    pub backend: BackendKind,

    /// Wall-clock limit for network operations of the subprocess backend
    pub network_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            remote_url: String::new(),
            branch: DEFAULT_BRANCH.to_string(),
            auto_pull_on_start: false,
            dashboards_path: None,
            selected_dashboards: Vec::new(),
            git_username: String::new(),
            git_token: String::new(),
            backend: BackendKind::default(),
            network_timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Load settings from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&ConfigManager::settings_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let settings: Settings =
            toml::from_str(&content).context("Failed to parse settings file")?;

        Ok(settings)
    }

    /// Save settings to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&ConfigManager::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;

        Ok(())
    }

    pub fn effective_branch(&self) -> &str {
        let branch = self.branch.trim();
        if branch.is_empty() {
            DEFAULT_BRANCH
        } else {
            branch
        }
    }

    pub fn effective_dashboards_path(&self) -> PathBuf {
        match &self.dashboards_path {
            Some(path) if !path.as_os_str().is_empty() => path.clone(),
            _ => ConfigManager::default_dashboards_dir(),
        }
    }

    pub fn remote_url(&self) -> Option<&str> {
        let url = self.remote_url.trim();
        (!url.is_empty()).then_some(url)
    }

    /// Selected dashboard names with blanks dropped.
    pub fn selection(&self) -> Vec<String> {
        self.selected_dashboards
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs.max(1))
    }
}
