//! `config` command: show or edit the settings file.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use dashboard_git_sync::config::ConfigManager;
use dashboard_git_sync::scm::BackendKind;
use dashboard_git_sync::settings::Settings;

use super::print_json;

/// Field updates requested on the command line; `None` leaves a field alone.
#[derive(Debug, Default)]
pub struct SettingsUpdate {
    pub remote_url: Option<String>,
    pub branch: Option<String>,
    pub dashboards_path: Option<PathBuf>,
    pub select: Option<Vec<String>>,
    pub clear_selection: bool,
    pub username: Option<String>,
    pub token: Option<String>,
    pub backend: Option<BackendKind>,
    pub auto_pull: Option<bool>,
    pub timeout_secs: Option<u64>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.remote_url.is_none()
            && self.branch.is_none()
            && self.dashboards_path.is_none()
            && self.select.is_none()
            && !self.clear_selection
            && self.username.is_none()
            && self.token.is_none()
            && self.backend.is_none()
            && self.auto_pull.is_none()
            && self.timeout_secs.is_none()
    }

    fn apply(self, settings: &mut Settings) {
        if let Some(url) = self.remote_url {
            settings.remote_url = url;
        }
        if let Some(branch) = self.branch {
            settings.branch = branch;
        }
        if let Some(path) = self.dashboards_path {
            settings.dashboards_path = Some(path);
        }
        if self.clear_selection {
            settings.selected_dashboards.clear();
        }
        if let Some(names) = self.select {
            settings.selected_dashboards = names;
        }
        if let Some(user) = self.username {
            settings.git_username = user;
        }
        if let Some(token) = self.token {
            settings.git_token = token;
        }
        if let Some(kind) = self.backend {
            settings.backend = kind;
        }
        if let Some(flag) = self.auto_pull {
            settings.auto_pull_on_start = flag;
        }
        if let Some(secs) = self.timeout_secs {
            settings.network_timeout_secs = secs;
        }
    }
}

pub fn handle_config(settings: Settings, update: SettingsUpdate, show: bool, json: bool) -> Result<bool> {
    if show || update.is_empty() {
        show_settings(&settings, json);
        return Ok(true);
    }

    let mut settings = settings;
    update.apply(&mut settings);
    settings.save().context("Failed to save settings")?;

    if json {
        print_json(&redacted(&settings));
    } else {
        println!("{}", "Settings saved".green().bold());
        println!("  {}", ConfigManager::settings_path()?.display());
    }
    Ok(true)
}

fn redacted(settings: &Settings) -> Settings {
    let mut copy = settings.clone();
    if !copy.git_token.is_empty() {
        copy.git_token = "***".to_string();
    }
    copy
}

fn show_settings(settings: &Settings, json: bool) {
    if json {
        print_json(&redacted(settings));
        return;
    }

    println!("{}", "Settings:".bold());
    println!(
        "  Remote URL: {}",
        settings.remote_url().unwrap_or("(not set)").cyan()
    );
    println!("  Branch: {}", settings.effective_branch().cyan());
    println!(
        "  Dashboards path: {}",
        settings.effective_dashboards_path().display()
    );
    let selection = settings.selection();
    if selection.is_empty() {
        println!("  Selected dashboards: {}", "(all)".dimmed());
    } else {
        println!("  Selected dashboards: {}", selection.join(", "));
    }
    println!("  Auto-pull on start: {}", settings.auto_pull_on_start);
    println!("  Backend: {}", settings.backend.name());
    println!("  Network timeout: {}s", settings.network_timeout().as_secs());
    println!(
        "  Git username: {}",
        if settings.git_username.is_empty() {
            "(not set)"
        } else {
            settings.git_username.as_str()
        }
    );
    println!(
        "  Git token: {}",
        if settings.git_token.is_empty() {
            "(not set)".to_string()
        } else {
            format!("({} chars)", settings.git_token.len())
        }
    );
}
