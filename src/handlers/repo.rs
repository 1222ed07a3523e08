//! Commands that act on the local dashboards repository.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;

use dashboard_git_sync::scm::url;
use dashboard_git_sync::settings::{Settings, DEFAULT_REMOTE};
use dashboard_git_sync::sync::DashboardSync;

use super::{print_json, report};

pub fn handle_init(settings: &Settings, json: bool) -> Result<bool> {
    let sync = DashboardSync::from_settings(settings);
    if !json {
        println!(
            "{} {}",
            "Preparing dashboards repository at".cyan().bold(),
            sync.repo_path().display()
        );
    }

    let apply = sync.apply_settings(settings);
    if json {
        print_json(&apply.steps());
    } else {
        report("init", &apply.initialized, false);
        if let Some(outcome) = &apply.remote {
            report(&format!("set {DEFAULT_REMOTE}"), outcome, false);
        }
        if let Some(outcome) = &apply.branch {
            report(&format!("checkout {}", settings.effective_branch()), outcome, false);
        }
        if let Some(outcome) = &apply.pull {
            report("auto-pull", outcome, false);
        }
    }
    Ok(apply.is_success())
}

pub fn handle_checkout(settings: &Settings, branch: &str, json: bool) -> Result<bool> {
    let sync = DashboardSync::from_settings(settings);
    let outcome = sync.checkout_or_create_branch(branch);
    Ok(report(&format!("checkout {branch}"), &outcome, json))
}

pub fn handle_commit(
    settings: &Settings,
    message: Option<&str>,
    all: bool,
    json: bool,
) -> Result<bool> {
    let sync = DashboardSync::from_settings(settings);
    let outcome = if all {
        let message = message
            .map(str::to_string)
            .unwrap_or_else(dashboard_git_sync::sync::default_commit_message);
        sync.commit_all(&message)
    } else {
        sync.commit_from_settings(settings, message)
    };
    Ok(report("commit", &outcome, json))
}

pub fn handle_pull(settings: &Settings, json: bool) -> Result<bool> {
    let sync = DashboardSync::from_settings(settings);
    let branch = settings.effective_branch();
    let outcome = sync.pull(settings, DEFAULT_REMOTE, branch);
    Ok(report(&format!("pull {DEFAULT_REMOTE}/{branch}"), &outcome, json))
}

pub fn handle_push(settings: &Settings, json: bool) -> Result<bool> {
    let sync = DashboardSync::from_settings(settings);
    let branch = settings.effective_branch();
    let outcome = sync.push(settings, DEFAULT_REMOTE, branch);
    Ok(report(&format!("push {DEFAULT_REMOTE}/{branch}"), &outcome, json))
}

/// Identifier used when `tag` is run without `--id`.
pub fn auto_tag_id() -> String {
    Utc::now().format("%Y.%m.%d.%H%M%S").to_string()
}

pub fn handle_tag(settings: &Settings, prefix: &str, id: Option<&str>, json: bool) -> Result<bool> {
    let sync = DashboardSync::from_settings(settings);
    let id = id.map(str::to_string).unwrap_or_else(auto_tag_id);
    let outcome = sync.create_tag_and_push(settings, DEFAULT_REMOTE, prefix, &id);
    Ok(report("tag", &outcome, json))
}

pub fn handle_status(settings: &Settings, json: bool) -> Result<bool> {
    let sync = DashboardSync::from_settings(settings);
    let status = match sync.status() {
        Ok(status) => status,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            return Ok(false);
        }
    };

    if json {
        print_json(&status);
        return Ok(true);
    }

    println!("{}", "=== Dashboard Sync Status ===".bold().cyan());
    println!();
    println!("{}", "Repository:".bold());
    println!("  Path: {}", status.path.display());
    println!("  Backend: {}", status.backend.name());
    println!(
        "  Initialized: {}",
        if status.is_repository {
            "Yes".green()
        } else {
            "No".yellow()
        }
    );
    println!("  Branch: {}", settings.effective_branch().cyan());
    if let Some(head) = &status.head {
        println!("  HEAD: {}", &head[..head.len().min(8)]);
    }
    match (&status.remote_url, &status.web_url) {
        (Some(remote), Some(web)) => {
            println!("  Remote: {}", remote.cyan());
            println!("  Web: {}", web);
        }
        _ => match settings.remote_url() {
            Some(configured) => println!(
                "  Remote: {} ({})",
                url::redact(configured),
                "not applied; run init".yellow()
            ),
            None => println!("  Remote: {}", "Not configured".yellow()),
        },
    }

    println!();
    println!("{}", "Dashboards:".bold());
    if status.dashboards.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    let selection = settings.selection();
    for dashboard in &status.dashboards {
        let marker = if selection.contains(&dashboard.name) {
            "*".green()
        } else {
            " ".normal()
        };
        let modified = dashboard
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("  {} {:<32} {}", marker, dashboard.name, modified.dimmed());
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_tag_id_shape() {
        let id = auto_tag_id();
        let parts: Vec<&str> = id.split('.').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].len(), 4);
        assert_eq!(parts[3].len(), 6);
    }
}
