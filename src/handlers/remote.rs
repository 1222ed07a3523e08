//! Commands that inspect the remote through the cache repository.

use anyhow::Result;
use colored::Colorize;

use dashboard_git_sync::browser::RemoteBrowser;
use dashboard_git_sync::settings::Settings;
use dashboard_git_sync::sync::DashboardSync;

use super::{print_json, report};

fn resolve_target<'a>(
    settings: &'a Settings,
    url: Option<&'a str>,
    branch: Option<&'a str>,
) -> Option<(&'a str, &'a str)> {
    let url = url.or_else(|| settings.remote_url())?;
    let branch = branch.unwrap_or_else(|| settings.effective_branch());
    Some((url, branch))
}

pub fn handle_remote_list(
    settings: &Settings,
    url: Option<&str>,
    branch: Option<&str>,
    json: bool,
) -> Result<bool> {
    let Some((url, branch)) = resolve_target(settings, url, branch) else {
        eprintln!("{}", "No remote URL configured; pass --url or run config --remote-url".red());
        return Ok(false);
    };

    let browser = RemoteBrowser::from_settings(settings);
    let entries = match browser.list_remote_top_level_entries(settings, url, branch) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            return Ok(false);
        }
    };

    if json {
        print_json(&entries);
        return Ok(true);
    }

    println!("{} {} @ {}", "Remote dashboards".cyan().bold(), url, branch);
    if entries.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for entry in &entries {
        let when = entry
            .last_modified
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("  {:<32} {}", entry.name, when.dimmed());
    }
    Ok(true)
}

pub fn handle_download(
    settings: &Settings,
    names: &[String],
    url: Option<&str>,
    branch: Option<&str>,
    commit: bool,
    json: bool,
) -> Result<bool> {
    let Some((url, branch)) = resolve_target(settings, url, branch) else {
        eprintln!("{}", "No remote URL configured; pass --url or run config --remote-url".red());
        return Ok(false);
    };

    let sync = DashboardSync::from_settings(settings);
    let browser = RemoteBrowser::from_settings(settings);
    let copied = match browser.download(settings, url, branch, names, sync.repo_path()) {
        Ok(copied) => copied,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            return Ok(false);
        }
    };

    if !json {
        for name in &copied {
            println!("  {} {}", "Downloaded".green(), name);
        }
    }

    if !commit || copied.is_empty() {
        if json {
            print_json(&copied);
        }
        return Ok(true);
    }

    let outcome = sync.commit_all(&format!("Download {} from remote", copied.join(", ")));
    Ok(report("commit downloaded dashboards", &outcome, json))
}
