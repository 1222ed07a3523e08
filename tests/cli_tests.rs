//! Binary smoke tests. Each run gets its own config directory.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run(config_home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dashboard-git-sync"))
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("DASHBOARD_SYNC_GIT_USERNAME")
        .env_remove("DASHBOARD_SYNC_GIT_TOKEN")
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run binary")
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
#[cfg(target_os = "linux")]
fn test_config_saves_and_redacts_token() {
    let temp = TempDir::new().unwrap();
    let dashboards = temp.path().join("dashboards");

    let saved = run(
        temp.path(),
        &[
            "config",
            "--remote-url",
            "https://example.com/team/dashboards.git",
            "--dashboards-path",
            dashboards.to_str().unwrap(),
            "--token",
            "super-secret",
            "--select",
            "dash-a,dash-b",
        ],
    );
    assert!(saved.status.success());

    let shown = run(temp.path(), &["--json", "config", "--show"]);
    assert!(shown.status.success());
    let value = json(&shown);
    assert_eq!(value["remote_url"], "https://example.com/team/dashboards.git");
    assert_eq!(value["git_token"], "***");
    assert_eq!(value["selected_dashboards"][1], "dash-b");
    assert!(!String::from_utf8_lossy(&shown.stdout).contains("super-secret"));
}

#[test]
#[cfg(target_os = "linux")]
fn test_init_then_status() {
    let temp = TempDir::new().unwrap();
    let dashboards = temp.path().join("dashboards");
    let path = dashboards.to_str().unwrap();

    assert!(run(temp.path(), &["config", "--dashboards-path", path]).status.success());

    let init = run(temp.path(), &["--json", "init"]);
    assert!(init.status.success(), "{}", String::from_utf8_lossy(&init.stdout));
    let steps = json(&init);
    assert_eq!(steps[0]["step"], "init");

    std::fs::create_dir_all(dashboards.join("dash-a")).unwrap();
    let status = run(temp.path(), &["--json", "status"]);
    assert!(status.status.success());
    let value = json(&status);
    assert_eq!(value["is_repository"], true);
    assert_eq!(value["dashboards"][0]["name"], "dash-a");
}

#[test]
#[cfg(target_os = "linux")]
fn test_push_without_remote_exits_nonzero() {
    let temp = TempDir::new().unwrap();
    let dashboards = temp.path().join("dashboards");
    let path = dashboards.to_str().unwrap();

    assert!(run(temp.path(), &["config", "--dashboards-path", path]).status.success());
    assert!(run(temp.path(), &["init"]).status.success());

    let push = run(temp.path(), &["--json", "push"]);
    assert!(!push.status.success());
    let value = json(&push);
    assert_eq!(value["success"], false);
    assert_eq!(value["error_kind"], "RemoteNotFound");
}
