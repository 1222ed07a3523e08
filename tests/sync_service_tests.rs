//! End-to-end Sync Service tests against local bare remotes.
//!
//! Each test runs once per backend. The `git` command-line cases are skipped
//! when no usable `git` executable is installed.

use dashboard_git_sync::error::{Completed, SyncError, SyncOutcome};
use dashboard_git_sync::scm::{self, BackendKind};
use dashboard_git_sync::settings::{Settings, DEFAULT_REMOTE};
use dashboard_git_sync::sync::DashboardSync;
use rstest::rstest;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const BRANCH: &str = "main";

fn available(kind: BackendKind) -> bool {
    scm::open_backend(kind, Path::new("."), Duration::from_secs(5))
        .probe()
        .is_ok()
}

fn bare_remote(root: &Path) -> String {
    let path = root.join("remote.git");
    git2::Repository::init_bare(&path).unwrap();
    path.to_string_lossy().to_string()
}

struct Workspace {
    settings: Settings,
    sync: DashboardSync,
}

impl Workspace {
    fn new(root: &Path, name: &str, remote: &str, kind: BackendKind, auto_pull: bool) -> Self {
        let settings = Settings {
            remote_url: remote.to_string(),
            dashboards_path: Some(root.join(name)),
            auto_pull_on_start: auto_pull,
            backend: kind,
            network_timeout_secs: 30,
            ..Settings::default()
        };
        let sync = DashboardSync::from_settings(&settings);
        let report = sync.apply_settings(&settings);
        assert!(report.is_success(), "{report:?}");
        Workspace { settings, sync }
    }

    fn write(&self, rel: &str, contents: &str) {
        let path = self.sync.repo_path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn read(&self, rel: &str) -> Option<String> {
        fs::read_to_string(self.sync.repo_path().join(rel)).ok()
    }

    fn commit_and_push(&self, message: &str) -> SyncOutcome {
        let committed = self.sync.commit_all(message);
        assert!(committed.is_success(), "{committed}");
        self.push()
    }

    fn push(&self) -> SyncOutcome {
        self.sync.push(&self.settings, DEFAULT_REMOTE, BRANCH)
    }

    fn pull(&self) -> SyncOutcome {
        self.sync.pull(&self.settings, DEFAULT_REMOTE, BRANCH)
    }
}

fn head_id(workspace: &Workspace) -> git2::Oid {
    git2::Repository::open(workspace.sync.repo_path())
        .unwrap()
        .refname_to_id("HEAD")
        .unwrap()
}

fn remote_tip(remote: &str) -> git2::Oid {
    git2::Repository::open_bare(remote)
        .unwrap()
        .refname_to_id("refs/heads/main")
        .unwrap()
}

fn remote_has_ref(remote: &str, name: &str) -> bool {
    git2::Repository::open_bare(remote)
        .unwrap()
        .find_reference(name)
        .is_ok()
}

#[rstest]
#[case::libgit2(BackendKind::LibGit2)]
#[case::cli(BackendKind::Cli)]
fn test_push_then_auto_pull_into_fresh_workspace(#[case] kind: BackendKind) {
    if !available(kind) {
        eprintln!("Skipping: {kind:?} not available");
        return;
    }
    let temp = TempDir::new().unwrap();
    let remote = bare_remote(temp.path());

    let alice = Workspace::new(temp.path(), "alice", &remote, kind, false);
    alice.write("dash-a/layout.json", "{\"v\":1}");
    let pushed = alice.commit_and_push("add dash-a");
    assert_eq!(pushed.completed(), Some(&Completed::Done), "{pushed}");
    assert!(remote_has_ref(&remote, "refs/heads/main"));

    let bob = Workspace::new(temp.path(), "bob", &remote, kind, true);
    assert_eq!(bob.read("dash-a/layout.json").as_deref(), Some("{\"v\":1}"));
}

#[rstest]
#[case::libgit2(BackendKind::LibGit2)]
#[case::cli(BackendKind::Cli)]
fn test_pull_fast_forwards(#[case] kind: BackendKind) {
    if !available(kind) {
        eprintln!("Skipping: {kind:?} not available");
        return;
    }
    let temp = TempDir::new().unwrap();
    let remote = bare_remote(temp.path());

    let alice = Workspace::new(temp.path(), "alice", &remote, kind, false);
    alice.write("dash-a/layout.json", "one");
    assert!(alice.commit_and_push("first").is_success());

    let bob = Workspace::new(temp.path(), "bob", &remote, kind, true);
    assert_eq!(bob.pull().completed(), Some(&Completed::UpToDate));

    alice.write("dash-a/layout.json", "two");
    assert!(alice.commit_and_push("second").is_success());

    let pulled = bob.pull();
    assert_eq!(pulled.completed(), Some(&Completed::FastForwarded), "{pulled}");
    assert_eq!(bob.read("dash-a/layout.json").as_deref(), Some("two"));
}

#[rstest]
#[case::libgit2(BackendKind::LibGit2)]
#[case::cli(BackendKind::Cli)]
fn test_push_retries_after_remote_moved(#[case] kind: BackendKind) {
    if !available(kind) {
        eprintln!("Skipping: {kind:?} not available");
        return;
    }
    let temp = TempDir::new().unwrap();
    let remote = bare_remote(temp.path());

    let alice = Workspace::new(temp.path(), "alice", &remote, kind, false);
    alice.write("dash-a/layout.json", "base");
    assert!(alice.commit_and_push("base").is_success());
    let bob = Workspace::new(temp.path(), "bob", &remote, kind, true);

    alice.write("dash-a/layout.json", "alice");
    assert!(alice.commit_and_push("alice edit").is_success());

    // Disjoint change: the automatic pull merges cleanly and the retry lands.
    bob.write("dash-b/layout.json", "bob");
    let pushed = bob.commit_and_push("bob edit");
    assert_eq!(pushed.completed(), Some(&Completed::Done), "{pushed}");
    assert_eq!(bob.read("dash-a/layout.json").as_deref(), Some("alice"));

    assert!(alice.pull().is_success());
    assert_eq!(alice.read("dash-b/layout.json").as_deref(), Some("bob"));
}

#[rstest]
#[case::libgit2(BackendKind::LibGit2)]
#[case::cli(BackendKind::Cli)]
fn test_conflicting_push_requires_manual_resolution(#[case] kind: BackendKind) {
    if !available(kind) {
        eprintln!("Skipping: {kind:?} not available");
        return;
    }
    let temp = TempDir::new().unwrap();
    let remote = bare_remote(temp.path());

    let alice = Workspace::new(temp.path(), "alice", &remote, kind, false);
    alice.write("dash-a/layout.json", "base\n");
    assert!(alice.commit_and_push("base").is_success());
    let bob = Workspace::new(temp.path(), "bob", &remote, kind, true);

    alice.write("dash-a/layout.json", "alice\n");
    assert!(alice.commit_and_push("alice edit").is_success());

    bob.write("dash-a/layout.json", "bob\n");
    assert!(bob.sync.commit_all("bob edit").is_success());
    let local_tip = head_id(&bob);
    let pushed = bob.push();

    assert!(
        matches!(pushed, SyncOutcome::RequiresManualResolution(_)),
        "{pushed}"
    );
    match pushed.error() {
        Some(SyncError::MergeConflict { paths, .. }) => {
            assert!(paths.iter().any(|p| p == "dash-a/layout.json"), "{paths:?}");
        }
        other => panic!("expected a merge conflict, got {other:?}"),
    }

    // No partial commit, and the local edit is still the tip.
    assert_eq!(head_id(&bob), local_tip);
    assert_ne!(remote_tip(&remote), local_tip);

    // Resolving and committing records a merge with both sides as parents.
    bob.write("dash-a/layout.json", "merged\n");
    let resolved = bob.sync.commit_all("resolve");
    assert_eq!(resolved.completed(), Some(&Completed::Done), "{resolved}");
    let repo = git2::Repository::open(bob.sync.repo_path()).unwrap();
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(head.parent_count(), 2);
    assert_eq!(head.parent_id(0).unwrap(), local_tip);
    assert!(matches!(repo.state(), git2::RepositoryState::Clean));

    assert_eq!(bob.push().completed(), Some(&Completed::Done));
    assert_eq!(remote_tip(&remote), head.id());
}

#[rstest]
#[case::libgit2(BackendKind::LibGit2)]
#[case::cli(BackendKind::Cli)]
fn test_pull_without_remote_branch(#[case] kind: BackendKind) {
    if !available(kind) {
        eprintln!("Skipping: {kind:?} not available");
        return;
    }
    let temp = TempDir::new().unwrap();
    let remote = bare_remote(temp.path());
    let alice = Workspace::new(temp.path(), "alice", &remote, kind, false);

    let pulled = alice.pull();
    assert!(!pulled.is_success());
    assert_eq!(pulled.error().map(|e| e.kind()), Some("RemoteBranchNotFound"));
}

#[rstest]
#[case::libgit2(BackendKind::LibGit2)]
#[case::cli(BackendKind::Cli)]
fn test_tag_is_created_once_and_pushed(#[case] kind: BackendKind) {
    if !available(kind) {
        eprintln!("Skipping: {kind:?} not available");
        return;
    }
    let temp = TempDir::new().unwrap();
    let remote = bare_remote(temp.path());
    let alice = Workspace::new(temp.path(), "alice", &remote, kind, false);
    alice.write("dash-a/layout.json", "x");
    assert!(alice.commit_and_push("release").is_success());

    let first = alice
        .sync
        .create_tag_and_push(&alice.settings, DEFAULT_REMOTE, "v", "1.0");
    assert_eq!(
        first.completed(),
        Some(&Completed::TagCreated("v1.0".to_string())),
        "{first}"
    );
    assert!(remote_has_ref(&remote, "refs/tags/v1.0"));

    let second = alice
        .sync
        .create_tag_and_push(&alice.settings, DEFAULT_REMOTE, "v", "1.0");
    assert_eq!(
        second.completed(),
        Some(&Completed::TagAlreadyExists("v1.0".to_string()))
    );
}

#[rstest]
#[case::libgit2(BackendKind::LibGit2)]
#[case::cli(BackendKind::Cli)]
fn test_commit_respects_selection(#[case] kind: BackendKind) {
    if !available(kind) {
        eprintln!("Skipping: {kind:?} not available");
        return;
    }
    let temp = TempDir::new().unwrap();
    let remote = bare_remote(temp.path());
    let mut alice = Workspace::new(temp.path(), "alice", &remote, kind, false);
    alice.settings.selected_dashboards = vec!["dash-a".to_string()];

    alice.write("dash-a/layout.json", "a");
    alice.write("dash-b/layout.json", "b");

    let first = alice.sync.commit_from_settings(&alice.settings, Some("selected"));
    assert_eq!(first.completed(), Some(&Completed::Done), "{first}");

    let repo = git2::Repository::open(alice.sync.repo_path()).unwrap();
    let tree = repo.head().unwrap().peel_to_tree().unwrap();
    assert!(tree.get_name("dash-a").is_some());
    assert!(tree.get_name("dash-b").is_none());

    let again = alice.sync.commit_from_settings(&alice.settings, Some("selected"));
    assert_eq!(again.completed(), Some(&Completed::NothingToDo));
}

#[rstest]
#[case::libgit2(BackendKind::LibGit2)]
#[case::cli(BackendKind::Cli)]
fn test_local_dashboards_listed_without_metadata(#[case] kind: BackendKind) {
    if !available(kind) {
        eprintln!("Skipping: {kind:?} not available");
        return;
    }
    let temp = TempDir::new().unwrap();
    let remote = bare_remote(temp.path());
    let alice = Workspace::new(temp.path(), "alice", &remote, kind, false);
    alice.write("zeta/a.json", "z");
    alice.write("alpha/a.json", "a");

    let names: Vec<String> = alice
        .sync
        .list_local_dashboards()
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}
