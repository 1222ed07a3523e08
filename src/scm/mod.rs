//! Repository backend abstraction layer.
//!
//! One contract, two mechanisms: the embedded libgit2 backend
//! ([`crate::git::GitManager`], the default) and the `git` CLI backend
//! ([`GitCli`]), picked per settings snapshot through [`BackendKind`].

mod git;
mod process;
pub mod url;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::credentials::Credentials;
use crate::error::{Result, SyncError};

pub use git::GitCli;

/// Name of the repository metadata directory under the working tree root.
pub const METADATA_DIR: &str = ".git";

/// Which mechanism executes repository operations.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Embedded libgit2 (no external executable needed)
    #[default]
    #[value(name = "libgit2")]
    #[serde(rename = "libgit2")]
    LibGit2,
    /// The `git` executable, with a wall-clock timeout per call
    Cli,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::LibGit2 => "libgit2",
            BackendKind::Cli => "git cli",
        }
    }
}

/// What to stage before a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitSelection {
    /// Every file under the repository root
    All,
    /// Every file under each named top-level directory
    Dashboards(Vec<String>),
}

impl CommitSelection {
    /// Build a selection of top-level directories, rejecting names that would
    /// resolve anywhere other than directly under the repository root.
    pub fn dashboards<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            validate_top_level_name(name)?;
            if !selected.iter().any(|existing: &String| existing == name) {
                selected.push(name.to_string());
            }
        }

        if selected.is_empty() {
            Ok(CommitSelection::All)
        } else {
            Ok(CommitSelection::Dashboards(selected))
        }
    }
}

fn validate_top_level_name(name: &str) -> Result<()> {
    let invalid = |reason| SyncError::InvalidSelection {
        name: name.to_string(),
        reason,
    };

    if name.contains('/') || name.contains('\\') {
        return Err(invalid("must be a single top-level directory name"));
    }
    if name == METADATA_DIR {
        return Err(invalid("the metadata directory cannot be selected"));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid("must not leave the repository root")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    AlreadyInitialized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    UpToDate,
    FastForwarded,
    Merged,
    /// The merge stopped with conflicts in these paths; nothing was committed.
    Conflicted(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Created(String),
    NothingToCommit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    NonFastForward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    Created,
    AlreadyExists,
}

/// Primitive repository operations against one working tree.
///
/// Implementations hold only the path; every call opens the repository
/// afresh, so a backend value is cheap and never caches repository state.
pub trait RepoBackend: Send {
    fn workdir(&self) -> &Path;

    fn kind(&self) -> BackendKind;

    /// Fails with `BackendUnavailable` when the mechanism cannot run here.
    fn probe(&self) -> Result<()>;

    /// True iff the working directory holds valid repository metadata.
    fn is_repository(&self) -> bool;

    /// Create repository metadata in the working directory.
    fn init_repository(&self) -> Result<()>;

    /// Create metadata if absent. The path is write-probed first so an
    /// unwritable location fails with `PermissionDenied`.
    fn init_if_needed(&self) -> Result<InitOutcome> {
        ensure_writable(self.workdir())?;
        if self.is_repository() {
            log::debug!("Repository already present at '{}'", self.workdir().display());
            return Ok(InitOutcome::AlreadyInitialized);
        }
        self.init_repository()?;
        log::info!(
            "Initialized repository at '{}' ({})",
            self.workdir().display(),
            self.kind().name()
        );
        Ok(InitOutcome::Created)
    }

    /// Add the remote, or overwrite its URL if it already exists.
    fn set_remote(&self, name: &str, url: &str) -> Result<()>;

    fn remove_remote(&self, name: &str) -> Result<()>;

    fn remote_url(&self, name: &str) -> Result<Option<String>>;

    fn remotes(&self) -> Result<Vec<String>>;

    /// Fetch every configured refspec of `remote` exactly once, pruning
    /// remote-tracking refs the remote no longer has.
    fn fetch_once(&self, remote: &str, creds: &Credentials) -> Result<()>;

    /// Fetch, retrying once over anonymous HTTPS when no credentials are
    /// configured and the stored URL is an SSH or credentialed form.
    fn fetch(&self, remote: &str, creds: &Credentials) -> Result<()> {
        let err = match self.fetch_once(remote, creds) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if !creds.is_empty() || matches!(err, SyncError::Timeout { .. }) {
            return Err(err);
        }

        let Some(current) = self.remote_url(remote)? else {
            return Err(err);
        };
        match url::anonymous_https(&current) {
            Some(anon) if !anon.eq_ignore_ascii_case(&current) => {
                log::info!(
                    "Fetch failed with URL '{}'. Retrying anonymously via '{}'...",
                    url::redact(&current),
                    anon
                );
                self.set_remote(remote, &anon)?;
                self.fetch_once(remote, creds)
            }
            _ => Err(err),
        }
    }

    /// Object id of `refs/remotes/<remote>/<branch>`, if fetched.
    fn remote_branch_tip(&self, remote: &str, branch: &str) -> Result<Option<String>>;

    /// Object id of `refs/heads/<branch>`, if it exists.
    fn branch_tip(&self, branch: &str) -> Result<Option<String>>;

    /// Object id HEAD resolves to; `None` while the branch is unborn.
    fn head_tip(&self) -> Result<Option<String>>;

    /// Make `branch` the checked-out branch, creating it at the remote tip when
    /// missing, and record `<remote>/<branch>` as its upstream.
    fn track_remote_branch(&self, remote: &str, branch: &str) -> Result<()>;

    /// Set the upstream of `branch` to `<remote>/<branch>` unless one is set.
    fn ensure_upstream(&self, remote: &str, branch: &str) -> Result<()>;

    /// Integrate `<remote>/<branch>` into the checked-out branch: fast-forward
    /// when possible, otherwise a real merge that may create a merge commit.
    fn merge(&self, remote: &str, branch: &str) -> Result<MergeOutcome>;

    /// Stage the selection. The metadata directory is never staged.
    fn stage(&self, selection: &CommitSelection) -> Result<()>;

    /// Commit the index. Refuses to create an empty commit. While a merge is
    /// in progress the commit concludes it with the merged heads as extra
    /// parents; unresolved conflicts fail with `MergeConflict`.
    fn commit(&self, message: &str) -> Result<CommitOutcome>;

    /// Commit even when nothing changed (branch bootstrap only).
    fn commit_allow_empty(&self, message: &str) -> Result<String>;

    fn push(&self, remote: &str, branch: &str, creds: &Credentials) -> Result<PushOutcome>;

    fn tag_exists(&self, name: &str) -> Result<bool>;

    /// Annotate HEAD with `name`. An existing tag is left untouched.
    fn create_annotated_tag(&self, name: &str, message: &str) -> Result<TagOutcome>;

    fn push_tag(&self, name: &str, remote: &str, creds: &Credentials) -> Result<()>;

    /// Check out `branch`; branch from HEAD if missing; on an unborn
    /// repository re-point HEAD and create an empty bootstrap commit.
    fn checkout_or_create_branch(&self, branch: &str) -> Result<()>;

    /// Point `branch` at `<remote>/<branch>`, check it out, and make the working
    /// tree match it exactly, removing untracked files.
    fn reset_hard_to_remote(&self, remote: &str, branch: &str) -> Result<()>;

    /// Commit time of the newest commit touching `dir`, using the mechanism's
    /// path-filtered history walk from HEAD.
    fn path_history_last_change(&self, dir: &str) -> Result<Option<DateTime<Utc>>>;

    /// Commit time of the newest commit whose diff against its first parent
    /// has a path under `dir/`, by scanning every commit from HEAD.
    fn full_scan_last_change(&self, dir: &str) -> Result<Option<DateTime<Utc>>>;
}

/// Build the backend of the given kind for `path`.
pub fn open_backend(kind: BackendKind, path: &Path, timeout: Duration) -> Box<dyn RepoBackend> {
    match kind {
        BackendKind::LibGit2 => Box::new(crate::git::GitManager::new(path, timeout)),
        BackendKind::Cli => Box::new(GitCli::new(path, timeout)),
    }
}

/// Verify the path accepts writes by actually writing a probe file.
pub fn ensure_writable(path: &Path) -> Result<()> {
    let denied = |err: std::io::Error| {
        log::warn!("No write access to '{}': {}", path.display(), err);
        SyncError::PermissionDenied {
            path: path.to_path_buf(),
        }
    };

    fs::create_dir_all(path).map_err(denied)?;
    let probe = path.join(format!(".write_test_{}.tmp", uuid::Uuid::new_v4().simple()));
    fs::write(&probe, b"test").map_err(denied)?;
    fs::remove_file(&probe).map_err(denied)?;
    Ok(())
}

/// Top-level directories of `root`, sorted by name, excluding the metadata directory.
pub fn top_level_dirs(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = fs::read_dir(root).map_err(|e| SyncError::io(root, e))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::io(root, e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| SyncError::io(entry.path(), e))?
            .is_dir();
        let name = entry.file_name().to_string_lossy().to_string();
        if is_dir && name != METADATA_DIR {
            dirs.push((name, entry.path()));
        }
    }
    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(dirs)
}

pub(crate) fn timestamp_from_secs(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::mock::{Call, ScriptedBackend};
    use tempfile::TempDir;

    #[test]
    fn test_selection_accepts_plain_names() {
        let selection = CommitSelection::dashboards(["dash-a", "dash-b", "dash-a"]).unwrap();
        assert_eq!(
            selection,
            CommitSelection::Dashboards(vec!["dash-a".into(), "dash-b".into()])
        );
    }

    #[test]
    fn test_empty_selection_means_all() {
        let selection = CommitSelection::dashboards(Vec::<String>::new()).unwrap();
        assert_eq!(selection, CommitSelection::All);
        let selection = CommitSelection::dashboards(["", "  "]).unwrap();
        assert_eq!(selection, CommitSelection::All);
    }

    #[test]
    fn test_selection_rejects_traversal() {
        for name in ["..", ".", "../outside", "a/b", "a\\b", "/etc", ".git"] {
            let result = CommitSelection::dashboards([name]);
            assert!(
                matches!(result, Err(SyncError::InvalidSelection { .. })),
                "expected '{name}' to be rejected"
            );
        }
    }

    #[test]
    fn test_ensure_writable_creates_directory() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("new").join("dashboards");
        ensure_writable(&target).unwrap();
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);
    }

    #[test]
    #[cfg(unix)]
    fn test_ensure_writable_reports_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let locked = temp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // Root ignores permission bits, so only assert when the probe can fail.
        if fs::write(locked.join("probe"), b"x").is_ok() {
            return;
        }

        let result = ensure_writable(&locked);
        assert!(matches!(result, Err(SyncError::PermissionDenied { .. })));

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_top_level_dirs_sorted_without_metadata() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        fs::create_dir_all(temp.path().join("zeta")).unwrap();
        fs::create_dir_all(temp.path().join("alpha")).unwrap();
        fs::write(temp.path().join("README.md"), "x").unwrap();

        let names: Vec<String> = top_level_dirs(temp.path())
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn test_backend_kind_serde_names() {
        assert_eq!(
            serde_json::to_string(&BackendKind::LibGit2).unwrap(),
            "\"libgit2\""
        );
        assert_eq!(serde_json::to_string(&BackendKind::Cli).unwrap(), "\"cli\"");
    }

    fn auth_failure() -> SyncError {
        SyncError::NetworkOrAuth {
            remote: "origin".into(),
            message: "authentication required".into(),
        }
    }

    #[test]
    fn test_fetch_retries_anonymously_over_https() {
        let backend = ScriptedBackend::with_url("git@github.com:owner/repo.git");
        backend.script_fetch_failure(auth_failure());

        backend.fetch("origin", &Credentials::default()).unwrap();

        assert_eq!(backend.url_changes(), vec!["https://github.com/owner/repo.git"]);
        assert_eq!(backend.calls(), vec![Call::Fetch, Call::Fetch]);
    }

    #[test]
    fn test_fetch_with_credentials_does_not_retry() {
        let backend = ScriptedBackend::with_url("git@github.com:owner/repo.git");
        backend.script_fetch_failure(auth_failure());
        let creds = Credentials {
            username: "x-access-token".into(),
            token: "secret".into(),
        };

        let err = backend.fetch("origin", &creds).unwrap_err();

        assert_eq!(err.kind(), "NetworkOrAuth");
        assert!(backend.url_changes().is_empty());
        assert_eq!(backend.calls(), vec![Call::Fetch]);
    }

    #[test]
    fn test_fetch_timeout_does_not_retry() {
        let backend = ScriptedBackend::with_url("git@github.com:owner/repo.git");
        backend.script_fetch_failure(SyncError::Timeout {
            operation: "fetch".into(),
            seconds: 30,
        });

        let err = backend.fetch("origin", &Credentials::default()).unwrap_err();

        assert_eq!(err.kind(), "Timeout");
        assert!(backend.url_changes().is_empty());
        assert_eq!(backend.calls(), vec![Call::Fetch]);
    }

    #[test]
    fn test_fetch_failure_on_https_url_is_not_retried() {
        let backend = ScriptedBackend::with_url("https://github.com/owner/repo.git");
        backend.script_fetch_failure(auth_failure());

        assert!(backend.fetch("origin", &Credentials::default()).is_err());
        assert!(backend.url_changes().is_empty());
        assert_eq!(backend.calls(), vec![Call::Fetch]);
    }
}
