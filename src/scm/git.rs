//! Repository backend driving the `git` executable.

use base64::Engine;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::process::{git_available, run_git, GitOutput};
use super::{
    timestamp_from_secs, BackendKind, CommitOutcome, CommitSelection, MergeOutcome, PushOutcome,
    RepoBackend, TagOutcome, METADATA_DIR,
};
use crate::credentials::Credentials;
use crate::error::{Result, SyncError};

/// Limit for commands that never touch the network.
const LOCAL_TIMEOUT: Duration = Duration::from_secs(120);

const COMMITTER_NAME: &str = "Dashboard Sync";
const COMMITTER_EMAIL: &str = "dashboard-sync@localhost";

/// Git backend implemented with CLI calls.
pub struct GitCli {
    workdir: PathBuf,
    network_timeout: Duration,
}

impl GitCli {
    pub fn new(path: &Path, network_timeout: Duration) -> Self {
        Self {
            workdir: path.to_path_buf(),
            network_timeout,
        }
    }

    /// Run a local git command and return its output regardless of exit code.
    fn git(&self, args: &[&str]) -> Result<GitOutput> {
        run_git(Some(&self.workdir), args, &[], LOCAL_TIMEOUT)
    }

    /// Run a local git command and return trimmed stdout, failing on non-zero exit.
    fn git_ok(&self, args: &[&str]) -> Result<String> {
        let output = self.git(args)?;
        if !output.success {
            return Err(SyncError::Command {
                command: format!("git {}", args.join(" ")),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout_trimmed().to_string())
    }

    /// Check if a git command succeeds (exit code 0).
    fn git_succeeds(&self, args: &[&str]) -> bool {
        self.git(args).map(|o| o.success).unwrap_or(false)
    }

    /// Run a network command with the configured timeout and credentials.
    fn git_network(&self, args: &[&str], creds: &Credentials) -> Result<GitOutput> {
        run_git(
            Some(&self.workdir),
            args,
            &auth_env(creds),
            self.network_timeout,
        )
    }

    fn verify(&self, refname: &str) -> Result<Option<String>> {
        let spec = format!("{refname}^{{commit}}");
        let output = self.git(&["rev-parse", "-q", "--verify", &spec])?;
        Ok(output
            .success
            .then(|| output.stdout_trimmed().to_string())
            .filter(|oid| !oid.is_empty()))
    }

    fn require_remote(&self, remote: &str) -> Result<()> {
        if self.remote_url(remote)?.is_none() {
            return Err(SyncError::RemoteNotFound(remote.to_string()));
        }
        Ok(())
    }

    fn current_branch(&self) -> Result<Option<String>> {
        let output = self.git(&["symbolic-ref", "--short", "-q", "HEAD"])?;
        Ok(output
            .success
            .then(|| output.stdout_trimmed().to_string())
            .filter(|name| !name.is_empty()))
    }

    fn conflicted_paths(&self) -> Result<Vec<String>> {
        let output = self.git(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn has_tracked_files(&self, dir: &str) -> bool {
        self.git(&["ls-files", "--", dir])
            .map(|o| o.success && !o.stdout.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Pass the token as an HTTP Basic header through git's environment config,
/// so it never shows up on a command line or in a log line.
fn auth_env(creds: &Credentials) -> Vec<(&'static str, String)> {
    if creds.is_empty() {
        return Vec::new();
    }
    let basic = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", creds.username, creds.token));
    vec![
        ("GIT_CONFIG_COUNT", "1".to_string()),
        ("GIT_CONFIG_KEY_0", "http.extraHeader".to_string()),
        ("GIT_CONFIG_VALUE_0", format!("Authorization: Basic {basic}")),
    ]
}

fn is_rejection(output: &GitOutput) -> bool {
    let text = format!("{}\n{}", output.stdout, output.stderr);
    text.contains("[rejected]")
        || text.contains("non-fast-forward")
        || text.contains("fetch first")
}

fn network_error(remote: &str, output: &GitOutput) -> SyncError {
    SyncError::NetworkOrAuth {
        remote: remote.to_string(),
        message: output.stderr.trim().to_string(),
    }
}

impl RepoBackend for GitCli {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Cli
    }

    fn probe(&self) -> Result<()> {
        if git_available() {
            Ok(())
        } else {
            Err(SyncError::BackendUnavailable(
                "'git --version' did not report a usable git".to_string(),
            ))
        }
    }

    fn is_repository(&self) -> bool {
        self.workdir.join(METADATA_DIR).exists()
            && self.git_succeeds(&["rev-parse", "--is-inside-work-tree"])
    }

    fn init_repository(&self) -> Result<()> {
        std::fs::create_dir_all(&self.workdir).map_err(|e| SyncError::io(&self.workdir, e))?;
        self.git_ok(&["init", "-q"])?;

        // Commits must not depend on the user's global identity being set.
        if !self.git_succeeds(&["config", "user.name"]) {
            self.git_ok(&["config", "user.name", COMMITTER_NAME])?;
        }
        if !self.git_succeeds(&["config", "user.email"]) {
            self.git_ok(&["config", "user.email", COMMITTER_EMAIL])?;
        }
        Ok(())
    }

    fn set_remote(&self, name: &str, url: &str) -> Result<()> {
        if self.remote_url(name)?.is_some() {
            self.git_ok(&["remote", "set-url", name, url])?;
        } else {
            self.git_ok(&["remote", "add", name, url])?;
        }
        Ok(())
    }

    fn remove_remote(&self, name: &str) -> Result<()> {
        self.git_ok(&["remote", "remove", name])?;
        Ok(())
    }

    fn remote_url(&self, name: &str) -> Result<Option<String>> {
        let output = self.git(&["remote", "get-url", name])?;
        Ok(output
            .success
            .then(|| output.stdout_trimmed().to_string()))
    }

    fn remotes(&self) -> Result<Vec<String>> {
        let output = self.git_ok(&["remote"])?;
        Ok(output.lines().map(|s| s.trim().to_string()).collect())
    }

    fn fetch_once(&self, remote: &str, creds: &Credentials) -> Result<()> {
        self.require_remote(remote)?;
        let output = self.git_network(&["fetch", "--quiet", "--prune", remote], creds)?;
        if !output.success {
            return Err(network_error(remote, &output));
        }
        Ok(())
    }

    fn remote_branch_tip(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        self.verify(&format!("refs/remotes/{remote}/{branch}"))
    }

    fn branch_tip(&self, branch: &str) -> Result<Option<String>> {
        self.verify(&format!("refs/heads/{branch}"))
    }

    fn head_tip(&self) -> Result<Option<String>> {
        self.verify("HEAD")
    }

    fn track_remote_branch(&self, remote: &str, branch: &str) -> Result<()> {
        let remote_ref = format!("refs/remotes/{remote}/{branch}");
        if self.branch_tip(branch)?.is_none() {
            if self.verify(&remote_ref)?.is_none() {
                return Err(SyncError::RemoteBranchNotFound {
                    remote: remote.to_string(),
                    branch: branch.to_string(),
                });
            }
            self.git_ok(&["checkout", "-q", "-b", branch, &remote_ref])?;
        } else if self.current_branch()?.as_deref() != Some(branch) {
            self.git_ok(&["checkout", "-q", branch])?;
        }

        self.git_ok(&["config", &format!("branch.{branch}.remote"), remote])?;
        self.git_ok(&[
            "config",
            &format!("branch.{branch}.merge"),
            &format!("refs/heads/{branch}"),
        ])?;
        Ok(())
    }

    fn ensure_upstream(&self, remote: &str, branch: &str) -> Result<()> {
        let key = format!("branch.{branch}.remote");
        if self.git_succeeds(&["config", &key]) {
            return Ok(());
        }
        self.git_ok(&["config", &key, remote])?;
        self.git_ok(&[
            "config",
            &format!("branch.{branch}.merge"),
            &format!("refs/heads/{branch}"),
        ])?;
        Ok(())
    }

    fn merge(&self, remote: &str, branch: &str) -> Result<MergeOutcome> {
        let remote_ref = format!("refs/remotes/{remote}/{branch}");
        let Some(target) = self.verify(&remote_ref)? else {
            return Err(SyncError::RemoteBranchNotFound {
                remote: remote.to_string(),
                branch: branch.to_string(),
            });
        };

        let before = self.head_tip()?;
        if before.as_deref() == Some(target.as_str())
            || (before.is_some()
                && self.git_succeeds(&["merge-base", "--is-ancestor", &target, "HEAD"]))
        {
            return Ok(MergeOutcome::UpToDate);
        }

        if self.git_succeeds(&["merge", "-q", "--ff-only", &remote_ref]) {
            return Ok(MergeOutcome::FastForwarded);
        }

        log::info!("Fast-forward to {remote}/{branch} not possible; attempting merge");
        let output = self.git(&[
            "merge",
            "-q",
            "--no-edit",
            "--allow-unrelated-histories",
            &remote_ref,
        ])?;
        if output.success {
            return Ok(MergeOutcome::Merged);
        }

        let conflicts = self.conflicted_paths()?;
        if !conflicts.is_empty() {
            return Ok(MergeOutcome::Conflicted(conflicts));
        }
        Err(SyncError::Command {
            command: format!("git merge {remote_ref}"),
            stderr: output.stderr.trim().to_string(),
        })
    }

    fn stage(&self, selection: &CommitSelection) -> Result<()> {
        match selection {
            CommitSelection::All => {
                self.git_ok(&["add", "-A"])?;
            }
            CommitSelection::Dashboards(names) => {
                let present: Vec<&str> = names
                    .iter()
                    .map(String::as_str)
                    .filter(|name| self.workdir.join(name).exists() || self.has_tracked_files(name))
                    .collect();
                if present.is_empty() {
                    log::debug!("None of the selected dashboards exist; nothing to stage");
                    return Ok(());
                }
                let mut args = vec!["add", "-A", "--"];
                args.extend(present);
                self.git_ok(&args)?;
            }
        }
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<CommitOutcome> {
        let conflicts = self.conflicted_paths()?;
        if !conflicts.is_empty() {
            return Err(SyncError::MergeConflict {
                reference: "MERGE_HEAD".to_string(),
                paths: conflicts,
            });
        }
        let merging = self.verify("MERGE_HEAD")?.is_some();
        if !merging && self.git_succeeds(&["diff", "--cached", "--quiet"]) {
            log::info!("No changes to commit.");
            return Ok(CommitOutcome::NothingToCommit);
        }
        self.git_ok(&["commit", "-q", "-m", message])?;
        let oid = self.head_tip()?.ok_or(SyncError::EmptyRepository)?;
        Ok(CommitOutcome::Created(oid))
    }

    fn commit_allow_empty(&self, message: &str) -> Result<String> {
        self.git_ok(&["commit", "-q", "--allow-empty", "-m", message])?;
        self.head_tip()?.ok_or(SyncError::EmptyRepository)
    }

    fn push(&self, remote: &str, branch: &str, creds: &Credentials) -> Result<PushOutcome> {
        self.require_remote(remote)?;
        if self.branch_tip(branch)?.is_none() {
            return Err(SyncError::BranchNotFound(branch.to_string()));
        }

        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let output = self.git_network(&["push", "--porcelain", remote, &refspec], creds)?;
        if output.success {
            return Ok(PushOutcome::Pushed);
        }
        if is_rejection(&output) {
            return Ok(PushOutcome::NonFastForward);
        }
        Err(network_error(remote, &output))
    }

    fn tag_exists(&self, name: &str) -> Result<bool> {
        let output = self.git(&["rev-parse", "-q", "--verify", &format!("refs/tags/{name}")])?;
        Ok(output.success)
    }

    fn create_annotated_tag(&self, name: &str, message: &str) -> Result<TagOutcome> {
        if self.head_tip()?.is_none() {
            return Err(SyncError::EmptyRepository);
        }
        if self.tag_exists(name)? {
            return Ok(TagOutcome::AlreadyExists);
        }
        self.git_ok(&["tag", "-a", name, "-m", message])?;
        Ok(TagOutcome::Created)
    }

    fn push_tag(&self, name: &str, remote: &str, creds: &Credentials) -> Result<()> {
        self.require_remote(remote)?;
        let refspec = format!("refs/tags/{name}:refs/tags/{name}");
        let output = self.git_network(&["push", "--porcelain", remote, &refspec], creds)?;
        if !output.success {
            return Err(network_error(remote, &output));
        }
        Ok(())
    }

    fn checkout_or_create_branch(&self, branch: &str) -> Result<()> {
        if self.branch_tip(branch)?.is_some() {
            if self.current_branch()?.as_deref() != Some(branch) {
                self.git_ok(&["checkout", "-q", branch])?;
            }
            return Ok(());
        }

        if self.head_tip()?.is_some() {
            self.git_ok(&["checkout", "-q", "-b", branch])?;
            return Ok(());
        }

        // Unborn: re-point HEAD, then give the branch a first commit.
        self.git_ok(&["symbolic-ref", "HEAD", &format!("refs/heads/{branch}")])?;
        self.commit_allow_empty("Initial commit")?;
        Ok(())
    }

    fn reset_hard_to_remote(&self, remote: &str, branch: &str) -> Result<()> {
        let remote_ref = format!("refs/remotes/{remote}/{branch}");
        if self.verify(&remote_ref)?.is_none() {
            return Err(SyncError::RemoteBranchNotFound {
                remote: remote.to_string(),
                branch: branch.to_string(),
            });
        }
        self.git_ok(&["checkout", "-q", "-f", "-B", branch, &remote_ref])?;
        self.git_ok(&["reset", "-q", "--hard", &remote_ref])?;
        self.git_ok(&["clean", "-q", "-ffdx"])?;
        Ok(())
    }

    fn path_history_last_change(&self, dir: &str) -> Result<Option<DateTime<Utc>>> {
        if self.head_tip()?.is_none() {
            return Ok(None);
        }
        let pathspec = format!("{dir}/");
        let output = self.git_ok(&["log", "-1", "--format=%ct", "HEAD", "--", &pathspec])?;
        Ok(output.parse::<i64>().ok().and_then(timestamp_from_secs))
    }

    fn full_scan_last_change(&self, dir: &str) -> Result<Option<DateTime<Utc>>> {
        if self.head_tip()?.is_none() {
            return Ok(None);
        }
        let output = self.git_ok(&[
            "-c",
            "core.quotePath=false",
            "log",
            "--format=%x1e%ct",
            "--name-only",
            "--diff-merges=first-parent",
            "HEAD",
        ])?;
        Ok(scan_log_records(&output, dir))
    }
}

/// Walk `%x1e<time>\n<paths..>` records newest-first and return the time of
/// the first record with a path under `dir/`.
fn scan_log_records(log: &str, dir: &str) -> Option<DateTime<Utc>> {
    let prefix = format!("{dir}/");
    for record in log.split('\u{1e}') {
        let mut lines = record.lines().map(str::trim).filter(|l| !l.is_empty());
        let Some(time) = lines.next().and_then(|t| t.parse::<i64>().ok()) else {
            continue;
        };
        if lines.any(|path| path.starts_with(&prefix)) {
            return timestamp_from_secs(time);
        }
    }
    None
}
