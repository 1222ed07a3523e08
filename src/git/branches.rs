use git2::build::CheckoutBuilder;
use git2::{BranchType, ErrorCode, Oid, Repository};

use super::manager::{head_commit, signature, GitManager};
use super::operations::short;
use crate::error::{Result, SyncError};
use crate::scm::MergeOutcome;

impl GitManager {
    pub fn remote_branch_tip(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        let repo = self.repo()?;
        Ok(remote_branch_oid(&repo, remote, branch)?.map(|oid| oid.to_string()))
    }

    pub fn branch_tip(&self, branch: &str) -> Result<Option<String>> {
        let repo = self.repo()?;
        let tip = match repo.find_branch(branch, BranchType::Local) {
            Ok(b) => Some(b.get().peel_to_commit()?.id().to_string()),
            Err(e) if e.code() == ErrorCode::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(tip)
    }

    pub fn head_tip(&self) -> Result<Option<String>> {
        let repo = self.repo()?;
        let tip = head_commit(&repo)?.map(|c| c.id().to_string());
        Ok(tip)
    }

    /// Check out `branch`, creating it at the remote tip when it does not exist
    pub fn track_remote_branch(&self, remote: &str, branch: &str) -> Result<()> {
        let repo = self.repo()?;
        let local_ref = format!("refs/heads/{branch}");

        match repo.find_branch(branch, BranchType::Local) {
            Ok(existing) => {
                if !head_is(&repo, branch) {
                    let commit = existing.get().peel_to_commit()?;
                    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))?;
                    repo.set_head(&local_ref)?;
                    log::info!("Checked out '{branch}'");
                }
            }
            Err(e) if e.code() == ErrorCode::NotFound => {
                let oid = remote_branch_oid(&repo, remote, branch)?.ok_or_else(|| {
                    SyncError::RemoteBranchNotFound {
                        remote: remote.to_string(),
                        branch: branch.to_string(),
                    }
                })?;
                let commit = repo.find_commit(oid)?;
                // Files are written before the branch exists so the
                // checkout compares against the current HEAD, not the target.
                repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))?;
                repo.branch(branch, &commit, false)?;
                repo.set_head(&local_ref)?;
                log::info!("Created '{branch}' from {remote}/{branch} at {}", short(&oid));
            }
            Err(e) => return Err(e.into()),
        }

        set_upstream(&repo, remote, branch)
    }

    pub fn ensure_upstream(&self, remote: &str, branch: &str) -> Result<()> {
        let repo = self.repo()?;
        let config = repo.config()?;
        if config.get_string(&format!("branch.{branch}.remote")).is_ok() {
            return Ok(());
        }
        drop(config);
        set_upstream(&repo, remote, branch)
    }

    /// Merge `<remote>/<branch>` into HEAD, fast-forwarding when possible
    pub fn merge(&self, remote: &str, branch: &str) -> Result<MergeOutcome> {
        let repo = self.repo()?;
        let oid = remote_branch_oid(&repo, remote, branch)?.ok_or_else(|| {
            SyncError::RemoteBranchNotFound {
                remote: remote.to_string(),
                branch: branch.to_string(),
            }
        })?;
        let annotated = repo.find_annotated_commit(oid)?;
        let (analysis, _) = repo.merge_analysis(&[&annotated])?;

        if analysis.is_up_to_date() {
            log::info!("Already up to date with {remote}/{branch}");
            return Ok(MergeOutcome::UpToDate);
        }

        if analysis.is_unborn() {
            let target = repo.find_commit(oid)?;
            repo.checkout_tree(target.as_object(), Some(CheckoutBuilder::new().safe()))?;
            let head_ref = repo.find_reference("HEAD")?;
            let name = head_ref
                .symbolic_target()
                .map(str::to_string)
                .unwrap_or_else(|| format!("refs/heads/{branch}"));
            repo.reference(&name, oid, true, "pull: initial")?;
            return Ok(MergeOutcome::FastForwarded);
        }

        if analysis.is_fast_forward() {
            fast_forward(&repo, oid)?;
            log::info!("Fast-forwarded to {}", short(&oid));
            return Ok(MergeOutcome::FastForwarded);
        }

        let mut checkout = CheckoutBuilder::new();
        checkout.safe().allow_conflicts(true).conflict_style_merge(true);
        repo.merge(&[&annotated], None, Some(&mut checkout))?;

        let mut index = repo.index()?;
        if index.has_conflicts() {
            let paths = conflicted_paths(&index)?;
            log::warn!("Merge of {remote}/{branch} conflicts in {} path(s)", paths.len());
            return Ok(MergeOutcome::Conflicted(paths));
        }

        let tree = repo.find_tree(index.write_tree()?)?;
        let sig = signature(&repo)?;
        let ours = repo.head()?.peel_to_commit()?;
        let theirs = repo.find_commit(oid)?;
        let message = format!("Merge {remote}/{branch}");
        let merge_oid = repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&ours, &theirs])?;
        repo.cleanup_state()?;

        log::info!("Merged {remote}/{branch} as {}", short(&merge_oid));
        Ok(MergeOutcome::Merged)
    }

    /// Check out `branch`, creating it from HEAD, or bootstrapping an unborn repository
    pub fn checkout_or_create_branch(&self, branch: &str) -> Result<()> {
        let repo = self.repo()?;
        let local_ref = format!("refs/heads/{branch}");

        if let Ok(existing) = repo.find_branch(branch, BranchType::Local) {
            if !head_is(&repo, branch) {
                let commit = existing.get().peel_to_commit()?;
                repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))?;
                repo.set_head(&local_ref)?;
                log::info!("Checked out '{branch}'");
            }
            return Ok(());
        }

        match head_commit(&repo)? {
            Some(commit) => {
                repo.branch(branch, &commit, false)?;
                repo.set_head(&local_ref)?;
                log::info!("Created branch '{branch}' at {}", short(&commit.id()));
            }
            None => {
                repo.set_head(&local_ref)?;
                self.commit_allow_empty("Initial commit")?;
                log::info!("Bootstrapped unborn branch '{branch}'");
            }
        }
        Ok(())
    }

    /// Make `branch` and the working tree match `<remote>/<branch>` exactly
    pub fn reset_hard_to_remote(&self, remote: &str, branch: &str) -> Result<()> {
        let repo = self.repo()?;
        let oid = remote_branch_oid(&repo, remote, branch)?.ok_or_else(|| {
            SyncError::RemoteBranchNotFound {
                remote: remote.to_string(),
                branch: branch.to_string(),
            }
        })?;
        let local_ref = format!("refs/heads/{branch}");

        repo.reference(&local_ref, oid, true, "reset to remote")?;
        repo.set_head(&local_ref)?;
        repo.checkout_head(Some(
            CheckoutBuilder::new()
                .force()
                .remove_untracked(true)
                .remove_ignored(true),
        ))?;
        log::debug!("Reset '{branch}' to {remote}/{branch} ({})", short(&oid));
        Ok(())
    }
}

fn remote_branch_oid(repo: &Repository, remote: &str, branch: &str) -> Result<Option<Oid>> {
    match repo.refname_to_id(&format!("refs/remotes/{remote}/{branch}")) {
        Ok(oid) => Ok(Some(oid)),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn head_is(repo: &Repository, branch: &str) -> bool {
    repo.head()
        .ok()
        .and_then(|h| h.shorthand().map(|s| s == branch))
        .unwrap_or(false)
}

fn set_upstream(repo: &Repository, remote: &str, branch: &str) -> Result<()> {
    let mut config = repo.config()?;
    config.set_str(&format!("branch.{branch}.remote"), remote)?;
    config.set_str(&format!("branch.{branch}.merge"), &format!("refs/heads/{branch}"))?;
    log::debug!("Upstream of '{branch}' set to {remote}/{branch}");
    Ok(())
}

fn fast_forward(repo: &Repository, target: Oid) -> Result<()> {
    let commit = repo.find_commit(target)?;
    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))?;
    let mut head = repo.head()?;
    head.set_target(target, "pull: fast-forward")?;
    Ok(())
}

pub(super) fn conflicted_paths(index: &git2::Index) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
        if let Some(entry) = entry {
            let path = String::from_utf8_lossy(&entry.path).to_string();
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths.sort();
    Ok(paths)
}
