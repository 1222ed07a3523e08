//! Embedded libgit2 repository backend.
//!
//! [`GitManager`] implements [`RepoBackend`] without an external `git`
//! executable. Operations are split by concern: repository setup, remotes and
//! transport, index and commits, branches and merging, and history lookups.

mod branches;
mod credentials;
mod history;
mod manager;
mod operations;
mod remote;

use chrono::{DateTime, Utc};
use std::path::Path;

use crate::credentials::Credentials;
use crate::error::Result;
use crate::scm::{
    BackendKind, CommitOutcome, CommitSelection, MergeOutcome, PushOutcome, RepoBackend,
    TagOutcome,
};

pub use manager::GitManager;

impl RepoBackend for GitManager {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn kind(&self) -> BackendKind {
        BackendKind::LibGit2
    }

    fn probe(&self) -> Result<()> {
        GitManager::probe(self)
    }

    fn is_repository(&self) -> bool {
        GitManager::is_repository(self)
    }

    fn init_repository(&self) -> Result<()> {
        GitManager::init_repository(self)
    }

    fn set_remote(&self, name: &str, url: &str) -> Result<()> {
        GitManager::set_remote(self, name, url)
    }

    fn remove_remote(&self, name: &str) -> Result<()> {
        GitManager::remove_remote(self, name)
    }

    fn remote_url(&self, name: &str) -> Result<Option<String>> {
        GitManager::remote_url(self, name)
    }

    fn remotes(&self) -> Result<Vec<String>> {
        GitManager::remotes(self)
    }

    fn fetch_once(&self, remote: &str, creds: &Credentials) -> Result<()> {
        GitManager::fetch_once(self, remote, creds)
    }

    fn remote_branch_tip(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        GitManager::remote_branch_tip(self, remote, branch)
    }

    fn branch_tip(&self, branch: &str) -> Result<Option<String>> {
        GitManager::branch_tip(self, branch)
    }

    fn head_tip(&self) -> Result<Option<String>> {
        GitManager::head_tip(self)
    }

    fn track_remote_branch(&self, remote: &str, branch: &str) -> Result<()> {
        GitManager::track_remote_branch(self, remote, branch)
    }

    fn ensure_upstream(&self, remote: &str, branch: &str) -> Result<()> {
        GitManager::ensure_upstream(self, remote, branch)
    }

    fn merge(&self, remote: &str, branch: &str) -> Result<MergeOutcome> {
        GitManager::merge(self, remote, branch)
    }

    fn stage(&self, selection: &CommitSelection) -> Result<()> {
        GitManager::stage(self, selection)
    }

    fn commit(&self, message: &str) -> Result<CommitOutcome> {
        GitManager::commit(self, message)
    }

    fn commit_allow_empty(&self, message: &str) -> Result<String> {
        GitManager::commit_allow_empty(self, message)
    }

    fn push(&self, remote: &str, branch: &str, creds: &Credentials) -> Result<PushOutcome> {
        GitManager::push(self, remote, branch, creds)
    }

    fn tag_exists(&self, name: &str) -> Result<bool> {
        GitManager::tag_exists(self, name)
    }

    fn create_annotated_tag(&self, name: &str, message: &str) -> Result<TagOutcome> {
        GitManager::create_annotated_tag(self, name, message)
    }

    fn push_tag(&self, name: &str, remote: &str, creds: &Credentials) -> Result<()> {
        GitManager::push_tag(self, name, remote, creds)
    }

    fn checkout_or_create_branch(&self, branch: &str) -> Result<()> {
        GitManager::checkout_or_create_branch(self, branch)
    }

    fn reset_hard_to_remote(&self, remote: &str, branch: &str) -> Result<()> {
        GitManager::reset_hard_to_remote(self, remote, branch)
    }

    fn path_history_last_change(&self, dir: &str) -> Result<Option<DateTime<Utc>>> {
        GitManager::path_history_last_change(self, dir)
    }

    fn full_scan_last_change(&self, dir: &str) -> Result<Option<DateTime<Utc>>> {
        GitManager::full_scan_last_change(self, dir)
    }
}
