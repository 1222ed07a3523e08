//! Scripted in-memory backend for exercising service policies.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::credentials::Credentials;
use crate::error::{Result, SyncError};
use crate::scm::{
    BackendKind, CommitOutcome, CommitSelection, MergeOutcome, PushOutcome, RepoBackend,
    TagOutcome,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Fetch,
    Track,
    Upstream,
    Merge,
    Stage,
    Commit,
    Bootstrap,
    Push,
    Tag,
    PushTag,
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    workdir: PathBuf,
    head: Mutex<Option<String>>,
    remote_tip: Mutex<Option<String>>,
    merges: Mutex<VecDeque<MergeOutcome>>,
    pushes: Mutex<VecDeque<PushOutcome>>,
    tags: Mutex<Vec<String>>,
    url: Mutex<Option<String>>,
    url_changes: Mutex<Vec<String>>,
    fetch_failures: Mutex<VecDeque<SyncError>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    /// A repository with one commit whose remote branch exists.
    pub fn with_remote_tip() -> Self {
        let backend = ScriptedBackend::default();
        *backend.head.lock().unwrap() = Some("1111".into());
        *backend.remote_tip.lock().unwrap() = Some("1111".into());
        backend
    }

    pub fn script_merge(&self, outcome: MergeOutcome) {
        self.merges.lock().unwrap().push_back(outcome);
    }

    /// Queue push results; once the queue is empty every push succeeds.
    pub fn script_push(&self, outcome: PushOutcome) {
        self.pushes.lock().unwrap().push_back(outcome);
    }

    pub fn with_url(url: &str) -> Self {
        let backend = ScriptedBackend::default();
        *backend.url.lock().unwrap() = Some(url.into());
        backend
    }

    /// Queue fetch failures; once the queue is empty every fetch succeeds.
    pub fn script_fetch_failure(&self, err: SyncError) {
        self.fetch_failures.lock().unwrap().push_back(err);
    }

    /// URLs passed to `set_remote`, in order.
    pub fn url_changes(&self) -> Vec<String> {
        self.url_changes.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RepoBackend for ScriptedBackend {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn kind(&self) -> BackendKind {
        BackendKind::LibGit2
    }

    fn probe(&self) -> Result<()> {
        Ok(())
    }

    fn is_repository(&self) -> bool {
        true
    }

    fn init_repository(&self) -> Result<()> {
        Ok(())
    }

    fn set_remote(&self, _name: &str, url: &str) -> Result<()> {
        self.url_changes.lock().unwrap().push(url.to_string());
        *self.url.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    fn remove_remote(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn remote_url(&self, _name: &str) -> Result<Option<String>> {
        Ok(Some(
            self.url
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| "https://example.com/dashboards.git".into()),
        ))
    }

    fn remotes(&self) -> Result<Vec<String>> {
        Ok(vec!["origin".into()])
    }

    fn fetch_once(&self, _remote: &str, _creds: &Credentials) -> Result<()> {
        self.record(Call::Fetch);
        match self.fetch_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn remote_branch_tip(&self, _remote: &str, _branch: &str) -> Result<Option<String>> {
        Ok(self.remote_tip.lock().unwrap().clone())
    }

    fn branch_tip(&self, _branch: &str) -> Result<Option<String>> {
        Ok(self.head.lock().unwrap().clone())
    }

    fn head_tip(&self) -> Result<Option<String>> {
        Ok(self.head.lock().unwrap().clone())
    }

    fn track_remote_branch(&self, _remote: &str, _branch: &str) -> Result<()> {
        self.record(Call::Track);
        Ok(())
    }

    fn ensure_upstream(&self, _remote: &str, _branch: &str) -> Result<()> {
        self.record(Call::Upstream);
        Ok(())
    }

    fn merge(&self, _remote: &str, _branch: &str) -> Result<MergeOutcome> {
        self.record(Call::Merge);
        Ok(self
            .merges
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MergeOutcome::UpToDate))
    }

    fn stage(&self, _selection: &CommitSelection) -> Result<()> {
        self.record(Call::Stage);
        Ok(())
    }

    fn commit(&self, _message: &str) -> Result<CommitOutcome> {
        self.record(Call::Commit);
        Ok(CommitOutcome::Created("2222".into()))
    }

    fn commit_allow_empty(&self, _message: &str) -> Result<String> {
        self.record(Call::Bootstrap);
        *self.head.lock().unwrap() = Some("0000".into());
        Ok("0000".into())
    }

    fn push(&self, _remote: &str, _branch: &str, _creds: &Credentials) -> Result<PushOutcome> {
        self.record(Call::Push);
        Ok(self
            .pushes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PushOutcome::Pushed))
    }

    fn tag_exists(&self, name: &str) -> Result<bool> {
        Ok(self.tags.lock().unwrap().iter().any(|t| t == name))
    }

    fn create_annotated_tag(&self, name: &str, _message: &str) -> Result<TagOutcome> {
        self.record(Call::Tag);
        let mut tags = self.tags.lock().unwrap();
        if tags.iter().any(|t| t == name) {
            return Ok(TagOutcome::AlreadyExists);
        }
        tags.push(name.to_string());
        Ok(TagOutcome::Created)
    }

    fn push_tag(&self, _name: &str, _remote: &str, _creds: &Credentials) -> Result<()> {
        self.record(Call::PushTag);
        Ok(())
    }

    fn checkout_or_create_branch(&self, _branch: &str) -> Result<()> {
        Ok(())
    }

    fn reset_hard_to_remote(&self, _remote: &str, _branch: &str) -> Result<()> {
        Ok(())
    }

    fn path_history_last_change(&self, _dir: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(None)
    }

    fn full_scan_last_change(&self, _dir: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(None)
    }
}
