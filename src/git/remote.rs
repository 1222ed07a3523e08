use git2::{ErrorCode, FetchOptions, FetchPrune, PushOptions, Repository};
use std::cell::RefCell;
use std::time::Instant;

use super::credentials::remote_callbacks;
use super::manager::GitManager;
use crate::credentials::Credentials;
use crate::error::{Result, SyncError};
use crate::scm::{url, PushOutcome};

impl GitManager {
    /// Add a remote, or re-point it when it already exists
    pub fn set_remote(&self, name: &str, url: &str) -> Result<()> {
        let repo = self.repo()?;
        match repo.find_remote(name) {
            Ok(_) => {
                repo.remote_set_url(name, url)?;
                log::debug!("Updated remote '{}' -> {}", name, url::redact(url));
            }
            Err(e) if e.code() == ErrorCode::NotFound => {
                repo.remote(name, url)?;
                log::debug!("Added remote '{}' -> {}", name, url::redact(url));
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    pub fn remove_remote(&self, name: &str) -> Result<()> {
        let repo = self.repo()?;
        match repo.remote_delete(name) {
            Ok(()) => Ok(()),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn remote_url(&self, name: &str) -> Result<Option<String>> {
        let repo = self.repo()?;
        let url = match repo.find_remote(name) {
            Ok(remote) => remote.url().map(str::to_string),
            Err(e) if e.code() == ErrorCode::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(url)
    }

    pub fn remotes(&self) -> Result<Vec<String>> {
        let repo = self.repo()?;
        let names = repo.remotes()?;
        Ok(names.iter().flatten().map(str::to_string).collect())
    }

    /// Fetch the remote's configured refspecs
    pub fn fetch_once(&self, remote_name: &str, creds: &Credentials) -> Result<()> {
        let repo = self.repo()?;
        let mut remote = find_remote(&repo, remote_name)?;
        let deadline = Instant::now() + self.network_timeout;

        let mut fetch_options = FetchOptions::new();
        fetch_options
            .remote_callbacks(remote_callbacks(creds, deadline))
            .prune(FetchPrune::On);

        log::info!(
            "Fetching '{}' ({})",
            remote_name,
            url::redact(remote.url().unwrap_or_default())
        );
        remote
            .fetch(&[] as &[&str], Some(&mut fetch_options), None)
            .map_err(|e| self.network_error("fetch", remote_name, e, deadline))?;
        Ok(())
    }

    /// Push a local branch to the same-named remote branch
    pub fn push(
        &self,
        remote_name: &str,
        branch_name: &str,
        creds: &Credentials,
    ) -> Result<PushOutcome> {
        let refspec = format!("refs/heads/{branch_name}:refs/heads/{branch_name}");
        let repo = self.repo()?;
        if repo.find_reference(&format!("refs/heads/{branch_name}")).is_err() {
            return Err(SyncError::BranchNotFound(branch_name.to_string()));
        }

        match self.push_refspec(&repo, remote_name, &refspec, creds) {
            Ok(()) => Ok(PushOutcome::Pushed),
            Err(SyncError::NonFastForward { .. }) => {
                log::warn!("Push of '{branch_name}' to '{remote_name}' rejected as non-fast-forward");
                Ok(PushOutcome::NonFastForward)
            }
            Err(e) => Err(e),
        }
    }

    /// Push `refs/tags/<name>`
    pub fn push_tag(&self, name: &str, remote_name: &str, creds: &Credentials) -> Result<()> {
        let repo = self.repo()?;
        let refspec = format!("refs/tags/{name}:refs/tags/{name}");
        self.push_refspec(&repo, remote_name, &refspec, creds)
    }

    fn push_refspec(
        &self,
        repo: &Repository,
        remote_name: &str,
        refspec: &str,
        creds: &Credentials,
    ) -> Result<()> {
        let mut remote = find_remote(repo, remote_name)?;
        let deadline = Instant::now() + self.network_timeout;
        let rejection: RefCell<Option<String>> = RefCell::new(None);

        let mut callbacks = remote_callbacks(creds, deadline);
        callbacks.push_update_reference(|refname, status| {
            if let Some(message) = status {
                log::warn!("Remote rejected '{refname}': {message}");
                *rejection.borrow_mut() = Some(message.to_string());
            }
            Ok(())
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        log::info!("Pushing '{}' to '{}'", refspec, remote_name);
        remote
            .push(&[refspec], Some(&mut push_options))
            .map_err(|e| self.network_error("push", remote_name, e, deadline))?;
        drop(push_options);

        match rejection.into_inner() {
            None => Ok(()),
            Some(message) if is_non_fast_forward(&message) => Err(SyncError::NonFastForward {
                remote: remote_name.to_string(),
                branch: branch_of(refspec),
            }),
            Some(message) => Err(SyncError::NetworkOrAuth {
                remote: remote_name.to_string(),
                message,
            }),
        }
    }

    fn network_error(
        &self,
        operation: &str,
        remote_name: &str,
        err: git2::Error,
        deadline: Instant,
    ) -> SyncError {
        if Instant::now() >= deadline {
            return SyncError::Timeout {
                operation: format!("{operation} {remote_name}"),
                seconds: self.network_timeout.as_secs(),
            };
        }
        if err.code() == ErrorCode::NotFastForward || is_non_fast_forward(err.message()) {
            return SyncError::NonFastForward {
                remote: remote_name.to_string(),
                branch: String::new(),
            };
        }
        log::warn!("{operation} '{remote_name}' failed: {}", err.message());
        SyncError::NetworkOrAuth {
            remote: remote_name.to_string(),
            message: err.message().to_string(),
        }
    }
}

fn find_remote<'r>(repo: &'r Repository, name: &str) -> Result<git2::Remote<'r>> {
    repo.find_remote(name).map_err(|e| {
        if e.code() == ErrorCode::NotFound {
            SyncError::RemoteNotFound(name.to_string())
        } else {
            SyncError::Git(e)
        }
    })
}

fn is_non_fast_forward(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("non-fast-forward")
        || message.contains("not present locally")
        || message.contains("fastforwardable")
        || message.contains("fetch first")
}

fn branch_of(refspec: &str) -> String {
    let dst = refspec.rsplit(':').next().unwrap_or(refspec);
    dst.trim_start_matches("refs/heads/")
        .trim_start_matches("refs/tags/")
        .to_string()
}
