//! Remote Browser: inspect a remote through a disposable cache repository.
//!
//! The cache lives at a fixed location and is shared by every browser in the
//! process, so all access goes through the same per-path lock the Sync
//! Service uses. The user's working tree is never touched, except by
//! [`RemoteBrowser::download`], which copies directories into it.

mod download;
mod history;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ConfigManager;
use crate::credentials::{self, Credentials};
use crate::error::{Result, SyncError};
use crate::scm::{self, BackendKind, RepoBackend, METADATA_DIR};
use crate::settings::{Settings, DEFAULT_REMOTE};
use crate::sync::{flatten_panic, lock};

/// A top-level directory of the remote branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteDirectoryEntry {
    pub name: String,
    /// Commit time of the newest commit that touched the directory
    pub last_modified: Option<DateTime<Utc>>,
}

pub struct RemoteBrowser {
    cache_path: PathBuf,
    kind: BackendKind,
    network_timeout: Duration,
}

impl RemoteBrowser {
    pub fn new<P: AsRef<Path>>(cache_path: P, kind: BackendKind, network_timeout: Duration) -> Self {
        RemoteBrowser {
            cache_path: cache_path.as_ref().to_path_buf(),
            kind,
            network_timeout,
        }
    }

    /// Browser over the process-wide cache location.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            ConfigManager::remote_cache_dir(),
            settings.backend,
            settings.network_timeout(),
        )
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Top-level directories of `<url>` at `branch`, sorted by name, each with
    /// the time it last changed.
    pub fn list_remote_top_level_entries(
        &self,
        settings: &Settings,
        url: &str,
        branch: &str,
    ) -> Result<Vec<RemoteDirectoryEntry>> {
        self.guarded(&format!("list {} @ {branch}", scm::url::redact(url)), |backend| {
            let creds = credentials::resolve(settings);
            refresh_cache(backend, &creds, url, branch)?;

            let mut entries = Vec::new();
            for (name, _) in scm::top_level_dirs(backend.workdir())? {
                let last_modified = history::last_change(backend, &name)?;
                log::debug!("Remote dashboard '{name}' last changed {last_modified:?}");
                entries.push(RemoteDirectoryEntry {
                    name,
                    last_modified,
                });
            }
            log::info!("Remote lists {} dashboard(s)", entries.len());
            Ok(entries)
        })
    }

    fn guarded<T, F>(&self, operation: &str, op: F) -> Result<T>
    where
        F: FnOnce(&dyn RepoBackend) -> Result<T>,
    {
        let backend = scm::open_backend(self.kind, &self.cache_path, self.network_timeout);
        let result = lock::with_path_lock(&self.cache_path, || {
            panic::catch_unwind(AssertUnwindSafe(|| op(backend.as_ref())))
        });
        let result = flatten_panic(operation, result);
        if let Err(err) = &result {
            log::error!("{operation} failed ({}): {err}", err.kind());
        }
        result
    }
}

/// Point the cache at `url` and make its working tree match `origin/<branch>`.
fn refresh_cache(
    backend: &dyn RepoBackend,
    creds: &Credentials,
    url: &str,
    branch: &str,
) -> Result<()> {
    let cache = backend.workdir();
    if cache.exists() && !backend.is_repository() {
        log::warn!(
            "Cache repository at '{}' has no {} directory; recreating",
            cache.display(),
            METADATA_DIR
        );
        std::fs::remove_dir_all(cache).map_err(|e| SyncError::io(cache, e))?;
    }
    backend.init_if_needed()?;

    for name in backend.remotes()? {
        if name != DEFAULT_REMOTE {
            backend.remove_remote(&name)?;
        }
    }
    backend.set_remote(DEFAULT_REMOTE, url)?;
    backend.fetch(DEFAULT_REMOTE, creds)?;
    backend.reset_hard_to_remote(DEFAULT_REMOTE, branch)
}
