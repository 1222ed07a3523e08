use git2::{Repository, Signature};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SyncError};

const SIGNATURE_NAME: &str = "Dashboard Sync";
const SIGNATURE_EMAIL: &str = "dashboard-sync@localhost";

/// libgit2-backed repository manager for one dashboards directory.
///
/// Only the path is held; the repository is reopened for every operation so
/// that nothing stale survives between calls.
pub struct GitManager {
    pub(super) workdir: PathBuf,
    pub(super) network_timeout: Duration,
}

impl GitManager {
    pub fn new<P: AsRef<Path>>(path: P, network_timeout: Duration) -> Self {
        GitManager {
            workdir: path.as_ref().to_path_buf(),
            network_timeout,
        }
    }

    /// Open the repository at the managed path.
    pub(super) fn repo(&self) -> Result<Repository> {
        Repository::open(&self.workdir).map_err(|e| {
            log::debug!(
                "Failed to open git repository at {}: {}",
                self.workdir.display(),
                e
            );
            SyncError::Git(e)
        })
    }

    pub fn is_repository(&self) -> bool {
        let ok = Repository::open(&self.workdir).is_ok();
        log::debug!("IsRepository '{}': {}", self.workdir.display(), ok);
        ok
    }

    /// Initialize a new repository
    pub fn init_repository(&self) -> Result<()> {
        std::fs::create_dir_all(&self.workdir).map_err(|e| SyncError::io(&self.workdir, e))?;
        Repository::init(&self.workdir)?;
        Ok(())
    }

    /// Report the linked libgit2 version; the library is always present.
    pub fn probe(&self) -> Result<()> {
        let version = git2::Version::get();
        let (major, minor, rev) = version.libgit2_version();
        log::debug!("libgit2 loaded. Version: {major}.{minor}.{rev}");
        Ok(())
    }
}

/// Signature from the repository config, or the engine's fixed identity.
pub(super) fn signature(repo: &Repository) -> Result<Signature<'static>> {
    match repo.signature() {
        Ok(sig) => Ok(sig.to_owned()),
        Err(_) => Ok(Signature::now(SIGNATURE_NAME, SIGNATURE_EMAIL)?),
    }
}

/// Commit HEAD resolves to, or `None` while the branch is unborn.
pub(super) fn head_commit(repo: &Repository) -> Result<Option<git2::Commit<'_>>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(e)
            if e.code() == git2::ErrorCode::UnbornBranch
                || e.code() == git2::ErrorCode::NotFound =>
        {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
