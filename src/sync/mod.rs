//! Sync Service: the user-facing operations on the dashboards repository.
//!
//! Every public operation on [`DashboardSync`] holds the per-path lock for the
//! repository, catches panics, logs one outcome line and returns a
//! [`SyncOutcome`]. Internal helpers work on a `&dyn RepoBackend` and
//! propagate [`SyncError`] with `?`, so composite operations (push retrying
//! through pull) never re-enter the lock.

mod commit;
mod discovery;
mod init;
pub(crate) mod lock;
mod pull;
mod push;
mod remote;
mod status;

pub use commit::default_commit_message;
pub use discovery::LocalDashboard;
pub use init::{ApplyReport, StepSummary};
pub use status::RepositoryStatus;

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Completed, Result, SyncError, SyncOutcome};
use crate::scm::{self, BackendKind, RepoBackend};
use crate::settings::Settings;

/// Orchestrates a repository backend for one dashboards directory.
pub struct DashboardSync {
    repo_path: PathBuf,
    backend: Box<dyn RepoBackend>,
}

impl DashboardSync {
    pub fn new<P: AsRef<Path>>(repo_path: P, kind: BackendKind, network_timeout: Duration) -> Self {
        let repo_path = repo_path.as_ref().to_path_buf();
        let backend = scm::open_backend(kind, &repo_path, network_timeout);
        DashboardSync { repo_path, backend }
    }

    /// Service for the dashboards path and backend named in `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.effective_dashboards_path(),
            settings.backend,
            settings.network_timeout(),
        )
    }

    /// Service over an already constructed backend.
    pub fn with_backend(backend: Box<dyn RepoBackend>) -> Self {
        DashboardSync {
            repo_path: backend.workdir().to_path_buf(),
            backend,
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Run `op` under the path lock and fold its result into an outcome.
    fn run<F>(&self, operation: &str, op: F) -> SyncOutcome
    where
        F: FnOnce(&dyn RepoBackend) -> Result<Completed>,
    {
        let backend = self.backend.as_ref();
        let result = lock::with_path_lock(&self.repo_path, || {
            panic::catch_unwind(AssertUnwindSafe(|| op(backend)))
        });
        let outcome = SyncOutcome::from(flatten_panic(operation, result));
        log_outcome(operation, &outcome);
        outcome
    }

    /// Like [`Self::run`] for operations that produce a value.
    fn query<T, F>(&self, operation: &str, op: F) -> Result<T>
    where
        F: FnOnce(&dyn RepoBackend) -> Result<T>,
    {
        let backend = self.backend.as_ref();
        let result = lock::with_path_lock(&self.repo_path, || {
            panic::catch_unwind(AssertUnwindSafe(|| op(backend)))
        });
        let result = flatten_panic(operation, result);
        if let Err(err) = &result {
            log::error!("{operation} failed ({}): {err}", err.kind());
        }
        result
    }
}

pub(crate) fn flatten_panic<T>(
    operation: &str,
    result: std::thread::Result<Result<T>>,
) -> Result<T> {
    match result {
        Ok(inner) => inner,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            Err(SyncError::Internal {
                operation: operation.to_string(),
                message,
            })
        }
    }
}

pub(crate) fn log_outcome(operation: &str, outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Succeeded(_) => log::info!("{operation}: {outcome}"),
        SyncOutcome::RequiresManualResolution(_) => log::warn!("{operation}: {outcome}"),
        SyncOutcome::Failed(_) => log::error!("{operation}: {outcome}"),
    }
}

#[cfg(test)]
pub(crate) mod mock;
