//! Error taxonomy and operation outcomes for the synchronization engine.
//!
//! Backend and service internals propagate [`SyncError`] with `?`. Public
//! operations never return it directly: they fold it into a [`SyncOutcome`]
//! so the host can tell "nothing to do" apart from "blocked" apart from
//! "broken".

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by repository backends and the services built on them.
#[derive(Debug, Error)]
pub enum SyncError {
    // ==========================================================================
    // Environment
    // ==========================================================================
    #[error("Path is not writable: '{}'", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Repository backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    // ==========================================================================
    // Remote interaction
    // ==========================================================================
    #[error("Could not reach or authenticate with remote '{remote}': {message}")]
    NetworkOrAuth { remote: String, message: String },

    #[error("Remote '{0}' is not configured")]
    RemoteNotFound(String),

    #[error("Remote branch not found: {remote}/{branch}")]
    RemoteBranchNotFound { remote: String, branch: String },

    #[error("Push to {remote}/{branch} rejected: non-fast-forward")]
    NonFastForward { remote: String, branch: String },

    #[error("Merging '{reference}' produced conflicts in {} path(s); manual resolution required", paths.len())]
    MergeConflict {
        reference: String,
        paths: Vec<String>,
    },

    // ==========================================================================
    // Local repository state
    // ==========================================================================
    #[error("Nothing to do: {0}")]
    NothingToDo(String),

    #[error("Local branch not found: {0}")]
    BranchNotFound(String),

    #[error("Repository has no commits")]
    EmptyRepository,

    #[error("Invalid dashboard selection '{name}': {reason}")]
    InvalidSelection { name: String, reason: &'static str },

    // ==========================================================================
    // Underlying mechanisms
    // ==========================================================================
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("{operation} aborted unexpectedly: {message}")]
    Internal { operation: String, message: String },
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short, stable name of the taxonomy member, used in log lines and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::PermissionDenied { .. } => "PermissionDenied",
            SyncError::BackendUnavailable(_) => "BackendUnavailable",
            SyncError::Timeout { .. } => "Timeout",
            SyncError::NetworkOrAuth { .. } => "NetworkOrAuth",
            SyncError::RemoteNotFound(_) => "RemoteNotFound",
            SyncError::RemoteBranchNotFound { .. } => "RemoteBranchNotFound",
            SyncError::NonFastForward { .. } => "NonFastForward",
            SyncError::MergeConflict { .. } => "MergeConflict",
            SyncError::NothingToDo(_) => "NothingToDo",
            SyncError::BranchNotFound(_) => "BranchNotFound",
            SyncError::EmptyRepository => "EmptyRepository",
            SyncError::InvalidSelection { .. } => "InvalidSelection",
            SyncError::Git(_) => "Git",
            SyncError::Io { .. } => "Io",
            SyncError::Command { .. } => "Command",
            SyncError::Internal { .. } => "Internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// What a successful operation actually did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "tag")]
pub enum Completed {
    Done,
    /// The request was valid but there was nothing to change (clean tree, etc).
    NothingToDo,
    UpToDate,
    FastForwarded,
    Merged,
    TagCreated(String),
    TagAlreadyExists(String),
}

/// Result of a public engine operation.
#[derive(Debug)]
pub enum SyncOutcome {
    Succeeded(Completed),
    Failed(SyncError),
    /// The engine stopped short of finishing because a human has to merge or rebase.
    RequiresManualResolution(SyncError),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Succeeded(_))
    }

    /// True only when the operation changed something.
    pub fn made_changes(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Succeeded(
                Completed::Done
                    | Completed::FastForwarded
                    | Completed::Merged
                    | Completed::TagCreated(_)
            )
        )
    }

    pub fn completed(&self) -> Option<&Completed> {
        match self {
            SyncOutcome::Succeeded(completed) => Some(completed),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            SyncOutcome::Succeeded(_) => None,
            SyncOutcome::Failed(err) | SyncOutcome::RequiresManualResolution(err) => Some(err),
        }
    }
}

impl From<Result<Completed>> for SyncOutcome {
    fn from(result: Result<Completed>) -> Self {
        match result {
            Ok(completed) => SyncOutcome::Succeeded(completed),
            Err(SyncError::NothingToDo(_)) => SyncOutcome::Succeeded(Completed::NothingToDo),
            Err(err @ SyncError::MergeConflict { .. }) => {
                SyncOutcome::RequiresManualResolution(err)
            }
            Err(err @ SyncError::NonFastForward { .. }) => {
                SyncOutcome::RequiresManualResolution(err)
            }
            Err(err) => SyncOutcome::Failed(err),
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Succeeded(Completed::Done) => write!(f, "succeeded"),
            SyncOutcome::Succeeded(Completed::NothingToDo) => write!(f, "nothing to do"),
            SyncOutcome::Succeeded(Completed::UpToDate) => write!(f, "already up to date"),
            SyncOutcome::Succeeded(Completed::FastForwarded) => write!(f, "fast-forwarded"),
            SyncOutcome::Succeeded(Completed::Merged) => write!(f, "merged"),
            SyncOutcome::Succeeded(Completed::TagCreated(name)) => {
                write!(f, "created tag '{name}'")
            }
            SyncOutcome::Succeeded(Completed::TagAlreadyExists(name)) => {
                write!(f, "tag '{name}' already exists")
            }
            SyncOutcome::Failed(err) => write!(f, "failed ({}): {err}", err.kind()),
            SyncOutcome::RequiresManualResolution(err) => {
                write!(f, "requires manual resolution: {err}")
            }
        }
    }
}
