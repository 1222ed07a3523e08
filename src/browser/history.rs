use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::scm::RepoBackend;

/// When `dir` last changed on the checked-out cache branch.
///
/// The backend's path-filtered history is tried first. When it errors or
/// finds nothing, every commit from HEAD is scanned against its first parent.
/// The scan is linear in history size and runs on every call.
pub(super) fn last_change(backend: &dyn RepoBackend, dir: &str) -> Result<Option<DateTime<Utc>>> {
    match backend.path_history_last_change(dir) {
        Ok(Some(timestamp)) => return Ok(Some(timestamp)),
        Ok(None) => log::debug!("No path history for '{dir}'; scanning all commits"),
        Err(err) => log::debug!("Path history for '{dir}' failed ({err}); scanning all commits"),
    }
    backend.full_scan_last_change(dir)
}
