use super::DashboardSync;
use crate::error::{Completed, SyncOutcome};
use crate::scm::url;

impl DashboardSync {
    /// Add the remote or overwrite its URL.
    pub fn set_remote(&self, name: &str, remote_url: &str) -> SyncOutcome {
        let operation = format!("set remote '{name}' -> {}", url::redact(remote_url));
        self.run(&operation, |backend| {
            if backend.remote_url(name)?.as_deref() == Some(remote_url) {
                return Ok(Completed::NothingToDo);
            }
            backend.set_remote(name, remote_url)?;
            Ok(Completed::Done)
        })
    }

    /// URL of a configured remote, if any.
    pub fn remote_url(&self, name: &str) -> Option<String> {
        self.query(&format!("read remote '{name}'"), |backend| {
            if !backend.is_repository() {
                return Ok(None);
            }
            backend.remote_url(name)
        })
        .ok()
        .flatten()
    }
}
