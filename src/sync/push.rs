use super::pull::pull_with;
use super::DashboardSync;
use crate::credentials::{self, Credentials};
use crate::error::{Completed, Result, SyncError, SyncOutcome};
use crate::scm::{PushOutcome, RepoBackend, TagOutcome};
use crate::settings::Settings;

/// Push `branch`, recovering from one non-fast-forward rejection.
///
/// On rejection the remote is pulled once and the push retried once. A
/// second rejection, or a conflicting pull, stops with the local history
/// untouched beyond what the pull merged.
pub(super) fn push_with(
    backend: &dyn RepoBackend,
    creds: &Credentials,
    remote: &str,
    branch: &str,
) -> Result<Completed> {
    if backend.head_tip()?.is_none() {
        backend.commit_allow_empty("Initial commit")?;
    }
    backend.ensure_upstream(remote, branch)?;

    if backend.push(remote, branch, creds)? == PushOutcome::Pushed {
        return Ok(Completed::Done);
    }

    log::warn!("Push to {remote}/{branch} was non-fast-forward; pulling once and retrying");
    pull_with(backend, creds, remote, branch)?;

    match backend.push(remote, branch, creds)? {
        PushOutcome::Pushed => Ok(Completed::Done),
        PushOutcome::NonFastForward => Err(SyncError::NonFastForward {
            remote: remote.to_string(),
            branch: branch.to_string(),
        }),
    }
}

pub(super) fn tag_and_push_with(
    backend: &dyn RepoBackend,
    creds: Option<&Credentials>,
    remote: &str,
    name: &str,
) -> Result<Completed> {
    let created = backend.create_annotated_tag(name, &format!("Dashboards {name}"))?;

    if let Some(creds) = creds {
        backend.push_tag(name, remote, creds)?;
    } else {
        log::info!("No remote configured; tag '{name}' kept local");
    }

    Ok(match created {
        TagOutcome::Created => Completed::TagCreated(name.to_string()),
        TagOutcome::AlreadyExists => Completed::TagAlreadyExists(name.to_string()),
    })
}

impl DashboardSync {
    /// Push the local `branch` to `<remote>/<branch>`.
    ///
    /// A second non-fast-forward after the automatic pull is reported as
    /// `RequiresManualResolution`.
    pub fn push(&self, settings: &Settings, remote: &str, branch: &str) -> SyncOutcome {
        self.run(&format!("push {remote}/{branch}"), |backend| {
            let creds = credentials::resolve(settings);
            push_with(backend, &creds, remote, branch)
        })
    }

    /// Tag HEAD as `<prefix><identifier>` and push the tag.
    ///
    /// An existing tag is reported as `Completed::TagAlreadyExists` and left
    /// where it is; it is still pushed so a remote that missed it catches up.
    /// Without a configured remote URL the tag stays local.
    pub fn create_tag_and_push(
        &self,
        settings: &Settings,
        remote: &str,
        prefix: &str,
        identifier: &str,
    ) -> SyncOutcome {
        let name = format!("{}{}", prefix.trim(), identifier.trim());
        self.run(&format!("tag '{name}'"), |backend| {
            if name.is_empty() {
                return Err(SyncError::InvalidSelection {
                    name: name.clone(),
                    reason: "tag name must not be empty",
                });
            }
            let creds = settings.remote_url().map(|_| credentials::resolve(settings));
            tag_and_push_with(backend, creds.as_ref(), remote, &name)
        })
    }
}
