use super::DashboardSync;
use crate::credentials::{self, Credentials};
use crate::error::{Completed, Result, SyncError, SyncOutcome};
use crate::scm::{MergeOutcome, RepoBackend};
use crate::settings::Settings;

/// Fetch `remote`, then bring the local `branch` up to `<remote>/<branch>`.
///
/// The local branch is created at the remote tip when missing and always
/// tracks the remote branch afterwards. Conflicts surface as
/// `MergeConflict` with nothing committed.
pub(super) fn pull_with(
    backend: &dyn RepoBackend,
    creds: &Credentials,
    remote: &str,
    branch: &str,
) -> Result<Completed> {
    backend.fetch(remote, creds)?;

    if backend.remote_branch_tip(remote, branch)?.is_none() {
        return Err(SyncError::RemoteBranchNotFound {
            remote: remote.to_string(),
            branch: branch.to_string(),
        });
    }

    backend.track_remote_branch(remote, branch)?;

    match backend.merge(remote, branch)? {
        MergeOutcome::UpToDate => Ok(Completed::UpToDate),
        MergeOutcome::FastForwarded => Ok(Completed::FastForwarded),
        MergeOutcome::Merged => Ok(Completed::Merged),
        MergeOutcome::Conflicted(paths) => Err(SyncError::MergeConflict {
            reference: format!("{remote}/{branch}"),
            paths,
        }),
    }
}

impl DashboardSync {
    /// Pull `<remote>/<branch>` into the local branch of the same name.
    ///
    /// Credentials are resolved from `settings` for this call only.
    pub fn pull(&self, settings: &Settings, remote: &str, branch: &str) -> SyncOutcome {
        self.run(&format!("pull {remote}/{branch}"), |backend| {
            let creds = credentials::resolve(settings);
            pull_with(backend, &creds, remote, branch)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::mock::{Call, ScriptedBackend};

    #[test]
    fn test_missing_remote_branch_stops_before_merge() {
        let backend = ScriptedBackend::default();
        let result = pull_with(&backend, &Credentials::default(), "origin", "main");

        assert!(matches!(result, Err(SyncError::RemoteBranchNotFound { .. })));
        assert_eq!(backend.calls(), vec![Call::Fetch]);
    }

    #[test]
    fn test_conflict_is_reported_distinctly() {
        let backend = ScriptedBackend::with_remote_tip();
        backend.script_merge(MergeOutcome::Conflicted(vec!["dash/a.json".into()]));

        let result = pull_with(&backend, &Credentials::default(), "origin", "main");
        let outcome = SyncOutcome::from(result);
        assert!(matches!(
            outcome,
            SyncOutcome::RequiresManualResolution(SyncError::MergeConflict { .. })
        ));
        assert_eq!(backend.calls(), vec![Call::Fetch, Call::Track, Call::Merge]);
    }

    #[test]
    fn test_fast_forward() {
        let backend = ScriptedBackend::with_remote_tip();
        backend.script_merge(MergeOutcome::FastForwarded);

        let result = pull_with(&backend, &Credentials::default(), "origin", "main").unwrap();
        assert_eq!(result, Completed::FastForwarded);
    }
}
