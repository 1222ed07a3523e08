use serde::Serialize;

use super::pull::pull_with;
use super::DashboardSync;
use crate::credentials;
use crate::error::{Completed, Result, SyncOutcome};
use crate::scm::{InitOutcome, RepoBackend};
use crate::settings::{Settings, DEFAULT_REMOTE};

/// Outcome of each step of [`DashboardSync::apply_settings`].
///
/// Steps that were not attempted are `None`: the remote step when no URL is
/// configured, the pull step when auto-pull is off, and every later step once
/// initialization failed.
#[derive(Debug)]
pub struct ApplyReport {
    pub initialized: SyncOutcome,
    pub remote: Option<SyncOutcome>,
    pub branch: Option<SyncOutcome>,
    pub pull: Option<SyncOutcome>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.initialized.is_success()
            && [&self.remote, &self.branch, &self.pull]
                .into_iter()
                .flatten()
                .all(SyncOutcome::is_success)
    }

    pub fn steps(&self) -> Vec<StepSummary> {
        let mut steps = vec![summary("init", &self.initialized)];
        for (step, outcome) in [("remote", &self.remote), ("branch", &self.branch), ("pull", &self.pull)] {
            if let Some(outcome) = outcome {
                steps.push(summary(step, outcome));
            }
        }
        steps
    }
}

/// Serializable step summary for `--json` output.
#[derive(Debug, Serialize)]
pub struct StepSummary {
    pub step: &'static str,
    pub success: bool,
    pub detail: String,
}

fn summary(step: &'static str, outcome: &SyncOutcome) -> StepSummary {
    StepSummary {
        step,
        success: outcome.is_success(),
        detail: outcome.to_string(),
    }
}

pub(super) fn ensure_initialized_with(backend: &dyn RepoBackend) -> Result<Completed> {
    backend.probe()?;
    match backend.init_if_needed()? {
        InitOutcome::Created => Ok(Completed::Done),
        InitOutcome::AlreadyInitialized => Ok(Completed::NothingToDo),
    }
}

impl DashboardSync {
    /// Verify the backend can run here and create the repository if absent.
    ///
    /// Calling this on an existing repository succeeds with
    /// `Completed::NothingToDo` and leaves its metadata untouched.
    pub fn ensure_initialized(&self) -> SyncOutcome {
        self.run("ensure initialized", ensure_initialized_with)
    }

    /// Check out `branch`, creating it from HEAD or bootstrapping an empty
    /// repository with an empty initial commit.
    pub fn checkout_or_create_branch(&self, branch: &str) -> SyncOutcome {
        self.run(&format!("checkout '{branch}'"), |backend| {
            backend.checkout_or_create_branch(branch)?;
            Ok(Completed::Done)
        })
    }

    /// Bring the repository in line with a settings snapshot: initialize,
    /// point `origin` at the configured URL, switch to the configured branch,
    /// and pull when auto-pull is enabled.
    pub fn apply_settings(&self, settings: &Settings) -> ApplyReport {
        let initialized = self.ensure_initialized();
        if !initialized.is_success() {
            return ApplyReport {
                initialized,
                remote: None,
                branch: None,
                pull: None,
            };
        }

        let remote = settings
            .remote_url()
            .map(|url| self.set_remote(DEFAULT_REMOTE, url));

        let branch_name = settings.effective_branch();
        let auto_pull = || {
            self.run(&format!("auto-pull {DEFAULT_REMOTE}/{branch_name}"), |backend| {
                let creds = credentials::resolve(settings);
                pull_with(backend, &creds, DEFAULT_REMOTE, branch_name)
            })
        };

        let wants_pull = settings.auto_pull_on_start && settings.remote_url().is_some();
        // An unborn repository takes the remote branch as-is; bootstrapping it
        // first would leave two unrelated root commits to merge.
        let unborn = self
            .query("inspect HEAD", |backend| backend.head_tip())
            .map(|tip| tip.is_none())
            .unwrap_or(false);

        let (branch, pull) = if wants_pull && unborn {
            let pull = auto_pull();
            (Some(self.checkout_or_create_branch(branch_name)), Some(pull))
        } else {
            let branch = Some(self.checkout_or_create_branch(branch_name));
            (branch, wants_pull.then(auto_pull))
        };

        ApplyReport {
            initialized,
            remote,
            branch,
            pull,
        }
    }
}
