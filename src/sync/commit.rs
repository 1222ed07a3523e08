use chrono::Local;

use super::DashboardSync;
use crate::error::{Completed, Result, SyncOutcome};
use crate::scm::{CommitOutcome, CommitSelection, RepoBackend};
use crate::settings::Settings;

const BLANK_MESSAGE: &str = "Update dashboards";

/// Default message for commits made from the host: local time, to the second.
pub fn default_commit_message() -> String {
    format!("{BLANK_MESSAGE} at {}", Local::now().format("%Y-%m-%d %H:%M:%S"))
}

fn normalize_message(message: &str) -> &str {
    let message = message.trim();
    if message.is_empty() {
        BLANK_MESSAGE
    } else {
        message
    }
}

pub(super) fn commit_with(
    backend: &dyn RepoBackend,
    selection: &CommitSelection,
    message: &str,
) -> Result<Completed> {
    backend.stage(selection)?;
    match backend.commit(normalize_message(message))? {
        CommitOutcome::Created(id) => {
            log::debug!("Committed {id}");
            Ok(Completed::Done)
        }
        CommitOutcome::NothingToCommit => Ok(Completed::NothingToDo),
    }
}

impl DashboardSync {
    /// Stage and commit every file in the dashboards root.
    ///
    /// A clean tree is `Completed::NothingToDo`, which is still a success.
    pub fn commit_all(&self, message: &str) -> SyncOutcome {
        self.run("commit all", |backend| {
            commit_with(backend, &CommitSelection::All, message)
        })
    }

    /// Stage and commit only the named top-level dashboards.
    ///
    /// An empty name list behaves like [`Self::commit_all`]. Names that would
    /// leave the repository root fail with `InvalidSelection` before anything
    /// is staged.
    pub fn commit_selected<S: AsRef<str>>(&self, message: &str, names: &[S]) -> SyncOutcome {
        self.run("commit selected", |backend| {
            let selection = CommitSelection::dashboards(names)?;
            commit_with(backend, &selection, message)
        })
    }

    /// Commit the settings' selected dashboards, or everything when none are
    /// selected. `None` uses [`default_commit_message`].
    pub fn commit_from_settings(&self, settings: &Settings, message: Option<&str>) -> SyncOutcome {
        let message = message
            .map(str::to_string)
            .unwrap_or_else(default_commit_message);
        let selection = settings.selection();
        if selection.is_empty() {
            self.commit_all(&message)
        } else {
            self.commit_selected(&message, &selection)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::scm::BackendKind;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn initialized(temp_dir: &TempDir) -> DashboardSync {
        let sync = DashboardSync::new(temp_dir.path(), BackendKind::LibGit2, Duration::from_secs(5));
        assert!(sync.ensure_initialized().is_success());
        sync
    }

    #[test]
    fn test_commit_all_clean_tree_is_nothing_to_do() {
        let temp_dir = TempDir::new().unwrap();
        let sync = initialized(&temp_dir);
        fs::create_dir_all(temp_dir.path().join("dash")).unwrap();
        fs::write(temp_dir.path().join("dash/layout.json"), "{}").unwrap();

        let first = sync.commit_all("first");
        assert_eq!(first.completed(), Some(&Completed::Done));

        let second = sync.commit_all("second");
        assert!(second.is_success());
        assert_eq!(second.completed(), Some(&Completed::NothingToDo));
    }

    #[test]
    fn test_commit_selected_rejects_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let sync = initialized(&temp_dir);

        let outcome = sync.commit_selected("escape", &["../outside"]);
        assert!(matches!(
            outcome,
            SyncOutcome::Failed(SyncError::InvalidSelection { .. })
        ));
    }

    #[test]
    fn test_commit_from_settings_uses_selection() {
        let temp_dir = TempDir::new().unwrap();
        let sync = initialized(&temp_dir);
        for dash in ["dash-a", "dash-b"] {
            fs::create_dir_all(temp_dir.path().join(dash)).unwrap();
            fs::write(temp_dir.path().join(dash).join("d.json"), dash).unwrap();
        }
        let settings = Settings {
            selected_dashboards: vec!["dash-b".into(), " ".into()],
            ..Settings::default()
        };

        assert!(sync.commit_from_settings(&settings, None).made_changes());

        let repo = git2::Repository::open(temp_dir.path()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        let tree = head.tree().unwrap();
        assert!(tree.get_path(std::path::Path::new("dash-b/d.json")).is_ok());
        assert!(tree.get_path(std::path::Path::new("dash-a/d.json")).is_err());
        assert!(head.message().unwrap().starts_with("Update dashboards at "));
    }

    #[test]
    fn test_blank_message_is_replaced() {
        assert_eq!(normalize_message("   "), "Update dashboards");
        assert_eq!(normalize_message(" keep "), "keep");
        assert!(default_commit_message().starts_with("Update dashboards at "));
    }
}
