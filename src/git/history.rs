//! Last-change lookups for top-level directories.

use chrono::{DateTime, Utc};
use git2::{Commit, Repository, Sort};
use std::collections::{BinaryHeap, HashSet};
use std::path::Path;

use super::manager::{head_commit, GitManager};
use crate::error::{Result, SyncError};
use crate::scm::timestamp_from_secs;

impl GitManager {
    /// Newest commit that changed `dir`, following `git log -- dir/` history
    /// simplification: a merge whose `dir` matches one of its parents is
    /// skipped and only that parent is followed.
    pub fn path_history_last_change(&self, dir: &str) -> Result<Option<DateTime<Utc>>> {
        let repo = self.repo()?;
        let dir_path = Path::new(dir);
        let Some(head) = head_commit(&repo)? else {
            return Ok(None);
        };

        let mut queue = BinaryHeap::new();
        let mut seen = HashSet::new();
        queue.push((head.time().seconds(), head.id()));
        seen.insert(head.id());

        while let Some((secs, oid)) = queue.pop() {
            let commit = repo.find_commit(oid)?;
            let current = entry_id(&commit, dir_path)?;

            let mut parents = Vec::with_capacity(commit.parent_count());
            for parent in commit.parents() {
                let same = entry_id(&parent, dir_path)? == current;
                parents.push((parent, same));
            }

            let next: Vec<Commit<'_>> = match parents.iter().position(|(_, same)| *same) {
                Some(idx) => vec![parents.swap_remove(idx).0],
                None if parents.is_empty() && current.is_none() => Vec::new(),
                None => return Ok(timestamp_from_secs(secs)),
            };
            for parent in next {
                if seen.insert(parent.id()) {
                    queue.push((parent.time().seconds(), parent.id()));
                }
            }
        }
        Ok(None)
    }

    /// Newest commit whose first-parent diff touches a path under `dir/`
    pub fn full_scan_last_change(&self, dir: &str) -> Result<Option<DateTime<Utc>>> {
        let repo = self.repo()?;
        let prefix = format!("{}/", dir.trim_end_matches('/'));

        for commit in walk_from_head(&repo)? {
            let commit = commit?;
            let tree = commit.tree()?;
            let parent_tree = match commit.parent(0) {
                Ok(parent) => Some(parent.tree()?),
                Err(_) => None,
            };
            let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

            let touched = diff.deltas().any(|delta| {
                [delta.new_file().path(), delta.old_file().path()]
                    .into_iter()
                    .flatten()
                    .any(|p| p.to_string_lossy().replace('\\', "/").starts_with(&prefix))
            });
            if touched {
                return Ok(timestamp_from_secs(commit.time().seconds()));
            }
        }
        Ok(None)
    }
}

/// Commits reachable from HEAD, newest first, looked up as the walk advances.
fn walk_from_head(repo: &Repository) -> Result<impl Iterator<Item = Result<Commit<'_>>> + '_> {
    let mut revwalk = repo.revwalk()?;
    revwalk.set_sorting(Sort::TIME)?;
    if head_commit(repo)?.is_some() {
        revwalk.push_head()?;
    }
    Ok(revwalk.map(move |oid| Ok::<_, SyncError>(repo.find_commit(oid?)?)))
}

fn entry_id(commit: &Commit<'_>, dir: &Path) -> Result<Option<git2::Oid>> {
    let tree = commit.tree()?;
    let id = tree.get_path(dir).ok().map(|entry| entry.id());
    Ok(id)
}
