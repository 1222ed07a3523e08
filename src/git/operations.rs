use git2::{ErrorCode, Oid, Repository, RepositoryState};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::manager::{head_commit, signature, GitManager};
use crate::error::{Result, SyncError};
use crate::scm::{CommitOutcome, CommitSelection, TagOutcome, METADATA_DIR};

impl GitManager {
    /// Stage additions, modifications and deletions under the selection
    pub fn stage(&self, selection: &CommitSelection) -> Result<()> {
        let repo = self.repo()?;
        let mut index = repo.index()?;

        let (roots, pathspecs): (Vec<PathBuf>, Vec<String>) = match selection {
            CommitSelection::All => (vec![self.workdir.clone()], vec!["*".to_string()]),
            CommitSelection::Dashboards(names) => (
                names.iter().map(|n| self.workdir.join(n)).collect(),
                names.clone(),
            ),
        };

        for root in roots.iter().filter(|r| r.exists()) {
            for relative in self.files_under(root) {
                if repo.is_path_ignored(&relative).unwrap_or(false) {
                    continue;
                }
                index.add_path(&relative)?;
            }
        }

        // Picks up deletions for paths already tracked.
        index.update_all(pathspecs.iter().map(String::as_str), None)?;
        index.write()?;
        log::debug!("Staged {:?}", selection);
        Ok(())
    }

    /// Files below `root`, relative to the working tree, skipping metadata
    fn files_under(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.file_name() != METADATA_DIR)
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&self.workdir)
                    .ok()
                    .map(Path::to_path_buf)
            })
            .collect()
    }

    /// Commit the index unless it matches HEAD.
    ///
    /// While a merge is in progress the commit concludes it: the merged
    /// heads become extra parents and the merge state is cleared.
    pub fn commit(&self, message: &str) -> Result<CommitOutcome> {
        let mut repo = self.repo()?;
        let merge_heads = merge_head_ids(&mut repo)?;
        let mut index = repo.index()?;
        if index.has_conflicts() {
            return Err(SyncError::MergeConflict {
                reference: "MERGE_HEAD".to_string(),
                paths: super::branches::conflicted_paths(&index)?,
            });
        }
        let tree_id = index.write_tree()?;
        let head = head_commit(&repo)?;

        let unchanged = merge_heads.is_empty()
            && match &head {
                Some(head) => head.tree_id() == tree_id,
                None => index.is_empty(),
            };
        if unchanged {
            log::info!("Nothing to commit");
            return Ok(CommitOutcome::NothingToCommit);
        }

        let mut parents: Vec<git2::Commit<'_>> = head.into_iter().collect();
        for id in &merge_heads {
            parents.push(repo.find_commit(*id)?);
        }
        let oid = write_commit(&repo, tree_id, &parents, message)?;
        if !merge_heads.is_empty() {
            repo.cleanup_state()?;
            log::info!("Concluded merge with commit {}", short(&oid));
        }
        log::info!("Created commit {} '{}'", short(&oid), message);
        Ok(CommitOutcome::Created(oid.to_string()))
    }

    pub fn commit_allow_empty(&self, message: &str) -> Result<String> {
        let repo = self.repo()?;
        let tree_id = repo.index()?.write_tree()?;
        let parents: Vec<git2::Commit<'_>> = head_commit(&repo)?.into_iter().collect();
        let oid = write_commit(&repo, tree_id, &parents, message)?;
        log::info!("Created bootstrap commit {} '{}'", short(&oid), message);
        Ok(oid.to_string())
    }

    pub fn tag_exists(&self, name: &str) -> Result<bool> {
        let repo = self.repo()?;
        let exists = repo.find_reference(&format!("refs/tags/{name}")).is_ok();
        Ok(exists)
    }

    /// Annotated tag on HEAD; never moves an existing tag
    pub fn create_annotated_tag(&self, name: &str, message: &str) -> Result<TagOutcome> {
        let repo = self.repo()?;
        if repo.find_reference(&format!("refs/tags/{name}")).is_ok() {
            log::info!("Tag '{name}' already exists");
            return Ok(TagOutcome::AlreadyExists);
        }

        let target = head_commit(&repo)?.ok_or(SyncError::EmptyRepository)?;
        let sig = signature(&repo)?;
        match repo.tag(name, target.as_object(), &sig, message, false) {
            Ok(_) => {
                log::info!("Created tag '{}' at {}", name, short(&target.id()));
                Ok(TagOutcome::Created)
            }
            Err(e) if e.code() == ErrorCode::Exists => Ok(TagOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }
}

/// Heads recorded in MERGE_HEAD while a merge is in progress.
fn merge_head_ids(repo: &mut Repository) -> Result<Vec<Oid>> {
    if !matches!(repo.state(), RepositoryState::Merge) {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    repo.mergehead_foreach(|oid| {
        ids.push(*oid);
        true
    })?;
    Ok(ids)
}

fn write_commit(
    repo: &Repository,
    tree_id: Oid,
    parents: &[git2::Commit<'_>],
    message: &str,
) -> Result<Oid> {
    let tree = repo.find_tree(tree_id)?;
    let sig = signature(repo)?;
    let parents: Vec<&git2::Commit<'_>> = parents.iter().collect();
    let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
    Ok(oid)
}

pub(super) fn short(oid: &Oid) -> String {
    oid.to_string().chars().take(8).collect()
}
