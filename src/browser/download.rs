use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use super::{refresh_cache, RemoteBrowser};
use crate::credentials;
use crate::error::{Result, SyncError};
use crate::scm::{CommitSelection, METADATA_DIR};
use crate::settings::Settings;
use crate::sync::lock;

impl RemoteBrowser {
    /// Replace each named dashboard under `dest_root` with the remote copy.
    ///
    /// Names missing from the remote are skipped with a warning. Returns the
    /// names that were copied. Nothing is committed here.
    pub fn download<S: AsRef<str>>(
        &self,
        settings: &Settings,
        url: &str,
        branch: &str,
        names: &[S],
        dest_root: &Path,
    ) -> Result<Vec<String>> {
        let names = match CommitSelection::dashboards(names)? {
            CommitSelection::Dashboards(names) => names,
            CommitSelection::All => return Ok(Vec::new()),
        };

        self.guarded("download dashboards", |backend| {
            let creds = credentials::resolve(settings);
            refresh_cache(backend, &creds, url, branch)?;

            lock::with_path_lock(dest_root, || {
                let mut copied = Vec::new();
                for name in &names {
                    let source = backend.workdir().join(name);
                    if !source.is_dir() {
                        log::warn!("Dashboard '{name}' is not on the remote; skipped");
                        continue;
                    }
                    let target = dest_root.join(name);
                    if target.exists() {
                        fs::remove_dir_all(&target).map_err(|e| SyncError::io(&target, e))?;
                    }
                    copy_tree(&source, &target)?;
                    log::info!("Downloaded '{name}' to '{}'", target.display());
                    copied.push(name.clone());
                }
                Ok(copied)
            })
        })
    }
}

fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    for entry in WalkDir::new(source)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name() != METADATA_DIR)
    {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source.to_path_buf());
            SyncError::io(path, std::io::Error::other(e.to_string()))
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| SyncError::io(entry.path(), std::io::Error::other(e.to_string())))?;
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination).map_err(|e| SyncError::io(&destination, e))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &destination).map_err(|e| SyncError::io(&destination, e))?;
        }
    }
    Ok(())
}
