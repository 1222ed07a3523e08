use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use super::DashboardSync;
use crate::error::{Result, SyncError};
use crate::scm;

/// A dashboard directory directly under the local dashboards root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalDashboard {
    pub name: String,
    pub path: PathBuf,
    /// Filesystem modification time of the directory itself
    pub modified: Option<DateTime<Utc>>,
}

impl DashboardSync {
    /// Top-level dashboards of the working tree, sorted by name.
    pub fn list_local_dashboards(&self) -> Result<Vec<LocalDashboard>> {
        self.query("list local dashboards", |backend| {
            let root = backend.workdir();
            if !root.exists() {
                return Ok(Vec::new());
            }

            scm::top_level_dirs(root)?
                .into_iter()
                .map(|(name, path)| -> Result<LocalDashboard> {
                    let modified = std::fs::metadata(&path)
                        .and_then(|m| m.modified())
                        .map_err(|e| SyncError::io(&path, e))?;
                    Ok(LocalDashboard {
                        name,
                        path,
                        modified: Some(DateTime::<Utc>::from(modified)),
                    })
                })
                .collect()
        })
    }
}
