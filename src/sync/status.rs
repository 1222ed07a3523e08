use serde::Serialize;
use std::path::PathBuf;

use super::discovery::LocalDashboard;
use super::DashboardSync;
use crate::error::Result;
use crate::scm::{url, BackendKind};
use crate::settings::DEFAULT_REMOTE;

/// Snapshot of the local repository for display.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryStatus {
    pub path: PathBuf,
    pub backend: BackendKind,
    pub is_repository: bool,
    pub head: Option<String>,
    pub remote_url: Option<String>,
    pub web_url: Option<String>,
    pub dashboards: Vec<LocalDashboard>,
}

impl DashboardSync {
    pub fn status(&self) -> Result<RepositoryStatus> {
        let dashboards = self.list_local_dashboards()?;
        self.query("status", |backend| {
            let is_repository = backend.is_repository();
            let (head, remote_url) = if is_repository {
                (backend.head_tip()?, backend.remote_url(DEFAULT_REMOTE)?)
            } else {
                (None, None)
            };
            let web_url = remote_url.as_deref().map(url::web_url);

            Ok(RepositoryStatus {
                path: backend.workdir().to_path_buf(),
                backend: backend.kind(),
                is_repository,
                head,
                remote_url: remote_url.as_deref().map(url::redact),
                web_url,
                dashboards,
            })
        })
    }
}
