//! # dashboard-git-sync
//!
//! Keeps a local folder of dashboards in sync with a remote git repository.
//!
//! ## Overview
//!
//! Each top-level directory of the dashboards folder is one dashboard. The
//! folder is a git working tree; this crate initializes it, points it at a
//! remote, commits the selected dashboards, pulls and pushes them, and tags
//! releases. A separate cache repository lets callers browse what the remote
//! holds and copy individual dashboards down without touching local history.
//!
//! ## Architecture
//!
//! - Settings and platform paths ([`settings`], [`config`], [`credentials`])
//! - Repository backends behind one trait ([`scm`], [`git`])
//! - User-facing operations that never panic ([`sync`], [`browser`])
//! - Error taxonomy and outcomes ([`error`]), logging ([`logger`])

/// Remote Browser: list and download dashboards from a remote via a cache
/// repository.
pub mod browser;

/// Platform-specific config directory, log file and default data locations.
pub mod config;

/// Resolution of HTTPS credentials from settings and the environment.
pub mod credentials;

pub mod error;

/// libgit2 repository backend.
pub mod git;

/// Logging configuration and utilities.
///
/// Sets up console logging (configurable via `RUST_LOG`) and a persistent log
/// file in the config directory with size-based rotation.
pub mod logger;

/// Repository backend trait, outcome types and the `git` command-line backend.
pub mod scm;

pub mod settings;

/// Sync Service: init, branch, commit, pull, push and tag operations.
pub mod sync;
