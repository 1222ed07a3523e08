//! Spawning `git` with a wall-clock limit.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, SyncError};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of a finished git invocation.
#[derive(Debug)]
pub(super) struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Run `git <args>` in `workdir`, killing it once `timeout` elapses.
///
/// A missing executable maps to `BackendUnavailable`; expiry maps to
/// `Timeout`. A non-zero exit is *not* an error here; callers inspect it.
pub(super) fn run_git(
    workdir: Option<&Path>,
    args: &[&str],
    envs: &[(&str, String)],
    timeout: Duration,
) -> Result<GitOutput> {
    let mut command = Command::new("git");
    command
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = workdir {
        command.current_dir(dir);
    }
    for (key, value) in envs {
        command.env(key, value);
    }

    let display = format!("git {}", args.join(" "));
    log::debug!("Running '{display}'");

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SyncError::BackendUnavailable("git executable not found on PATH".to_string())
        } else {
            SyncError::Command {
                command: display.clone(),
                stderr: e.to_string(),
            }
        }
    })?;

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let status = match wait_with_deadline(&mut child, timeout) {
        Ok(status) => status,
        Err(err) => {
            // Helpers spawned by git may still hold the pipes open; the
            // readers are left detached rather than joined.
            drop(stdout_reader);
            drop(stderr_reader);
            log::error!("'{display}' did not finish within {}s; killed", timeout.as_secs());
            return Err(err.unwrap_or_else(|| SyncError::Timeout {
                operation: display,
                seconds: timeout.as_secs(),
            }));
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    Ok(GitOutput {
        success: status.success(),
        stdout,
        stderr,
    })
}

/// `Err(None)` means the deadline passed and the child was killed.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> std::result::Result<std::process::ExitStatus, Option<SyncError>> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(None);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return Err(Some(SyncError::Command {
                    command: "git".to_string(),
                    stderr: e.to_string(),
                }));
            }
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

/// True when `git --version` answers within five seconds.
pub(super) fn git_available() -> bool {
    match run_git(None, &["--version"], &[], Duration::from_secs(5)) {
        Ok(output) => output.success && output.stdout.to_lowercase().contains("git version"),
        Err(_) => false,
    }
}
