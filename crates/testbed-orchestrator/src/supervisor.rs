//! Background sessions for launched processes.
//!
//! A session is one spawned process plus the log file its stderr is redirected
//! into. The supervisor only knows about sessions it created itself and never
//! inspects the wider process table.

use crate::commands::LaunchCommand;
use crate::LaunchError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Child;
use tracing::{debug, warn};

/// Starts and terminates the processes of a run.
#[async_trait]
pub trait Supervisor: Send {
    /// Start `command` in the background with stderr redirected into
    /// `log_file`. Returns the session name without waiting on the process.
    fn launch(&mut self, command: &LaunchCommand, log_file: &Path) -> Result<String, LaunchError>;

    /// Terminate every owned session. Never fails; sessions that already
    /// exited are skipped. Calling it with no sessions is a no-op.
    async fn teardown_all(&mut self);

    /// Number of sessions currently owned.
    fn session_count(&self) -> usize;

    /// Sessions whose process has already exited, with their status.
    ///
    /// Diagnostic only: the run does not end early because of it.
    fn exited_sessions(&mut self) -> Vec<(String, ExitStatus)> {
        Vec::new()
    }
}

/// Session name derived from the log file identity (`logs/worker-0-1.log`
/// → `worker-0-1`).
pub fn session_name(log_file: &Path) -> String {
    log_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| log_file.display().to_string())
}

struct Session {
    name: String,
    log_file: PathBuf,
    child: Child,
}

/// Supervisor spawning real OS processes.
///
/// Children are killed on drop, so sessions do not outlive the supervisor even
/// when a run unwinds.
#[derive(Default)]
pub struct ProcessSupervisor {
    sessions: Vec<Session>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the owned sessions in launch order.
    pub fn session_names(&self) -> Vec<&str> {
        self.sessions.iter().map(|s| s.name.as_str()).collect()
    }
}

#[async_trait]
impl Supervisor for ProcessSupervisor {
    fn launch(&mut self, command: &LaunchCommand, log_file: &Path) -> Result<String, LaunchError> {
        let name = session_name(log_file);
        let log = std::fs::File::create(log_file).map_err(|source| LaunchError::LogFile {
            path: log_file.to_path_buf(),
            source,
        })?;

        let child = command
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                command: command.to_string(),
                source,
            })?;

        debug!(session = %name, pid = ?child.id(), log = %log_file.display(), "launched session");
        self.sessions.push(Session {
            name: name.clone(),
            log_file: log_file.to_path_buf(),
            child,
        });
        Ok(name)
    }

    async fn teardown_all(&mut self) {
        let mut terminated = Vec::with_capacity(self.sessions.len());
        for mut session in self.sessions.drain(..) {
            match session.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(session = %session.name, %status, "session already exited");
                    continue;
                }
                Ok(None) => {}
                Err(e) => debug!(session = %session.name, error = %e, "failed to poll session"),
            }
            if let Err(e) = session.child.start_kill() {
                debug!(session = %session.name, error = %e, "failed to kill session");
            }
            terminated.push(session);
        }

        for mut session in terminated {
            match session.child.wait().await {
                Ok(status) => debug!(
                    session = %session.name,
                    %status,
                    log = %session.log_file.display(),
                    "session terminated"
                ),
                Err(e) => warn!(session = %session.name, error = %e, "failed to reap session"),
            }
        }
    }

    fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn exited_sessions(&mut self) -> Vec<(String, ExitStatus)> {
        self.sessions
            .iter_mut()
            .filter_map(|s| match s.child.try_wait() {
                Ok(Some(status)) => Some((s.name.clone(), status)),
                _ => None,
            })
            .collect()
    }
}
