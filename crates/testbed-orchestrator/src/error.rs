//! Error types for the orchestrator.

use std::path::PathBuf;
use std::process::ExitStatus;
use testbed_config::ConfigError;
use thiserror::Error;

/// An external command (compile, keygen, node or client launch) failed.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The command could not be started at all.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully.
    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: ExitStatus },

    /// The command succeeded but its output is unusable.
    #[error("`{command}` produced unusable output: {reason}")]
    Output { command: String, reason: String },

    /// The dedicated log file of a session could not be created.
    #[error("failed to create log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A freshly built binary could not be linked into the testbed directory.
    #[error("failed to alias binary {path}: {source}")]
    Alias {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The log analyzer could not interpret the produced logs.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read log file {path}: {source}")]
    ReadLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No log at all was found for a role expected to run.
    #[error("no {role} logs found in {path}")]
    MissingLogs { role: &'static str, path: PathBuf },

    /// A process panicked during the run.
    #[error("{name} panicked")]
    Panicked { name: String },

    /// A process logged an error during the run.
    #[error("{name} reported an error: {line}")]
    Errored { name: String, line: String },
}

/// Why a run that got past parameter validation failed.
#[derive(Debug, Error)]
pub enum RunFailure {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Top-level benchmark error.
///
/// `RunFailed` is only returned after every session of the run was torn down.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Invalid nodes or bench parameters: {0}")]
    InvalidParameters(#[source] ConfigError),

    #[error("Failed to run benchmark: {0}")]
    RunFailed(#[from] RunFailure),
}
