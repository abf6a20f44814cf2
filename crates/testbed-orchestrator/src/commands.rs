//! Construction and execution of the external commands a run invokes.

use crate::keys::KeyKind;
use crate::LaunchError;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use testbed_types::{NetworkAddress, WorkerId};

/// File name of the node binary aliased into the testbed directory.
pub const NODE_BINARY: &str = "narwhal-node";

/// File name of the benchmark client binary aliased into the testbed directory.
pub const CLIENT_BINARY: &str = "narwhal-benchmark-client";

/// A program with its arguments, spawned without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Run the command from `dir` instead of the orchestrator's directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// A `tokio` command ready to spawn.
    pub fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run to completion, failing on a non-zero exit status.
    pub async fn run(&self) -> Result<(), LaunchError> {
        let status = self
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await
            .map_err(|source| LaunchError::Spawn {
                command: self.to_string(),
                source,
            })?;
        if !status.success() {
            return Err(LaunchError::Failed {
                command: self.to_string(),
                status,
            });
        }
        Ok(())
    }

    /// Run to completion and return its trimmed standard output.
    pub async fn output(&self) -> Result<String, LaunchError> {
        let output = self
            .to_command()
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| LaunchError::Spawn {
                command: self.to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(LaunchError::Failed {
                command: self.to_string(),
                status: output.status,
            });
        }
        String::from_utf8(output.stdout)
            .map(|s| s.trim().to_string())
            .map_err(|_| LaunchError::Output {
                command: self.to_string(),
                reason: "stdout is not valid UTF-8".to_string(),
            })
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Files a primary or worker process is started with.
#[derive(Debug, Clone)]
pub struct NodeFiles {
    pub primary_keys: PathBuf,
    pub primary_network_keys: PathBuf,
    pub worker_keys: PathBuf,
    pub committee: PathBuf,
    pub workers: PathBuf,
    pub store: PathBuf,
    pub parameters: PathBuf,
}

/// Builds the command lines of the node and client binaries.
#[derive(Debug, Clone)]
pub struct CommandMaker {
    node: PathBuf,
    client: PathBuf,
}

impl CommandMaker {
    /// Commands invoking the binaries aliased into `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            node: dir.join(NODE_BINARY),
            client: dir.join(CLIENT_BINARY),
        }
    }

    /// Build the node crate with the benchmark feature.
    pub fn compile(failpoints: bool, release: bool) -> LaunchCommand {
        let features = if failpoints {
            "benchmark fail/failpoints"
        } else {
            "benchmark"
        };
        let cmd = LaunchCommand::new("cargo").args(["build", "--quiet", "--features", features]);
        if release {
            cmd.arg("--release")
        } else {
            cmd
        }
    }

    pub fn generate_key(&self, kind: KeyKind, key_file: &Path) -> LaunchCommand {
        let subcommand = match kind {
            KeyKind::Protocol => "generate_keys",
            KeyKind::Network => "generate_network_keys",
        };
        LaunchCommand::new(&self.node)
            .arg(subcommand)
            .arg("--filename")
            .arg(key_file)
    }

    pub fn get_pub_key(&self, key_file: &Path) -> LaunchCommand {
        LaunchCommand::new(&self.node)
            .arg("get_pub_key")
            .arg("--filename")
            .arg(key_file)
    }

    fn run_node(&self, files: &NodeFiles, debug: bool) -> LaunchCommand {
        LaunchCommand::new(&self.node)
            .arg(if debug { "-vvv" } else { "-vv" })
            .arg("run")
            .arg("--primary-keys")
            .arg(&files.primary_keys)
            .arg("--primary-network-keys")
            .arg(&files.primary_network_keys)
            .arg("--worker-keys")
            .arg(&files.worker_keys)
            .arg("--committee")
            .arg(&files.committee)
            .arg("--workers")
            .arg(&files.workers)
            .arg("--store")
            .arg(&files.store)
            .arg("--parameters")
            .arg(&files.parameters)
    }

    pub fn run_primary(&self, files: &NodeFiles, debug: bool) -> LaunchCommand {
        self.run_node(files, debug).arg("primary")
    }

    pub fn run_worker(&self, files: &NodeFiles, id: WorkerId, debug: bool) -> LaunchCommand {
        self.run_node(files, debug)
            .arg("worker")
            .arg("--id")
            .arg(id.to_string())
    }

    /// Client sending `rate` tx/s of `size` bytes to `target`, told about every
    /// worker in `nodes` so it can wait for them to come up.
    pub fn run_client(
        &self,
        target: &NetworkAddress,
        size: usize,
        rate: u64,
        nodes: &[NetworkAddress],
    ) -> LaunchCommand {
        let cmd = LaunchCommand::new(&self.client)
            .arg(target.to_string())
            .arg("--size")
            .arg(size.to_string())
            .arg("--rate")
            .arg(rate.to_string());
        if nodes.is_empty() {
            cmd
        } else {
            cmd.arg("--nodes").args(nodes.iter().map(|a| a.to_string()))
        }
    }
}
