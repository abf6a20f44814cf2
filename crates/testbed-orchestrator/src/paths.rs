//! File layout of a local testbed.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Locations of every artifact a run reads or writes.
///
/// Key files, config descriptors and stores live directly in the testbed
/// directory as dot-files so that cleanup can sweep them by prefix. Only one
/// orchestrator may use a testbed directory at a time; nothing here locks it.
#[derive(Debug, Clone)]
pub struct TestbedPaths {
    root: PathBuf,
    node_crate: PathBuf,
    target_dir: PathBuf,
}

impl TestbedPaths {
    /// Layout rooted at `root`, with the node crate and cargo target directory
    /// next to it (`../node`, `../target`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            node_crate: root.join("..").join("node"),
            target_dir: root.join("..").join("target"),
            root,
        }
    }

    pub fn with_node_crate(mut self, node_crate: impl Into<PathBuf>) -> Self {
        self.node_crate = node_crate.into();
        self
    }

    pub fn with_target_dir(mut self, target_dir: impl Into<PathBuf>) -> Self {
        self.target_dir = target_dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory the compile step runs in.
    pub fn node_crate_dir(&self) -> &Path {
        &self.node_crate
    }

    /// Directory of the freshly built binaries.
    pub fn binary_dir(&self, release: bool) -> PathBuf {
        self.target_dir
            .join(if release { "release" } else { "debug" })
    }

    pub fn committee_file(&self) -> PathBuf {
        self.root.join(".committee.json")
    }

    pub fn workers_file(&self) -> PathBuf {
        self.root.join(".workers.json")
    }

    pub fn parameters_file(&self) -> PathBuf {
        self.root.join(".parameters.json")
    }

    pub fn primary_key_file(&self, i: usize) -> PathBuf {
        self.root.join(format!(".primary-{i}-key.json"))
    }

    pub fn primary_network_key_file(&self, i: usize) -> PathBuf {
        self.root.join(format!(".primary-{i}-network-key.json"))
    }

    /// Key file of the worker with global index `k = i * W + j`.
    pub fn worker_key_file(&self, k: usize) -> PathBuf {
        self.root.join(format!(".worker-{k}-key.json"))
    }

    /// Store of primary `i`, or of its worker `j`.
    pub fn db_path(&self, i: usize, worker: Option<u32>) -> PathBuf {
        match worker {
            Some(j) => self.root.join(format!(".db-{i}-{j}")),
            None => self.root.join(format!(".db-{i}")),
        }
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn primary_log_file(&self, i: usize) -> PathBuf {
        self.logs_dir().join(format!("primary-{i}.log"))
    }

    pub fn worker_log_file(&self, i: usize, j: u32) -> PathBuf {
        self.logs_dir().join(format!("worker-{i}-{j}.log"))
    }

    pub fn client_log_file(&self, i: usize, j: u32) -> PathBuf {
        self.logs_dir().join(format!("client-{i}-{j}.log"))
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    /// Remove logs, stores and config artifacts of a previous run, then
    /// recreate the empty logs and results directories.
    ///
    /// Best effort: prior state may legitimately not exist, so every failure
    /// is logged and skipped.
    pub fn clean(&self) {
        let logs = self.logs_dir();
        if let Err(e) = std::fs::remove_dir_all(&logs) {
            debug!(path = %logs.display(), error = %e, "no logs to remove");
        }

        match std::fs::read_dir(&self.root) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let name = entry.file_name();
                    let name = name.to_string_lossy();
                    let path = entry.path();
                    let result = if name.starts_with(".db-") {
                        std::fs::remove_dir_all(&path)
                    } else if name.starts_with('.') && name.ends_with(".json") {
                        std::fs::remove_file(&path)
                    } else {
                        continue;
                    };
                    if let Err(e) = result {
                        debug!(path = %path.display(), error = %e, "failed to remove stale artifact");
                    }
                }
            }
            Err(e) => debug!(path = %self.root.display(), error = %e, "testbed directory unreadable"),
        }

        for dir in [logs, self.results_dir()] {
            if let Err(e) = std::fs::create_dir_all(&dir) {
                debug!(path = %dir.display(), error = %e, "failed to create directory");
            }
        }
    }
}

impl Default for TestbedPaths {
    fn default() -> Self {
        Self::new(".")
    }
}
