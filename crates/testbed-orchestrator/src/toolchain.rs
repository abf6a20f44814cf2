//! Compiling the node crate and aliasing its binaries.

use crate::commands::{CommandMaker, CLIENT_BINARY, NODE_BINARY};
use crate::{LaunchError, TestbedPaths};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

/// Produces the node and client binaries the testbed runs.
#[async_trait]
pub trait Toolchain: Send + Sync {
    async fn build(&self, failpoints: bool, release: bool) -> Result<(), LaunchError>;
}

/// Builds with cargo in the node crate, then symlinks the binaries into the
/// testbed directory.
#[derive(Debug, Clone)]
pub struct CargoToolchain {
    paths: TestbedPaths,
}

impl CargoToolchain {
    pub fn new(paths: TestbedPaths) -> Self {
        Self { paths }
    }

    fn alias_binaries(&self, release: bool) -> Result<(), LaunchError> {
        let origin = self.paths.binary_dir(release);
        for name in [NODE_BINARY, CLIENT_BINARY] {
            alias(&origin.join(name), &self.paths.root().join(name))?;
        }
        Ok(())
    }
}

fn alias(binary: &Path, link: &Path) -> Result<(), LaunchError> {
    let to_error = |source: std::io::Error| LaunchError::Alias {
        path: binary.to_path_buf(),
        source,
    };
    let binary = std::fs::canonicalize(binary).map_err(to_error)?;
    match std::fs::remove_file(link) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(to_error(e)),
    }
    #[cfg(unix)]
    std::os::unix::fs::symlink(&binary, link).map_err(to_error)?;
    #[cfg(not(unix))]
    std::fs::copy(&binary, link).map(drop).map_err(to_error)?;
    Ok(())
}

#[async_trait]
impl Toolchain for CargoToolchain {
    async fn build(&self, failpoints: bool, release: bool) -> Result<(), LaunchError> {
        let cmd = CommandMaker::compile(failpoints, release).current_dir(self.paths.node_crate_dir());
        info!(command = %cmd, "Compiling node binaries");
        cmd.run().await?;
        self.alias_binaries(release)
    }
}
