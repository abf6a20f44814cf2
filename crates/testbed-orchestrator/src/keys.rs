//! Identity generation.

use crate::commands::CommandMaker;
use crate::LaunchError;
use async_trait::async_trait;
use std::path::Path;
use testbed_types::{NodeIdentity, PublicKey};
use tracing::debug;

/// Which key scheme to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Protocol signing key of a primary.
    Protocol,
    /// Transport key of a primary or worker.
    Network,
}

/// Materialises a key file and reports its public identity.
#[async_trait]
pub trait KeyProvisioner: Send + Sync {
    /// Create the key at `key_file` and return its identity. No retry: any
    /// failure aborts provisioning.
    async fn generate(&self, kind: KeyKind, key_file: &Path) -> Result<NodeIdentity, LaunchError>;
}

/// Key provisioner backed by the node binary's key commands.
#[derive(Debug, Clone)]
pub struct ExternalKeyProvisioner {
    commands: CommandMaker,
}

impl ExternalKeyProvisioner {
    pub fn new(commands: CommandMaker) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl KeyProvisioner for ExternalKeyProvisioner {
    async fn generate(&self, kind: KeyKind, key_file: &Path) -> Result<NodeIdentity, LaunchError> {
        self.commands.generate_key(kind, key_file).run().await?;

        let read_back = self.commands.get_pub_key(key_file);
        let key = read_back.output().await?;
        if key.is_empty() {
            return Err(LaunchError::Output {
                command: read_back.to_string(),
                reason: "empty public key".to_string(),
            });
        }

        debug!(key_file = %key_file.display(), ?kind, public_key = %key, "generated key");
        Ok(NodeIdentity::new(PublicKey::new(key), key_file))
    }
}
