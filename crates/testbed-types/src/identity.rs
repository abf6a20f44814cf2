//! Node identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Public key string as printed by the node binary's `get_pub_key` command.
///
/// The testbed never interprets the key; it is only used as a map key in the
/// persisted committee and worker cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(String);

impl PublicKey {
    /// Wrap a public key string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A generated key: its public identity plus the key file it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    public_key: PublicKey,
    key_file: PathBuf,
}

impl NodeIdentity {
    /// Create an identity from a public key and the path of its key material.
    pub fn new(public_key: PublicKey, key_file: impl Into<PathBuf>) -> Self {
        Self {
            public_key,
            key_file: key_file.into(),
        }
    }

    /// The public identity string.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Path of the key file backing this identity.
    pub fn key_file(&self) -> &Path {
        &self.key_file
    }
}
