//! Writing config artifacts consumed by the launched processes.

use crate::ConfigError;
use serde::Serialize;
use std::path::Path;

/// Serialise `value` as pretty JSON into `path`, replacing any previous file.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ConfigError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
