//! Loading the alias store from disk.
//!
//! The store is a single JSON document. It is read-only from this crate's
//! point of view: a missing file is an empty store, never created here.

use std::io;
use std::path::{Path, PathBuf};

use super::AliasStore;
use crate::error::{Error, Result};
use crate::path::PathResolver;

/// Default location of the alias store.
pub const DEFAULT_STORE_PATH: &str = "~/.ssh/ssh_config.json";

/// Resolve the store path, honouring an explicit override.
pub fn store_path(resolver: &PathResolver, override_path: Option<&str>) -> Result<PathBuf> {
    resolver.resolve(override_path.unwrap_or(DEFAULT_STORE_PATH))
}

/// Load the alias store at `path`.
///
/// # Errors
///
/// Returns [`Error::ConfigFile`] if the path is a directory, cannot be read
/// or does not contain a valid store.
pub fn load_store(path: &Path) -> Result<AliasStore> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Alias store not found, using empty store");
            return Ok(AliasStore::default());
        }
        Err(e) => return Err(config_file_error(path, e)),
    };

    let store = AliasStore::from_json(&text).map_err(|e| config_file_error(path, e))?;
    tracing::debug!(
        path = %path.display(),
        aliases = store.servers.len(),
        "Loaded alias store"
    );
    Ok(store)
}

fn config_file_error(
    path: &Path,
    source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> Error {
    Error::ConfigFile {
        path: path.to_path_buf(),
        source: source.into(),
    }
}
