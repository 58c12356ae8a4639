//! Path resolution for configured file paths.
//!
//! Paths in the alias store come in three shapes:
//!
//! - `~` followed by anything: joined onto the user's home directory
//! - `/...`: already absolute, returned unchanged
//! - anything else: relative to the directory holding the executable
//!
//! Resolution is purely lexical; the target does not have to exist.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Marker for the home directory at the start of a path.
pub const HOME_MARKER: char = '~';

/// Resolves configured paths against a home directory and the executable
/// directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathResolver {
    home: Option<PathBuf>,
    exe_dir: Option<PathBuf>,
}

impl PathResolver {
    /// Create a resolver with explicit anchor directories.
    #[must_use]
    pub const fn new(home: Option<PathBuf>, exe_dir: Option<PathBuf>) -> Self {
        Self { home, exe_dir }
    }

    /// Create a resolver anchored at the current user's home directory and
    /// the directory of the running executable.
    #[must_use]
    pub fn from_env() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self::new(dirs::home_dir(), exe_dir)
    }

    /// Directory used for relative paths.
    #[must_use]
    pub fn exe_dir(&self) -> Option<&Path> {
        self.exe_dir.as_deref()
    }

    /// Turn `raw` into an absolute path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathResolution`] for an empty path, or when the
    /// anchor directory the path needs is unknown.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf> {
        if raw.is_empty() {
            return Err(Error::path_resolution(raw, "path is empty"));
        }

        if let Some(rest) = raw.strip_prefix(HOME_MARKER) {
            let home = self
                .home
                .as_ref()
                .ok_or_else(|| Error::path_resolution(raw, "home directory is unknown"))?;
            let rest = rest.trim_start_matches('/');
            return Ok(if rest.is_empty() {
                home.clone()
            } else {
                home.join(rest)
            });
        }

        if raw.starts_with('/') {
            return Ok(PathBuf::from(raw));
        }

        let exe_dir = self
            .exe_dir
            .as_ref()
            .ok_or_else(|| Error::path_resolution(raw, "executable directory is unknown"))?;
        Ok(exe_dir.join(raw))
    }
}
