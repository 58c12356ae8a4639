//! Raw-mode switching with guaranteed restoration.
//!
//! [`RawMode`] snapshots the terminal attributes before switching, and puts
//! them back either on an explicit [`RawMode::restore`] or when dropped.

use std::os::fd::{AsFd, OwnedFd};

use rustix::termios::{self, OptionalActions, Termios};

use crate::error::{Result, TermError, errno_to_io};

/// A terminal held in raw mode.
///
/// The guard owns a duplicate of the terminal descriptor so it stays valid
/// regardless of what happens to the handle it was created from.
pub struct RawMode {
    fd: OwnedFd,
    saved: Termios,
    active: bool,
}

impl std::fmt::Debug for RawMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawMode")
            .field("fd", &self.fd)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl RawMode {
    /// Snapshot the attributes of `fd` and switch it to raw mode.
    ///
    /// # Errors
    ///
    /// Returns [`TermError::NotATerminal`] if `fd` is not a terminal, or an
    /// attribute error if the snapshot or the switch fails. Nothing is
    /// changed when an error is returned.
    pub fn enable(fd: impl AsFd) -> Result<Self> {
        let fd = fd.as_fd();
        if !termios::isatty(fd) {
            return Err(TermError::NotATerminal);
        }

        let saved =
            termios::tcgetattr(fd).map_err(|e| TermError::GetAttributes(errno_to_io(e)))?;
        let fd = fd.try_clone_to_owned().map_err(TermError::Duplicate)?;

        let mut raw = saved.clone();
        raw.make_raw();
        termios::tcsetattr(&fd, OptionalActions::Now, &raw)
            .map_err(|e| TermError::SetAttributes(errno_to_io(e)))?;

        tracing::debug!("terminal switched to raw mode");
        Ok(Self {
            fd,
            saved,
            active: true,
        })
    }

    /// Switch standard input to raw mode.
    pub fn stdin() -> Result<Self> {
        Self::enable(std::io::stdin())
    }

    /// Whether the terminal is still in raw mode.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Put back the attributes captured by [`RawMode::enable`].
    ///
    /// Calling this more than once is a no-op after the first success.
    pub fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        termios::tcsetattr(&self.fd, OptionalActions::Now, &self.saved)
            .map_err(|e| TermError::SetAttributes(errno_to_io(e)))?;
        self.active = false;
        tracing::debug!("terminal mode restored");
        Ok(())
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!(error = %e, "failed to restore terminal mode on drop");
        }
    }
}
