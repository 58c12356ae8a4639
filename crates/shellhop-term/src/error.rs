//! Error types for the shellhop-term crate.
//!
//! All fallible terminal operations return [`TermError`], which keeps the
//! underlying OS error as its source.

use std::io;

/// The error type for local terminal operations.
#[derive(Debug, thiserror::Error)]
pub enum TermError {
    /// The file descriptor does not refer to a terminal.
    #[error("not a terminal")]
    NotATerminal,

    /// Failed to read terminal attributes.
    #[error("failed to get terminal attributes: {0}")]
    GetAttributes(#[source] io::Error),

    /// Failed to apply terminal attributes.
    #[error("failed to set terminal attributes: {0}")]
    SetAttributes(#[source] io::Error),

    /// Failed to query the window size.
    #[error("failed to query window size: {0}")]
    WindowSize(#[source] io::Error),

    /// Failed to register a signal handler.
    #[error("failed to register signal handler: {0}")]
    Signal(#[source] io::Error),

    /// Failed to duplicate the terminal file descriptor.
    #[error("failed to duplicate terminal descriptor: {0}")]
    Duplicate(#[source] io::Error),
}

/// A specialized Result type for terminal operations.
pub type Result<T> = std::result::Result<T, TermError>;

#[cfg(unix)]
pub(crate) fn errno_to_io(errno: rustix::io::Errno) -> io::Error {
    io::Error::from_raw_os_error(errno.raw_os_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(TermError::NotATerminal.to_string(), "not a terminal");

        let err = TermError::SetAttributes(io::Error::other("busy"));
        assert!(err.to_string().contains("set terminal attributes"));
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn error_keeps_source() {
        use std::error::Error as _;

        let err = TermError::WindowSize(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(TermError::NotATerminal.source().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn errno_conversion() {
        let io_err = errno_to_io(rustix::io::Errno::NOTTY);
        assert_eq!(io_err.raw_os_error(), Some(rustix::io::Errno::NOTTY.raw_os_error()));
    }
}
