//! Window size queries.

use std::os::fd::AsFd;

use crate::error::{Result, TermError, errno_to_io};
use crate::size::TerminalSize;

/// Read the window size of the terminal behind `fd`.
pub fn window_size(fd: impl AsFd) -> Result<TerminalSize> {
    let winsize =
        rustix::termios::tcgetwinsize(fd).map_err(|e| TermError::WindowSize(errno_to_io(e)))?;
    Ok(TerminalSize::new(winsize.ws_col, winsize.ws_row))
}

/// Read the window size of the terminal attached to standard input.
pub fn stdin_size() -> Result<TerminalSize> {
    window_size(std::io::stdin())
}

/// Check whether `fd` refers to a terminal.
#[must_use]
pub fn is_terminal(fd: impl AsFd) -> bool {
    rustix::termios::isatty(fd)
}
