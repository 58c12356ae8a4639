//! The process's own terminal.

use shellhop_term::{RawMode, ResizeSignals, TerminalSize};

use super::lifecycle::LocalTerminal;

/// The controlling terminal on standard input.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdTerminal;

impl StdTerminal {
    /// Create a handle to the standard-input terminal.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LocalTerminal for StdTerminal {
    type RawMode = RawMode;
    type Resizes = ResizeSignals;

    fn size(&self) -> shellhop_term::Result<TerminalSize> {
        shellhop_term::stdin_size()
    }

    fn enter_raw_mode(&self) -> shellhop_term::Result<RawMode> {
        RawMode::stdin()
    }

    fn resize_events(&self) -> shellhop_term::Result<ResizeSignals> {
        ResizeSignals::new()
    }
}
