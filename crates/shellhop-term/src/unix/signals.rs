//! Signal streams for interactive sessions.
//!
//! Two streams matter while a remote shell is attached: SIGWINCH, which
//! drives window-size propagation, and the termination family (SIGTERM,
//! SIGHUP, SIGINT), which ends the session through the normal teardown path
//! instead of killing the process with the terminal still in raw mode.

use futures::StreamExt;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGWINCH};
use signal_hook_tokio::{Handle, Signals};

use crate::error::{Result, TermError};

/// Which termination signal was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// SIGTERM.
    Terminate,
    /// SIGHUP, usually the controlling terminal going away.
    Hangup,
    /// SIGINT.
    Interrupt,
}

impl Interrupt {
    const fn from_signal(signal: i32) -> Option<Self> {
        match signal {
            SIGTERM => Some(Self::Terminate),
            SIGHUP => Some(Self::Hangup),
            SIGINT => Some(Self::Interrupt),
            _ => None,
        }
    }

    /// The conventional signal name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Terminate => "SIGTERM",
            Self::Hangup => "SIGHUP",
            Self::Interrupt => "SIGINT",
        }
    }
}

/// Stream of terminal resize notifications.
pub struct ResizeSignals {
    signals: Signals,
    handle: Handle,
}

impl std::fmt::Debug for ResizeSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResizeSignals").finish_non_exhaustive()
    }
}

impl ResizeSignals {
    /// Subscribe to SIGWINCH.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Result<Self> {
        let signals = Signals::new([SIGWINCH]).map_err(TermError::Signal)?;
        let handle = signals.handle();
        Ok(Self { signals, handle })
    }

    /// Wait for the next resize. Returns `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<()> {
        self.signals.next().await.map(|_| ())
    }
}

impl Drop for ResizeSignals {
    fn drop(&mut self) {
        self.handle.close();
    }
}

/// Stream of termination requests.
pub struct InterruptSignals {
    signals: Signals,
    handle: Handle,
}

impl std::fmt::Debug for InterruptSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptSignals").finish_non_exhaustive()
    }
}

impl InterruptSignals {
    /// Subscribe to SIGTERM, SIGHUP and SIGINT.
    ///
    /// While subscribed, these signals no longer terminate the process.
    pub fn new() -> Result<Self> {
        let signals = Signals::new([SIGTERM, SIGHUP, SIGINT]).map_err(TermError::Signal)?;
        let handle = signals.handle();
        Ok(Self { signals, handle })
    }

    /// Wait for the next termination request.
    pub async fn recv(&mut self) -> Option<Interrupt> {
        while let Some(signal) = self.signals.next().await {
            if let Some(interrupt) = Interrupt::from_signal(signal) {
                return Some(interrupt);
            }
        }
        None
    }
}

impl Drop for InterruptSignals {
    fn drop(&mut self) {
        self.handle.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_from_signal() {
        assert_eq!(Interrupt::from_signal(SIGTERM), Some(Interrupt::Terminate));
        assert_eq!(Interrupt::from_signal(SIGHUP), Some(Interrupt::Hangup));
        assert_eq!(Interrupt::from_signal(SIGINT), Some(Interrupt::Interrupt));
        assert_eq!(Interrupt::from_signal(SIGWINCH), None);
    }

    #[test]
    fn interrupt_names() {
        assert_eq!(Interrupt::Terminate.name(), "SIGTERM");
        assert_eq!(Interrupt::Hangup.name(), "SIGHUP");
        assert_eq!(Interrupt::Interrupt.name(), "SIGINT");
    }
}
