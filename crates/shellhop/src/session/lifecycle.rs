//! Session lifecycle types and the seams between the orchestrator and its
//! collaborators.
//!
//! The orchestrator drives a linear state machine over four abstractions:
//! a [`Connector`] producing a [`Connection`], a [`ShellChannel`] opened on
//! it, and the [`LocalTerminal`]. The SSH backend and the local terminal
//! crate provide the production implementations; tests use scripted mocks.

use std::fmt;
use std::future::Future;
use std::io;

use shellhop_term::TerminalSize;
use tokio::sync::mpsc;

use crate::config::ServerProfile;
use crate::error::Result;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing acquired yet.
    #[default]
    Idle,
    /// Transport connected and authenticated.
    Connected,
    /// Session channel open.
    SessionOpen,
    /// Local terminal in raw mode.
    RawMode,
    /// Remote PTY allocated.
    PtyRequested,
    /// Remote shell running, streams wired.
    ShellRunning,
    /// Everything released.
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connected => "connected",
            Self::SessionOpen => "session-open",
            Self::RawMode => "raw-mode",
            Self::PtyRequested => "pty-requested",
            Self::ShellRunning => "shell-running",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A request from a background loop to the owner of the session channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRequest {
    /// Tell the server the local window changed.
    WindowChange(TerminalSize),
    /// Send a protocol-level keepalive.
    Keepalive,
}

/// Why an interactive session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The remote process reported an exit status or signal.
    RemoteExit,
    /// The channel closed without an exit report.
    ChannelClosed,
    /// The local process was asked to stop.
    Interrupted,
    /// Local stdout or stderr could not be written.
    LocalIo,
}

/// How the remote shell finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellExit {
    /// Exit status sent by the server.
    pub status: Option<u32>,
    /// Name of the signal that killed the remote process.
    pub signal: Option<String>,
    /// Why the session ended.
    pub reason: EndReason,
}

impl ShellExit {
    /// An exit with only a reason.
    #[must_use]
    pub const fn new(reason: EndReason) -> Self {
        Self {
            status: None,
            signal: None,
            reason,
        }
    }

    /// A remote exit with `status`.
    #[must_use]
    pub const fn with_status(status: u32) -> Self {
        Self {
            status: Some(status),
            signal: None,
            reason: EndReason::RemoteExit,
        }
    }
}

/// Establishes authenticated connections.
pub trait Connector: Send + Sync {
    /// The connection type produced.
    type Connection: Connection;

    /// Dial, handshake and authenticate.
    fn connect(
        &self,
        profile: &ServerProfile,
    ) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// An authenticated connection.
pub trait Connection: Send {
    /// The session channel type.
    type Channel: ShellChannel;

    /// Open a session channel.
    fn open_session(&mut self) -> impl Future<Output = Result<Self::Channel>> + Send;

    /// Close the connection.
    fn close(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// A session channel that can host an interactive shell.
pub trait ShellChannel: Send {
    /// Request a remote pseudo-terminal.
    fn request_pty(
        &mut self,
        term: &str,
        size: TerminalSize,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Start the remote login shell.
    fn start_shell(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Pump the standard streams until the remote side finishes.
    ///
    /// Requests from `requests` are applied to the channel in arrival order.
    fn run(
        &mut self,
        requests: mpsc::Receiver<ChannelRequest>,
    ) -> impl Future<Output = ShellExit> + Send;

    /// Close the channel.
    fn close(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Restores a terminal taken into raw mode.
pub trait RawModeGuard: Send {
    /// Restore the saved mode. Calling twice is harmless.
    fn restore(&mut self) -> shellhop_term::Result<()>;
}

/// A stream of terminal-resize notifications.
pub trait ResizeSource: Send + 'static {
    /// Wait for the next notification; `None` once the source is closed.
    fn recv(&mut self) -> impl Future<Output = Option<()>> + Send;
}

/// The local terminal.
pub trait LocalTerminal: Clone + Send + Sync + 'static {
    /// Guard returned by [`LocalTerminal::enter_raw_mode`].
    type RawMode: RawModeGuard;
    /// Resize notification source.
    type Resizes: ResizeSource;

    /// Current dimensions.
    fn size(&self) -> shellhop_term::Result<TerminalSize>;

    /// Snapshot the current mode and switch to raw.
    fn enter_raw_mode(&self) -> shellhop_term::Result<Self::RawMode>;

    /// Subscribe to resize notifications.
    fn resize_events(&self) -> shellhop_term::Result<Self::Resizes>;
}

#[cfg(unix)]
impl RawModeGuard for shellhop_term::RawMode {
    fn restore(&mut self) -> shellhop_term::Result<()> {
        Self::restore(self)
    }
}

#[cfg(unix)]
impl ResizeSource for shellhop_term::ResizeSignals {
    async fn recv(&mut self) -> Option<()> {
        Self::recv(self).await
    }
}

impl ResizeSource for mpsc::Receiver<()> {
    async fn recv(&mut self) -> Option<()> {
        Self::recv(self).await
    }
}
