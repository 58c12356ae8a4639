//! Interactive session management.
//!
//! This module provides:
//! - [`Session`], the orchestrator that takes a validated profile to a
//!   running remote shell and unwinds everything afterwards
//! - the collaborator traits it is generic over ([`Connector`],
//!   [`Connection`], [`ShellChannel`], [`LocalTerminal`])
//! - the keepalive and resize background loops
//! - [`SessionOptions`] and the exit-status policy

pub mod background;
pub mod keepalive;
pub mod lifecycle;
#[cfg(unix)]
pub mod local;
pub mod options;
pub mod orchestrator;
pub mod resize;

pub use background::BackgroundTasks;
pub use keepalive::KeepaliveConfig;
pub use lifecycle::{
    ChannelRequest, Connection, Connector, EndReason, LocalTerminal, RawModeGuard, ResizeSource,
    SessionState, ShellChannel, ShellExit,
};
#[cfg(unix)]
pub use local::StdTerminal;
pub use options::{DEFAULT_CONNECT_TIMEOUT, ExitStatusPolicy, SessionOptions};
pub use orchestrator::Session;
