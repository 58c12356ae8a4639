//! SSH backend for interactive remote sessions.
//!
//! This module provides:
//! - Password and public key authentication
//! - Host key verification against `known_hosts`, with trust-on-first-use
//!   and per-alias fingerprint pinning
//! - Tunnelling through a SOCKS5 proxy
//! - The channel pump that carries the interactive shell

pub mod auth;
pub mod channel;
pub mod host_key;
pub mod proxy;
pub mod transport;

// Re-export commonly used types
pub use auth::AuthMethod;
pub use channel::SshShellChannel;
pub use host_key::{HostKeyPolicy, HostKeyStatus, HostKeyVerifier, KnownHosts};
pub use proxy::Socks5Proxy;
pub use transport::{ClientHandler, SshConnection, SshConnector};
