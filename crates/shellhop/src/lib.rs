//! shellhop: interactive SSH sessions for configured aliases
//!
//! This crate takes a named server alias from a JSON store and turns it into
//! a fully interactive remote shell on the local terminal.
//!
//! # Features
//!
//! - **Async-first design** with Tokio runtime
//! - **Password and key authentication**, including passphrase-protected keys
//! - **Host key verification** with `known_hosts`, trust-on-first-use or a
//!   pinned fingerprint
//! - **SOCKS5 proxying** with no silent fallback to a direct connection
//! - **Keepalive and resize propagation** as cancellable background loops
//! - **Guaranteed unwind**: the local terminal is restored on every exit path
//! - **Test utilities** for driving the orchestrator without a network
//!   (feature: `test-utils`)
//!
//! # Example
//!
//! ```ignore
//! use shellhop::backend::ssh::SshConnector;
//! use shellhop::config::ServerConfig;
//! use shellhop::path::PathResolver;
//! use shellhop::session::{Session, SessionOptions, StdTerminal};
//!
//! #[tokio::main]
//! async fn main() -> shellhop::Result<()> {
//!     let profile = ServerConfig::new("example.com", "deploy")
//!         .key("~/.ssh/id_ed25519")
//!         .validate()?;
//!
//!     let options = SessionOptions::default();
//!     let connector = SshConnector::new(options.clone(), PathResolver::from_env());
//!     let session = Session::new(connector, StdTerminal::new(), options);
//!
//!     let exit = session.run(&profile, None, std::future::pending()).await?;
//!     println!("remote shell ended: {:?}", exit.reason);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod path;
pub mod session;

pub use config::{AliasStore, GlobalConfig, ServerConfig, ServerProfile};
pub use error::{Error, ErrorKind, Result};
pub use session::{Session, SessionOptions, SessionState, ShellExit};

// Test utilities
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
