//! Error types for shellhop.
//!
//! Every failure while establishing a session maps to exactly one
//! [`ErrorKind`]. None of them are retried: the session is unwound and the
//! error is reported to the caller. Keepalive send failures and window-size
//! read failures never surface here; the background loops log and skip them.

use std::io;
use std::path::PathBuf;

use shellhop_term::TermError;
use thiserror::Error;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credential configuration failed validation.
    ConfigInvalid,
    /// The alias store could not be read or parsed.
    ConfigFileFailed,
    /// A configured path could not be made absolute.
    PathResolutionFailed,
    /// The private key file could not be read.
    KeyFileUnreadable,
    /// The private key could not be parsed or decrypted.
    KeyParseFailed,
    /// The proxy URL has no usable address.
    ProxyAddressInvalid,
    /// The proxy could not be reached or refused the tunnel.
    ProxyDialFailed,
    /// The target could not be reached directly.
    NetworkDialFailed,
    /// Protocol negotiation, host key check or authentication failed.
    HandshakeFailed,
    /// The server refused to open a session channel.
    ChannelOpenFailed,
    /// The local terminal could not be switched to raw mode.
    TerminalModeFailed,
    /// The server refused the pseudo-terminal request.
    PtyRequestFailed,
    /// The server refused to start the shell.
    ShellStartFailed,
}

/// The error type for shellhop operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Credential configuration failed validation.
    #[error("invalid configuration: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The alias store could not be loaded.
    #[error("failed to load {}: {source}", path.display())]
    ConfigFile {
        /// Path of the store.
        path: PathBuf,
        /// The underlying I/O or parse error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A path could not be resolved to an absolute path.
    #[error("cannot resolve path '{path}': {reason}")]
    PathResolution {
        /// The path as configured.
        path: String,
        /// Why resolution failed.
        reason: String,
    },

    /// The private key file could not be read.
    #[error("cannot read key file {}: {source}", path.display())]
    KeyFileUnreadable {
        /// The resolved key path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The private key could not be parsed, or the passphrase was wrong.
    #[error("cannot load private key {}: {reason}", path.display())]
    KeyParse {
        /// The resolved key path.
        path: PathBuf,
        /// Why parsing failed.
        reason: String,
    },

    /// The proxy URL has no usable host or port.
    #[error("invalid proxy address '{proxy}': {reason}")]
    ProxyAddressInvalid {
        /// The proxy URL as configured.
        proxy: String,
        /// Why the address is unusable.
        reason: String,
    },

    /// Dialing the target through the proxy failed.
    #[error("proxy {proxy} could not reach {target}: {reason}")]
    ProxyDial {
        /// The proxy address.
        proxy: String,
        /// The `host:port` being dialed.
        target: String,
        /// Why the dial failed.
        reason: String,
    },

    /// Dialing the target directly failed.
    #[error("failed to connect to {target}: {reason}")]
    NetworkDial {
        /// The `host:port` being dialed.
        target: String,
        /// Why the dial failed.
        reason: String,
    },

    /// The SSH handshake failed, including host key rejection and
    /// authentication failure.
    #[error("SSH handshake with {target} failed: {reason}")]
    Handshake {
        /// The `host:port` of the server.
        target: String,
        /// Why the handshake failed.
        reason: String,
    },

    /// Opening the session channel failed.
    #[error("failed to open session channel: {reason}")]
    ChannelOpen {
        /// Why the channel could not be opened.
        reason: String,
    },

    /// The local terminal could not be switched to raw mode.
    #[error("failed to set terminal mode: {0}")]
    TerminalMode(#[from] TermError),

    /// The remote pseudo-terminal request failed.
    #[error("remote PTY request failed: {reason}")]
    PtyRequest {
        /// Why the request failed.
        reason: String,
    },

    /// The remote shell could not be started.
    #[error("failed to start remote shell: {reason}")]
    ShellStart {
        /// Why the shell did not start.
        reason: String,
    },
}

/// A specialized Result type for shellhop operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration validation error.
    pub fn config_invalid(reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            reason: reason.into(),
        }
    }

    /// Create a path resolution error.
    pub fn path_resolution(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathResolution {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a handshake error.
    pub fn handshake(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Handshake {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a channel-open error.
    pub fn channel_open(reason: impl Into<String>) -> Self {
        Self::ChannelOpen {
            reason: reason.into(),
        }
    }

    /// Create a PTY request error.
    pub fn pty_request(reason: impl Into<String>) -> Self {
        Self::PtyRequest {
            reason: reason.into(),
        }
    }

    /// Create a shell start error.
    pub fn shell_start(reason: impl Into<String>) -> Self {
        Self::ShellStart {
            reason: reason.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigInvalid { .. } => ErrorKind::ConfigInvalid,
            Self::ConfigFile { .. } => ErrorKind::ConfigFileFailed,
            Self::PathResolution { .. } => ErrorKind::PathResolutionFailed,
            Self::KeyFileUnreadable { .. } => ErrorKind::KeyFileUnreadable,
            Self::KeyParse { .. } => ErrorKind::KeyParseFailed,
            Self::ProxyAddressInvalid { .. } => ErrorKind::ProxyAddressInvalid,
            Self::ProxyDial { .. } => ErrorKind::ProxyDialFailed,
            Self::NetworkDial { .. } => ErrorKind::NetworkDialFailed,
            Self::Handshake { .. } => ErrorKind::HandshakeFailed,
            Self::ChannelOpen { .. } => ErrorKind::ChannelOpenFailed,
            Self::TerminalMode(_) => ErrorKind::TerminalModeFailed,
            Self::PtyRequest { .. } => ErrorKind::PtyRequestFailed,
            Self::ShellStart { .. } => ErrorKind::ShellStartFailed,
        }
    }

    /// Whether the error comes from local configuration rather than from
    /// the network or the remote side.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConfigInvalid
                | ErrorKind::ConfigFileFailed
                | ErrorKind::PathResolutionFailed
                | ErrorKind::KeyFileUnreadable
                | ErrorKind::KeyParseFailed
                | ErrorKind::ProxyAddressInvalid
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::config_invalid("host is required");
        assert_eq!(err.to_string(), "invalid configuration: host is required");

        let err = Error::handshake("example.com:22", "authentication rejected");
        assert!(err.to_string().contains("example.com:22"));
        assert!(err.to_string().contains("authentication rejected"));
    }

    #[test]
    fn key_errors_show_path() {
        let err = Error::KeyFileUnreadable {
            path: PathBuf::from("/home/u/.ssh/id_rsa"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/home/u/.ssh/id_rsa"));
        assert!(msg.contains("no such file"));
        assert_eq!(err.kind(), ErrorKind::KeyFileUnreadable);
    }

    #[test]
    fn terminal_error_converts() {
        let err: Error = TermError::NotATerminal.into();
        assert_eq!(err.kind(), ErrorKind::TerminalModeFailed);
        assert!(err.to_string().contains("not a terminal"));
    }

    #[test]
    fn kinds_cover_every_stage() {
        assert_eq!(Error::channel_open("x").kind(), ErrorKind::ChannelOpenFailed);
        assert_eq!(Error::pty_request("x").kind(), ErrorKind::PtyRequestFailed);
        assert_eq!(Error::shell_start("x").kind(), ErrorKind::ShellStartFailed);
        assert_eq!(
            Error::path_resolution("", "empty").kind(),
            ErrorKind::PathResolutionFailed
        );
    }

    #[test]
    fn config_classification() {
        assert!(Error::config_invalid("x").is_config());
        assert!(
            Error::ProxyAddressInvalid {
                proxy: "socks5://".into(),
                reason: "missing host".into(),
            }
            .is_config()
        );
        assert!(
            !Error::NetworkDial {
                target: "h:22".into(),
                reason: "refused".into(),
            }
            .is_config()
        );
        assert!(!Error::shell_start("x").is_config());
    }
}
