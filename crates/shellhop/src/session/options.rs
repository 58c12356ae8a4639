//! Per-invocation session options.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::backend::ssh::HostKeyPolicy;
use crate::config::DEFAULT_TERM;
use crate::error::{Error, Result};

use super::lifecycle::ShellExit;

/// Default time allowed for the dial and for the handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether the remote exit status becomes the local exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitStatusPolicy {
    /// Exit 0 after any session that was established.
    #[default]
    Ignore,
    /// Exit with the remote status, or 128 + 1 when killed by a signal.
    Propagate,
}

impl ExitStatusPolicy {
    /// The local exit code for a finished session.
    #[must_use]
    pub fn code_for(self, exit: &ShellExit) -> u8 {
        match self {
            Self::Ignore => 0,
            Self::Propagate => match (exit.status, &exit.signal) {
                (Some(status), _) => u8::try_from(status).unwrap_or(u8::MAX),
                (None, Some(_)) => 129,
                (None, None) => 0,
            },
        }
    }
}

impl FromStr for ExitStatusPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ignore" => Ok(Self::Ignore),
            "propagate" => Ok(Self::Propagate),
            other => Err(Error::config_invalid(format!(
                "unknown exit status policy '{other}' (expected ignore or propagate)"
            ))),
        }
    }
}

/// Options for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Terminal type for the remote PTY.
    pub term: String,
    /// Bound on the dial and on the handshake.
    pub connect_timeout: Duration,
    /// Host key policy for aliases without a pinned key.
    pub host_key_policy: HostKeyPolicy,
    /// `known_hosts` file; `None` disables recording and lookups.
    pub known_hosts: Option<PathBuf>,
    /// Exit status handling.
    pub exit_status: ExitStatusPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            term: DEFAULT_TERM.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            host_key_policy: HostKeyPolicy::default(),
            known_hosts: None,
            exit_status: ExitStatusPolicy::default(),
        }
    }
}

impl SessionOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the terminal type. Empty values keep the default.
    #[must_use]
    pub fn term(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        if !term.is_empty() {
            self.term = term;
        }
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the host key policy.
    #[must_use]
    pub fn host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Set the `known_hosts` path.
    #[must_use]
    pub fn known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts = Some(path.into());
        self
    }

    /// Set the exit status policy.
    #[must_use]
    pub const fn exit_status(mut self, policy: ExitStatusPolicy) -> Self {
        self.exit_status = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::lifecycle::EndReason;

    #[test]
    fn defaults() {
        let opts = SessionOptions::default();
        assert_eq!(opts.term, "xterm-256color");
        assert_eq!(opts.connect_timeout, Duration::from_secs(30));
        assert_eq!(opts.host_key_policy, HostKeyPolicy::Tofu);
        assert_eq!(opts.exit_status, ExitStatusPolicy::Ignore);
    }

    #[test]
    fn empty_term_keeps_default() {
        assert_eq!(SessionOptions::new().term("").term, "xterm-256color");
        assert_eq!(SessionOptions::new().term("vt100").term, "vt100");
    }

    #[test]
    fn exit_codes() {
        let status = ShellExit::with_status(7);
        let signaled = ShellExit {
            status: None,
            signal: Some("KILL".into()),
            reason: EndReason::RemoteExit,
        };
        let closed = ShellExit::new(EndReason::ChannelClosed);

        assert_eq!(ExitStatusPolicy::Ignore.code_for(&status), 0);
        assert_eq!(ExitStatusPolicy::Propagate.code_for(&status), 7);
        assert_eq!(ExitStatusPolicy::Propagate.code_for(&signaled), 129);
        assert_eq!(ExitStatusPolicy::Propagate.code_for(&closed), 0);
        assert_eq!(
            ExitStatusPolicy::Propagate.code_for(&ShellExit::with_status(300)),
            255
        );
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("propagate".parse::<ExitStatusPolicy>().unwrap(), ExitStatusPolicy::Propagate);
        assert_eq!("ignore".parse::<ExitStatusPolicy>().unwrap(), ExitStatusPolicy::Ignore);
        assert!("sometimes".parse::<ExitStatusPolicy>().is_err());
    }
}
