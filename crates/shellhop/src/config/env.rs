//! Environment-based configuration.
//!
//! Variables are read with the `SHELLHOP_` prefix, except the standard
//! `TERM` and `SSH_KNOWN_HOSTS`. Overrides set with
//! [`EnvConfig::with_var`] take precedence over the process environment.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::DEFAULT_TERM;
use crate::backend::ssh::HostKeyPolicy;
use crate::backend::ssh::host_key::KNOWN_HOSTS_ENV;
use crate::error::{Error, Result};
use crate::logging::{DEFAULT_FILTER, LogFormat, LoggingConfig};
use crate::session::{ExitStatusPolicy, SessionOptions};

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "SHELLHOP";

/// Environment variable reader.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Values that shadow the process environment.
    overrides: HashMap<String, String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a new environment config reader.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            overrides: HashMap::new(),
        }
    }

    /// Shadow the full variable `name` with `value`.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get an unprefixed variable.
    #[must_use]
    pub fn get_unprefixed(&self, var_name: &str) -> Option<String> {
        self.overrides
            .get(var_name)
            .cloned()
            .or_else(|| std::env::var(var_name).ok())
            .filter(|v| !v.is_empty())
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.get_unprefixed(&self.var_name(name))
    }

    /// Get a string value with default.
    #[must_use]
    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Get a parsed value.
    #[must_use]
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| v.parse().ok())
    }

    /// Get a duration in seconds.
    #[must_use]
    pub fn duration_secs(&self, name: &str) -> Option<Duration> {
        self.parse::<u64>(name).map(Duration::from_secs)
    }

    /// Terminal type for the remote PTY, from `TERM`.
    #[must_use]
    pub fn term(&self) -> String {
        self.get_unprefixed(vars::TERM)
            .unwrap_or_else(|| DEFAULT_TERM.to_string())
    }

    /// Location of `known_hosts`: `SSH_KNOWN_HOSTS`, else under the home
    /// directory.
    #[must_use]
    pub fn known_hosts(&self) -> Option<PathBuf> {
        self.get_unprefixed(KNOWN_HOSTS_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".ssh").join("known_hosts")))
    }

    /// Session options from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] for an unknown host key policy, exit
    /// status policy or a malformed connect timeout.
    pub fn session_options(&self) -> Result<SessionOptions> {
        let mut options = SessionOptions::new().term(self.term());

        if let Some(policy) = self.get(vars::HOST_KEY) {
            options = options.host_key_policy(policy.parse::<HostKeyPolicy>()?);
        }
        if let Some(policy) = self.get(vars::EXIT_STATUS) {
            options = options.exit_status(policy.parse::<ExitStatusPolicy>()?);
        }
        if let Some(raw) = self.get(vars::CONNECT_TIMEOUT) {
            let timeout = self
                .duration_secs(vars::CONNECT_TIMEOUT)
                .filter(|t| !t.is_zero())
                .ok_or_else(|| {
                    Error::config_invalid(format!(
                        "{} must be a positive number of seconds, got '{raw}'",
                        self.var_name(vars::CONNECT_TIMEOUT)
                    ))
                })?;
            options = options.connect_timeout(timeout);
        }
        if let Some(path) = self.known_hosts() {
            options = options.known_hosts(path);
        }

        Ok(options)
    }

    /// Logging settings from the environment.
    #[must_use]
    pub fn logging(&self) -> LoggingConfig {
        let format = match self.get(vars::LOG_FORMAT).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        LoggingConfig {
            filter: self.get_or(vars::LOG, DEFAULT_FILTER),
            log_file: self.get(vars::LOG_FILE).map(PathBuf::from),
            format,
        }
    }

    /// Override for the alias store path.
    #[must_use]
    pub fn store_path(&self) -> Option<String> {
        self.get(vars::CONFIG)
    }
}

/// Environment variable names, without the prefix.
pub mod vars {
    /// Alias store path.
    pub const CONFIG: &str = "CONFIG";
    /// Log filter directives.
    pub const LOG: &str = "LOG";
    /// Log file path.
    pub const LOG_FILE: &str = "LOG_FILE";
    /// Log output format (`text` or `json`).
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
    /// Host key policy.
    pub const HOST_KEY: &str = "HOST_KEY";
    /// Exit status policy.
    pub const EXIT_STATUS: &str = "EXIT_STATUS";
    /// Connect timeout in seconds.
    pub const CONNECT_TIMEOUT: &str = "CONNECT_TIMEOUT";
    /// Terminal type (unprefixed).
    pub const TERM: &str = "TERM";
}
