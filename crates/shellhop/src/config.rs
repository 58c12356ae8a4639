//! Server credential configuration.
//!
//! [`ServerConfig`] is the raw record stored per alias. It is turned into a
//! [`ServerProfile`] by [`ServerConfig::validate`], which fills defaults
//! (auth method inference, port 22, default key path) and rejects
//! incomplete records. Only validated profiles reach the session code.
//!
//! # Example
//!
//! ```
//! use shellhop::config::{AuthKind, ServerConfig};
//!
//! let profile = ServerConfig::new("example.com", "deploy")
//!     .password("hunter2")
//!     .validate()
//!     .unwrap();
//!
//! assert_eq!(profile.port, 22);
//! assert_eq!(profile.auth_kind(), AuthKind::Password);
//! ```

pub mod env;
pub mod file;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Private key used when key authentication has no explicit path.
pub const DEFAULT_KEY_PATH: &str = "~/.ssh/id_rsa";

/// Default keepalive interval in seconds.
pub const DEFAULT_SERVER_ALIVE_INTERVAL: i64 = 30;

/// Default terminal type for the remote PTY.
pub const DEFAULT_TERM: &str = "xterm-256color";

/// The only proxy scheme that is honoured.
pub const SOCKS5_SCHEME: &str = "socks5://";

/// Prefix of a SHA-256 host key fingerprint.
pub const FINGERPRINT_PREFIX: &str = "SHA256:";

// ============================================================================
// Authentication kind
// ============================================================================

/// How the user authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    /// Password authentication.
    Password,
    /// Public key authentication.
    Key,
}

impl AuthKind {
    /// The literal used in the alias store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Key => "key",
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "password" => Ok(Self::Password),
            "key" => Ok(Self::Key),
            other => Err(Error::config_invalid(format!(
                "auth_method must be 'key' or 'password', got '{other}'"
            ))),
        }
    }
}

// ============================================================================
// Raw server record
// ============================================================================

/// Raw per-alias record as stored in the alias store.
///
/// Every field is optional on disk; empty strings and a zero port mean
/// "not set".
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Hostname or IP address.
    pub host: String,
    /// Login user.
    pub user: String,
    /// Port; zero or negative means the default.
    pub port: i64,
    /// `key`, `password`, or empty to infer.
    pub auth_method: String,
    /// Login password, or key passphrase for key authentication.
    pub password: String,
    /// Private key path.
    #[serde(rename = "key")]
    pub key_path: String,
    /// Proxy URL; only `socks5://` is used.
    pub proxy: String,
    /// Pinned host key fingerprint (`SHA256:...`).
    pub host_key: String,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("auth_method", &self.auth_method)
            .field("password", &redacted(&self.password))
            .field("key_path", &self.key_path)
            .field("proxy", &self.proxy)
            .field("host_key", &self.host_key)
            .finish()
    }
}

const fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "<redacted>" }
}

impl ServerConfig {
    /// Create a record for `user@host`.
    #[must_use]
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            ..Default::default()
        }
    }

    /// Set the port.
    #[must_use]
    pub const fn port(mut self, port: i64) -> Self {
        self.port = port;
        self
    }

    /// Set the auth method literal.
    #[must_use]
    pub fn auth_method(mut self, method: impl Into<String>) -> Self {
        self.auth_method = method.into();
        self
    }

    /// Set the password (or key passphrase).
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the private key path.
    #[must_use]
    pub fn key(mut self, path: impl Into<String>) -> Self {
        self.key_path = path.into();
        self
    }

    /// Set the proxy URL.
    #[must_use]
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = proxy.into();
        self
    }

    /// Pin the host key fingerprint.
    #[must_use]
    pub fn host_key(mut self, fingerprint: impl Into<String>) -> Self {
        self.host_key = fingerprint.into();
        self
    }

    /// The auth method after inference: explicit value if set, otherwise
    /// `password` when a password is present and `key` when it is not.
    pub fn effective_auth_kind(&self) -> Result<AuthKind> {
        if self.auth_method.is_empty() {
            Ok(if self.password.is_empty() {
                AuthKind::Key
            } else {
                AuthKind::Password
            })
        } else {
            self.auth_method.parse()
        }
    }

    /// The port after defaulting.
    pub fn effective_port(&self) -> Result<u16> {
        if self.port <= 0 {
            return Ok(DEFAULT_PORT);
        }
        u16::try_from(self.port)
            .map_err(|_| Error::config_invalid(format!("port {} is out of range", self.port)))
    }

    /// One-line listing: `user@host[:port][, proxy: url]`.
    ///
    /// The port is shown only when it differs from 22. Secrets never
    /// appear.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!("{}@{}", self.user, self.host);
        match self.effective_port() {
            Ok(DEFAULT_PORT) => {}
            Ok(port) => line.push_str(&format!(":{port}")),
            Err(_) => line.push_str(&format!(":{}", self.port)),
        }
        if !self.proxy.is_empty() {
            line.push_str(&format!(", proxy: {}", self.proxy));
        }
        line
    }

    /// Validate the record and fill in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] when host or user is empty, the auth
    /// method is unknown, password authentication has no password, the port
    /// is out of range, or the pinned fingerprint is malformed.
    pub fn validate(&self) -> Result<ServerProfile> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(Error::config_invalid("host is required"));
        }
        let user = self.user.trim();
        if user.is_empty() {
            return Err(Error::config_invalid("user is required"));
        }

        let credential = match self.effective_auth_kind()? {
            AuthKind::Password => {
                if self.password.is_empty() {
                    return Err(Error::config_invalid(
                        "password authentication requires a password",
                    ));
                }
                Credential::Password(self.password.clone())
            }
            AuthKind::Key => Credential::Key {
                path: if self.key_path.is_empty() {
                    DEFAULT_KEY_PATH.to_string()
                } else {
                    self.key_path.clone()
                },
                passphrase: (!self.password.is_empty()).then(|| self.password.clone()),
            },
        };

        let proxy = if self.proxy.starts_with(SOCKS5_SCHEME) {
            Some(self.proxy.clone())
        } else {
            if !self.proxy.is_empty() {
                tracing::warn!(
                    host = %host,
                    proxy = %self.proxy,
                    "Ignoring proxy with unsupported scheme, connecting directly"
                );
            }
            None
        };

        let host_key = match self.host_key.trim() {
            "" => None,
            fp if fp.starts_with(FINGERPRINT_PREFIX) && fp.len() > FINGERPRINT_PREFIX.len() => {
                Some(fp.to_string())
            }
            fp => {
                return Err(Error::config_invalid(format!(
                    "host_key must be a {FINGERPRINT_PREFIX} fingerprint, got '{fp}'"
                )));
            }
        };

        Ok(ServerProfile {
            host: host.to_string(),
            user: user.to_string(),
            port: self.effective_port()?,
            credential,
            proxy,
            host_key,
        })
    }
}

// ============================================================================
// Validated profile
// ============================================================================

/// Credential selected for a validated profile.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Log in with a password.
    Password(String),
    /// Log in with a private key.
    Key {
        /// Key path as configured; resolved at authentication time.
        path: String,
        /// Passphrase protecting the key, if any.
        passphrase: Option<String>,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::Key { path, passphrase } => f
                .debug_struct("Key")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// A validated server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProfile {
    /// Hostname or IP address.
    pub host: String,
    /// Login user.
    pub user: String,
    /// Port.
    pub port: u16,
    /// Credential to authenticate with.
    pub credential: Credential,
    /// SOCKS5 proxy URL, if the connection is tunneled.
    pub proxy: Option<String>,
    /// Pinned host key fingerprint.
    pub host_key: Option<String>,
}

impl ServerProfile {
    /// The auth method this profile uses.
    #[must_use]
    pub const fn auth_kind(&self) -> AuthKind {
        match self.credential {
            Credential::Password(_) => AuthKind::Password,
            Credential::Key { .. } => AuthKind::Key,
        }
    }

    /// The `host:port` target, with IPv6 literals bracketed.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

// ============================================================================
// Global settings and the alias store
// ============================================================================

fn default_server_alive_interval() -> i64 {
    DEFAULT_SERVER_ALIVE_INTERVAL
}

/// Settings shared by every alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Seconds between keepalive probes; zero or negative disables them.
    #[serde(default = "default_server_alive_interval")]
    pub server_alive_interval: i64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            server_alive_interval: DEFAULT_SERVER_ALIVE_INTERVAL,
        }
    }
}

impl GlobalConfig {
    /// The keepalive period, or `None` when disabled.
    #[must_use]
    pub fn keepalive_interval(&self) -> Option<Duration> {
        u64::try_from(self.server_alive_interval)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// The full alias store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasStore {
    /// Shared settings, if the store has a `global` section.
    pub global: Option<GlobalConfig>,
    /// Server records keyed by alias.
    pub servers: BTreeMap<String, ServerConfig>,
}

impl AliasStore {
    /// Parse a store from JSON text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Look up an alias.
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&ServerConfig> {
        self.servers.get(alias)
    }

    /// Whether the store has no aliases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Aliases whose name, host or user contains `pattern`, ignoring case.
    pub fn matching<'a>(
        &'a self,
        pattern: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a ServerConfig)> + 'a {
        let needle = pattern.to_lowercase();
        self.servers
            .iter()
            .filter(move |(alias, server)| {
                needle.is_empty()
                    || alias.to_lowercase().contains(&needle)
                    || server.host.to_lowercase().contains(&needle)
                    || server.user.to_lowercase().contains(&needle)
            })
            .map(|(alias, server)| (alias.as_str(), server))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn password_set_infers_password() {
        let profile = ServerConfig::new("h", "u").password("pw").validate().unwrap();
        assert_eq!(profile.auth_kind(), AuthKind::Password);
        assert_eq!(profile.credential, Credential::Password("pw".into()));
    }

    #[test]
    fn nothing_set_infers_key_with_default_path() {
        let profile = ServerConfig::new("h", "u").validate().unwrap();
        assert_eq!(
            profile.credential,
            Credential::Key {
                path: DEFAULT_KEY_PATH.into(),
                passphrase: None,
            }
        );
    }

    #[test]
    fn password_with_key_method_is_passphrase() {
        let profile = ServerConfig::new("h", "u")
            .auth_method("key")
            .key("~/.ssh/id_ed25519")
            .password("secret")
            .validate()
            .unwrap();
        assert_eq!(
            profile.credential,
            Credential::Key {
                path: "~/.ssh/id_ed25519".into(),
                passphrase: Some("secret".into()),
            }
        );
    }

    #[test]
    fn password_method_without_password_is_invalid() {
        let err = ServerConfig::new("h", "u")
            .auth_method("password")
            .validate()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn unknown_method_is_invalid() {
        let err = ServerConfig::new("h", "u")
            .auth_method("kerberos")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("kerberos"));
    }

    #[test]
    fn host_and_user_required() {
        assert!(ServerConfig::new("", "u").validate().is_err());
        assert!(ServerConfig::new("h", "  ").validate().is_err());
    }

    #[test]
    fn port_defaults_and_bounds() {
        assert_eq!(ServerConfig::new("h", "u").validate().unwrap().port, 22);
        assert_eq!(ServerConfig::new("h", "u").port(-5).validate().unwrap().port, 22);
        assert_eq!(ServerConfig::new("h", "u").port(2222).validate().unwrap().port, 2222);
        assert!(ServerConfig::new("h", "u").port(70_000).validate().is_err());
    }

    #[test]
    fn only_socks5_proxy_is_kept() {
        let socks = ServerConfig::new("h", "u")
            .proxy("socks5://127.0.0.1:1080")
            .validate()
            .unwrap();
        assert_eq!(socks.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));

        let http = ServerConfig::new("h", "u")
            .proxy("http://127.0.0.1:3128")
            .validate()
            .unwrap();
        assert_eq!(http.proxy, None);
    }

    #[test]
    fn host_key_must_be_sha256() {
        let ok = ServerConfig::new("h", "u")
            .host_key("SHA256:abc")
            .validate()
            .unwrap();
        assert_eq!(ok.host_key.as_deref(), Some("SHA256:abc"));

        assert!(ServerConfig::new("h", "u").host_key("MD5:aa").validate().is_err());
        assert!(ServerConfig::new("h", "u").host_key("SHA256:").validate().is_err());
    }

    #[test]
    fn address_brackets_ipv6() {
        let v4 = ServerConfig::new("10.0.0.1", "u").port(2200).validate().unwrap();
        assert_eq!(v4.address(), "10.0.0.1:2200");
        let v6 = ServerConfig::new("::1", "u").validate().unwrap();
        assert_eq!(v6.address(), "[::1]:22");
    }

    #[test]
    fn summary_hides_default_port_and_secrets() {
        let plain = ServerConfig::new("h", "u").password("topsecret");
        assert_eq!(plain.summary(), "u@h");

        let proxied = ServerConfig::new("h", "u")
            .port(2222)
            .proxy("socks5://127.0.0.1:1080");
        assert_eq!(proxied.summary(), "u@h:2222, proxy: socks5://127.0.0.1:1080");
        assert!(!plain.summary().contains("topsecret"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = ServerConfig::new("h", "u").password("topsecret");
        assert!(!format!("{config:?}").contains("topsecret"));
        let profile = config.validate().unwrap();
        assert!(!format!("{profile:?}").contains("topsecret"));
    }

    #[test]
    fn keepalive_interval() {
        assert_eq!(
            GlobalConfig::default().keepalive_interval(),
            Some(Duration::from_secs(30))
        );
        let off = GlobalConfig {
            server_alive_interval: 0,
        };
        assert_eq!(off.keepalive_interval(), None);
        let negative = GlobalConfig {
            server_alive_interval: -1,
        };
        assert_eq!(negative.keepalive_interval(), None);
    }

    #[test]
    fn store_parses_json() {
        let store = AliasStore::from_json(
            r#"{
                "global": {},
                "servers": {
                    "web": {"host": "web.example.com", "user": "deploy", "port": 2222,
                            "key": "~/.ssh/deploy", "proxy": "socks5://127.0.0.1:1080"},
                    "db": {"host": "db.internal", "user": "root", "password": "pw"}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(store.global, Some(GlobalConfig::default()));
        let web = store.get("web").unwrap();
        assert_eq!(web.key_path, "~/.ssh/deploy");
        assert_eq!(web.port, 2222);
        assert_eq!(store.get("db").unwrap().password, "pw");
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn store_without_global() {
        let store = AliasStore::from_json(r#"{"servers": {}}"#).unwrap();
        assert!(store.global.is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn matching_filters_case_insensitively() {
        let mut store = AliasStore::default();
        store
            .servers
            .insert("Prod-Web".into(), ServerConfig::new("web.example.com", "deploy"));
        store
            .servers
            .insert("staging".into(), ServerConfig::new("10.1.2.3", "admin"));

        let hits: Vec<_> = store.matching("prod").map(|(alias, _)| alias).collect();
        assert_eq!(hits, ["Prod-Web"]);
        let hits: Vec<_> = store.matching("ADMIN").map(|(alias, _)| alias).collect();
        assert_eq!(hits, ["staging"]);
        assert_eq!(store.matching("").count(), 2);
    }

    proptest! {
        #[test]
        fn non_positive_port_is_22(port in i64::MIN..=0) {
            let profile = ServerConfig::new("h", "u").port(port).validate().unwrap();
            prop_assert_eq!(profile.port, DEFAULT_PORT);
        }

        #[test]
        fn in_range_port_is_kept(port in 1i64..=65535) {
            let profile = ServerConfig::new("h", "u").port(port).validate().unwrap();
            prop_assert_eq!(i64::from(profile.port), port);
        }

        #[test]
        fn inference_follows_password(password in "[a-zA-Z0-9]{0,12}") {
            let kind = ServerConfig::new("h", "u").password(password.clone()).effective_auth_kind().unwrap();
            let expected = if password.is_empty() { AuthKind::Key } else { AuthKind::Password };
            prop_assert_eq!(kind, expected);
        }
    }
}
