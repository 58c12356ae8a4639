//! Host key verification.
//!
//! The server's key is checked during the handshake according to a
//! [`HostKeyPolicy`]. Trust-on-first-use is the default: unknown hosts are
//! recorded in `known_hosts` and accepted, hosts whose key changed are
//! rejected.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use russh::keys::{HashAlg, PublicKey};

use crate::config::{DEFAULT_PORT, FINGERPRINT_PREFIX, ServerProfile};
use crate::error::{Error, Result};

/// Marker prefix of a revoked key line.
const REVOKED_MARKER: &str = "@revoked ";

/// Environment variable overriding the `known_hosts` location.
pub const KNOWN_HOSTS_ENV: &str = "SSH_KNOWN_HOSTS";

/// Host key verification policy.
///
/// # Security
///
/// [`HostKeyPolicy::AcceptAny`] exists only with the `insecure-skip-verify`
/// feature. It allows man-in-the-middle attacks and logs a warning on every
/// connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum HostKeyPolicy {
    /// Accept every key without checking.
    #[cfg(feature = "insecure-skip-verify")]
    AcceptAny,
    /// Accept only keys already present in `known_hosts`.
    KnownHosts,
    /// Accept and record unknown hosts; reject changed keys.
    #[default]
    Tofu,
    /// Accept only the key with this SHA-256 fingerprint.
    Pinned(String),
}

impl HostKeyPolicy {
    /// The policy for `profile`: its pinned fingerprint if it has one,
    /// otherwise `default`.
    #[must_use]
    pub fn for_profile(default: &Self, profile: &ServerProfile) -> Self {
        profile
            .host_key
            .as_ref()
            .map_or_else(|| default.clone(), |fp| Self::Pinned(fp.clone()))
    }
}

impl FromStr for HostKeyPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "strict" | "known-hosts" => Ok(Self::KnownHosts),
            "tofu" => Ok(Self::Tofu),
            #[cfg(feature = "insecure-skip-verify")]
            "accept-any" => Ok(Self::AcceptAny),
            fp if fp.starts_with(FINGERPRINT_PREFIX) => Ok(Self::Pinned(fp.to_string())),
            other => Err(Error::config_invalid(format!(
                "unknown host key policy '{other}'"
            ))),
        }
    }
}

/// Outcome of looking a host up in `known_hosts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyStatus {
    /// A recorded key matches.
    Trusted,
    /// The host is recorded, but with a different key.
    Changed,
    /// The host is not recorded.
    Unknown,
    /// The key is listed under an `@revoked` marker.
    Revoked,
}

/// The SHA-256 fingerprint of `key` in OpenSSH notation.
#[must_use]
pub fn fingerprint(key: &PublicKey) -> String {
    key.fingerprint(HashAlg::Sha256).to_string()
}

// ============================================================================
// known_hosts file
// ============================================================================

/// A `known_hosts` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownHosts {
    path: PathBuf,
}

impl KnownHosts {
    /// Use the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The host field for `host:port` as OpenSSH writes it.
    #[must_use]
    pub fn host_pattern(host: &str, port: u16) -> String {
        if port == DEFAULT_PORT {
            host.to_string()
        } else {
            format!("[{host}]:{port}")
        }
    }

    /// Look up `host:port` and compare against `key`.
    ///
    /// A missing or unreadable file counts as no entries. An `@revoked`
    /// entry for the key wins over any matching plain entry. Hashed host
    /// names and `@cert-authority` lines are skipped.
    #[must_use]
    pub fn lookup(&self, host: &str, port: u16, key: &PublicKey) -> HostKeyStatus {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Failed to read known_hosts file"
                    );
                }
                return HostKeyStatus::Unknown;
            }
        };

        let pattern = Self::host_pattern(host, port);
        let wanted = fingerprint(key);
        let mut recorded = false;

        let mut trusted = false;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (revoked, line) = match line.strip_prefix(REVOKED_MARKER) {
                Some(rest) => (true, rest.trim_start()),
                None if line.starts_with('@') => continue,
                None => (false, line),
            };

            let mut parts = line.split_whitespace();
            let (Some(hosts), Some(_key_type), Some(key_data)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };

            if !hosts.split(',').any(|h| h == pattern) {
                continue;
            }

            match russh::keys::parse_public_key_base64(key_data) {
                Ok(stored) if fingerprint(&stored) == wanted => {
                    if revoked {
                        return HostKeyStatus::Revoked;
                    }
                    trusted = true;
                }
                Ok(_) if !revoked => recorded = true,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(host = %host, error = %e, "Skipping unparsable known_hosts entry");
                }
            }
        }

        if trusted {
            HostKeyStatus::Trusted
        } else if recorded {
            HostKeyStatus::Changed
        } else {
            HostKeyStatus::Unknown
        }
    }

    /// Append an entry for `host:port`, creating the file and its directory
    /// if needed.
    pub fn append(&self, host: &str, port: u16, key: &PublicKey) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))?;
                }
            }
        }

        let encoded = key.to_openssh().map_err(io::Error::other)?;
        // Drop the comment, keeping "key-type base64".
        let key_str = encoded.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
        let line = format!("{} {key_str}\n", Self::host_pattern(host, port));

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

// ============================================================================
// Verifier
// ============================================================================

/// Applies a [`HostKeyPolicy`] to the key offered by one server.
#[derive(Debug, Clone)]
pub struct HostKeyVerifier {
    policy: HostKeyPolicy,
    known_hosts: Option<KnownHosts>,
    host: String,
    port: u16,
}

impl HostKeyVerifier {
    /// Create a verifier for `host:port`.
    #[must_use]
    pub fn new(
        policy: HostKeyPolicy,
        known_hosts: Option<KnownHosts>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            policy,
            known_hosts,
            host: host.into(),
            port,
        }
    }

    /// Check `key`. `Err` carries the reason for rejection.
    ///
    /// A key listed as `@revoked` is refused under every policy.
    pub fn verify(&self, key: &PublicKey) -> std::result::Result<(), String> {
        let offered = fingerprint(key);
        let status = self.status(key);
        if status == HostKeyStatus::Revoked {
            tracing::error!(
                host = %self.host,
                fingerprint = %offered,
                "Host key is marked as revoked in known_hosts"
            );
            return Err(format!("host key {offered} is revoked"));
        }

        match &self.policy {
            #[cfg(feature = "insecure-skip-verify")]
            HostKeyPolicy::AcceptAny => {
                tracing::warn!(
                    host = %self.host,
                    fingerprint = %offered,
                    "Accepting server key without verification (INSECURE)"
                );
                Ok(())
            }
            HostKeyPolicy::Pinned(expected) => {
                if *expected == offered {
                    tracing::debug!(host = %self.host, "Host key matches pinned fingerprint");
                    Ok(())
                } else {
                    tracing::error!(
                        host = %self.host,
                        expected = %expected,
                        offered = %offered,
                        "Host key does not match pinned fingerprint"
                    );
                    Err(format!(
                        "host key {offered} does not match pinned fingerprint {expected}"
                    ))
                }
            }
            HostKeyPolicy::KnownHosts => match status {
                HostKeyStatus::Trusted => Ok(()),
                HostKeyStatus::Changed => Err(self.changed(&offered)),
                HostKeyStatus::Unknown => {
                    tracing::warn!(
                        host = %self.host,
                        fingerprint = %offered,
                        "Host not found in known_hosts, rejecting"
                    );
                    Err(format!("host key {offered} is not in known_hosts"))
                }
                HostKeyStatus::Revoked => Err(format!("host key {offered} is revoked")),
            },
            HostKeyPolicy::Tofu => match status {
                HostKeyStatus::Trusted => Ok(()),
                HostKeyStatus::Changed => Err(self.changed(&offered)),
                HostKeyStatus::Unknown => {
                    self.remember(key, &offered);
                    Ok(())
                }
                HostKeyStatus::Revoked => Err(format!("host key {offered} is revoked")),
            },
        }
    }

    fn status(&self, key: &PublicKey) -> HostKeyStatus {
        self.known_hosts
            .as_ref()
            .map_or(HostKeyStatus::Unknown, |kh| kh.lookup(&self.host, self.port, key))
    }

    fn changed(&self, offered: &str) -> String {
        tracing::error!(
            host = %self.host,
            fingerprint = %offered,
            "HOST KEY MISMATCH! Possible man-in-the-middle attack!"
        );
        format!("host key for {} changed (now {offered})", self.host)
    }

    fn remember(&self, key: &PublicKey, offered: &str) {
        let Some(known_hosts) = &self.known_hosts else {
            tracing::warn!(
                host = %self.host,
                fingerprint = %offered,
                "No known_hosts location, accepting key without saving"
            );
            return;
        };

        match known_hosts.append(&self.host, self.port, key) {
            Ok(()) => tracing::warn!(
                host = %self.host,
                fingerprint = %offered,
                path = %known_hosts.path().display(),
                "Permanently added host key to known_hosts"
            ),
            Err(e) => tracing::warn!(
                host = %self.host,
                error = %e,
                "Failed to write known_hosts, accepting key without saving"
            ),
        }
    }
}
