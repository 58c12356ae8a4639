//! SSH authentication.
//!
//! A validated profile carries exactly one credential. [`resolve`] turns it
//! into an [`AuthMethod`], loading and decrypting the private key when the
//! profile uses key authentication. [`authenticate`] presents it to the
//! server.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use russh::client;
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg};

use crate::config::{Credential, ServerProfile};
use crate::error::{Error, Result};
use crate::path::PathResolver;

/// A credential ready to present to the server.
#[derive(Clone)]
pub enum AuthMethod {
    /// Password authentication.
    Password(String),
    /// Public key authentication with a decoded private key.
    PublicKey(Arc<PrivateKey>),
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::PublicKey(key) => f
                .debug_tuple("PublicKey")
                .field(&key.algorithm().as_str())
                .finish(),
        }
    }
}

impl AuthMethod {
    /// Check if this is password auth.
    #[must_use]
    pub const fn is_password(&self) -> bool {
        matches!(self, Self::Password(_))
    }

    /// Check if this is public key auth.
    #[must_use]
    pub const fn is_public_key(&self) -> bool {
        matches!(self, Self::PublicKey(_))
    }
}

/// Build the auth method for `profile`.
///
/// Password credentials involve no I/O. Key credentials resolve the key
/// path through `resolver`, read the file, and decode it, using the
/// configured password as the passphrase when one is set.
///
/// # Errors
///
/// Returns [`Error::PathResolution`], [`Error::KeyFileUnreadable`] or
/// [`Error::KeyParse`].
pub async fn resolve(profile: &ServerProfile, resolver: &PathResolver) -> Result<AuthMethod> {
    match &profile.credential {
        Credential::Password(password) => Ok(AuthMethod::Password(password.clone())),
        Credential::Key { path, passphrase } => {
            let path = resolver.resolve(path)?;
            tracing::debug!(
                user = %profile.user,
                key = %path.display(),
                "Loading private key"
            );
            let key = load_private_key(&path, passphrase.as_deref()).await?;
            Ok(AuthMethod::PublicKey(key))
        }
    }
}

/// Load a private key from disk.
///
/// With a passphrase the key is decoded as encrypted first. Unencrypted keys
/// configured alongside a password still load: the decode is retried without
/// the passphrase before giving up.
///
/// # Errors
///
/// Returns [`Error::KeyFileUnreadable`] if the file cannot be read and
/// [`Error::KeyParse`] for malformed material or a wrong or missing
/// passphrase.
pub async fn load_private_key(path: &Path, passphrase: Option<&str>) -> Result<Arc<PrivateKey>> {
    let key_data = tokio::fs::read(path)
        .await
        .map_err(|source| Error::KeyFileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let key_str = String::from_utf8(key_data).map_err(|e| Error::KeyParse {
        path: path.to_path_buf(),
        reason: format!("key file is not valid UTF-8: {e}"),
    })?;

    let decoded = match russh::keys::decode_secret_key(&key_str, passphrase) {
        Ok(key) => Ok(key),
        Err(first) if passphrase.is_some() => {
            russh::keys::decode_secret_key(&key_str, None).map_err(|_| first)
        }
        Err(e) => Err(e),
    };

    let key = decoded.map_err(|e| {
        let reason = if passphrase.is_none() && e.to_string().contains("encrypted") {
            "key is encrypted but no passphrase is configured (set `password` for this alias)"
                .to_string()
        } else {
            e.to_string()
        };
        Error::KeyParse {
            path: path.to_path_buf(),
            reason,
        }
    })?;

    Ok(Arc::new(key))
}

/// Authenticate `user` on an established connection.
///
/// # Errors
///
/// Returns [`Error::Handshake`] if the server rejects the credential or the
/// exchange fails.
pub(crate) async fn authenticate<H: client::Handler>(
    handle: &mut client::Handle<H>,
    user: &str,
    method: &AuthMethod,
    target: &str,
) -> Result<()> {
    let result = match method {
        AuthMethod::Password(password) => {
            tracing::debug!(user = %user, "Attempting password authentication");
            handle.authenticate_password(user, password).await
        }
        AuthMethod::PublicKey(key) => {
            tracing::debug!(
                user = %user,
                algorithm = %key.algorithm().as_str(),
                "Attempting public key authentication"
            );
            // best_supported_rsa_hash returns Result<Option<Option<HashAlg>>, _>
            let rsa_hash = handle
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();
            let key_with_hash = PrivateKeyWithHashAlg::new(Arc::clone(key), rsa_hash);
            handle.authenticate_publickey(user, key_with_hash).await
        }
    };

    match result {
        Ok(auth) if auth.success() => {
            tracing::info!(user = %user, "Authentication successful");
            Ok(())
        }
        Ok(_) => {
            tracing::debug!(user = %user, "Authentication rejected");
            Err(Error::handshake(
                target,
                format!("authentication rejected for user '{user}'"),
            ))
        }
        Err(e) => {
            tracing::debug!(user = %user, error = %e, "Authentication error");
            Err(Error::handshake(target, format!("authentication failed: {e}")))
        }
    }
}
