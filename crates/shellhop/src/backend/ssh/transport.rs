//! Transport: dial, SSH handshake and authentication.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use russh::client;
use russh::keys::PublicKey;
use tokio::net::TcpStream;

use super::auth::{self, AuthMethod};
use super::channel::SshShellChannel;
use super::host_key::{HostKeyPolicy, HostKeyVerifier, KnownHosts};
use super::proxy::Socks5Proxy;
use crate::config::ServerProfile;
use crate::error::{Error, Result};
use crate::path::PathResolver;
use crate::session::{Connection, Connector, SessionOptions};

/// russh client handler that applies the host key policy.
///
/// russh only learns that the key was rejected; the reason is kept here so
/// the handshake error can report it.
pub struct ClientHandler {
    verifier: HostKeyVerifier,
    rejection: Arc<Mutex<Option<String>>>,
}

impl ClientHandler {
    fn new(verifier: HostKeyVerifier) -> (Self, Arc<Mutex<Option<String>>>) {
        let rejection = Arc::new(Mutex::new(None));
        let handler = Self {
            verifier,
            rejection: Arc::clone(&rejection),
        };
        (handler, rejection)
    }
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.verifier.verify(server_public_key) {
            Ok(()) => Ok(true),
            Err(reason) => {
                *self
                    .rejection
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(reason);
                Ok(false)
            }
        }
    }
}

/// Dial `profile`, directly or through its SOCKS5 proxy.
///
/// # Errors
///
/// Returns [`Error::ProxyAddressInvalid`], [`Error::ProxyDial`] or
/// [`Error::NetworkDial`]. A failing proxy never falls back to a direct
/// connection.
pub async fn dial(profile: &ServerProfile, timeout: Duration) -> Result<TcpStream> {
    let target = profile.address();

    let stream = if let Some(proxy_url) = &profile.proxy {
        let proxy = Socks5Proxy::parse(proxy_url)?;
        tokio::time::timeout(timeout, proxy.dial(&profile.host, profile.port))
            .await
            .map_err(|_| Error::ProxyDial {
                proxy: proxy_url.clone(),
                target: target.clone(),
                reason: format!("timed out after {}s", timeout.as_secs()),
            })??
    } else {
        tracing::debug!(host = %profile.host, port = profile.port, "Dialing");
        tokio::time::timeout(timeout, TcpStream::connect((profile.host.as_str(), profile.port)))
            .await
            .map_err(|_| Error::NetworkDial {
                target: target.clone(),
                reason: format!("timed out after {}s", timeout.as_secs()),
            })?
            .map_err(|e| Error::NetworkDial {
                target: target.clone(),
                reason: e.to_string(),
            })?
    };

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
    }
    Ok(stream)
}

/// Connect, verify the host key and authenticate.
///
/// # Errors
///
/// Returns dial errors from [`dial`], and [`Error::Handshake`] for protocol
/// failures, rejected host keys and rejected credentials.
pub async fn connect(
    profile: &ServerProfile,
    auth: &AuthMethod,
    options: &SessionOptions,
) -> Result<SshConnection> {
    let target = profile.address();
    tracing::info!(
        host = %profile.host,
        port = profile.port,
        user = %profile.user,
        proxy = profile.proxy.as_deref().unwrap_or("none"),
        "Connecting to SSH server"
    );

    let stream = dial(profile, options.connect_timeout).await?;

    let policy = HostKeyPolicy::for_profile(&options.host_key_policy, profile);
    let known_hosts = options.known_hosts.clone().map(KnownHosts::new);
    let verifier = HostKeyVerifier::new(policy, known_hosts, &profile.host, profile.port);
    let (handler, rejection) = ClientHandler::new(verifier);

    let config = Arc::new(client::Config::default());
    let handshake = tokio::time::timeout(
        options.connect_timeout,
        client::connect_stream(config, stream, handler),
    )
    .await;

    let mut handle = match handshake {
        Ok(Ok(handle)) => handle,
        Ok(Err(e)) => {
            let reason = rejection
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .unwrap_or_else(|| e.to_string());
            return Err(Error::handshake(&target, reason));
        }
        Err(_) => {
            return Err(Error::handshake(
                &target,
                format!("timed out after {}s", options.connect_timeout.as_secs()),
            ));
        }
    };

    auth::authenticate(&mut handle, &profile.user, auth, &target).await?;

    tracing::info!(host = %profile.host, user = %profile.user, "SSH connection established");
    Ok(SshConnection {
        handle: Arc::new(handle),
        target,
    })
}

/// [`Connector`] backed by russh.
#[derive(Debug, Clone)]
pub struct SshConnector {
    options: SessionOptions,
    resolver: PathResolver,
}

impl SshConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new(options: SessionOptions, resolver: PathResolver) -> Self {
        Self { options, resolver }
    }
}

impl Connector for SshConnector {
    type Connection = SshConnection;

    async fn connect(&self, profile: &ServerProfile) -> Result<SshConnection> {
        let method = auth::resolve(profile, &self.resolver).await?;
        connect(profile, &method, &self.options).await
    }
}

/// An authenticated SSH connection.
pub struct SshConnection {
    handle: Arc<client::Handle<ClientHandler>>,
    target: String,
}

impl std::fmt::Debug for SshConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnection")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Connection for SshConnection {
    type Channel = SshShellChannel;

    async fn open_session(&mut self) -> Result<SshShellChannel> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::channel_open(e.to_string()))?;
        tracing::debug!(addr = %self.target, "Session channel opened");
        Ok(SshShellChannel::new(channel, Arc::clone(&self.handle)))
    }

    async fn close(&mut self) -> io::Result<()> {
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::error::ErrorKind;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn direct_dial_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let profile = ServerConfig::new("127.0.0.1", "u")
            .password("pw")
            .port(i64::from(port))
            .validate()
            .unwrap();

        let (stream, accepted) =
            tokio::join!(dial(&profile, Duration::from_secs(5)), listener.accept());
        let stream = stream.unwrap();
        accepted.unwrap();
        assert!(stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn refused_dial_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let profile = ServerConfig::new("127.0.0.1", "u")
            .password("pw")
            .port(i64::from(port))
            .validate()
            .unwrap();
        let err = dial(&profile, Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkDialFailed);
    }

    #[tokio::test]
    async fn unreachable_proxy_does_not_fall_back() {
        // A live target that must never be contacted.
        let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target_port = target.local_addr().unwrap().port();
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = dead.local_addr().unwrap().port();
        drop(dead);

        let profile = ServerConfig::new("127.0.0.1", "u")
            .password("pw")
            .port(i64::from(target_port))
            .proxy(format!("socks5://127.0.0.1:{dead_port}"))
            .validate()
            .unwrap();

        let err = dial(&profile, Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProxyDialFailed);
    }

    #[tokio::test]
    async fn invalid_proxy_address() {
        let profile = ServerConfig::new("h", "u")
            .password("pw")
            .proxy("socks5://")
            .validate()
            .unwrap();
        let err = dial(&profile, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProxyAddressInvalid);
    }

    #[tokio::test]
    async fn garbage_server_fails_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await.unwrap();
        });

        let profile = ServerConfig::new("127.0.0.1", "u")
            .password("pw")
            .port(i64::from(port))
            .validate()
            .unwrap();
        let options = SessionOptions::default().connect_timeout(Duration::from_secs(5));
        let err = connect(&profile, &AuthMethod::Password("pw".into()), &options)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HandshakeFailed);
        server.await.unwrap();
    }
}
