//! SOCKS5 proxy dialing.
//!
//! Only the unauthenticated CONNECT flow is implemented. The target name is
//! sent to the proxy unresolved, so DNS happens on the proxy side.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use url::Url;

use crate::error::{Error, Result};

/// Port used when the proxy URL has none.
pub const DEFAULT_SOCKS5_PORT: u16 = 1080;

/// SOCKS5 protocol constants (RFC 1928).
mod socks5 {
    pub const VERSION: u8 = 0x05;
    pub const AUTH_NONE: u8 = 0x00;
    pub const AUTH_NO_ACCEPTABLE: u8 = 0xFF;
    pub const CMD_CONNECT: u8 = 0x01;
    pub const RESERVED: u8 = 0x00;
    pub const ATYP_IPV4: u8 = 0x01;
    pub const ATYP_DOMAIN: u8 = 0x03;
    pub const ATYP_IPV6: u8 = 0x04;
    pub const REP_SUCCESS: u8 = 0x00;
    pub const REP_GENERAL_FAILURE: u8 = 0x01;
    pub const REP_CONN_NOT_ALLOWED: u8 = 0x02;
    pub const REP_NETWORK_UNREACHABLE: u8 = 0x03;
    pub const REP_HOST_UNREACHABLE: u8 = 0x04;
    pub const REP_CONN_REFUSED: u8 = 0x05;
    pub const REP_TTL_EXPIRED: u8 = 0x06;
    pub const REP_CMD_NOT_SUPPORTED: u8 = 0x07;
    pub const REP_ADDR_NOT_SUPPORTED: u8 = 0x08;
}

/// A parsed `socks5://host[:port]` proxy address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks5Proxy {
    url: String,
    host: String,
    port: u16,
}

impl Socks5Proxy {
    /// Parse a proxy URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProxyAddressInvalid`] if the URL is malformed, is
    /// not `socks5://`, has no host, or carries credentials.
    pub fn parse(proxy: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::ProxyAddressInvalid {
            proxy: proxy.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(proxy).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "socks5" {
            return Err(invalid("scheme must be socks5"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("proxy authentication is not supported"));
        }

        let host = url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?;

        Ok(Self {
            url: proxy.to_string(),
            host: host.to_string(),
            port: url.port().unwrap_or(DEFAULT_SOCKS5_PORT),
        })
    }

    /// Proxy host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Proxy port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// The proxy's `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Connect to the proxy and ask it to open a tunnel to
    /// `target_host:target_port`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProxyDial`] if the proxy is unreachable or refuses
    /// the tunnel.
    pub async fn dial(&self, target_host: &str, target_port: u16) -> Result<TcpStream> {
        let target = format!("{target_host}:{target_port}");
        let dial_error = |reason: String| Error::ProxyDial {
            proxy: self.url.clone(),
            target: target.clone(),
            reason,
        };

        tracing::debug!(
            proxy = %self.address(),
            host = %target_host,
            port = target_port,
            "Dialing through SOCKS5 proxy"
        );

        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| dial_error(format!("cannot reach proxy: {e}")))?;
        handshake(&mut stream, target_host, target_port)
            .await
            .map_err(|e| dial_error(e.to_string()))?;

        tracing::debug!(proxy = %self.address(), dest = %target, "SOCKS5 tunnel established");
        Ok(stream)
    }
}

/// Encode a CONNECT request for `host:port`.
///
/// IP literals use their address types; anything else is sent as a domain
/// name.
///
/// # Errors
///
/// Fails for an empty name or one longer than 255 bytes.
pub fn encode_connect_request(host: &str, port: u16) -> io::Result<Vec<u8>> {
    let mut request = vec![socks5::VERSION, socks5::CMD_CONNECT, socks5::RESERVED];

    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        request.push(socks5::ATYP_IPV4);
        request.extend_from_slice(&ip.octets());
    } else if let Ok(ip) = host.parse::<Ipv6Addr>() {
        request.push(socks5::ATYP_IPV6);
        request.extend_from_slice(&ip.octets());
    } else {
        let len = u8::try_from(host.len())
            .ok()
            .filter(|len| *len > 0)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("target name must be 1-255 bytes, got {}", host.len()),
                )
            })?;
        request.push(socks5::ATYP_DOMAIN);
        request.push(len);
        request.extend_from_slice(host.as_bytes());
    }

    request.extend_from_slice(&port.to_be_bytes());
    Ok(request)
}

/// Run the client side of the SOCKS5 negotiation on `stream`.
///
/// On success the stream is a transparent tunnel to the target.
pub async fn handshake<S>(stream: &mut S, host: &str, port: u16) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = encode_connect_request(host, port)?;

    // Greeting: one method, no authentication.
    stream
        .write_all(&[socks5::VERSION, 1, socks5::AUTH_NONE])
        .await?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    if choice[0] != socks5::VERSION {
        return Err(protocol_error(format!(
            "unsupported SOCKS version {} in reply",
            choice[0]
        )));
    }
    match choice[1] {
        socks5::AUTH_NONE => {}
        socks5::AUTH_NO_ACCEPTABLE => {
            return Err(protocol_error("proxy requires authentication"));
        }
        other => {
            return Err(protocol_error(format!(
                "proxy selected unsupported auth method {other:#04x}"
            )));
        }
    }

    stream.write_all(&request).await?;

    // VER | REP | RSV | ATYP
    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await?;
    if reply[0] != socks5::VERSION {
        return Err(protocol_error(format!(
            "unsupported SOCKS version {} in reply",
            reply[0]
        )));
    }
    if reply[1] != socks5::REP_SUCCESS {
        return Err(protocol_error(reply_message(reply[1])));
    }

    // BND.ADDR and BND.PORT are unused but must be drained.
    let addr_len = match reply[3] {
        socks5::ATYP_IPV4 => 4,
        socks5::ATYP_IPV6 => 16,
        socks5::ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            usize::from(len[0])
        }
        other => {
            return Err(protocol_error(format!(
                "unknown address type {other:#04x} in reply"
            )));
        }
    };
    let mut bound = vec![0u8; addr_len + 2];
    stream.read_exact(&mut bound).await?;

    Ok(())
}

fn reply_message(code: u8) -> String {
    match code {
        socks5::REP_GENERAL_FAILURE => "general SOCKS server failure".to_string(),
        socks5::REP_CONN_NOT_ALLOWED => "connection not allowed by ruleset".to_string(),
        socks5::REP_NETWORK_UNREACHABLE => "network unreachable".to_string(),
        socks5::REP_HOST_UNREACHABLE => "host unreachable".to_string(),
        socks5::REP_CONN_REFUSED => "connection refused".to_string(),
        socks5::REP_TTL_EXPIRED => "TTL expired".to_string(),
        socks5::REP_CMD_NOT_SUPPORTED => "command not supported".to_string(),
        socks5::REP_ADDR_NOT_SUPPORTED => "address type not supported".to_string(),
        other => format!("unknown SOCKS reply {other:#04x}"),
    }
}

fn protocol_error(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;
    use tokio::io::duplex;

    #[test]
    fn parse_proxy_url() {
        let proxy = Socks5Proxy::parse("socks5://127.0.0.1:9050").unwrap();
        assert_eq!(proxy.host(), "127.0.0.1");
        assert_eq!(proxy.port(), 9050);
        assert_eq!(proxy.address(), "127.0.0.1:9050");

        let proxy = Socks5Proxy::parse("socks5://proxy.lan").unwrap();
        assert_eq!(proxy.port(), DEFAULT_SOCKS5_PORT);

        let proxy = Socks5Proxy::parse("socks5://[::1]:1081").unwrap();
        assert_eq!(proxy.host(), "::1");
        assert_eq!(proxy.address(), "[::1]:1081");
    }

    #[test]
    fn parse_rejects_bad_addresses() {
        for bad in ["socks5://", "socks5://user:pw@host:1080", "http://host:1080", "nonsense"] {
            let err = Socks5Proxy::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ProxyAddressInvalid, "{bad}");
        }
    }

    #[test]
    fn connect_request_encoding() {
        assert_eq!(
            encode_connect_request("10.0.0.1", 22).unwrap(),
            vec![5, 1, 0, 1, 10, 0, 0, 1, 0, 22]
        );
        assert_eq!(
            encode_connect_request("db", 2222).unwrap(),
            vec![5, 1, 0, 3, 2, b'd', b'b', 0x08, 0xAE]
        );

        let v6 = encode_connect_request("::1", 22).unwrap();
        assert_eq!(v6[3], 4);
        assert_eq!(v6.len(), 4 + 16 + 2);

        assert!(encode_connect_request("", 22).is_err());
        assert!(encode_connect_request(&"a".repeat(256), 22).is_err());
    }

    async fn fake_server<S>(mut server: S, reply: Vec<u8>) -> Vec<u8>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut greeting = [0u8; 3];
        server.read_exact(&mut greeting).await.unwrap();
        assert_eq!(greeting, [5, 1, 0]);
        server.write_all(&[5, 0]).await.unwrap();

        let mut head = [0u8; 5];
        server.read_exact(&mut head).await.unwrap();
        let mut rest = vec![0u8; usize::from(head[4]) + 2];
        server.read_exact(&mut rest).await.unwrap();

        server.write_all(&reply).await.unwrap();
        let mut request = head.to_vec();
        request.extend(rest);
        request
    }

    #[tokio::test]
    async fn handshake_succeeds() {
        let (mut client, server) = duplex(256);
        let reply = vec![5, 0, 0, 1, 127, 0, 0, 1, 0x1F, 0x90];
        let server = tokio::spawn(fake_server(server, reply));

        handshake(&mut client, "example.com", 22).await.unwrap();

        let request = server.await.unwrap();
        assert_eq!(&request[5..16], b"example.com");
        assert_eq!(&request[16..], &[0, 22]);
    }

    #[tokio::test]
    async fn handshake_drains_domain_bound_address() {
        let (mut client, server) = duplex(256);
        let mut reply = vec![5, 0, 0, 3, 4];
        reply.extend_from_slice(b"prox");
        reply.extend_from_slice(&[0, 80]);
        reply.extend_from_slice(b"SSH-2.0");
        let server = tokio::spawn(async move {
            let _ = fake_server(server, reply).await;
        });

        handshake(&mut client, "target", 22).await.unwrap();
        server.await.unwrap();

        // Bytes after the reply belong to the tunnel.
        let mut banner = [0u8; 7];
        client.read_exact(&mut banner).await.unwrap();
        assert_eq!(&banner, b"SSH-2.0");
    }

    #[tokio::test]
    async fn handshake_reports_refusal() {
        let (mut client, server) = duplex(256);
        let reply = vec![5, 5, 0, 1, 0, 0, 0, 0, 0, 0];
        let server = tokio::spawn(fake_server(server, reply));

        let err = handshake(&mut client, "example.com", 22).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn handshake_requires_no_auth() {
        let (mut client, mut server) = duplex(64);
        let server = tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            server.read_exact(&mut greeting).await.unwrap();
            server.write_all(&[5, 0xFF]).await.unwrap();
        });

        let err = handshake(&mut client, "example.com", 22).await.unwrap_err();
        assert!(err.to_string().contains("authentication"));
        server.await.unwrap();
    }

    proptest! {
        #[test]
        fn domain_requests_frame_correctly(host in "[a-z][a-z0-9.-]{0,62}", port in any::<u16>()) {
            let request = encode_connect_request(&host, port).unwrap();
            prop_assert_eq!(&request[..4], &[5, 1, 0, 3]);
            prop_assert_eq!(usize::from(request[4]), host.len());
            prop_assert_eq!(&request[5..5 + host.len()], host.as_bytes());
            prop_assert_eq!(&request[5 + host.len()..], &port.to_be_bytes());
        }
    }
}
