//! Interactive session channel.
//!
//! [`SshShellChannel`] is the single owner of the russh channel once the
//! shell is running. Its pump copies stdin to the channel, channel data to
//! stdout and stderr, and applies window-change and keepalive requests from
//! the background loops.

use std::io;
use std::sync::Arc;

use russh::client;
use russh::{ChannelMsg, Pty};
use shellhop_term::TerminalSize;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::transport::ClientHandler;
use crate::error::{Error, Result};
use crate::session::{ChannelRequest, EndReason, ShellChannel, ShellExit};

/// Terminal modes sent with the PTY request.
const PTY_MODES: [(Pty, u32); 3] = [
    (Pty::ECHO, 1),
    (Pty::TTY_OP_ISPEED, 14400),
    (Pty::TTY_OP_OSPEED, 14400),
];

/// Size of the stdin read buffer.
const STDIN_BUFFER_SIZE: usize = 4096;

/// Extended data type code for stderr.
const EXTENDED_DATA_STDERR: u32 = 1;

/// A session channel on an SSH connection.
pub struct SshShellChannel {
    channel: russh::Channel<client::Msg>,
    handle: Arc<client::Handle<ClientHandler>>,
}

impl std::fmt::Debug for SshShellChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshShellChannel")
            .field("id", &self.channel.id())
            .finish_non_exhaustive()
    }
}

impl SshShellChannel {
    pub(crate) const fn new(
        channel: russh::Channel<client::Msg>,
        handle: Arc<client::Handle<ClientHandler>>,
    ) -> Self {
        Self { channel, handle }
    }

    /// Wait for the server's reply to a request sent with `want_reply`.
    async fn await_reply(&mut self) -> std::result::Result<(), String> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => return Err("request rejected by server".into()),
                Some(ChannelMsg::Close) | None => return Err("channel closed".into()),
                Some(other) => tracing::trace!(msg = ?other, "Ignoring message while awaiting reply"),
            }
        }
    }

    async fn apply(&self, request: ChannelRequest) {
        match request {
            ChannelRequest::WindowChange(size) => {
                if let Err(e) = self
                    .channel
                    .window_change(u32::from(size.cols), u32::from(size.rows), 0, 0)
                    .await
                {
                    tracing::debug!(error = %e, size = %size, "Window change failed");
                }
            }
            ChannelRequest::Keepalive => {
                if let Err(e) = self.handle.send_keepalive(true).await {
                    tracing::debug!(error = %e, "Keepalive failed");
                }
            }
        }
    }
}

async fn write_flush<W: AsyncWrite + Unpin>(out: &mut W, data: &[u8]) -> io::Result<()> {
    out.write_all(data).await?;
    out.flush().await
}

impl ShellChannel for SshShellChannel {
    async fn request_pty(&mut self, term: &str, size: TerminalSize) -> Result<()> {
        self.channel
            .request_pty(
                true,
                term,
                u32::from(size.cols),
                u32::from(size.rows),
                0,
                0,
                &PTY_MODES,
            )
            .await
            .map_err(|e| Error::pty_request(e.to_string()))?;
        self.await_reply().await.map_err(Error::pty_request)
    }

    async fn start_shell(&mut self) -> Result<()> {
        self.channel
            .request_shell(true)
            .await
            .map_err(|e| Error::shell_start(e.to_string()))?;
        self.await_reply().await.map_err(Error::shell_start)
    }

    async fn run(&mut self, mut requests: mpsc::Receiver<ChannelRequest>) -> ShellExit {
        let mut stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut stderr = tokio::io::stderr();
        let mut buf = vec![0u8; STDIN_BUFFER_SIZE];
        let mut stdin_open = true;
        let mut requests_open = true;
        let mut status = None;
        let mut signal = None;

        let reason = loop {
            tokio::select! {
                msg = self.channel.wait() => match msg {
                    Some(ChannelMsg::Data { data }) => {
                        if let Err(e) = write_flush(&mut stdout, &data).await {
                            tracing::warn!(error = %e, "Failed to write to stdout");
                            break EndReason::LocalIo;
                        }
                    }
                    Some(ChannelMsg::ExtendedData { data, ext }) => {
                        let written = if ext == EXTENDED_DATA_STDERR {
                            write_flush(&mut stderr, &data).await
                        } else {
                            write_flush(&mut stdout, &data).await
                        };
                        if let Err(e) = written {
                            tracing::warn!(error = %e, "Failed to write remote output");
                            break EndReason::LocalIo;
                        }
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        tracing::debug!(exit_status, "Remote process exited");
                        status = Some(exit_status);
                    }
                    Some(ChannelMsg::ExitSignal { signal_name, core_dumped, .. }) => {
                        tracing::debug!(signal = ?signal_name, core_dumped, "Remote process killed");
                        signal = Some(format!("{signal_name:?}"));
                    }
                    Some(ChannelMsg::Eof) => tracing::debug!("Remote sent EOF"),
                    Some(ChannelMsg::Close) | None => {
                        break if status.is_some() || signal.is_some() {
                            EndReason::RemoteExit
                        } else {
                            EndReason::ChannelClosed
                        };
                    }
                    Some(_) => {}
                },
                read = stdin.read(&mut buf), if stdin_open => match read {
                    Ok(0) => {
                        stdin_open = false;
                        if let Err(e) = self.channel.eof().await {
                            tracing::debug!(error = %e, "Failed to send EOF");
                        }
                    }
                    Ok(n) => {
                        if let Err(e) = self.channel.data(&buf[..n]).await {
                            tracing::debug!(error = %e, "Failed to send input");
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Stopped reading stdin");
                        stdin_open = false;
                    }
                },
                req = requests.recv(), if requests_open => match req {
                    Some(req) => self.apply(req).await,
                    None => requests_open = false,
                },
            }
        };

        ShellExit {
            status,
            signal,
            reason,
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        self.channel.close().await.map_err(io::Error::other)
    }
}
