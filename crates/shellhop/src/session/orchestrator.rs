//! Session orchestration.
//!
//! [`Session::run`] walks the lifecycle
//! `Idle → Connected → SessionOpen → RawMode → PtyRequested → ShellRunning → Terminated`.
//! Each acquired resource is pushed onto a release stack; whatever happens,
//! the stack is unwound in reverse order: background loops stopped first,
//! then the local terminal restored, the channel closed, the connection
//! closed.

use std::future::Future;
use std::pin::Pin;

use shellhop_term::TerminalSize;
use tokio::sync::mpsc;

use super::background::BackgroundTasks;
use super::keepalive::{self, KeepaliveConfig};
use super::lifecycle::{
    Connection, Connector, EndReason, LocalTerminal, RawModeGuard, SessionState, ShellChannel,
    ShellExit,
};
use super::options::SessionOptions;
use super::resize;
use crate::config::{GlobalConfig, ServerProfile};
use crate::error::Result;

/// Depth of the queue feeding background requests to the channel owner.
const REQUEST_QUEUE_DEPTH: usize = 16;

/// Resources held by a session, released in reverse acquisition order.
struct Acquired<C: Connection, R: RawModeGuard> {
    state: SessionState,
    connection: Option<C>,
    channel: Option<C::Channel>,
    raw_mode: Option<R>,
}

impl<C: Connection, R: RawModeGuard> Acquired<C, R> {
    const fn new() -> Self {
        Self {
            state: SessionState::Idle,
            connection: None,
            channel: None,
            raw_mode: None,
        }
    }

    async fn release(mut self) {
        if let Some(mut raw_mode) = self.raw_mode.take() {
            if let Err(e) = raw_mode.restore() {
                tracing::warn!(error = %e, "Failed to restore terminal mode");
            }
        }
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                tracing::debug!(error = %e, "Failed to close session channel");
            }
        }
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                tracing::debug!(error = %e, "Failed to close connection");
            }
        }
        advance(&mut self.state, SessionState::Terminated);
    }
}

/// Await `step` unless `interrupt` resolves first.
///
/// Once this returns `None` the interrupt has completed and must not be
/// polled again.
async fn until_interrupted<T, F, I>(step: F, interrupt: Pin<&mut I>) -> Option<T>
where
    F: Future<Output = T>,
    I: Future<Output = ()>,
{
    tokio::select! {
        biased;
        () = interrupt => None,
        out = step => Some(out),
    }
}

fn advance(state: &mut SessionState, to: SessionState) {
    tracing::debug!(from = %state, to = %to, "Session state changed");
    *state = to;
}

/// An interactive shell session against one server.
#[derive(Debug)]
pub struct Session<C, T> {
    connector: C,
    terminal: T,
    options: SessionOptions,
}

impl<C, T> Session<C, T>
where
    C: Connector,
    T: LocalTerminal,
{
    /// Create a session.
    #[must_use]
    pub const fn new(connector: C, terminal: T, options: SessionOptions) -> Self {
        Self {
            connector,
            terminal,
            options,
        }
    }

    /// Run the session to completion. A session runs once.
    ///
    /// Returns once the remote shell finishes or `interrupt` resolves.
    /// `interrupt` is watched from the first step on, so an interrupted
    /// establishment unwinds like a finished session and reports
    /// [`EndReason::Interrupted`]. The local terminal is restored before this
    /// returns, on every path.
    ///
    /// # Errors
    ///
    /// Returns the first establishment failure: connect, channel open,
    /// raw mode, PTY request or shell start.
    pub async fn run<I>(
        self,
        profile: &ServerProfile,
        global: Option<&GlobalConfig>,
        interrupt: I,
    ) -> Result<ShellExit>
    where
        I: Future<Output = ()> + Send,
    {
        let mut acquired = Acquired::new();
        tokio::pin!(interrupt);
        let result = self
            .drive(profile, global, interrupt.as_mut(), &mut acquired)
            .await;
        if let Err(e) = &result {
            tracing::debug!(state = %acquired.state, error = %e, "Session failed, unwinding");
        }
        acquired.release().await;
        result
    }

    async fn drive<I>(
        &self,
        profile: &ServerProfile,
        global: Option<&GlobalConfig>,
        mut interrupt: Pin<&mut I>,
        acquired: &mut Acquired<C::Connection, T::RawMode>,
    ) -> Result<ShellExit>
    where
        I: Future<Output = ()> + Send,
    {
        let Some(connection) =
            until_interrupted(self.connector.connect(profile), interrupt.as_mut()).await
        else {
            return Ok(interrupted(acquired.state));
        };
        let connection = acquired.connection.insert(connection?);
        advance(&mut acquired.state, SessionState::Connected);

        let Some(channel) =
            until_interrupted(connection.open_session(), interrupt.as_mut()).await
        else {
            return Ok(interrupted(acquired.state));
        };
        let channel = acquired.channel.insert(channel?);
        advance(&mut acquired.state, SessionState::SessionOpen);

        acquired.raw_mode = Some(self.terminal.enter_raw_mode()?);
        advance(&mut acquired.state, SessionState::RawMode);

        let size = match self.terminal.size() {
            Ok(size) => size.or_default(),
            Err(e) => {
                tracing::debug!(error = %e, "Cannot read window size, using default");
                TerminalSize::default()
            }
        };
        let Some(pty) = until_interrupted(
            channel.request_pty(&self.options.term, size),
            interrupt.as_mut(),
        )
        .await
        else {
            return Ok(interrupted(acquired.state));
        };
        pty?;
        advance(&mut acquired.state, SessionState::PtyRequested);
        tracing::debug!(term = %self.options.term, size = %size, "Remote PTY allocated");

        let (requests, queue) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let mut tasks = BackgroundTasks::new();

        let keepalive_config = KeepaliveConfig::from_global(global);
        let keepalive_requests = requests.clone();
        tasks.spawn("keepalive", move |token| {
            keepalive::run(keepalive_config, keepalive_requests, token)
        });

        match self.terminal.resize_events() {
            Ok(events) => {
                let terminal = self.terminal.clone();
                let resize_requests = requests.clone();
                tasks.spawn("resize", move |token| {
                    resize::watch(events, move || terminal.size(), size, resize_requests, token)
                });
            }
            Err(e) => tracing::warn!(error = %e, "Window resizes will not be forwarded"),
        }
        drop(requests);

        match until_interrupted(channel.start_shell(), interrupt.as_mut()).await {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                tasks.shutdown().await;
                return Err(e);
            }
            None => {
                tasks.shutdown().await;
                return Ok(interrupted(acquired.state));
            }
        }
        advance(&mut acquired.state, SessionState::ShellRunning);
        tracing::info!(host = %profile.host, user = %profile.user, "Remote shell started");

        let exit = tokio::select! {
            exit = channel.run(queue) => exit,
            () = interrupt => {
                tracing::info!("Interrupted, closing session");
                ShellExit::new(EndReason::Interrupted)
            }
        };

        tasks.shutdown().await;
        tracing::info!(
            host = %profile.host,
            status = ?exit.status,
            signal = ?exit.signal,
            reason = ?exit.reason,
            "Session ended"
        );
        Ok(exit)
    }
}

fn interrupted(state: SessionState) -> ShellExit {
    tracing::info!(state = %state, "Interrupted before the shell started");
    ShellExit::new(EndReason::Interrupted)
}
