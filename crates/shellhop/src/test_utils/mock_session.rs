//! Scripted mock session components.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use shellhop_term::{TermError, TerminalSize};
use tokio::sync::mpsc;

use crate::config::ServerProfile;
use crate::error::{Error, Result};
use crate::session::{
    ChannelRequest, Connection, Connector, LocalTerminal, RawModeGuard, ShellChannel, ShellExit,
};

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `Connector::connect`.
    Connect,
    /// `Connection::open_session`.
    OpenSession,
    /// `LocalTerminal::enter_raw_mode`.
    EnterRaw,
    /// `ShellChannel::request_pty`.
    RequestPty {
        /// Terminal type requested.
        term: String,
        /// Size requested.
        size: TerminalSize,
    },
    /// `ShellChannel::start_shell`.
    StartShell,
    /// `ShellChannel::run` started.
    Run,
    /// A request delivered to the running channel.
    Request(ChannelRequest),
    /// The raw-mode guard restored the terminal.
    RestoreTerminal,
    /// `ShellChannel::close`.
    CloseChannel,
    /// `Connection::close`.
    CloseConnection,
}

/// Stage at which a mock should fail or stall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Connecting.
    Connect,
    /// Opening the session channel.
    OpenSession,
    /// Entering raw mode.
    RawMode,
    /// Requesting the PTY.
    Pty,
    /// Starting the shell.
    Shell,
}

/// Shared, ordered log of calls.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push(&self, event: Event) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Snapshot of all events so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug, Clone)]
struct Script {
    log: EventLog,
    fail_at: Option<Stage>,
    exit: ShellExit,
    stall_at: Option<Stage>,
    hang: bool,
    run_for: Option<Duration>,
    queue: Arc<Mutex<Option<mpsc::Receiver<ChannelRequest>>>>,
}

impl Script {
    fn fails_at(&self, stage: Stage) -> bool {
        self.fail_at == Some(stage)
    }

    async fn stall(&self, stage: Stage) {
        if self.stall_at == Some(stage) {
            std::future::pending::<()>().await;
        }
    }
}

/// Mock [`Connector`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    script: Script,
}

impl MockConnector {
    /// Create a connector whose sessions succeed and exit with status 0.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            script: Script {
                log,
                fail_at: None,
                exit: ShellExit::with_status(0),
                stall_at: None,
                hang: false,
                run_for: None,
                queue: Arc::new(Mutex::new(None)),
            },
        }
    }

    /// Fail at `stage`. [`Stage::RawMode`] is handled by [`MockTerminal`].
    #[must_use]
    pub const fn fail_at(mut self, stage: Stage) -> Self {
        self.script.fail_at = Some(stage);
        self
    }

    /// Never complete the call at `stage`. [`Stage::RawMode`] is
    /// synchronous and cannot stall.
    #[must_use]
    pub const fn stall_at(mut self, stage: Stage) -> Self {
        self.script.stall_at = Some(stage);
        self
    }

    /// The exit reported by the channel.
    #[must_use]
    pub fn exit(mut self, exit: ShellExit) -> Self {
        self.script.exit = exit;
        self
    }

    /// Never finish the channel's run.
    #[must_use]
    pub const fn hang(mut self) -> Self {
        self.script.hang = true;
        self
    }

    /// Keep the channel running for `duration`, recording requests.
    #[must_use]
    pub const fn run_for(mut self, duration: Duration) -> Self {
        self.script.run_for = Some(duration);
        self
    }

    /// Requests queued after the channel's run returned.
    ///
    /// The run keeps its request queue open instead of dropping it, so
    /// anything still sent afterwards lands here.
    #[must_use]
    pub fn unprocessed(&self) -> Vec<ChannelRequest> {
        let mut queue = self
            .script
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut left = Vec::new();
        if let Some(queue) = queue.as_mut() {
            while let Ok(req) = queue.try_recv() {
                left.push(req);
            }
        }
        left
    }
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, profile: &ServerProfile) -> Result<MockConnection> {
        self.script.log.push(Event::Connect);
        self.script.stall(Stage::Connect).await;
        if self.script.fails_at(Stage::Connect) {
            return Err(Error::NetworkDial {
                target: profile.address(),
                reason: "connection refused".into(),
            });
        }
        Ok(MockConnection {
            script: self.script.clone(),
        })
    }
}

/// Mock [`Connection`].
#[derive(Debug)]
pub struct MockConnection {
    script: Script,
}

impl Connection for MockConnection {
    type Channel = MockChannel;

    async fn open_session(&mut self) -> Result<MockChannel> {
        self.script.log.push(Event::OpenSession);
        self.script.stall(Stage::OpenSession).await;
        if self.script.fails_at(Stage::OpenSession) {
            return Err(Error::channel_open("administratively prohibited"));
        }
        Ok(MockChannel {
            script: self.script.clone(),
        })
    }

    async fn close(&mut self) -> io::Result<()> {
        self.script.log.push(Event::CloseConnection);
        Ok(())
    }
}

/// Mock [`ShellChannel`].
#[derive(Debug)]
pub struct MockChannel {
    script: Script,
}

impl ShellChannel for MockChannel {
    async fn request_pty(&mut self, term: &str, size: TerminalSize) -> Result<()> {
        self.script.log.push(Event::RequestPty {
            term: term.to_string(),
            size,
        });
        self.script.stall(Stage::Pty).await;
        if self.script.fails_at(Stage::Pty) {
            return Err(Error::pty_request("request denied"));
        }
        Ok(())
    }

    async fn start_shell(&mut self) -> Result<()> {
        self.script.log.push(Event::StartShell);
        self.script.stall(Stage::Shell).await;
        if self.script.fails_at(Stage::Shell) {
            return Err(Error::shell_start("request denied"));
        }
        Ok(())
    }

    async fn run(&mut self, mut requests: mpsc::Receiver<ChannelRequest>) -> ShellExit {
        let log = &self.script.log;
        log.push(Event::Run);

        if self.script.hang {
            while let Some(req) = requests.recv().await {
                log.push(Event::Request(req));
            }
            std::future::pending::<()>().await;
        }

        if let Some(duration) = self.script.run_for {
            let deadline = tokio::time::sleep(duration);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    () = &mut deadline => break,
                    req = requests.recv() => match req {
                        Some(req) => log.push(Event::Request(req)),
                        None => {
                            (&mut deadline).await;
                            break;
                        }
                    },
                }
            }
        }

        while let Ok(req) = requests.try_recv() {
            log.push(Event::Request(req));
        }
        *self
            .script
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(requests);
        self.script.exit.clone()
    }

    async fn close(&mut self) -> io::Result<()> {
        self.script.log.push(Event::CloseChannel);
        Ok(())
    }
}

/// Mock raw-mode guard.
#[derive(Debug)]
pub struct MockRawMode {
    log: EventLog,
    active: bool,
}

impl RawModeGuard for MockRawMode {
    fn restore(&mut self) -> shellhop_term::Result<()> {
        if self.active {
            self.active = false;
            self.log.push(Event::RestoreTerminal);
        }
        Ok(())
    }
}

/// Mock [`LocalTerminal`] with a settable size.
#[derive(Debug, Clone)]
pub struct MockTerminal {
    log: EventLog,
    size: Arc<Mutex<TerminalSize>>,
    fail_raw: bool,
    resizes: Arc<Mutex<Option<mpsc::Receiver<()>>>>,
}

impl MockTerminal {
    /// Create a terminal of the given size with no resize notifications.
    #[must_use]
    pub fn new(log: EventLog, size: TerminalSize) -> Self {
        Self {
            log,
            size: Arc::new(Mutex::new(size)),
            fail_raw: false,
            resizes: Arc::new(Mutex::new(None)),
        }
    }

    /// Deliver resize notifications from `events`.
    #[must_use]
    pub fn with_resizes(self, events: mpsc::Receiver<()>) -> Self {
        *self.resizes.lock().unwrap_or_else(PoisonError::into_inner) = Some(events);
        self
    }

    /// Fail to enter raw mode.
    #[must_use]
    pub const fn fail_raw_mode(mut self) -> Self {
        self.fail_raw = true;
        self
    }

    /// Change the reported size.
    pub fn set_size(&self, size: TerminalSize) {
        *self.size.lock().unwrap_or_else(PoisonError::into_inner) = size;
    }
}

impl LocalTerminal for MockTerminal {
    type RawMode = MockRawMode;
    type Resizes = mpsc::Receiver<()>;

    fn size(&self) -> shellhop_term::Result<TerminalSize> {
        Ok(*self.size.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn enter_raw_mode(&self) -> shellhop_term::Result<MockRawMode> {
        self.log.push(Event::EnterRaw);
        if self.fail_raw {
            return Err(TermError::NotATerminal);
        }
        Ok(MockRawMode {
            log: self.log.clone(),
            active: true,
        })
    }

    fn resize_events(&self) -> shellhop_term::Result<mpsc::Receiver<()>> {
        self.resizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| TermError::Signal(io::Error::other("no resize source configured")))
    }
}
