//! Keepalive loop.
//!
//! Sends a protocol-level keepalive ("keep-alive@openssh.com") once per
//! `server_alive_interval`, starting immediately. The request goes through
//! the channel owner's request queue; the reply is not awaited, so a failed
//! probe is only logged.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::lifecycle::ChannelRequest;
use crate::config::GlobalConfig;

/// Keepalive configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeepaliveConfig {
    /// Interval between keepalives; `None` disables the loop.
    pub interval: Option<Duration>,
}

impl KeepaliveConfig {
    /// Create a config with the given interval.
    #[must_use]
    pub const fn new(interval: Option<Duration>) -> Self {
        Self { interval }
    }

    /// Derive the config from the global settings. Absent settings disable
    /// keepalives.
    #[must_use]
    pub fn from_global(global: Option<&GlobalConfig>) -> Self {
        Self::new(global.and_then(GlobalConfig::keepalive_interval))
    }

    /// Check if keepalives are enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }
}

/// Run the keepalive loop until `token` is cancelled.
///
/// No keepalive is sent once cancellation has been observed.
pub async fn run(
    config: KeepaliveConfig,
    requests: mpsc::Sender<ChannelRequest>,
    token: CancellationToken,
) {
    let Some(interval) = config.interval else {
        tracing::debug!("Keepalive disabled");
        return;
    };

    tracing::debug!(interval_secs = interval.as_secs(), "Keepalive loop started");

    loop {
        if token.is_cancelled() {
            break;
        }

        tokio::select! {
            biased;
            () = token.cancelled() => break,
            sent = requests.send(ChannelRequest::Keepalive) => {
                if sent.is_err() {
                    tracing::debug!("Keepalive not delivered, channel owner is gone");
                }
            }
        }

        tokio::select! {
            biased;
            () = token.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    tracing::debug!("Keepalive loop stopped");
}
