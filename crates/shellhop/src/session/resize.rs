//! Resize watcher.
//!
//! Forwards local window-size changes to the remote PTY. Notifications that
//! leave the size unchanged are dropped, and so are notifications whose size
//! cannot be read or reads as zero.

use shellhop_term::TerminalSize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::lifecycle::{ChannelRequest, ResizeSource};

/// Watch `events` until `token` is cancelled or the source closes.
///
/// `initial` is the size the PTY was requested with.
pub async fn watch<S, F>(
    mut events: S,
    read_size: F,
    initial: TerminalSize,
    requests: mpsc::Sender<ChannelRequest>,
    token: CancellationToken,
) where
    S: ResizeSource,
    F: Fn() -> shellhop_term::Result<TerminalSize> + Send,
{
    let mut last = initial;

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            event = events.recv() => {
                if event.is_none() {
                    tracing::debug!("Resize notifications closed");
                    break;
                }
            }
        }

        let size = match read_size() {
            Ok(size) => size,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring resize, cannot read window size");
                continue;
            }
        };
        if size.is_empty() {
            tracing::debug!(size = %size, "Ignoring resize to an empty window");
            continue;
        }
        if size == last {
            continue;
        }

        tracing::debug!(from = %last, to = %size, "Window resized");
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            sent = requests.send(ChannelRequest::WindowChange(size)) => {
                if sent.is_err() {
                    tracing::debug!("Window change not delivered, channel owner is gone");
                }
            }
        }
        last = size;
    }

    tracing::debug!("Resize watcher stopped");
}
