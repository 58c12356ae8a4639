//! shellhop-term: local terminal control for interactive remote sessions
//!
//! This crate holds the pieces of an interactive SSH client that touch the
//! *local* terminal:
//!
//! - [`RawMode`] snapshots the terminal attributes, switches to raw mode and
//!   restores the snapshot on request or on drop
//! - [`window_size`] and [`stdin_size`] read the current dimensions
//! - [`ResizeSignals`] delivers SIGWINCH notifications as an async stream
//! - [`InterruptSignals`] turns SIGTERM, SIGHUP and SIGINT into values so
//!   callers can unwind cleanly
//!
//! # Example
//!
//! ```ignore
//! use shellhop_term::{RawMode, ResizeSignals, stdin_size};
//!
//! let mut raw = RawMode::stdin()?;
//! let mut resizes = ResizeSignals::new()?;
//! while resizes.recv().await.is_some() {
//!     println!("now {}", stdin_size()?);
//! }
//! raw.restore()?;
//! ```
//!
//! Only Unix platforms are supported.

pub mod error;
pub mod size;

#[cfg(unix)]
pub mod unix;

pub use error::{Result, TermError};
pub use size::TerminalSize;

#[cfg(unix)]
pub use unix::{
    Interrupt, InterruptSignals, RawMode, ResizeSignals, is_terminal, stdin_size, window_size,
};
