//! Unix terminal support.
//!
//! - raw-mode switching via `tcgetattr`/`tcsetattr`
//! - window size via `TIOCGWINSZ`
//! - SIGWINCH and termination signal streams via `signal-hook-tokio`

mod raw;
mod signals;
mod winsize;

pub use raw::RawMode;
pub use signals::{Interrupt, InterruptSignals, ResizeSignals};
pub use winsize::{is_terminal, stdin_size, window_size};
