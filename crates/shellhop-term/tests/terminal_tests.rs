//! Integration tests for raw mode, window size and signal streams.
//!
//! Raw-mode and size tests run against a freshly allocated pseudo-terminal
//! so they do not depend on how the test runner's stdio is attached.

#![cfg(unix)]

use std::fs::File;
use std::os::fd::OwnedFd;
use std::time::Duration;

use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{LocalModes, Winsize, tcgetattr, tcsetwinsize};
use shellhop_term::{RawMode, ResizeSignals, TermError, TerminalSize, is_terminal, window_size};

fn open_pty_pair() -> (OwnedFd, File) {
    let master = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY).expect("openpt");
    grantpt(&master).expect("grantpt");
    unlockpt(&master).expect("unlockpt");
    let name = ptsname(&master, Vec::new()).expect("ptsname");
    let path = name.to_str().expect("pts path is UTF-8").to_string();
    let slave = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .expect("open slave");
    (master, slave)
}

#[test]
fn raw_mode_rejects_non_terminal() {
    let null = File::open("/dev/null").expect("open /dev/null");
    assert!(!is_terminal(&null));

    let err = RawMode::enable(&null).unwrap_err();
    assert!(matches!(err, TermError::NotATerminal));
}

#[test]
fn raw_mode_switches_and_restores() {
    let (_master, slave) = open_pty_pair();
    assert!(is_terminal(&slave));

    let before = tcgetattr(&slave).expect("tcgetattr");
    assert!(before.local_modes.contains(LocalModes::ICANON));

    let mut raw = RawMode::enable(&slave).expect("enable raw mode");
    assert!(raw.is_active());
    let during = tcgetattr(&slave).expect("tcgetattr");
    assert!(!during.local_modes.contains(LocalModes::ICANON));
    assert!(!during.local_modes.contains(LocalModes::ECHO));

    raw.restore().expect("restore");
    assert!(!raw.is_active());
    let after = tcgetattr(&slave).expect("tcgetattr");
    assert_eq!(after.local_modes, before.local_modes);

    // Second restore is a no-op.
    raw.restore().expect("restore again");
}

#[test]
fn raw_mode_restores_on_drop() {
    let (_master, slave) = open_pty_pair();
    let before = tcgetattr(&slave).expect("tcgetattr");

    {
        let _raw = RawMode::enable(&slave).expect("enable raw mode");
        let during = tcgetattr(&slave).expect("tcgetattr");
        assert_ne!(during.local_modes, before.local_modes);
    }

    let after = tcgetattr(&slave).expect("tcgetattr");
    assert_eq!(after.local_modes, before.local_modes);
}

#[test]
fn window_size_reads_pty_dimensions() {
    let (master, slave) = open_pty_pair();
    tcsetwinsize(
        &master,
        Winsize {
            ws_row: 43,
            ws_col: 132,
            ws_xpixel: 0,
            ws_ypixel: 0,
        },
    )
    .expect("tcsetwinsize");

    assert_eq!(window_size(&slave).expect("size"), TerminalSize::new(132, 43));
}

#[test]
fn window_size_fails_on_non_terminal() {
    let null = File::open("/dev/null").expect("open /dev/null");
    assert!(matches!(window_size(&null), Err(TermError::WindowSize(_))));
}

#[tokio::test]
async fn resize_signal_is_delivered() {
    let mut resizes = ResizeSignals::new().expect("subscribe to SIGWINCH");
    signal_hook::low_level::raise(signal_hook::consts::SIGWINCH).expect("raise");

    let got = tokio::time::timeout(Duration::from_secs(5), resizes.recv())
        .await
        .expect("notification within timeout");
    assert_eq!(got, Some(()));
}
