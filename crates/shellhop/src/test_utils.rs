//! Test utilities for shellhop.
//!
//! Scripted stand-ins for the connector, connection, channel and local
//! terminal. Every call they receive is appended to a shared [`EventLog`],
//! so tests can assert exactly which resources were acquired and in which
//! order they were released.

mod mock_session;

pub use mock_session::{
    Event, EventLog, MockChannel, MockConnection, MockConnector, MockRawMode, MockTerminal, Stage,
};
