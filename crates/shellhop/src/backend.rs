//! Backend module for remote transports.
//!
//! The only backend is SSH. The session orchestrator is generic over the
//! [`Connector`](crate::session::Connector) trait, so tests drive it with
//! scripted collaborators instead.

pub mod ssh;
