//! Relay state machine
//!
//! One relay is a sequence of bounded-context agent sessions chained by
//! handoff artifacts. The supervisor here is transport-agnostic: it drives
//! whichever [`crate::transport::SessionTransport`] it is given.

pub mod supervisor;

pub use supervisor::{RelaySupervisor, BREVITY_THRESHOLD};
