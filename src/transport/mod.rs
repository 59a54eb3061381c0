//! Session transports
//!
//! A transport is the mechanism by which one agent session is started,
//! observed, and torn down. Two implementations share the supervisor and the
//! prompt builder: an interactive tmux transport polling rendered screen
//! content, and a streaming transport parsing structured subprocess events.

pub mod pipe;
pub mod tmux;
pub mod tty;

use crate::error::Result;
use crate::shutdown::ShutdownOutcome;
use crate::types::{SessionReport, SessionSpec, TransportKind};
use async_trait::async_trait;

pub use pipe::PipeTransport;
pub use tty::TtyTransport;

/// One polymorphic session capability: start, await outcome, terminate.
///
/// The supervisor owns exactly one transport per relay and runs sessions
/// strictly one at a time; implementations may assume the previous session
/// was terminated before `start_session` is called again.
#[async_trait]
pub trait SessionTransport: Send {
    fn kind(&self) -> TransportKind;

    /// Launch the agent for this session. Failure here is fatal to the relay.
    async fn start_session(&mut self, spec: &SessionSpec) -> Result<()>;

    /// Block until the session reaches a terminal state.
    async fn await_outcome(&mut self, spec: &SessionSpec) -> Result<SessionReport>;

    /// Stop the session's process if it may still be running.
    ///
    /// Best-effort: a session that will not exit is reported, not fatal.
    async fn terminate_session(&mut self, spec: &SessionSpec) -> ShutdownOutcome;
}
