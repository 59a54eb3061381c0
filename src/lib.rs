//! Baton - Context-Window Relay Supervisor for Claude Code
//!
//! Baton chains bounded-context agent sessions so a task larger than one
//! context window can finish: each session inherits a compact handoff
//! summary from its predecessor instead of the full conversation history.
//!
//! # Architecture
//!
//! The relay is organized into a few layers:
//! - **Types**: sessions, outcomes, statistics, reports
//! - **Protocol**: the handoff schema and the prompts that carry state forward
//! - **Detection**: classifying a running session's terminal state
//! - **Transports**: interactive (tmux pane) and streaming (subprocess events)
//! - **Relay**: the supervisor state machine driving it all
//!
//! # Example
//!
//! ```ignore
//! use baton_core::{PipeTransport, RelayConfig, RelaySupervisor};
//!
//! #[tokio::main]
//! async fn main() -> baton_core::Result<()> {
//!     let config = RelayConfig {
//!         task: "Build a REST API with tests".to_string(),
//!         max_sessions: 5,
//!         ..Default::default()
//!     };
//!
//!     let transport = Box::new(PipeTransport::new(&config));
//!     let report = RelaySupervisor::new(config, transport).run().await?;
//!     println!("stopped: {:?}", report.stop);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod detect;
pub mod error;
pub mod gitctx;
pub mod install;
pub mod protocol;
pub mod relay;
pub mod shutdown;
pub mod transport;
pub mod types;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use config::{find_claude, RelayConfig};
pub use error::{BatonError, Result};
pub use relay::{RelaySupervisor, BREVITY_THRESHOLD};
pub use transport::{PipeTransport, SessionTransport, TtyTransport};
pub use types::{
    HandoffSource, RelayReport, RelayStats, SessionOutcome, SessionReport, SessionSpec,
    SessionStats, StopReason, TransportKind,
};
