//! Graceful session termination
//!
//! Drives an interactive agent session to a clean exit, escalating once with
//! a hard interrupt if the clean path does not converge. A session that still
//! will not exit is logged and left behind — the supervisor proceeds anyway,
//! since the next session gets a fresh terminal context.
//!
//! The exit command and its confirming Enter must be separate sends: typing
//! `/exit` opens an autocomplete suggestion in the agent UI, and an Enter
//! arriving before the suggestion renders fails to exit.

use crate::detect::{is_idle_prompt, ScreenSource};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Key and text injection on top of screen capture.
#[async_trait]
pub trait SurfaceControl: ScreenSource {
    /// Send named keys (Enter, Escape, C-c, ...).
    async fn send_keys(&self, keys: &[&str]);
    /// Send text literally, bypassing key name lookup.
    async fn send_literal(&self, text: &str);
}

/// Terminal outcome of a shutdown attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Idle shell prompt reached — the agent exited
    Exited,
    /// Both attempts exhausted; the agent may still be running
    StillRunning,
}

/// Escalation phase of the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Graceful,
    Escalated,
}

/// Pacing for the exit sequence
#[derive(Debug, Clone, Copy)]
pub struct ShutdownTiming {
    /// Delay after Escape before typing the exit command
    pub escape_settle: Duration,
    /// Delay for the autocomplete suggestion to render before Enter
    pub autocomplete_settle: Duration,
    /// Delay after the hard interrupt before retrying
    pub interrupt_settle: Duration,
    /// Idle-prompt poll interval
    pub poll_interval: Duration,
    /// Idle-prompt wait after the graceful attempt
    pub graceful_timeout: Duration,
    /// Shorter idle-prompt wait after escalation
    pub escalated_timeout: Duration,
    /// Rendered lines inspected for the idle prompt
    pub tail_lines: usize,
}

impl Default for ShutdownTiming {
    fn default() -> Self {
        Self {
            escape_settle: Duration::from_millis(500),
            autocomplete_settle: Duration::from_secs(2),
            interrupt_settle: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            graceful_timeout: Duration::from_secs(30),
            escalated_timeout: Duration::from_secs(15),
            tail_lines: 3,
        }
    }
}

/// Drives one session to exit, with a single escalation step
pub struct TerminationSequencer<'a, S: SurfaceControl> {
    surface: &'a S,
    timing: ShutdownTiming,
}

impl<'a, S: SurfaceControl> TerminationSequencer<'a, S> {
    pub fn new(surface: &'a S, timing: ShutdownTiming) -> Self {
        Self { surface, timing }
    }

    /// Run the shutdown state machine to completion.
    pub async fn run(&self) -> ShutdownOutcome {
        for phase in [Phase::Graceful, Phase::Escalated] {
            if phase == Phase::Escalated {
                warn!("Graceful exit did not converge, escalating with interrupt");
                self.surface.send_keys(&["C-c"]).await;
                sleep(self.timing.interrupt_settle).await;
            }

            self.exit_sequence().await;

            let timeout = match phase {
                Phase::Graceful => self.timing.graceful_timeout,
                Phase::Escalated => self.timing.escalated_timeout,
            };
            if self.poll_idle(timeout).await {
                info!("Session exited ({:?} phase)", phase);
                return ShutdownOutcome::Exited;
            }
        }

        warn!("Session did not exit after escalation; proceeding anyway");
        ShutdownOutcome::StillRunning
    }

    /// Escape to command mode, type the exit command, then confirm.
    async fn exit_sequence(&self) {
        self.surface.send_keys(&["Escape"]).await;
        sleep(self.timing.escape_settle).await;
        self.surface.send_literal("/exit").await;
        // Let the autocomplete suggestion render before confirming.
        sleep(self.timing.autocomplete_settle).await;
        self.surface.send_keys(&["Enter"]).await;
    }

    async fn poll_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let idle = match self.surface.capture_tail(self.timing.tail_lines).await {
                Some(tail) => is_idle_prompt(&tail),
                None => false,
            };
            if idle {
                return true;
            }
            if Instant::now() >= deadline {
                debug!("Idle prompt not reached within {:?}", timeout);
                return false;
            }
            sleep(self.timing.poll_interval).await;
        }
    }
}
