//! Relay supervisor
//!
//! Top-level state machine: start a session, wait for its signal, decide
//! whether to continue, loop. Sessions run strictly one at a time; the
//! supervisor owns the transport and the monotonically accumulated relay
//! statistics, so no locking is involved anywhere in the relay.

use crate::config::RelayConfig;
use crate::error::Result;
use crate::protocol;
use crate::shutdown::ShutdownOutcome;
use crate::transport::SessionTransport;
use crate::types::{
    HandoffSource, RelayReport, RelayStats, SessionOutcome, SessionSpec, StopReason,
    TransportKind,
};
use crate::ui;
use crate::utils::{first_lines, random_hex};
use tracing::{debug, info, warn};

/// A final result below this length that used no tools is read as the agent
/// saying "done" rather than handing off (streaming mode).
pub const BREVITY_THRESHOLD: usize = 200;

/// What the supervisor decided after one session's outcome
enum Decision {
    /// Start the next session with this predecessor handoff
    Continue(HandoffSource),
    /// The relay is over
    Stop(StopReason),
}

/// Drives one relay across sessions until a stop condition
pub struct RelaySupervisor {
    config: RelayConfig,
    transport: Box<dyn SessionTransport>,
    stats: RelayStats,
    outcomes: Vec<SessionOutcome>,
}

impl RelaySupervisor {
    pub fn new(config: RelayConfig, transport: Box<dyn SessionTransport>) -> Self {
        Self {
            config,
            transport,
            stats: RelayStats::default(),
            outcomes: Vec::new(),
        }
    }

    /// Run the relay to its Stopped state.
    ///
    /// Statistics and the outcome sequence are surfaced in the report even
    /// when the relay stops on a failure.
    pub async fn run(mut self) -> Result<RelayReport> {
        self.config.validate()?;

        let mut predecessor: Option<HandoffSource> = None;
        let mut index: u32 = 1;

        let stop = loop {
            ui::session_header(index, self.config.max_sessions);

            let spec = self.build_spec(index, predecessor.as_ref());

            if let Err(e) = self.transport.start_session(&spec).await {
                ui::err(&format!("Session {}: {}", index, e));
                break StopReason::TransportFailed(e.to_string());
            }
            self.stats.sessions += 1;

            let report = match self.transport.await_outcome(&spec).await {
                Ok(report) => report,
                Err(e) => {
                    ui::err(&format!("Session {}: {}", index, e));
                    break StopReason::TransportFailed(e.to_string());
                }
            };
            self.stats.absorb(&report.stats);

            if self.transport.kind() == TransportKind::Streaming {
                ui::ok(&format!(
                    "Session {} done — tools: {}  cost: ${:.4}  tokens: {}/{}",
                    index,
                    report.stats.tool_invocations,
                    report.stats.cost_usd,
                    report.stats.input_tokens,
                    report.stats.output_tokens
                ));
            }

            let decision = match report.outcome {
                SessionOutcome::HandoffProduced(source) => {
                    self.on_handoff(source, &spec, report.stats.tool_invocations)
                        .await
                }
                SessionOutcome::EndedWithoutHandoff => self.on_ended(&spec).await,
                SessionOutcome::TimedOut => self.on_timeout(&spec).await,
            };

            match decision {
                Decision::Stop(reason) => break reason,
                Decision::Continue(source) => {
                    if self.config.max_sessions > 0 && index >= self.config.max_sessions {
                        ui::status(&format!(
                            "Reached max sessions ({})",
                            self.config.max_sessions
                        ));
                        break StopReason::MaxSessions;
                    }
                    predecessor = Some(source);
                    index += 1;
                    tokio::time::sleep(self.config.cooldown).await;
                }
            }
        };

        info!("Relay stopped: {:?}", stop);
        Ok(RelayReport {
            stop,
            stats: self.stats,
            outcomes: self.outcomes,
        })
    }

    /// Assemble the spec for session `index`, registering a fresh unguessable
    /// handoff path for interactive sessions before launch.
    fn build_spec(&self, index: u32, predecessor: Option<&HandoffSource>) -> SessionSpec {
        let prompt = match predecessor {
            // Session 1 gets the task verbatim; it has no predecessor state.
            None => self.config.task.clone(),
            Some(source) => protocol::build_continuation_prompt(
                index,
                &self.config.task,
                &source.as_prompt_input(),
            ),
        };

        let mut spec =
            SessionSpec::new(index, prompt).with_timeout(self.config.session_timeout());

        if self.transport.kind() == TransportKind::Interactive {
            let path = self
                .config
                .handoff_dir
                .join(format!("baton-handoff-{}.md", random_hex(3)));
            ui::status(&format!("Handoff path: {}", path.display()));
            spec = spec.with_handoff_path(path);
        }
        spec
    }

    /// A handoff was confirmed: close the session (interactive), record the
    /// predecessor, and continue — unless the streaming completion policy
    /// reads the result as "done".
    async fn on_handoff(
        &mut self,
        source: HandoffSource,
        spec: &SessionSpec,
        tool_invocations: u64,
    ) -> Decision {
        self.outcomes
            .push(SessionOutcome::HandoffProduced(source.clone()));

        if let HandoffSource::Text(text) = &source {
            if tool_invocations == 0 && text.len() < BREVITY_THRESHOLD {
                ui::complete("Task appears complete (session used no tools and output was brief)");
                return Decision::Stop(StopReason::TaskComplete);
            }
        }

        match &source {
            HandoffSource::File(path) => {
                ui::ok(&format!(
                    "Session {}: handoff file detected at {}",
                    spec.index,
                    path.display()
                ));
                self.preview_handoff(path);

                ui::status("Gracefully exiting claude...");
                match self.transport.terminate_session(spec).await {
                    ShutdownOutcome::Exited => ui::ok("Claude exited"),
                    ShutdownOutcome::StillRunning => {
                        // Non-fatal: the next session gets a fresh context.
                        warn!("Session {} still running after shutdown", spec.index);
                    }
                }
            }
            HandoffSource::Text(_) => {
                debug!("Session {}: handoff captured from final result", spec.index);
            }
        }

        Decision::Continue(source)
    }

    /// The session ended without a handoff signal.
    async fn on_ended(&mut self, spec: &SessionSpec) -> Decision {
        // Race recovery (best effort): the agent may have written the file in
        // the same poll window the idle prompt fired.
        if spec.handoff_file_exists() {
            let path = spec
                .handoff_path
                .clone()
                .unwrap_or_default();
            ui::ok(&format!("Session {}: claude exited with handoff", spec.index));
            let source = HandoffSource::File(path);
            self.outcomes
                .push(SessionOutcome::HandoffProduced(source.clone()));
            return Decision::Continue(source);
        }

        self.outcomes.push(SessionOutcome::EndedWithoutHandoff);

        match self.transport.kind() {
            TransportKind::Interactive => {
                ui::complete(&format!(
                    "Session {}: claude exited without handoff — task likely complete",
                    spec.index
                ));
                Decision::Stop(StopReason::TaskComplete)
            }
            // Stream closed with nothing usable.
            TransportKind::Streaming => {
                ui::err("Session returned empty result, stopping");
                Decision::Stop(StopReason::EmptyResult)
            }
        }
    }

    /// The deadline elapsed: stop the session, then re-check for a handoff
    /// written just before the deadline.
    async fn on_timeout(&mut self, spec: &SessionSpec) -> Decision {
        ui::err(&format!(
            "Session {} timed out ({}s)",
            spec.index, self.config.session_timeout_secs
        ));

        ui::status("Force-exiting claude...");
        if self.transport.terminate_session(spec).await == ShutdownOutcome::StillRunning {
            warn!("Session {} still running after timeout shutdown", spec.index);
        }

        if spec.handoff_file_exists() {
            let path = spec.handoff_path.clone().unwrap_or_default();
            ui::ok(&format!(
                "Session {}: handoff file found after timeout at {}",
                spec.index,
                path.display()
            ));
            let source = HandoffSource::File(path);
            self.outcomes
                .push(SessionOutcome::HandoffProduced(source.clone()));
            return Decision::Continue(source);
        }

        self.outcomes.push(SessionOutcome::TimedOut);
        Decision::Stop(StopReason::TimedOut)
    }

    fn preview_handoff(&self, path: &std::path::Path) {
        if let Ok(contents) = std::fs::read_to_string(path) {
            ui::status("Handoff content preview:");
            for line in first_lines(&contents, 5) {
                println!("  {}", line);
            }
        }
    }
}
