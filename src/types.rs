//! Core data types for the relay
//!
//! Sessions, outcomes, statistics, and reports shared between the supervisor
//! and the transports. These types carry no behavior beyond small helpers;
//! the state machine lives in [`crate::relay`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which transport a session runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    /// tmux pane polled for file and idle-prompt signals
    Interactive,
    /// Subprocess emitting line-delimited JSON events
    Streaming,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Interactive => "interactive",
            TransportKind::Streaming => "streaming",
        }
    }
}

/// Where a handoff artifact lives
///
/// Interactive sessions materialize the handoff as a file at a path the
/// supervisor registered before the session started; streaming sessions hold
/// the final result text in memory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffSource {
    /// Handoff file written by the agent via its file-writing tool
    File(PathBuf),
    /// Handoff captured from the session's final message
    Text(String),
}

impl HandoffSource {
    /// Render the source into a form the prompt builder accepts.
    ///
    /// A file source passes its path; the builder resolves it to contents.
    pub fn as_prompt_input(&self) -> String {
        match self {
            HandoffSource::File(path) => path.to_string_lossy().to_string(),
            HandoffSource::Text(text) => text.clone(),
        }
    }
}

/// Terminal state of one session, as classified by the signal detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The agent produced a handoff artifact
    HandoffProduced(HandoffSource),
    /// The session ended without any handoff signal
    EndedWithoutHandoff,
    /// The per-session deadline elapsed with no signal
    TimedOut,
}

impl SessionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SessionOutcome::HandoffProduced(_) => "handoff",
            SessionOutcome::EndedWithoutHandoff => "ended",
            SessionOutcome::TimedOut => "timeout",
        }
    }
}

/// Per-session usage reported by the streaming transport
///
/// Interactive sessions report zeros; the tmux pane exposes no usage data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Tool invocations observed in the event stream
    pub tool_invocations: u64,
    /// Cost in USD as reported by the agent
    pub cost_usd: f64,
    /// Input tokens consumed
    pub input_tokens: u64,
    /// Output tokens produced
    pub output_tokens: u64,
}

/// Outcome plus usage for one completed session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub stats: SessionStats,
}

impl SessionReport {
    pub fn new(outcome: SessionOutcome) -> Self {
        Self {
            outcome,
            stats: SessionStats::default(),
        }
    }
}

/// Monotonically accumulated counters across all sessions of one relay
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RelayStats {
    /// Sessions started
    pub sessions: u64,
    /// Total tool invocations
    pub tool_invocations: u64,
    /// Total cost in USD
    pub cost_usd: f64,
    /// Total input tokens
    pub input_tokens: u64,
    /// Total output tokens
    pub output_tokens: u64,
}

impl RelayStats {
    /// Fold one session's usage into the running totals. Never resets.
    pub fn absorb(&mut self, stats: &SessionStats) {
        self.tool_invocations += stats.tool_invocations;
        self.cost_usd += stats.cost_usd;
        self.input_tokens += stats.input_tokens;
        self.output_tokens += stats.output_tokens;
    }
}

/// Everything a transport needs to launch and observe one session
///
/// Built fresh by the supervisor for each session; the handoff path is chosen
/// before launch and is unguessable and per-session unique.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    /// 1-based session ordinal within the relay
    pub index: u32,
    /// Full prompt text for this session
    pub prompt: String,
    /// Registered handoff file path (interactive sessions only)
    pub handoff_path: Option<PathBuf>,
    /// Signal-detection deadline; `None` means unbounded
    pub timeout: Option<Duration>,
    /// When the session was started
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl SessionSpec {
    pub fn new(index: u32, prompt: String) -> Self {
        Self {
            index,
            prompt,
            handoff_path: None,
            timeout: None,
            started_at: chrono::Utc::now(),
        }
    }

    pub fn with_handoff_path(mut self, path: PathBuf) -> Self {
        self.handoff_path = Some(path);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Race-recovery check: did a handoff file appear at the registered path?
    pub fn handoff_file_exists(&self) -> bool {
        self.handoff_path
            .as_deref()
            .map(Path::exists)
            .unwrap_or(false)
    }
}

/// Why the relay stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The agent finished without requesting continuation
    TaskComplete,
    /// Configured max-sessions bound reached
    MaxSessions,
    /// Streaming session produced nothing usable
    EmptyResult,
    /// Session deadline elapsed and no handoff was recovered
    TimedOut,
    /// The transport could not start a session
    TransportFailed(String),
}

impl StopReason {
    /// Whether this stop counts as a successful relay
    pub fn is_success(&self) -> bool {
        matches!(self, StopReason::TaskComplete | StopReason::MaxSessions)
    }
}

/// Final report surfaced when the relay reaches its Stopped state
///
/// Statistics are surfaced even on failure stops — a partial result, not a
/// silent failure.
#[derive(Debug, Clone)]
pub struct RelayReport {
    pub stop: StopReason,
    pub stats: RelayStats,
    /// Outcome of every session, in order
    pub outcomes: Vec<SessionOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_absorb_accumulates() {
        let mut totals = RelayStats::default();
        let one = SessionStats {
            tool_invocations: 4,
            cost_usd: 0.25,
            input_tokens: 1000,
            output_tokens: 500,
        };
        totals.absorb(&one);
        totals.absorb(&one);

        assert_eq!(totals.tool_invocations, 8);
        assert_eq!(totals.input_tokens, 2000);
        assert_eq!(totals.output_tokens, 1000);
        assert!((totals.cost_usd - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_handoff_file_exists_without_path() {
        let spec = SessionSpec::new(1, "task".to_string());
        assert!(!spec.handoff_file_exists());
    }

    #[test]
    fn test_handoff_file_exists_with_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.md");
        std::fs::write(&path, "## Q0: state").unwrap();

        let spec = SessionSpec::new(2, "task".to_string()).with_handoff_path(path);
        assert!(spec.handoff_file_exists());
    }

    #[test]
    fn test_stop_reason_success() {
        assert!(StopReason::TaskComplete.is_success());
        assert!(StopReason::MaxSessions.is_success());
        assert!(!StopReason::EmptyResult.is_success());
        assert!(!StopReason::TimedOut.is_success());
        assert!(!StopReason::TransportFailed("boom".to_string()).is_success());
    }
}
