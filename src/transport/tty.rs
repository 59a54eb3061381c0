//! Interactive tmux transport
//!
//! Runs each session as a `claude` process inside a detached tmux pane. The
//! relay protocol instructions ride in via `--append-system-prompt`, the
//! handoff path and context thresholds via per-session environment
//! assignments on the launch command line, and session signals come back
//! through the polling detector.

use crate::config::RelayConfig;
use crate::detect::{DetectorTiming, Signal, SignalDetector};
use crate::error::{BatonError, Result};
use crate::protocol;
use crate::shutdown::{ShutdownOutcome, ShutdownTiming, TerminationSequencer};
use crate::transport::tmux::TmuxSurface;
use crate::transport::SessionTransport;
use crate::types::{
    HandoffSource, SessionOutcome, SessionReport, SessionSpec, TransportKind,
};
use crate::utils::random_hex;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Marker the agent renders when its input prompt is ready
const READY_MARKER: &str = "❯";

/// How long to wait for the agent to come up after launch
const READY_TIMEOUT: Duration = Duration::from_secs(60);

/// Interactive transport bound to one tmux surface for the whole relay
pub struct TtyTransport {
    surface: TmuxSurface,
    claude_bin: PathBuf,
    model: Option<String>,
    permission_mode: String,
    warn_tokens: u64,
    critical_tokens: u64,
    detector_timing: DetectorTiming,
    shutdown_timing: ShutdownTiming,
    /// Keeps the per-session system-prompt file alive while claude reads it
    sysprompt_file: Option<NamedTempFile>,
}

impl TtyTransport {
    /// Create the tmux surface and bind the transport to it.
    pub async fn connect(config: &RelayConfig) -> Result<Self> {
        let name = config
            .session_name
            .clone()
            .unwrap_or_else(|| format!("baton-{}", random_hex(3)));

        let surface = TmuxSurface::create(&name, 200, 50).await?;
        info!("tmux surface '{}' created", name);

        Ok(Self {
            surface,
            claude_bin: config.claude_bin.clone(),
            model: config.model.clone(),
            permission_mode: config.permission_mode.clone(),
            warn_tokens: config.warn_tokens,
            critical_tokens: config.critical_tokens,
            detector_timing: DetectorTiming::default(),
            shutdown_timing: ShutdownTiming::default(),
            sysprompt_file: None,
        })
    }

    /// tmux session name, for attach/cleanup hints.
    pub fn session_name(&self) -> &str {
        self.surface.name()
    }

    /// Per-session launch environment: handoff path plus the thresholds the
    /// context-guard hook reads. Built fresh for every session rather than
    /// mutating the supervisor's own environment.
    fn session_env(&self, handoff_path: &Path) -> Vec<(String, String)> {
        vec![
            (
                "BATON_HANDOFF_PATH".to_string(),
                handoff_path.to_string_lossy().to_string(),
            ),
            ("CTX_WARN_TOKENS".to_string(), self.warn_tokens.to_string()),
            (
                "CTX_CRITICAL_TOKENS".to_string(),
                self.critical_tokens.to_string(),
            ),
        ]
    }

    /// Wait for the agent's ready marker, clearing scrollback first so a
    /// previous session's marker cannot satisfy the check.
    async fn wait_for_ready(&self) -> Result<()> {
        use crate::detect::ScreenSource;

        self.surface.clear_history().await;

        let deadline = Instant::now() + READY_TIMEOUT;
        loop {
            if let Some(tail) = self.surface.capture_tail(6).await {
                if tail.contains(READY_MARKER) {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(BatonError::TransportStart(
                    "claude did not start in time".to_string(),
                ));
            }
            sleep(Duration::from_secs(2)).await;
        }
    }
}

/// Render the shell command that launches claude inside the pane.
///
/// `CLAUDECODE` is unset so the agent's nested-session detection does not
/// trip; the session env rides as inline assignments so nothing leaks into
/// the supervisor's own environment.
fn render_launch_command(
    claude_bin: &Path,
    model: Option<&str>,
    permission_mode: &str,
    env: &[(String, String)],
    sysprompt_path: &Path,
) -> String {
    let env_prefix = env
        .iter()
        .map(|(k, v)| format!("{}='{}'", k, v))
        .collect::<Vec<_>>()
        .join(" ");

    let mut cmd = format!(
        "unset CLAUDECODE && {} {}",
        env_prefix,
        claude_bin.display()
    );
    if let Some(model) = model {
        cmd.push_str(&format!(" --model {}", model));
    }
    cmd.push_str(&format!(
        " --permission-mode {} --append-system-prompt \"$(cat {})\"",
        permission_mode,
        sysprompt_path.display()
    ));
    cmd
}

#[async_trait]
impl SessionTransport for TtyTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Interactive
    }

    async fn start_session(&mut self, spec: &SessionSpec) -> Result<()> {
        let handoff_path = spec.handoff_path.as_deref().ok_or_else(|| {
            BatonError::Other("interactive session requires a registered handoff path".to_string())
        })?;

        let sysprompt =
            protocol::build_protocol_instructions(TransportKind::Interactive, Some(handoff_path));
        let mut sp_file = NamedTempFile::new()?;
        sp_file.write_all(sysprompt.as_bytes())?;

        let command = render_launch_command(
            &self.claude_bin,
            self.model.as_deref(),
            &self.permission_mode,
            &self.session_env(handoff_path),
            sp_file.path(),
        );
        debug!("Launching session {} in pane", spec.index);
        self.surface.send_keys(&[&command, "Enter"]).await;

        self.wait_for_ready().await?;
        info!("Session {}: claude ready", spec.index);

        self.surface.send_prompt(&spec.prompt).await?;

        // Dropped (and deleted) when the session's outcome is in.
        self.sysprompt_file = Some(sp_file);
        Ok(())
    }

    async fn await_outcome(&mut self, spec: &SessionSpec) -> Result<SessionReport> {
        let handoff_path = spec.handoff_path.clone().ok_or_else(|| {
            BatonError::Other("interactive session requires a registered handoff path".to_string())
        })?;

        let detector = SignalDetector::new(&self.surface, &handoff_path, self.detector_timing);
        let signal = detector.wait(spec.timeout).await;

        self.sysprompt_file = None;

        let outcome = match signal {
            Signal::Handoff => SessionOutcome::HandoffProduced(HandoffSource::File(handoff_path)),
            Signal::Exited => SessionOutcome::EndedWithoutHandoff,
            Signal::TimedOut => SessionOutcome::TimedOut,
        };
        Ok(SessionReport::new(outcome))
    }

    async fn terminate_session(&mut self, spec: &SessionSpec) -> ShutdownOutcome {
        debug!("Terminating session {}", spec.index);
        TerminationSequencer::new(&self.surface, self.shutdown_timing)
            .run()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_launch_command_full() {
        let env = vec![
            (
                "BATON_HANDOFF_PATH".to_string(),
                "/tmp/baton-handoff-aa.md".to_string(),
            ),
            ("CTX_WARN_TOKENS".to_string(), "175000".to_string()),
            ("CTX_CRITICAL_TOKENS".to_string(), "190000".to_string()),
        ];
        let cmd = render_launch_command(
            Path::new("/usr/local/bin/claude"),
            Some("haiku"),
            "bypassPermissions",
            &env,
            Path::new("/tmp/baton-sp-1"),
        );

        assert!(cmd.starts_with("unset CLAUDECODE && "));
        assert!(cmd.contains("BATON_HANDOFF_PATH='/tmp/baton-handoff-aa.md'"));
        assert!(cmd.contains("CTX_WARN_TOKENS='175000'"));
        assert!(cmd.contains("CTX_CRITICAL_TOKENS='190000'"));
        assert!(cmd.contains("--model haiku"));
        assert!(cmd.contains("--permission-mode bypassPermissions"));
        assert!(cmd.contains("--append-system-prompt \"$(cat /tmp/baton-sp-1)\""));
    }

    #[test]
    fn test_render_launch_command_without_model() {
        let cmd = render_launch_command(
            Path::new("claude"),
            None,
            "acceptEdits",
            &[],
            Path::new("/tmp/sp"),
        );
        assert!(!cmd.contains("--model"));
        assert!(cmd.contains("--permission-mode acceptEdits"));
    }
}
