//! Streaming subprocess transport
//!
//! Runs each session as `claude -p --verbose --output-format stream-json`
//! and consumes its line-delimited JSON events until the process exits. The
//! event stream is lazy, finite, and non-restartable; there is no way to send
//! further input mid-stream, so session teardown is just reaping the child.

use crate::config::RelayConfig;
use crate::error::{BatonError, Result};
use crate::protocol;
use crate::shutdown::ShutdownOutcome;
use crate::transport::SessionTransport;
use crate::types::{
    HandoffSource, SessionOutcome, SessionReport, SessionSpec, SessionStats, TransportKind,
};
use crate::ui;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// One typed event from the agent's output stream.
///
/// Unknown event types collapse into `Other`; malformed lines are skipped
/// upstream in [`parse_event`].
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum StreamEvent {
    #[serde(rename = "assistant")]
    Assistant {
        #[serde(default)]
        message: Option<AssistantMessage>,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        tool_name: Option<String>,
    },
    #[serde(rename = "result")]
    FinalResult {
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        cost_usd: Option<f64>,
        #[serde(default)]
        usage: Option<Usage>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Parse one stream line; `None` for blanks and malformed JSON.
pub(crate) fn parse_event(line: &str) -> Option<StreamEvent> {
    if line.trim().is_empty() {
        return None;
    }
    serde_json::from_str(line).ok()
}

/// Usage and final result accumulated over one session's event stream
#[derive(Debug, Default)]
pub(crate) struct StreamTally {
    pub tool_invocations: u64,
    pub cost_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub final_result: Option<String>,
}

impl StreamTally {
    pub fn observe(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::ToolUse { .. } => {
                self.tool_invocations += 1;
            }
            StreamEvent::FinalResult {
                result,
                cost_usd,
                usage,
            } => {
                if let Some(result) = result {
                    self.final_result = Some(result.clone());
                }
                if let Some(cost) = cost_usd {
                    self.cost_usd = *cost;
                }
                if let Some(usage) = usage {
                    self.input_tokens = usage.input_tokens;
                    self.output_tokens = usage.output_tokens;
                }
            }
            StreamEvent::Assistant { .. } | StreamEvent::Other => {}
        }
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            tool_invocations: self.tool_invocations,
            cost_usd: self.cost_usd,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
        }
    }
}

/// Streaming transport: one subprocess per session
pub struct PipeTransport {
    claude_bin: PathBuf,
    model: Option<String>,
    warn_tokens: u64,
    critical_tokens: u64,
    child: Option<Child>,
}

impl PipeTransport {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            claude_bin: config.claude_bin.clone(),
            model: config.model.clone(),
            warn_tokens: config.warn_tokens,
            critical_tokens: config.critical_tokens,
            child: None,
        }
    }
}

#[async_trait]
impl SessionTransport for PipeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Streaming
    }

    async fn start_session(&mut self, spec: &SessionSpec) -> Result<()> {
        // No filesystem signal in this mode: the protocol instructions ask
        // for the handoff as the literal final message.
        let prompt = format!(
            "{}\n\n{}",
            spec.prompt,
            protocol::build_protocol_instructions(TransportKind::Streaming, None)
        );

        let mut command = Command::new(&self.claude_bin);
        command.arg("-p");
        if let Some(model) = &self.model {
            command.args(["--model", model]);
        }
        command
            .args(["--verbose", "--output-format", "stream-json"])
            .arg(&prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .env_remove("CLAUDECODE")
            .env("CTX_WARN_TOKENS", self.warn_tokens.to_string())
            .env("CTX_CRITICAL_TOKENS", self.critical_tokens.to_string());

        let child = command.spawn().map_err(|e| {
            BatonError::TransportStart(format!(
                "failed to start {}: {}",
                self.claude_bin.display(),
                e
            ))
        })?;

        debug!("Session {}: claude subprocess started", spec.index);
        self.child = Some(child);
        Ok(())
    }

    async fn await_outcome(&mut self, spec: &SessionSpec) -> Result<SessionReport> {
        let mut child = self.child.take().ok_or_else(|| {
            BatonError::Other("await_outcome called with no running session".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            BatonError::TransportStart("claude stdout was not captured".to_string())
        })?;

        let mut tally = StreamTally::default();
        let mut lines = BufReader::new(stdout).lines();

        while let Some(line) = lines.next_line().await? {
            let Some(event) = parse_event(&line) else {
                continue;
            };

            match &event {
                StreamEvent::Assistant {
                    message: Some(message),
                } => {
                    for block in &message.content {
                        if let ContentBlock::Text { text } = block {
                            if !text.is_empty() {
                                ui::assistant_text(text);
                            }
                        }
                    }
                }
                StreamEvent::ToolUse { tool_name } => {
                    ui::tool_use(tool_name.as_deref().unwrap_or("unknown"));
                }
                _ => {}
            }

            tally.observe(&event);
        }

        if let Err(e) = child.wait().await {
            warn!("Session {}: wait on claude failed: {}", spec.index, e);
        }

        let outcome = match tally.final_result.as_deref() {
            Some(result) if !result.is_empty() => {
                SessionOutcome::HandoffProduced(HandoffSource::Text(result.to_string()))
            }
            // No final result, or an empty one: nothing usable came back.
            _ => SessionOutcome::EndedWithoutHandoff,
        };

        Ok(SessionReport {
            outcome,
            stats: tally.stats(),
        })
    }

    async fn terminate_session(&mut self, _spec: &SessionSpec) -> ShutdownOutcome {
        // The subprocess has normally exited by the time we get here; kill is
        // a no-op safety net.
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill claude subprocess: {}", e);
                return ShutdownOutcome::StillRunning;
            }
        }
        ShutdownOutcome::Exited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assistant_event() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"working on it"},{"type":"thinking","thinking":"hmm"}]}}"#;
        let event = parse_event(line).expect("parses");
        match event {
            StreamEvent::Assistant {
                message: Some(message),
            } => {
                assert_eq!(message.content.len(), 2);
                assert!(matches!(
                    &message.content[0],
                    ContentBlock::Text { text } if text == "working on it"
                ));
                assert!(matches!(&message.content[1], ContentBlock::Other));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_tool_use_event() {
        let line = r#"{"type":"tool_use","tool_name":"Bash"}"#;
        let event = parse_event(line).expect("parses");
        assert!(matches!(
            event,
            StreamEvent::ToolUse { tool_name: Some(name) } if name == "Bash"
        ));
    }

    #[test]
    fn test_parse_result_event() {
        let line = r#"{"type":"result","result":"all done","cost_usd":0.1234,"usage":{"input_tokens":1000,"output_tokens":250}}"#;
        let event = parse_event(line).expect("parses");
        match event {
            StreamEvent::FinalResult {
                result,
                cost_usd,
                usage,
            } => {
                assert_eq!(result.as_deref(), Some("all done"));
                assert_eq!(cost_usd, Some(0.1234));
                let usage = usage.expect("usage present");
                assert_eq!(usage.input_tokens, 1000);
                assert_eq!(usage.output_tokens, 250);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_and_malformed_lines() {
        assert!(matches!(
            parse_event(r#"{"type":"system","subtype":"init"}"#),
            Some(StreamEvent::Other)
        ));
        assert!(parse_event("not json at all").is_none());
        assert!(parse_event("").is_none());
    }

    #[test]
    fn test_tally_accumulates_stream() {
        let lines = [
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]}}"#,
            r#"{"type":"tool_use","tool_name":"Read"}"#,
            r#"{"type":"tool_use","tool_name":"Write"}"#,
            r#"{"type":"result","result":"handoff text","cost_usd":0.5,"usage":{"input_tokens":10,"output_tokens":20}}"#,
        ];

        let mut tally = StreamTally::default();
        for line in lines {
            if let Some(event) = parse_event(line) {
                tally.observe(&event);
            }
        }

        assert_eq!(tally.tool_invocations, 2);
        assert_eq!(tally.final_result.as_deref(), Some("handoff text"));
        let stats = tally.stats();
        assert_eq!(stats.input_tokens, 10);
        assert_eq!(stats.output_tokens, 20);
        assert!((stats.cost_usd - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tally_without_result_event() {
        let mut tally = StreamTally::default();
        if let Some(event) = parse_event(r#"{"type":"tool_use","tool_name":"Bash"}"#) {
            tally.observe(&event);
        }
        assert!(tally.final_result.is_none());
    }
}
