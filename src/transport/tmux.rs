//! tmux terminal surface control
//!
//! Minimal wrapper over the tmux CLI. The relay depends on five operations
//! only — create a named surface, send literal text, send named keys, capture
//! the rendered tail, destroy by name — plus buffer paste for multi-line
//! prompts. Send and capture failures are swallowed: a transient tmux error
//! shows up as "condition not met" on the next poll, never as a relay error.

use crate::detect::ScreenSource;
use crate::error::{BatonError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Handle to one detached tmux session hosting the agent
#[derive(Debug, Clone)]
pub struct TmuxSurface {
    /// tmux session name
    name: String,
    /// Target pane (`<name>:0.0`)
    pane: String,
}

impl TmuxSurface {
    /// Create a detached tmux session, killing any stale one with this name.
    pub async fn create(name: &str, width: u32, height: u32) -> Result<Self> {
        // Stale sessions from a previous run would swallow our keystrokes.
        let _ = run_tmux(&["kill-session", "-t", name]).await;

        let status = run_tmux(&[
            "new-session",
            "-d",
            "-s",
            name,
            "-x",
            &width.to_string(),
            "-y",
            &height.to_string(),
        ])
        .await?;
        if !status {
            return Err(BatonError::TransportStart(format!(
                "tmux new-session failed for '{}'",
                name
            )));
        }

        tokio::time::sleep(Duration::from_secs(1)).await;

        Ok(Self {
            name: name.to_string(),
            pane: format!("{}:0.0", name),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send named keys (Enter, Escape, C-c, ...) to the pane.
    pub async fn send_keys(&self, keys: &[&str]) {
        let mut args = vec!["send-keys", "-t", self.pane.as_str()];
        args.extend_from_slice(keys);
        if let Err(e) = run_tmux(&args).await {
            debug!("tmux send-keys failed: {}", e);
        }
    }

    /// Send text literally (`-l`), bypassing key name lookup.
    pub async fn send_literal(&self, text: &str) {
        if let Err(e) = run_tmux(&["send-keys", "-t", &self.pane, "-l", text]).await {
            debug!("tmux send-keys -l failed: {}", e);
        }
    }

    /// Paste a multi-line prompt through a tmux buffer, then press Enter.
    ///
    /// Typing long prompts key-by-key is slow and mangles newlines; a buffer
    /// paste delivers the text atomically.
    pub async fn send_prompt(&self, prompt: &str) -> Result<()> {
        let mut tmpfile = tempfile::NamedTempFile::new()?;
        tmpfile.write_all(prompt.as_bytes())?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        run_tmux(&["load-buffer", &tmp_path]).await?;
        run_tmux(&["paste-buffer", "-p", "-t", &self.pane]).await?;
        drop(tmpfile);

        tokio::time::sleep(Duration::from_millis(300)).await;
        self.send_keys(&["Enter"]).await;
        Ok(())
    }

    /// Clear pane scrollback, preventing false positives from a previous
    /// session's rendered output.
    pub async fn clear_history(&self) {
        if let Err(e) = run_tmux(&["clear-history", "-t", &self.pane]).await {
            debug!("tmux clear-history failed: {}", e);
        }
    }

    /// Destroy the session by name.
    pub async fn kill(&self) {
        if let Err(e) = run_tmux(&["kill-session", "-t", &self.name]).await {
            warn!("tmux kill-session failed: {}", e);
        }
    }

    /// Capture the full pane text, `None` on failure.
    async fn capture(&self) -> Option<String> {
        let output = Command::new("tmux")
            .args(["capture-pane", "-t", &self.pane, "-p"])
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl ScreenSource for TmuxSurface {
    async fn capture_tail(&self, lines: usize) -> Option<String> {
        self.capture().await.map(|text| tail_non_empty(&text, lines))
    }
}

#[async_trait]
impl crate::shutdown::SurfaceControl for TmuxSurface {
    async fn send_keys(&self, keys: &[&str]) {
        TmuxSurface::send_keys(self, keys).await;
    }

    async fn send_literal(&self, text: &str) {
        TmuxSurface::send_literal(self, text).await;
    }
}

/// Last `n` non-empty lines of rendered text, newline-joined.
fn tail_non_empty(text: &str, n: usize) -> String {
    let non_empty: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    let start = non_empty.len().saturating_sub(n);
    non_empty[start..].join("\n")
}

/// Run a tmux command, returning whether it exited successfully.
async fn run_tmux(args: &[&str]) -> Result<bool> {
    let status = Command::new("tmux").args(args).status().await?;
    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_non_empty_takes_last_lines() {
        let text = "one\n\ntwo\n   \nthree\nfour\n";
        assert_eq!(tail_non_empty(text, 3), "two\nthree\nfour");
    }

    #[test]
    fn test_tail_non_empty_shorter_than_n() {
        assert_eq!(tail_non_empty("only\n", 5), "only");
    }

    #[test]
    fn test_tail_non_empty_all_blank() {
        assert_eq!(tail_non_empty("\n  \n\t\n", 3), "");
    }
}
