//! Relay configuration
//!
//! Runtime configuration assembled from CLI flags and environment variables
//! by `main.rs`. Token thresholds feed the context-guard hook; everything
//! else drives the supervisor and transports.

use crate::error::{BatonError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default warning threshold for context usage (tokens)
pub const DEFAULT_WARN_TOKENS: u64 = 175_000;

/// Default denial threshold for context usage (tokens)
pub const DEFAULT_CRITICAL_TOKENS: u64 = 190_000;

/// Runtime configuration for one relay run
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Task description, passed verbatim to session 1
    pub task: String,

    /// Claude model override; `None` uses the agent's default
    pub model: Option<String>,

    /// Permission mode for interactive sessions
    pub permission_mode: String,

    /// tmux session name; `None` generates `baton-<hex>`
    pub session_name: Option<String>,

    /// Max relay sessions; 0 means unbounded
    pub max_sessions: u32,

    /// Context warning threshold exported to the context-guard hook
    pub warn_tokens: u64,

    /// Context denial threshold exported to the context-guard hook
    pub critical_tokens: u64,

    /// Per-session signal deadline in seconds; 0 means unbounded
    pub session_timeout_secs: u64,

    /// Directory where per-session handoff files are created
    pub handoff_dir: PathBuf,

    /// Pause between sessions after a handoff
    pub cooldown: Duration,

    /// Resolved path to the claude binary
    pub claude_bin: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            task: String::new(),
            model: None,
            permission_mode: "bypassPermissions".to_string(),
            session_name: None,
            max_sessions: 0,
            warn_tokens: DEFAULT_WARN_TOKENS,
            critical_tokens: DEFAULT_CRITICAL_TOKENS,
            session_timeout_secs: 0,
            handoff_dir: std::env::temp_dir(),
            cooldown: Duration::from_secs(3),
            claude_bin: PathBuf::from("claude"),
        }
    }
}

impl RelayConfig {
    /// Per-session signal deadline, `None` when unbounded
    pub fn session_timeout(&self) -> Option<Duration> {
        if self.session_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.session_timeout_secs))
        }
    }

    /// Validate the configuration before starting a relay
    pub fn validate(&self) -> Result<()> {
        if self.task.trim().is_empty() {
            return Err(BatonError::Config("no task provided".to_string()));
        }
        if self.warn_tokens >= self.critical_tokens {
            return Err(BatonError::Config(format!(
                "warn-tokens ({}) must be below critical-tokens ({})",
                self.warn_tokens, self.critical_tokens
            )));
        }
        Ok(())
    }
}

/// Resolve the claude binary: `CLAUDE_BIN` override first, then PATH lookup.
///
/// PATH lookup ignores shell aliases and functions, so wrappers that inject
/// API keys must be pointed at via `CLAUDE_BIN`.
pub fn find_claude() -> Result<PathBuf> {
    if let Ok(bin) = std::env::var("CLAUDE_BIN") {
        if !bin.is_empty() {
            return Ok(PathBuf::from(bin));
        }
    }

    if let Some(path) = search_path("claude") {
        return Ok(path);
    }

    Err(BatonError::ClaudeNotFound(
        "'claude' not found in PATH; set CLAUDE_BIN to override".to_string(),
    ))
}

/// Look up an executable on PATH.
fn search_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.max_sessions, 0);
        assert_eq!(config.warn_tokens, DEFAULT_WARN_TOKENS);
        assert_eq!(config.critical_tokens, DEFAULT_CRITICAL_TOKENS);
        assert_eq!(config.permission_mode, "bypassPermissions");
        assert!(config.session_timeout().is_none());
    }

    #[test]
    fn test_session_timeout_zero_is_unbounded() {
        let config = RelayConfig {
            session_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.session_timeout(), None);

        let config = RelayConfig {
            session_timeout_secs: 90,
            ..Default::default()
        };
        assert_eq!(config.session_timeout(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_validate_rejects_empty_task() {
        let config = RelayConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let config = RelayConfig {
            task: "build it".to_string(),
            warn_tokens: 200_000,
            critical_tokens: 190_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_sane_config() {
        let config = RelayConfig {
            task: "build it".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
