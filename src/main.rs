//! Baton - Context-Window Relay Supervisor for Claude Code
//!
//! This is the CLI entry point. Everything here is peripheral glue: flag
//! parsing, logging setup, and banner printing. The relay itself lives in
//! `baton_core`.

use baton_core::{
    config::{DEFAULT_CRITICAL_TOKENS, DEFAULT_WARN_TOKENS},
    error::Result,
    find_claude, install, ui, HandoffSource, PipeTransport, RelayConfig, RelayReport,
    RelaySupervisor, SessionOutcome, SessionTransport, TtyTransport,
};
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(name = "baton")]
#[command(about = "Context-window relay supervisor for Claude Code", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Task description
    task: Option<String>,

    /// Pipe mode (claude -p, no tmux). Default is TTY mode
    #[arg(short = 'p', long = "pipe")]
    pipe: bool,

    /// Claude model (default: claude's own default)
    #[arg(long, env = "MODEL")]
    model: Option<String>,

    /// Max relay sessions (0 = unlimited)
    #[arg(long, env = "MAX_SESSIONS", default_value_t = 0)]
    max_sessions: u32,

    /// Context warning threshold in tokens
    #[arg(long, env = "CTX_WARN_TOKENS", default_value_t = DEFAULT_WARN_TOKENS)]
    warn_tokens: u64,

    /// Context deny threshold in tokens
    #[arg(long, env = "CTX_CRITICAL_TOKENS", default_value_t = DEFAULT_CRITICAL_TOKENS)]
    critical_tokens: u64,

    /// Permission mode [TTY only]
    #[arg(long, env = "PERMISSION_MODE", default_value = "bypassPermissions")]
    permission_mode: String,

    /// Per-session timeout in seconds (0 = unlimited) [TTY only]
    #[arg(long, env = "SESSION_TIMEOUT", default_value_t = 0)]
    session_timeout: u64,

    /// tmux session name (default: baton-<random>) [TTY only]
    #[arg(long)]
    name: Option<String>,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the context-guard hook into ~/.claude
    Install,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let filter = EnvFilter::new(format!("baton={}", level.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // Write logs to stderr, not stdout
        .init();

    debug!("Baton v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Some(Commands::Install) = cli.command {
        return install::run_install();
    }

    let Some(task) = cli.task else {
        ui::err("No task provided. Run 'baton --help' for usage.");
        std::process::exit(1);
    };

    let config = RelayConfig {
        task,
        model: cli.model,
        permission_mode: cli.permission_mode,
        session_name: cli.name,
        max_sessions: cli.max_sessions,
        warn_tokens: cli.warn_tokens,
        critical_tokens: cli.critical_tokens,
        session_timeout_secs: cli.session_timeout,
        claude_bin: find_claude()?,
        ..Default::default()
    };
    config.validate()?;

    let (report, extra) = if cli.pipe {
        (run_pipe_relay(config).await?, Vec::new())
    } else {
        run_tty_relay(config).await?
    };

    ui::finish_banner(&report.stats, &extra);

    if !report.stop.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_pipe_relay(config: RelayConfig) -> Result<RelayReport> {
    ui::start_banner(
        "pipe mode",
        &[
            format!("Model: {}", config.model.as_deref().unwrap_or("(default)")),
            describe_max_sessions(config.max_sessions),
        ],
    );

    let transport: Box<dyn SessionTransport> = Box::new(PipeTransport::new(&config));
    RelaySupervisor::new(config, transport).run().await
}

async fn run_tty_relay(config: RelayConfig) -> Result<(RelayReport, Vec<String>)> {
    let transport = TtyTransport::connect(&config).await?;
    let session_name = transport.session_name().to_string();

    ui::start_banner(
        "tmux file-signal mode",
        &[
            format!("Model: {}", config.model.as_deref().unwrap_or("(default)")),
            describe_max_sessions(config.max_sessions),
            match config.session_timeout() {
                Some(t) => format!("Session timeout: {}s", t.as_secs()),
                None => "Session timeout: unlimited".to_string(),
            },
            format!("Attach: {}tmux attach -t {}{}", ui::BOLD, session_name, ui::RESET),
        ],
    );

    let transport: Box<dyn SessionTransport> = Box::new(transport);
    let report = RelaySupervisor::new(config, transport).run().await?;

    let extra = interactive_finish_lines(&session_name, &report);
    Ok((report, extra))
}

/// Finish-banner lines for the interactive mode: the last handoff file, if
/// any, plus the tmux attach and cleanup hints.
fn interactive_finish_lines(session_name: &str, report: &RelayReport) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(path) = last_handoff_file(report) {
        lines.push(format!("Last handoff: {}", path.display()));
    }
    lines.push(format!("Attach: tmux attach -t {}", session_name));
    lines.push(format!("Cleanup: tmux kill-session -t {}", session_name));
    lines
}

fn last_handoff_file(report: &RelayReport) -> Option<&std::path::Path> {
    report.outcomes.iter().rev().find_map(|outcome| match outcome {
        SessionOutcome::HandoffProduced(HandoffSource::File(path)) => Some(path.as_path()),
        _ => None,
    })
}

fn describe_max_sessions(max_sessions: u32) -> String {
    if max_sessions > 0 {
        format!("Max sessions: {}", max_sessions)
    } else {
        "Max sessions: unlimited".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_core::{RelayStats, StopReason};
    use std::path::PathBuf;

    fn report_with(outcomes: Vec<SessionOutcome>) -> RelayReport {
        RelayReport {
            stop: StopReason::TaskComplete,
            stats: RelayStats::default(),
            outcomes,
        }
    }

    #[test]
    fn test_finish_lines_include_last_handoff_and_tmux_hints() {
        let report = report_with(vec![
            SessionOutcome::HandoffProduced(HandoffSource::File(PathBuf::from(
                "/tmp/baton-handoff-aa.md",
            ))),
            SessionOutcome::HandoffProduced(HandoffSource::File(PathBuf::from(
                "/tmp/baton-handoff-bb.md",
            ))),
            SessionOutcome::EndedWithoutHandoff,
        ]);

        let lines = interactive_finish_lines("baton-x1", &report);
        assert!(lines
            .iter()
            .any(|l| l.contains("Last handoff: /tmp/baton-handoff-bb.md")));
        assert!(lines.iter().any(|l| l.contains("tmux attach -t baton-x1")));
        assert!(lines
            .iter()
            .any(|l| l.contains("tmux kill-session -t baton-x1")));
    }

    #[test]
    fn test_finish_lines_without_any_handoff() {
        let report = report_with(vec![SessionOutcome::EndedWithoutHandoff]);

        let lines = interactive_finish_lines("baton-x2", &report);
        assert!(!lines.iter().any(|l| l.contains("Last handoff")));
        assert_eq!(lines.len(), 2);
    }
}
