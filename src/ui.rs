//! Console output for relay progress
//!
//! User-facing progress goes to stdout with ANSI color; diagnostics go to
//! tracing (stderr). Kept separate so the relay's observable output reads
//! cleanly even with logging disabled.

use crate::types::RelayStats;

pub const RED: &str = "\x1b[0;31m";
pub const GREEN: &str = "\x1b[0;32m";
pub const YELLOW: &str = "\x1b[1;33m";
pub const BLUE: &str = "\x1b[0;34m";
pub const CYAN: &str = "\x1b[0;36m";
pub const BOLD: &str = "\x1b[1m";
pub const RESET: &str = "\x1b[0m";

const RULE: &str = "══════════════════════════════════════════";

/// Timestamped status line
pub fn status(msg: &str) {
    let ts = chrono::Local::now().format("%H:%M:%S");
    println!("{}[{}]{} {}", BLUE, ts, RESET, msg);
}

/// Success line with a check mark
pub fn ok(msg: &str) {
    println!("{}{}✓{} {}", GREEN, BOLD, RESET, msg);
}

/// Failure line with a cross mark
pub fn err(msg: &str) {
    println!("{}{}✗{} {}", RED, BOLD, RESET, msg);
}

/// Assistant text echoed from the streaming transport
pub fn assistant_text(text: &str) {
    println!("{}{}{}", CYAN, text, RESET);
}

/// Tool invocation echoed from the streaming transport
pub fn tool_use(name: &str) {
    println!("  {}🔧 [{}]{}", YELLOW, name, RESET);
}

/// Banner printed when a relay starts
pub fn start_banner(mode: &str, lines: &[String]) {
    println!("\n{}{}{}{}", BOLD, BLUE, RULE, RESET);
    println!("{}{}  baton ({}){}", BOLD, BLUE, mode, RESET);
    for line in lines {
        println!("  {}", line);
    }
    println!("{}{}{}{}", BOLD, BLUE, RULE, RESET);
}

/// Header printed before each session
pub fn session_header(index: u32, max_sessions: u32) {
    let bound = if max_sessions == 0 {
        "∞".to_string()
    } else {
        max_sessions.to_string()
    };
    println!(
        "\n{}{}── Session {} / {} ──{}",
        BOLD, BLUE, index, bound, RESET
    );
}

/// Green completion line
pub fn complete(msg: &str) {
    println!("\n{}{}✓ {}{}", GREEN, BOLD, msg, RESET);
}

/// Banner printed when the relay stops
pub fn finish_banner(stats: &RelayStats, extra: &[String]) {
    println!("\n{}{}{}{}", BOLD, BLUE, RULE, RESET);
    println!("{}{}  baton finished{}", BOLD, BLUE, RESET);
    println!("{}{}{}{}", BOLD, BLUE, RULE, RESET);
    println!("  Total sessions: {}", stats.sessions);
    if stats.tool_invocations > 0 || stats.input_tokens > 0 {
        println!("  Total cost: ${:.4}", stats.cost_usd);
        println!(
            "  Total tokens: {} in / {} out",
            stats.input_tokens, stats.output_tokens
        );
    }
    for line in extra {
        println!("  {}", line);
    }
    println!("{}{}{}{}", BOLD, BLUE, RULE, RESET);
}
