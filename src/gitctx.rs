//! Repository state snapshots for continuation prompts
//!
//! Thin wrapper over the git CLI. Both reads return an empty string on any
//! failure (no repository, no history, git missing) — the prompt builder
//! treats that as "no history", never as an error.

use std::process::Command;

/// `git diff --stat HEAD~1 HEAD` — what the previous session changed.
pub fn diff_stat() -> String {
    run_git(&["diff", "--stat", "HEAD~1", "HEAD"])
}

/// `git status --short` — current working-tree state.
pub fn status_short() -> String {
    run_git(&["status", "--short"])
}

fn run_git(args: &[&str]) -> String {
    let output = match Command::new("git").args(args).output() {
        Ok(output) => output,
        Err(_) => return String::new(),
    };
    if !output.status.success() {
        return String::new();
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
