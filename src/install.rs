//! Hook installation into the agent's settings store
//!
//! Installs the embedded context-guard script into `~/.claude/hooks/` and
//! registers it for the `PreToolUse` and `PostToolUse` events in
//! `~/.claude/settings.json`. Idempotent: an up-to-date script is left
//! alone, already-registered hooks are not duplicated, and unrelated
//! settings keys are preserved byte-for-byte in value.

use crate::error::{BatonError, Result};
use crate::ui;
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

/// Embedded hook script, written out verbatim on install
const CONTEXT_GUARD_SH: &str = include_str!("../assets/context-guard.sh");

/// Command string registered in settings.json
const HOOK_COMMAND: &str = "~/.claude/hooks/context-guard.sh";

/// Hook events the guard listens on
const HOOK_EVENTS: [&str; 2] = ["PreToolUse", "PostToolUse"];

/// Install into the user's `~/.claude` directory.
pub fn run_install() -> Result<()> {
    let home = dirs::home_dir()
        .ok_or_else(|| BatonError::Install("cannot determine home directory".to_string()))?;
    let claude_dir = home.join(".claude");
    install_into(&claude_dir)?;

    ui::complete("Installation complete!");
    println!("  Hook script: {}", claude_dir.join("hooks/context-guard.sh").display());
    println!("  Settings: {}", claude_dir.join("settings.json").display());
    println!("\n{}Configuration:{}", ui::YELLOW, ui::RESET);
    println!("  CTX_WARN_TOKENS=175000     # Warning threshold (override via env var)");
    println!("  CTX_CRITICAL_TOKENS=190000 # Rejection threshold (override via env var)");
    println!("\n{}Interactive mode env vars:{}", ui::YELLOW, ui::RESET);
    println!("  BATON_HANDOFF_PATH         # Set automatically by baton; agent writes handoff to this path");
    Ok(())
}

/// Install the script and register hooks under the given `.claude` directory.
pub fn install_into(claude_dir: &Path) -> Result<()> {
    let hook_dir = claude_dir.join("hooks");
    let hook_dst = hook_dir.join("context-guard.sh");
    let settings_path = claude_dir.join("settings.json");

    std::fs::create_dir_all(&hook_dir)?;

    match std::fs::read_to_string(&hook_dst) {
        Ok(existing) if existing == CONTEXT_GUARD_SH => {
            ui::ok(&format!("Hook script is up to date: {}", hook_dst.display()));
        }
        _ => {
            std::fs::write(&hook_dst, CONTEXT_GUARD_SH)?;
            make_executable(&hook_dst)?;
            ui::ok(&format!("Hook script installed: {}", hook_dst.display()));
        }
    }

    if register_hooks(&settings_path)? {
        ui::ok("Hooks registered in settings.json");
    } else {
        ui::ok("Hooks already registered, no update needed");
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Register the guard for both hook events; returns whether settings changed.
fn register_hooks(settings_path: &Path) -> Result<bool> {
    let mut settings: Value = match std::fs::read_to_string(settings_path) {
        Ok(data) => serde_json::from_str(&data).map_err(|e| {
            BatonError::Install(format!("failed to parse {}: {}", settings_path.display(), e))
        })?,
        Err(_) => json!({}),
    };

    let settings_obj = settings
        .as_object_mut()
        .ok_or_else(|| BatonError::Install("settings.json is not a JSON object".to_string()))?;

    let hooks = settings_obj
        .entry("hooks")
        .or_insert_with(|| json!({}));
    let hooks_obj = hooks
        .as_object_mut()
        .ok_or_else(|| BatonError::Install("settings.json 'hooks' is not an object".to_string()))?;

    let mut updated = false;
    for event in HOOK_EVENTS {
        let entries = hooks_obj.entry(event).or_insert_with(|| json!([]));
        if has_hook_command(entries, HOOK_COMMAND) {
            debug!("{} already registered for {}", HOOK_COMMAND, event);
            continue;
        }
        if let Some(array) = entries.as_array_mut() {
            array.push(hook_entry());
            updated = true;
        }
    }

    if updated {
        let mut out = serde_json::to_string_pretty(&settings)?;
        out.push('\n');
        std::fs::write(settings_path, out)?;
    }
    Ok(updated)
}

fn hook_entry() -> Value {
    json!({
        "hooks": [
            {
                "type": "command",
                "command": HOOK_COMMAND,
                "timeout": 10,
            }
        ]
    })
}

/// Does this event's entry array already contain our hook command?
fn has_hook_command(entries: &Value, command: &str) -> bool {
    let Some(entries) = entries.as_array() else {
        return false;
    };
    entries.iter().any(|entry| {
        entry
            .get("hooks")
            .and_then(Value::as_array)
            .map(|hooks| {
                hooks
                    .iter()
                    .any(|h| h.get("command").and_then(Value::as_str) == Some(command))
            })
            .unwrap_or(false)
    })
}
