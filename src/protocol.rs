//! Relay protocol prompts
//!
//! Renders the fixed instructions that teach the agent how to request
//! continuation, and the continuation prompt that seeds each session from its
//! predecessor's handoff. The continuation prompt is the sole channel carrying
//! state between sessions, so rendering must be byte-identical for identical
//! inputs.
//!
//! The five-question handoff schema and the autonomy rules are shared
//! constants: the interactive and streaming render paths must never diverge
//! on them.

use crate::gitctx;
use crate::types::TransportKind;
use std::path::Path;

/// Five fixed orientation questions every handoff must answer
pub const HANDOFF_FORMAT: &str = r#"## Q0: What is the current state of this project?
(what is this project, what is the current goal, how far have we progressed.
The next agent is a blank process with ZERO history — this section is its only orientation.)

## Q1: What should the next agent do first?
(Be specific: which file, which function, what exact change.
NOT "continue implementing X" — that is useless without context.)

## Q2: What will NOT work? What dead ends were discovered?
(Every dead end you hide costs the next agent 10+ tool calls to rediscover.)

## Q3: What non-obvious decisions were made and why?
(If the next agent reads the code and thinks "why not do it the other way?" — answer here.)

## Q4: What are you uncertain about?
(Honest uncertainty is more valuable than false confidence.)"#;

/// Rules shared by both protocol variants and the continuation prompt
pub const HANDOFF_RULES: &str = r#"- You are an AUTONOMOUS agent. NEVER ask the human for confirmation, clarification, or approval. NEVER pause to wait for input. Make decisions and execute.
- DO NOT list completed work or modified files — the supervisor auto-injects git diff.
- DO NOT restate the original task — the supervisor passes it separately.
- DO NOT answer a question with "None" — if truly none, skip it entirely.
- Q0 (project state) is MANDATORY — without it the next agent cannot orient itself."#;

/// Render the protocol instructions appended to each session's system prompt.
///
/// Interactive mode embeds the exact filesystem path the agent must write the
/// handoff to; streaming mode has no filesystem signal and instructs the agent
/// to emit the handoff as its literal final message instead. `handoff_path` is
/// ignored for streaming.
pub fn build_protocol_instructions(kind: TransportKind, handoff_path: Option<&Path>) -> String {
    match kind {
        TransportKind::Interactive => {
            let path = handoff_path
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default();
            format!(
                r"[IMPORTANT SYSTEM INSTRUCTION — BATON RELAY PROTOCOL]

You are one node in an autonomous state machine. When your context fills up, a supervisor will restart a fresh agent that inherits your state. Your job is to make progress on the task and, when warned about context limits, write a handoff file so the next agent can resume without loss.

## Handoff Mechanism

The environment variable BATON_HANDOFF_PATH is set to:
  {path}

When you receive a context warning (⚠ Context used...), you MUST:
1. Finish your current immediate step
2. Use the Write tool to create the handoff file at the EXACT path above
3. The file signals the supervisor to start a new session — this is how the relay works

## Handoff File Format

The file MUST follow this structure:

```markdown
{format}
```

## Critical Rules

{rules}
- The handoff is a FILE written via the Write tool — NOT text output to the conversation.",
                path = path,
                format = HANDOFF_FORMAT,
                rules = HANDOFF_RULES,
            )
        }
        TransportKind::Streaming => format!(
            r"[IMPORTANT SYSTEM INSTRUCTION — BATON RELAY PROTOCOL]

You are one node in an autonomous state machine. When your context fills up, a supervisor will restart a fresh agent that inherits your state.

When you receive a context warning (⚠ Context used...), you MUST:
1. Finish your current immediate step
2. Output a HANDOFF as your final message following the format below

HANDOFF FORMAT — answer each question concisely:

{format}

RULES:
{rules}",
            format = HANDOFF_FORMAT,
            rules = HANDOFF_RULES,
        ),
    }
}

/// Build the prompt that seeds session `session_index` from its predecessor.
///
/// `handoff_source` is transport-agnostic: interactive mode passes the handoff
/// file path, streaming mode passes the captured text. A source that names an
/// existing readable file is resolved to its contents; anything else is used
/// verbatim. The one side effect is a repository read for the diff block.
pub fn build_continuation_prompt(session_index: u32, task: &str, handoff_source: &str) -> String {
    let handoff = resolve_handoff(handoff_source);

    let mut git_state = gitctx::diff_stat();
    if git_state.is_empty() {
        git_state = "(no git history)".to_string();
    }
    let git_status = gitctx::status_short();

    format!(
        r"You are session {index} of an autonomous state machine. You are resuming from session {prev}.

CRITICAL: You are AUTONOMOUS. Do NOT ask the human anything. Do NOT wait for confirmation. Read the handoff, understand the state, and EXECUTE immediately.

## Original Task
{task}

## Auto-recovered State (from git)
```
{git_state}
{git_status}
```

## Handoff from Previous Session
{handoff}

Read the handoff above carefully before doing anything.
- Q0 gives you project orientation
- Q1 tells you exactly where to start
- Q2 tells you what NOT to try — respect these, they were learned the hard way
- Q3 explains decisions that might look wrong but aren't
- Q4 flags risks you should verify early

Now execute. Do not ask questions. Do not wait for approval. Start working.",
        index = session_index,
        prev = session_index.saturating_sub(1),
        task = task,
        git_state = git_state,
        git_status = git_status,
        handoff = handoff,
    )
}

/// Resolve a handoff source: file contents when it names a readable file,
/// the literal string otherwise.
fn resolve_handoff(source: &str) -> String {
    match std::fs::read_to_string(source) {
        Ok(contents) => contents,
        Err(_) => source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_interactive_instructions_embed_path() {
        let path = PathBuf::from("/tmp/baton-handoff-abc123.md");
        let rendered =
            build_protocol_instructions(TransportKind::Interactive, Some(path.as_path()));

        assert!(rendered.contains("/tmp/baton-handoff-abc123.md"));
        assert!(rendered.contains("BATON RELAY PROTOCOL"));
        assert!(rendered.contains("Write tool"));
        for q in ["Q0:", "Q1:", "Q2:", "Q3:", "Q4:"] {
            assert!(rendered.contains(q), "missing handoff question {}", q);
        }
    }

    #[test]
    fn test_streaming_instructions_have_no_path() {
        let rendered = build_protocol_instructions(TransportKind::Streaming, None);

        assert!(rendered.contains("BATON RELAY PROTOCOL"));
        assert!(rendered.contains("AUTONOMOUS"));
        assert!(rendered.contains("Q0:"));
        assert!(!rendered.contains("BATON_HANDOFF_PATH"));
    }

    #[test]
    fn test_instructions_are_idempotent() {
        let path = PathBuf::from("/tmp/baton-handoff-xyz.md");
        let a = build_protocol_instructions(TransportKind::Interactive, Some(path.as_path()));
        let b = build_protocol_instructions(TransportKind::Interactive, Some(path.as_path()));
        assert_eq!(a, b);

        let a = build_protocol_instructions(TransportKind::Streaming, None);
        let b = build_protocol_instructions(TransportKind::Streaming, None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_continuation_embeds_ordinals_task_and_handoff() {
        let rendered = build_continuation_prompt(3, "Build a REST API", "handoff text here");

        assert!(rendered.contains("session 3"));
        assert!(rendered.contains("session 2"));
        assert!(rendered.contains("Build a REST API"));
        assert!(rendered.contains("handoff text here"));
        assert!(rendered.contains("AUTONOMOUS"));
    }

    #[test]
    fn test_continuation_resolves_file_source_to_contents() {
        let dir = tempfile::tempdir().unwrap();
        let handoff_file = dir.path().join("handoff.md");
        std::fs::write(&handoff_file, "## Q0: file-based handoff content").unwrap();

        let rendered =
            build_continuation_prompt(2, "my task", &handoff_file.to_string_lossy());

        assert!(rendered.contains("file-based handoff content"));
        assert!(!rendered.contains(&handoff_file.to_string_lossy().to_string()));
    }

    #[test]
    fn test_continuation_uses_raw_text_when_not_a_file() {
        let rendered = build_continuation_prompt(2, "my task", "raw handoff notes");
        assert!(rendered.contains("raw handoff notes"));
    }

    #[test]
    fn test_format_and_rules_shared_by_both_variants() {
        let interactive = build_protocol_instructions(
            TransportKind::Interactive,
            Some(Path::new("/tmp/h.md")),
        );
        let streaming = build_protocol_instructions(TransportKind::Streaming, None);

        for line in HANDOFF_RULES.lines() {
            assert!(interactive.contains(line));
            assert!(streaming.contains(line));
        }
        assert!(interactive.contains(HANDOFF_FORMAT));
        assert!(streaming.contains(HANDOFF_FORMAT));
    }
}
