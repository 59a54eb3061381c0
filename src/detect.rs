//! Session signal detection
//!
//! Classifies the terminal state of a running interactive session by polling
//! two independent conditions: a handoff file at the pre-registered path, and
//! an idle shell prompt in the rendered screen tail. Each condition must hold
//! twice in a row, separated by a settle delay, to reject transient false
//! positives. The handoff check runs first on every tick so a late-arriving
//! file is not shadowed by a simultaneous idle prompt.
//!
//! Screen content arrives through the [`ScreenSource`] trait, so a future
//! transport with a real completion callback can replace the polling without
//! touching the supervisor.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

/// Idle shell prompt: a trailing `%` (zsh) or `$` (bash) with only
/// whitespace after it. Mid-line occurrences do not match.
static SHELL_PROMPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[%$]\s*$").expect("shell prompt regex is valid"));

/// Raw signal observed by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Handoff file confirmed at the registered path
    Handoff,
    /// Idle shell prompt confirmed — the agent has exited
    Exited,
    /// Deadline elapsed with neither condition confirmed
    TimedOut,
}

/// Something that can capture the rendered tail of a terminal surface.
///
/// `capture_tail` returns the last `lines` non-empty rendered lines, or
/// `None` on a capture failure (treated as "condition not met").
#[async_trait]
pub trait ScreenSource: Send + Sync {
    async fn capture_tail(&self, lines: usize) -> Option<String>;
}

/// Does the rendered tail end at an idle shell prompt?
pub fn is_idle_prompt(tail: &str) -> bool {
    SHELL_PROMPT_RE.is_match(tail)
}

/// Map one poll observation to a signal, if any.
///
/// Total over all inputs; a confirmed handoff takes precedence over a
/// confirmed idle prompt, which takes precedence over deadline expiry.
/// `None` means keep polling.
pub fn classify(handoff_present: bool, idle: bool, expired: bool) -> Option<Signal> {
    if handoff_present {
        Some(Signal::Handoff)
    } else if idle {
        Some(Signal::Exited)
    } else if expired {
        Some(Signal::TimedOut)
    } else {
        None
    }
}

/// Poll pacing for the detector
#[derive(Debug, Clone, Copy)]
pub struct DetectorTiming {
    /// Delay before the first check, letting the agent start processing
    pub grace: Duration,
    /// Interval between polls
    pub poll_interval: Duration,
    /// Delay between the two confirmations of a condition
    pub settle: Duration,
    /// Rendered lines inspected for the idle prompt
    pub tail_lines: usize,
}

impl Default for DetectorTiming {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            poll_interval: Duration::from_secs(2),
            settle: Duration::from_secs(2),
            tail_lines: 3,
        }
    }
}

/// Polling signal detector for one interactive session
pub struct SignalDetector<'a, S: ScreenSource> {
    screen: &'a S,
    handoff_path: PathBuf,
    timing: DetectorTiming,
}

impl<'a, S: ScreenSource> SignalDetector<'a, S> {
    pub fn new(screen: &'a S, handoff_path: &Path, timing: DetectorTiming) -> Self {
        Self {
            screen,
            handoff_path: handoff_path.to_path_buf(),
            timing,
        }
    }

    /// Block until the session produces exactly one signal.
    ///
    /// `timeout` is an advisory wall-clock deadline inside the loop, not a
    /// preemptive cancellation — on [`Signal::TimedOut`] the agent process may
    /// still be running and the caller must stop it. `None` waits forever.
    pub async fn wait(&self, timeout: Option<Duration>) -> Signal {
        // The grace period counts against the deadline, so the configured
        // timeout bounds the whole wait.
        let deadline = timeout.map(|t| Instant::now() + t);
        sleep(self.timing.grace).await;

        loop {
            // Handoff file first, so it is never shadowed by an idle prompt
            // appearing in the same poll window.
            if self.handoff_confirmed().await {
                debug!("Handoff file confirmed at {}", self.handoff_path.display());
                return Signal::Handoff;
            }

            if self.idle_confirmed().await {
                debug!("Idle shell prompt confirmed");
                return Signal::Exited;
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Signal::TimedOut;
                }
            }

            sleep(self.timing.poll_interval).await;
        }
    }

    async fn handoff_confirmed(&self) -> bool {
        if !self.handoff_path.exists() {
            return false;
        }
        sleep(self.timing.settle).await;
        self.handoff_path.exists()
    }

    async fn idle_confirmed(&self) -> bool {
        if !self.idle_now().await {
            return false;
        }
        sleep(self.timing.settle).await;
        self.idle_now().await
    }

    async fn idle_now(&self) -> bool {
        match self.screen.capture_tail(self.timing.tail_lines).await {
            Some(tail) => is_idle_prompt(&tail),
            None => {
                // Capture failures count as "condition not met"; retry on the
                // next tick rather than surfacing an error.
                trace!("Screen capture failed, treating as not idle");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_prompt_matches() {
        let cases = [
            ("user@host ~ %", true),
            ("user@host ~ % ", true),
            ("user@host:~$", true),
            ("user@host:~$ ", true),
            ("%", true),
            ("$", true),
            ("echo $HOME", false),
            ("100% done", false),
            ("", false),
            ("user@host:~", false),
            ("some output\nmore output\nuser@host ~ % ", true),
        ];
        for (input, want) in cases {
            assert_eq!(is_idle_prompt(input), want, "input: {:?}", input);
        }
    }

    #[test]
    fn test_classify_is_total_with_handoff_precedence() {
        for handoff in [false, true] {
            for idle in [false, true] {
                for expired in [false, true] {
                    let got = classify(handoff, idle, expired);
                    let want = if handoff {
                        Some(Signal::Handoff)
                    } else if idle {
                        Some(Signal::Exited)
                    } else if expired {
                        Some(Signal::TimedOut)
                    } else {
                        None
                    };
                    assert_eq!(got, want, "({}, {}, {})", handoff, idle, expired);
                }
            }
        }
    }

    struct FixedScreen {
        tail: Option<String>,
    }

    #[async_trait]
    impl ScreenSource for FixedScreen {
        async fn capture_tail(&self, _lines: usize) -> Option<String> {
            self.tail.clone()
        }
    }

    fn fast_timing() -> DetectorTiming {
        DetectorTiming {
            grace: Duration::from_millis(1),
            poll_interval: Duration::from_millis(5),
            settle: Duration::from_millis(1),
            tail_lines: 3,
        }
    }

    #[tokio::test]
    async fn test_wait_detects_handoff_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.md");
        std::fs::write(&path, "## Q0: state").unwrap();

        let screen = FixedScreen { tail: None };
        let detector = SignalDetector::new(&screen, &path, fast_timing());

        let signal = detector.wait(Some(Duration::from_secs(1))).await;
        assert_eq!(signal, Signal::Handoff);
    }

    #[tokio::test]
    async fn test_wait_detects_idle_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.md");

        let screen = FixedScreen {
            tail: Some("user@host ~ % ".to_string()),
        };
        let detector = SignalDetector::new(&screen, &path, fast_timing());

        let signal = detector.wait(Some(Duration::from_secs(1))).await;
        assert_eq!(signal, Signal::Exited);
    }

    #[tokio::test]
    async fn test_wait_handoff_beats_idle_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.md");
        std::fs::write(&path, "## Q0: state").unwrap();

        let screen = FixedScreen {
            tail: Some("user@host ~ % ".to_string()),
        };
        let detector = SignalDetector::new(&screen, &path, fast_timing());

        let signal = detector.wait(Some(Duration::from_secs(1))).await;
        assert_eq!(signal, Signal::Handoff);
    }

    #[tokio::test]
    async fn test_wait_times_out_when_no_signal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.md");

        let screen = FixedScreen {
            tail: Some("claude is thinking...".to_string()),
        };
        let detector = SignalDetector::new(&screen, &path, fast_timing());

        let signal = detector.wait(Some(Duration::from_millis(20))).await;
        assert_eq!(signal, Signal::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_counts_against_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.md");

        let screen = FixedScreen { tail: None };
        let timing = DetectorTiming {
            grace: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            settle: Duration::from_secs(1),
            tail_lines: 3,
        };
        let detector = SignalDetector::new(&screen, &path, timing);

        // Timeout shorter than the grace period: the wait must end right
        // after the grace sleep, not at grace + timeout.
        let started = Instant::now();
        let signal = detector.wait(Some(Duration::from_secs(2))).await;
        assert_eq!(signal, Signal::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_capture_failure_is_not_idle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.md");

        let screen = FixedScreen { tail: None };
        let detector = SignalDetector::new(&screen, &path, fast_timing());

        let signal = detector.wait(Some(Duration::from_millis(20))).await;
        assert_eq!(signal, Signal::TimedOut);
    }
}
