//! Per-invocation execution context and progress log.
//!
//! Every `call_tool` invocation owns exactly one [`ExecutionContext`]. It is
//! created when the invocation begins, threaded *explicitly by parameter*
//! through the dispatch/orchestration chain, and dropped when the invocation
//! ends. There is no ambient "current context" lookup — concurrent
//! invocations stay fully isolated and the log is trivially testable.
//!
//! The progress log is append-only. At the end of an invocation the façade
//! renders it via [`ExecutionContext::progress_summary`] and prepends it to
//! the final answer so the caller gets an audit trail of what the
//! orchestration actually did.

use uuid::Uuid;

/// Delimiters wrapped around the rendered progress log.
const SUMMARY_HEADER: &str = "\n\n--- Progress Log ---\n";
const SUMMARY_FOOTER: &str = "\n--- End Progress Log ---\n\n";

/// Scratch state for a single tool invocation.
pub struct ExecutionContext {
    /// Opaque invocation handle, useful for correlating log lines.
    id: Uuid,
    /// Human-readable progress lines in recording order.
    progress: Vec<String>,
}

impl ExecutionContext {
    /// Create a fresh context for one invocation.
    pub fn new() -> Self {
        ExecutionContext {
            id: Uuid::new_v4(),
            progress: Vec::new(),
        }
    }

    /// The opaque invocation id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Append one progress line.
    pub fn record(&mut self, line: impl Into<String>) {
        let line = line.into();
        log::debug!("[{}] {}", self.id, line);
        self.progress.push(line);
    }

    /// Number of lines recorded so far.
    pub fn len(&self) -> usize {
        self.progress.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.progress.is_empty()
    }

    /// Render all recorded lines between fixed delimiter markers, or an
    /// empty string when nothing was recorded.
    pub fn progress_summary(&self) -> String {
        if self.progress.is_empty() {
            return String::new();
        }
        format!(
            "{}{}{}",
            SUMMARY_HEADER,
            self.progress.join("\n"),
            SUMMARY_FOOTER
        )
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summary_is_empty_string() {
        let ctx = ExecutionContext::new();
        assert!(ctx.is_empty());
        assert_eq!(ctx.progress_summary(), "");
    }

    #[test]
    fn test_summary_preserves_recording_order() {
        let mut ctx = ExecutionContext::new();
        ctx.record("first");
        ctx.record("second");
        ctx.record("third");

        let summary = ctx.progress_summary();
        assert!(summary.starts_with("\n\n--- Progress Log ---\n"));
        assert!(summary.ends_with("\n--- End Progress Log ---\n\n"));

        let first = summary.find("first").unwrap();
        let second = summary.find("second").unwrap();
        let third = summary.find("third").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_contexts_are_independent() {
        let mut a = ExecutionContext::new();
        let b = ExecutionContext::new();
        a.record("only in a");

        assert_ne!(a.id(), b.id());
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }
}
