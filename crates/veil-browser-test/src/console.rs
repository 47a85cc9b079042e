//! Console tail capture for failure diagnostics.
//!
//! The harness only ever looks at the console when a flow step has already
//! failed, so this is not a general console framework: it keeps a bounded
//! tail of warning- and error-level messages per page and can render them
//! as a text artifact. Log/info noise from the tested platform is dropped
//! at capture time.
//!
//! Shared via `Arc<Mutex<Vec<_>>>` rather than a channel: the tail is read
//! repeatedly and out of band, ordering must be preserved, and the volume
//! is tiny.

use chromiumoxide::cdp::js_protocol::runtime::{ConsoleApiCalledType, EventConsoleApiCalled};
use std::sync::{Arc, Mutex};

/// Maximum number of entries retained per page.
///
/// Old entries are discarded first; a failure report wants the recent tail,
/// not the session history.
const MAX_ENTRIES: usize = 64;

/// One captured console message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleEntry {
    /// True for `console.error`, false for `console.warn`.
    pub is_error: bool,

    /// The formatted message text. Multiple arguments are joined with spaces.
    pub text: String,

    /// Source location if available ("app.js:42:10").
    pub source: Option<String>,
}

/// Bounded, thread-safe tail of warning/error console messages.
///
/// Cheaply cloneable; one clone lives in the page's CDP event listener task
/// and another in the page itself for diagnostics to read.
#[derive(Debug, Clone, Default)]
pub struct ConsoleTail {
    entries: Arc<Mutex<Vec<ConsoleEntry>>>,
}

impl ConsoleTail {
    /// Creates a new, empty tail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event if it is warning- or error-level.
    ///
    /// Called from the CDP listener task. A poisoned mutex means a test
    /// already panicked while holding the lock; dropping the entry is fine,
    /// the panic is the failure that matters.
    pub(crate) fn observe(&self, event: &EventConsoleApiCalled) {
        let is_error = match event.r#type {
            ConsoleApiCalledType::Error => true,
            ConsoleApiCalledType::Warning => false,
            _ => return,
        };

        let text = event
            .args
            .iter()
            .map(|arg| {
                arg.value
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .unwrap_or("<object>")
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join(" ");

        let source = event.stack_trace.as_ref().and_then(|stack| {
            stack.call_frames.first().map(|frame| {
                format!("{}:{}:{}", frame.url, frame.line_number, frame.column_number)
            })
        });

        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() == MAX_ENTRIES {
                entries.remove(0);
            }
            entries.push(ConsoleEntry {
                is_error,
                text,
                source,
            });
        }
    }

    /// Returns a snapshot of the captured tail.
    #[must_use]
    pub fn entries(&self) -> Vec<ConsoleEntry> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Returns true if any error-level message was captured.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .any(|e| e.is_error)
    }

    /// Renders the tail as plain text for attachment to a failure report.
    ///
    /// Empty string when nothing was captured, so callers can skip writing
    /// an empty artifact.
    #[must_use]
    pub fn render(&self) -> String {
        let entries = self.entries();
        let mut out = String::new();
        for entry in entries {
            let level = if entry.is_error { "ERROR" } else { "WARN " };
            out.push_str(level);
            out.push(' ');
            out.push_str(&entry.text);
            if let Some(source) = &entry.source {
                out.push_str(" (");
                out.push_str(source);
                out.push(')');
            }
            out.push('\n');
        }
        out
    }

    /// Clears the tail, e.g. between flow steps that reuse a page.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    #[cfg(test)]
    fn push_raw(&self, entry: ConsoleEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() == MAX_ENTRIES {
                entries.remove(0);
            }
            entries.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(is_error: bool, text: &str) -> ConsoleEntry {
        ConsoleEntry {
            is_error,
            text: text.to_string(),
            source: None,
        }
    }

    #[test]
    fn render_formats_levels_and_sources() {
        let tail = ConsoleTail::new();
        tail.push_raw(entry(false, "slow asset"));
        tail.push_raw(ConsoleEntry {
            is_error: true,
            text: "decryption failed".into(),
            source: Some("popup.js:10:2".into()),
        });

        let rendered = tail.render();
        assert!(rendered.contains("WARN  slow asset"));
        assert!(rendered.contains("ERROR decryption failed (popup.js:10:2)"));
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let tail = ConsoleTail::new();
        tail.push_raw(entry(false, "warn only"));
        assert!(!tail.has_errors());

        tail.push_raw(entry(true, "boom"));
        assert!(tail.has_errors());
    }

    #[test]
    fn tail_is_bounded() {
        let tail = ConsoleTail::new();
        for i in 0..(MAX_ENTRIES + 10) {
            tail.push_raw(entry(false, &format!("msg {i}")));
        }

        let entries = tail.entries();
        assert_eq!(entries.len(), MAX_ENTRIES);
        assert_eq!(entries[0].text, "msg 10", "oldest entries discarded first");
    }

    #[test]
    fn clear_empties_the_tail() {
        let tail = ConsoleTail::new();
        tail.push_raw(entry(true, "boom"));
        tail.clear();
        assert!(tail.entries().is_empty());
        assert!(tail.render().is_empty());
    }
}
