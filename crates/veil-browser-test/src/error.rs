//! Error types for browser-level operations.
//!
//! These are the failure modes of the session/page layer: launch problems,
//! navigation failures, timed-out waits, script and input dispatch errors.
//! Flow-level errors (window roles, OAuth steps) live in the harness crate
//! and wrap these.

use std::time::Duration;
use thiserror::Error;

/// The main error type for browser session and page operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to launch the browser process.
    ///
    /// Chrome missing, extension path invalid, or the profile directory
    /// could not be created. Fatal and non-retryable by design: a session
    /// that cannot start is a setup error, not a flaky step.
    #[error("failed to launch browser: {reason}")]
    LaunchFailed {
        /// Human-readable reason for the launch failure
        reason: String,
        /// Optional underlying error that caused the failure
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Failed to establish or keep the CDP connection.
    #[error("CDP connection failed: {0}")]
    ConnectionFailed(String),

    /// Navigation to a URL failed or timed out.
    #[error("navigation to '{url}' failed: {reason}")]
    NavigationFailed {
        /// The URL that failed to load
        url: String,
        /// Reason for the navigation failure
        reason: String,
    },

    /// A wait condition was not satisfied within the timeout.
    #[error("wait condition '{condition}' timed out after {timeout:?}")]
    WaitTimeout {
        /// Description of the condition that timed out
        condition: String,
        /// How long we waited before timing out
        timeout: Duration,
    },

    /// JavaScript execution in the page context failed.
    #[error("JavaScript execution failed: {0}")]
    ScriptExecutionFailed(String),

    /// A DOM element required by the harness was not found.
    #[error("element '{selector}' not found: {reason}")]
    ElementNotFound {
        /// CSS selector that failed to match
        selector: String,
        /// Underlying reason
        reason: String,
    },

    /// A trusted input event could not be dispatched.
    #[error("input dispatch failed: {0}")]
    InputDispatch(String),

    /// No open target matches the given window handle.
    ///
    /// The window closed between snapshot and use. The harness treats this
    /// as fatal for the flow run, never as retryable.
    #[error("no open window for handle {handle}")]
    TargetGone {
        /// The stale handle, for the failure message
        handle: String,
    },

    /// An operation was attempted on a closed session.
    #[error("browser session is already closed")]
    AlreadyClosed,

    /// Wraps errors from the chromiumoxide library.
    #[error("chromiumoxide error: {0}")]
    ChromiumOxide(#[from] chromiumoxide::error::CdpError),

    /// Generic I/O errors (profile dir creation, artifact writes).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for browser operations.
pub type Result<T> = std::result::Result<T, BrowserError>;
