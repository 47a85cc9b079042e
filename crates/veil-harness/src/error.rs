//! Flow-level error taxonomy.
//!
//! Five failure classes, per the propagation policy: setup errors (fatal,
//! no retry), timeouts (fatal for the run, preceded by diagnostic
//! capture), missing windows, unknown registry roles (programming errors),
//! and assertion failures (reported as test failures, never swallowed).
//! Nothing in the orchestrator retries automatically; every failure names
//! the step it happened in so flakiness is diagnosable rather than opaque.

use crate::registry::WindowRole;
use thiserror::Error;
use veil_browser_test::BrowserError;

/// The error type for orchestrator and sub-flow operations.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Environment or configuration problem, fatal before the flow even
    /// touches a window (missing credentials, unset extension id).
    #[error("setup error: {0}")]
    Setup(String),

    /// Configuration extraction failed.
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// An expected new window never appeared within the bounded poll.
    #[error("expected new window did not appear within {attempts} poll attempts")]
    WindowNotFound {
        /// How many snapshot-difference attempts were made
        attempts: u32,
    },

    /// A registry lookup for a role that holds no handle.
    ///
    /// This is a programming error in the flow, not a browser condition.
    #[error("no window registered for role '{role}'")]
    UnknownRole {
        /// The role that was resolved
        role: WindowRole,
    },

    /// `register` for a role that already holds a live handle.
    ///
    /// Replacing a mapping requires the explicit `replace` path so a
    /// still-open window is never silently orphaned.
    #[error("role '{role}' already holds a window handle (use replace)")]
    RoleOccupied {
        /// The occupied role
        role: WindowRole,
    },

    /// A flow-state transition that skips ahead or moves backward.
    #[error("illegal flow transition: {from} → {to}")]
    IllegalTransition {
        /// Current state
        from: &'static str,
        /// Requested state
        to: &'static str,
    },

    /// Observed state does not match the expected post-condition.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// A named orchestrator step failed.
    ///
    /// Wraps the underlying error so reports show both which step broke
    /// and why.
    #[error("mandatory flow step '{step}' failed: {source}")]
    Step {
        /// The step name (matches the diagnostic artifact label)
        step: &'static str,
        /// What went wrong inside the step
        #[source]
        source: Box<FlowError>,
    },

    /// Browser-level failure (launch, navigation, element wait, input).
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl From<figment::Error> for FlowError {
    fn from(err: figment::Error) -> Self {
        FlowError::Config(Box::new(err))
    }
}

impl FlowError {
    /// True when this error (or the step error it wraps) is a bounded wait
    /// that ran out of time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            FlowError::Browser(BrowserError::WaitTimeout { .. }) => true,
            FlowError::Step { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// A specialized Result type for flow operations.
pub type FlowResult<T> = std::result::Result<T, FlowError>;
