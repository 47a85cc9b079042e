//! Window registry: logical roles mapped to live window handles.
//!
//! The flow juggles up to three windows: the tested platform page, the
//! extension surface, and (transiently) the OAuth consent popup. The
//! registry names them by role so flow code never passes raw handles
//! around, and enforces single-writer semantics: a role is re-mapped only
//! through the explicit `replace` path, never by a silent second
//! `register`.
//!
//! Because the engine exposes window existence only as a snapshot list,
//! new-window detection diffs a captured "before" snapshot against the
//! live list in a bounded attempt-counted poll.

use crate::config::Timings;
use crate::error::{FlowError, FlowResult};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;
use veil_browser_test::{ExtensionSession, WindowHandle, poll_attempts};

/// Logical role of a window within one flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowRole {
    /// The supported platform page (the site the extension augments).
    Platform,
    /// The extension's own UI document.
    Surface,
    /// The third-party OAuth consent popup (exists only during
    /// authentication).
    Oauth,
}

impl fmt::Display for WindowRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WindowRole::Platform => "platform",
            WindowRole::Surface => "extension-surface",
            WindowRole::Oauth => "oauth",
        };
        f.write_str(name)
    }
}

/// Role → handle map, owned exclusively by one orchestrator run.
#[derive(Debug, Default)]
pub struct WindowRegistry {
    map: HashMap<WindowRole, WindowHandle>,
}

impl WindowRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a role to a handle.
    ///
    /// # Errors
    ///
    /// `RoleOccupied` when the role already holds a handle; re-mapping
    /// must go through [`WindowRegistry::replace`] so the caller
    /// acknowledges the prior window is closing.
    pub fn register(&mut self, role: WindowRole, handle: WindowHandle) -> FlowResult<()> {
        if self.map.contains_key(&role) {
            return Err(FlowError::RoleOccupied { role });
        }
        debug!(%role, %handle, "window registered");
        self.map.insert(role, handle);
        Ok(())
    }

    /// Re-maps a role, returning the prior handle.
    ///
    /// The explicit-acknowledgement path: callers use this when the prior
    /// window is known to be closing (e.g. reopening the surface).
    pub fn replace(&mut self, role: WindowRole, handle: WindowHandle) -> Option<WindowHandle> {
        debug!(%role, %handle, "window replaced");
        self.map.insert(role, handle)
    }

    /// Resolves a role to its live handle.
    ///
    /// # Errors
    ///
    /// `UnknownRole` when no handle is mapped, a programming error in the
    /// flow, not a browser condition.
    pub fn resolve(&self, role: WindowRole) -> FlowResult<&WindowHandle> {
        self.map.get(&role).ok_or(FlowError::UnknownRole { role })
    }

    /// Drops a role's mapping, returning the handle if one was present.
    pub fn forget(&mut self, role: WindowRole) -> Option<WindowHandle> {
        let prior = self.map.remove(&role);
        if prior.is_some() {
            debug!(%role, "window forgotten");
        }
        prior
    }

    /// True when the role currently holds a handle.
    #[must_use]
    pub fn contains(&self, role: WindowRole) -> bool {
        self.map.contains_key(&role)
    }
}

/// Waits for a window that is not in the `before` snapshot to appear.
///
/// Re-snapshots the live handle list at a fixed interval for a fixed
/// number of attempts and returns the first handle in the set difference.
/// Inherently racy: a window can appear and close within one interval,
/// which is accepted: the snapshot list is the only existence signal the
/// engine exposes.
///
/// # Errors
///
/// `WindowNotFound` when every attempt comes back empty.
pub async fn wait_for_new_window(
    session: &ExtensionSession,
    before: &[WindowHandle],
    timings: &Timings,
) -> FlowResult<WindowHandle> {
    let attempts = timings.window_poll_attempts;

    let found = poll_attempts(attempts, timings.window_poll_interval(), || async {
        match session.windows().await {
            Ok(live) => live.into_iter().find(|handle| !before.contains(handle)),
            // Transient enumeration failures count as "not yet"; the
            // attempt budget still bounds the wait.
            Err(_) => None,
        }
    })
    .await;

    found.ok_or(FlowError::WindowNotFound { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: &str) -> WindowHandle {
        WindowHandle::from_raw(id)
    }

    #[test]
    fn register_then_resolve_round_trips() {
        let mut registry = WindowRegistry::new();
        registry
            .register(WindowRole::Platform, handle("t-1"))
            .expect("register");

        assert_eq!(
            registry.resolve(WindowRole::Platform).expect("resolve"),
            &handle("t-1")
        );
    }

    #[test]
    fn register_refuses_silent_overwrite() {
        let mut registry = WindowRegistry::new();
        registry
            .register(WindowRole::Surface, handle("t-1"))
            .expect("register");

        let err = registry
            .register(WindowRole::Surface, handle("t-2"))
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::RoleOccupied {
                role: WindowRole::Surface
            }
        ));

        // The original mapping is untouched.
        assert_eq!(
            registry.resolve(WindowRole::Surface).expect("resolve"),
            &handle("t-1")
        );
    }

    #[test]
    fn replace_returns_the_prior_handle() {
        let mut registry = WindowRegistry::new();
        registry
            .register(WindowRole::Surface, handle("t-1"))
            .expect("register");

        let prior = registry.replace(WindowRole::Surface, handle("t-2"));
        assert_eq!(prior, Some(handle("t-1")));
        assert_eq!(
            registry.resolve(WindowRole::Surface).expect("resolve"),
            &handle("t-2")
        );
    }

    #[test]
    fn resolve_after_forget_is_unknown_role() {
        let mut registry = WindowRegistry::new();
        registry
            .register(WindowRole::Oauth, handle("t-1"))
            .expect("register");

        assert_eq!(registry.forget(WindowRole::Oauth), Some(handle("t-1")));

        let err = registry.resolve(WindowRole::Oauth).unwrap_err();
        assert!(matches!(
            err,
            FlowError::UnknownRole {
                role: WindowRole::Oauth
            }
        ));
    }

    #[test]
    fn register_succeeds_again_after_forget() {
        // The consent window's lifecycle: detected, registered, closed,
        // forgotten. A later run's register must not need replace.
        let mut registry = WindowRegistry::new();
        registry
            .register(WindowRole::Oauth, handle("t-1"))
            .expect("first register");
        registry.forget(WindowRole::Oauth);

        registry
            .register(WindowRole::Oauth, handle("t-2"))
            .expect("register after forget");
        assert_eq!(
            registry.resolve(WindowRole::Oauth).expect("resolve"),
            &handle("t-2")
        );
    }

    #[test]
    fn forget_on_empty_role_is_none() {
        let mut registry = WindowRegistry::new();
        assert_eq!(registry.forget(WindowRole::Platform), None);
    }

    #[test]
    fn roles_display_their_wire_names() {
        assert_eq!(WindowRole::Platform.to_string(), "platform");
        assert_eq!(WindowRole::Surface.to_string(), "extension-surface");
        assert_eq!(WindowRole::Oauth.to_string(), "oauth");
    }
}
