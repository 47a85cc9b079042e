//! Extension session lifecycle: one Chrome process, one isolated profile,
//! one loaded extension.
//!
//! `ExtensionSession` is the session factory from the harness point of
//! view: it launches Chrome with the unpacked extension preloaded, hands
//! out pages, and enumerates open windows as opaque handles. Sessions are
//! destroyed at test teardown; `Drop` kills the process if a test panics
//! before explicit `close()`.
//!
//! Two launch decisions are load-bearing:
//!
//! - Headful only. Chrome does not load unpacked extensions in headless
//!   mode, so unlike an ordinary page-test browser there is no headless
//!   switch to flip.
//! - Automation countermeasures are always on. Identity providers refuse
//!   to render a sign-in form inside a browser that advertises itself as
//!   automated, and the OAuth sub-flow depends on that form appearing.

use crate::error::{BrowserError, Result};
use crate::page::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use futures::StreamExt;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Opaque identifier for one browsing context (tab or popup) within a
/// session.
///
/// Wraps the CDP target id. Handles are never reused after their context
/// closes; resolving a stale handle fails with `TargetGone`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowHandle(TargetId);

impl WindowHandle {
    pub(crate) fn new(id: TargetId) -> Self {
        Self(id)
    }

    /// Builds a handle from a raw target id string.
    ///
    /// Sessions are the normal source of handles; this constructor exists
    /// for registry tests and external tooling that record ids.
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(TargetId::new(id.into()))
    }

    pub(crate) fn target_id(&self) -> &TargetId {
        &self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.inner())
    }
}

/// Configuration for launching an extension session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Path to the unpacked extension directory (the built `dist/`).
    pub extension_dir: PathBuf,

    /// Profile directory. `None` creates a fresh isolated directory under
    /// the system temp dir; pass a fixed path to persist credentials and
    /// storage across sessions (used by persistence tests).
    pub profile_dir: Option<PathBuf>,

    /// Browser window size (default: 1920x1080).
    pub window_size: (u32, u32),

    /// Additional Chrome arguments.
    pub args: Vec<String>,

    /// Chrome executable path (`None` = auto-detect).
    pub chrome_path: Option<String>,
}

impl SessionConfig {
    /// Creates a config for the given unpacked extension directory.
    #[must_use]
    pub fn new(extension_dir: impl Into<PathBuf>) -> Self {
        Self {
            extension_dir: extension_dir.into(),
            profile_dir: None,
            window_size: (1920, 1080),
            args: Vec::new(),
            chrome_path: None,
        }
    }

    /// Uses a persistent profile directory instead of a throwaway one.
    #[must_use]
    pub fn with_profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = Some(dir.into());
        self
    }

    /// Sets a custom window size.
    #[must_use]
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }

    /// Adds additional Chrome arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args.extend(args);
        self
    }

    /// Sets an explicit Chrome executable.
    #[must_use]
    pub fn with_chrome_path(mut self, path: impl Into<String>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    /// Resolves the profile directory, creating it if needed.
    fn resolve_profile_dir(&self) -> Result<PathBuf> {
        let dir = match &self.profile_dir {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir().join(format!("veil-e2e-{}", uuid::Uuid::new_v4())),
        };
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Converts to a chromiumoxide `BrowserConfig`.
    ///
    /// `profile_dir` is resolved once by the caller so the session records
    /// the same directory Chrome actually uses.
    fn to_browser_config(&self, profile_dir: &std::path::Path) -> Result<BrowserConfig> {
        if !self.extension_dir.is_dir() {
            return Err(BrowserError::LaunchFailed {
                reason: format!(
                    "extension directory not found: {} (build the extension first)",
                    self.extension_dir.display()
                ),
                source: None,
            });
        }

        let extension = self.extension_dir.display();

        // Headful: unpacked extensions do not load in headless Chrome.
        let mut config = BrowserConfig::builder().with_head();

        config = config
            .arg(format!("--load-extension={extension}"))
            .arg(format!("--disable-extensions-except={extension}"))
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg(format!(
                "--window-size={},{}",
                self.window_size.0, self.window_size.1
            ))
            // Identity providers gate their sign-in form on these.
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-dev-shm-usage");

        for arg in &self.args {
            config = config.arg(arg.clone());
        }

        if let Some(path) = &self.chrome_path {
            config = config.chrome_executable(path.clone());
        }

        config.build().map_err(|e| BrowserError::LaunchFailed {
            reason: format!("invalid browser configuration: {e}"),
            source: None,
        })
    }
}

/// One isolated browser process with the extension installed.
///
/// Owns every window opened during its lifetime. One in-flight orchestrator
/// run per session; concurrent runs against the same session are
/// unsupported.
///
/// Prefer explicit `close()` at teardown; `Drop` is the panic safety net.
pub struct ExtensionSession {
    inner: Arc<Mutex<Option<Browser>>>,
    profile_dir: PathBuf,
}

impl ExtensionSession {
    /// Launches Chrome with the extension preloaded.
    ///
    /// # Errors
    ///
    /// `LaunchFailed` when the extension directory is missing, the profile
    /// directory cannot be created, or Chrome fails to start. These are
    /// fatal setup errors; callers must not retry.
    pub async fn launch(config: SessionConfig) -> Result<Self> {
        let profile_dir = config.resolve_profile_dir()?;
        debug!(
            extension = %config.extension_dir.display(),
            profile = %profile_dir.display(),
            "launching extension session"
        );

        let browser_config = config.to_browser_config(&profile_dir)?;

        let (browser, mut handler) =
            Browser::launch(browser_config)
                .await
                .map_err(|e| BrowserError::LaunchFailed {
                    reason: "failed to launch Chrome process".to_string(),
                    source: Some(Box::new(e)),
                })?;

        // Drive the CDP event loop for the lifetime of the session.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("browser handler error: {}", e);
                }
            }
        });

        debug!("extension session launched");

        Ok(Self {
            inner: Arc::new(Mutex::new(Some(browser))),
            profile_dir,
        })
    }

    /// The profile directory this session stores its state in.
    #[must_use]
    pub fn profile_dir(&self) -> &PathBuf {
        &self.profile_dir
    }

    /// Opens a new blank page (tab) in the session.
    ///
    /// # Errors
    ///
    /// `AlreadyClosed` if the session was closed.
    pub async fn new_page(&self) -> Result<Page> {
        let guard = self.inner.lock().await;
        let browser = guard.as_ref().ok_or(BrowserError::AlreadyClosed)?;

        let chrome_page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;

        Ok(Page::new(chrome_page))
    }

    /// Snapshot of the currently open windows.
    ///
    /// The engine exposes window existence only as this snapshot list;
    /// new-window detection is done by diffing two snapshots, never by
    /// waiting for an event.
    ///
    /// # Errors
    ///
    /// `AlreadyClosed` if the session was closed.
    pub async fn windows(&self) -> Result<Vec<WindowHandle>> {
        let guard = self.inner.lock().await;
        let browser = guard.as_ref().ok_or(BrowserError::AlreadyClosed)?;

        let pages = browser
            .pages()
            .await
            .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;

        Ok(pages
            .iter()
            .map(|p| WindowHandle::new(p.target_id().clone()))
            .collect())
    }

    /// Resolves a window handle back to a controllable page.
    ///
    /// # Errors
    ///
    /// `TargetGone` when no open window matches the handle; the context
    /// closed since the handle was captured. This is fatal for the flow
    /// run, not retryable.
    pub async fn page_for(&self, handle: &WindowHandle) -> Result<Page> {
        let guard = self.inner.lock().await;
        let browser = guard.as_ref().ok_or(BrowserError::AlreadyClosed)?;

        let pages = browser
            .pages()
            .await
            .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;

        for page in pages {
            if page.target_id() == handle.target_id() {
                return Ok(Page::new(page));
            }
        }

        Err(BrowserError::TargetGone {
            handle: handle.to_string(),
        })
    }

    /// Closes the session and kills the Chrome process.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser fails to close gracefully.
    pub async fn close(self) -> Result<()> {
        let mut guard = self.inner.lock().await;

        if let Some(mut browser) = guard.take() {
            debug!("closing extension session");
            browser
                .close()
                .await
                .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;
        }

        Ok(())
    }

    /// Returns true if the session has been closed.
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

impl Drop for ExtensionSession {
    fn drop(&mut self) {
        // Can't await in Drop; chromiumoxide's Browser::drop kills the
        // process when the inner Option still holds it. Normal teardown
        // goes through close(), which leaves the Option empty.
        if let Ok(guard) = self.inner.try_lock() {
            if guard.is_some() {
                warn!("session dropped without explicit close(), Chrome killed via Drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_extension_dir_is_a_launch_failure() {
        let config = SessionConfig::new("/definitely/not/a/real/extension");
        let profile = std::env::temp_dir();
        let err = config.to_browser_config(&profile).unwrap_err();

        match err {
            BrowserError::LaunchFailed { reason, .. } => {
                assert!(reason.contains("extension directory not found"));
            }
            other => panic!("expected LaunchFailed, got {other:?}"),
        }
    }

    #[test]
    fn default_profile_dir_is_unique_per_resolution() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = SessionConfig::new(dir.path());

        let first = config.resolve_profile_dir().expect("resolve");
        let second = config.resolve_profile_dir().expect("resolve");
        assert_ne!(first, second, "throwaway profiles must not collide");
    }

    #[test]
    fn explicit_profile_dir_is_stable() {
        let ext = tempfile::tempdir().expect("tempdir");
        let profile = tempfile::tempdir().expect("tempdir");
        let config = SessionConfig::new(ext.path()).with_profile_dir(profile.path());

        let first = config.resolve_profile_dir().expect("resolve");
        let second = config.resolve_profile_dir().expect("resolve");
        assert_eq!(first, second);
        assert_eq!(first, profile.path());
    }

    #[tokio::test]
    #[ignore] // Requires Chrome and a built extension
    async fn session_launch_and_close() {
        let ext = std::env::var("VEIL_E2E_EXTENSION_DIR").expect("extension dir env");
        let session = ExtensionSession::launch(SessionConfig::new(ext))
            .await
            .expect("failed to launch session");

        assert!(!session.is_closed().await);
        assert!(!session.windows().await.expect("windows").is_empty());

        session.close().await.expect("failed to close session");
    }
}
