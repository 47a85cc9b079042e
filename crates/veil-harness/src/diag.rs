//! Failure diagnostics: screenshots and console tails written next to
//! each other under the artifact directory.
//!
//! Capture is best effort. A flow that is already failing must never be
//! masked by a second failure while collecting evidence, so every error
//! in here is downgraded to a warning.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use veil_browser_test::{ExtensionSession, Page};

/// Writes failure artifacts for a flow run.
pub struct Diagnostics {
    dir: PathBuf,
}

impl Diagnostics {
    /// Creates a collector rooted at `dir`. The directory is created
    /// lazily on first capture.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The artifact directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stamp(label: &str) -> String {
        let now = chrono::Local::now().format("%Y%m%d-%H%M%S");
        format!("{now}-{label}")
    }

    /// Writes a screenshot under the artifact directory, creating the
    /// directory on demand.
    ///
    /// # Errors
    ///
    /// Any filesystem failure from directory creation or the write.
    fn write_screenshot(&self, label: &str, png: &[u8]) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(Self::stamp(label)).with_extension("png");
        std::fs::write(&path, png)?;
        Ok(path)
    }

    /// Writes the console tail alongside the screenshot. An empty tail
    /// produces no file.
    ///
    /// # Errors
    ///
    /// Any filesystem failure from directory creation or the write.
    fn write_console_tail(&self, label: &str, tail: &str) -> std::io::Result<Option<PathBuf>> {
        if tail.is_empty() {
            return Ok(None);
        }
        std::fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(Self::stamp(label))
            .with_extension("console.txt");
        std::fs::write(&path, tail)?;
        Ok(Some(path))
    }

    /// Captures a screenshot and the console tail of `page`.
    pub async fn capture_page(&self, page: &Page, label: &str) {
        match page.screenshot().await {
            Ok(png) => match self.write_screenshot(label, &png) {
                Ok(path) => info!(path = %path.display(), "screenshot captured"),
                Err(err) => warn!(%err, "screenshot write failed"),
            },
            Err(err) => warn!(%err, "screenshot capture failed"),
        }

        if let Err(err) = self.write_console_tail(label, &page.console().render()) {
            warn!(%err, "console tail write failed");
        }
    }

    /// Captures from whichever window is still answering when the
    /// failing window is no longer known. Walks the current window list
    /// and stops after the first successful capture.
    pub async fn capture_any(&self, session: &ExtensionSession, label: &str) {
        let handles = match session.windows().await {
            Ok(handles) => handles,
            Err(err) => {
                warn!(%err, "window enumeration failed during capture");
                return;
            }
        };
        for handle in handles {
            match session.page_for(&handle).await {
                Ok(page) => {
                    self.capture_page(&page, label).await;
                    return;
                }
                Err(err) => warn!(%handle, %err, "window not capturable"),
            }
        }
        warn!(label, "no window answered; nothing captured");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_embeds_label() {
        let stamp = Diagnostics::stamp("oauth-failure");
        assert!(stamp.ends_with("-oauth-failure"));
        assert!(stamp.len() > "oauth-failure".len() + 1);
    }

    #[test]
    fn dir_is_exposed() {
        let diag = Diagnostics::new("reports/screenshots");
        assert_eq!(diag.dir(), Path::new("reports/screenshots"));
    }

    #[test]
    fn screenshot_write_creates_nested_dir() {
        let root = tempfile::tempdir().expect("tempdir");
        let diag = Diagnostics::new(root.path().join("reports").join("screenshots"));

        let path = diag
            .write_screenshot("flow-failure", b"not-a-real-png")
            .expect("write");

        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        assert_eq!(std::fs::read(&path).expect("read back"), b"not-a-real-png");
    }

    #[test]
    fn empty_console_tail_writes_nothing() {
        let root = tempfile::tempdir().expect("tempdir");
        let diag = Diagnostics::new(root.path());

        let written = diag.write_console_tail("quiet", "").expect("write");

        assert_eq!(written, None);
        let entries = std::fs::read_dir(root.path()).expect("read dir").count();
        assert_eq!(entries, 0);
    }

    #[test]
    fn console_tail_lands_next_to_screenshots() {
        let root = tempfile::tempdir().expect("tempdir");
        let diag = Diagnostics::new(root.path());

        let path = diag
            .write_console_tail("noisy", "[error] boom\n")
            .expect("write")
            .expect("a file");

        assert!(path.to_string_lossy().ends_with(".console.txt"));
        assert_eq!(
            std::fs::read_to_string(&path).expect("read back"),
            "[error] boom\n"
        );
    }
}
