//! Surface activation strategies.
//!
//! The control that opens the extension surface lives in browser chrome,
//! not in any page DOM, so activation cannot be a selector click. The
//! trait isolates the coordinate-and-timing fragile technique behind one
//! seam; the orchestrator only ever sees `activate`.

use async_trait::async_trait;
use tracing::{debug, info};
use veil_browser_test::{
    CdpInput, ExtensionSession, NamedKey, Page, RawInput, settle, x_at_width_percent,
};

use crate::config::HarnessConfig;
use crate::error::{FlowError, FlowResult};

/// Horizontal position of the developer-mode toggle on the engine's
/// management surface, as a percentage of window width. Calibrated at
/// x=1894 on a 1920-wide window; the toggle anchors to the right edge so
/// a fraction of the width tolerates other resolutions.
pub const DEV_TOGGLE_X_PERCENT: f64 = 98.64;

/// Vertical position of the developer-mode toggle, in pixels from the
/// top of the window.
pub const DEV_TOGGLE_Y_PX: f64 = 118.0;

/// Position of the load-unpacked button, visible once developer mode is
/// on. Anchors to the left edge, so fixed pixels suffice.
pub const LOAD_UNPACKED_X_PX: f64 = 90.0;

/// Vertical position of the load-unpacked button.
pub const LOAD_UNPACKED_Y_PX: f64 = 175.0;

/// Opens the extension surface and returns its page.
#[async_trait]
pub trait SurfaceActivation: Send + Sync {
    /// Performs the activation technique. `platform` is the already-open
    /// platform window, untouched by the default strategies.
    async fn activate(
        &self,
        session: &ExtensionSession,
        platform: &Page,
        config: &HarnessConfig,
    ) -> FlowResult<Page>;
}

/// The full input-driven install choreography: enable developer mode on
/// the engine's management surface by coordinate click, trigger
/// load-unpacked, type the build path into the native file dialog, then
/// open the surface by constructed URL.
///
/// The runtime id cannot be read back after an input-driven install, so
/// it comes from configuration. Every wait in here is a blind settle;
/// nothing on the management surface or the native dialog is observable
/// through the page protocol.
pub struct DevModeClickthrough;

impl DevModeClickthrough {
    async fn enable_and_load(
        &self,
        session: &ExtensionSession,
        config: &HarnessConfig,
    ) -> FlowResult<()> {
        let timings = &config.timings;

        let manager = session.new_page().await?;
        manager.navigate("chrome://extensions").await?;
        manager.bring_to_front().await?;
        settle(timings.post_click_settle(), "management surface paint").await;

        let input = CdpInput::new(&manager);
        let (width, _) = input.viewport_size().await?;
        let toggle_x = x_at_width_percent(width, DEV_TOGGLE_X_PERCENT);
        debug!(x = toggle_x, y = DEV_TOGGLE_Y_PX, "clicking developer-mode toggle");
        input.click_at(toggle_x, DEV_TOGGLE_Y_PX).await?;
        settle(timings.post_click_settle(), "developer-mode animation").await;

        debug!(x = LOAD_UNPACKED_X_PX, y = LOAD_UNPACKED_Y_PX, "clicking load-unpacked");
        input.click_at(LOAD_UNPACKED_X_PX, LOAD_UNPACKED_Y_PX).await?;
        settle(timings.provider_step_settle(), "native file dialog open").await;

        // The dialog's filename field holds focus when it opens; type the
        // build path and confirm twice, once to navigate and once to pick.
        let path = config.extension_dir.display().to_string();
        input.insert_text(&path).await?;
        input.press_key(NamedKey::Enter).await?;
        settle(timings.post_click_settle(), "dialog path navigation").await;
        input.press_key(NamedKey::Enter).await?;
        settle(timings.provider_step_settle(), "unpacked extension load").await;

        manager.close().await?;
        Ok(())
    }
}

#[async_trait]
impl SurfaceActivation for DevModeClickthrough {
    async fn activate(
        &self,
        session: &ExtensionSession,
        _platform: &Page,
        config: &HarnessConfig,
    ) -> FlowResult<Page> {
        self.enable_and_load(session, config).await?;
        let surface = open_surface_by_url(session, config).await?;
        info!(handle = %surface.handle(), "extension surface active");
        Ok(surface)
    }
}

/// Opens the popup document by URL in a fresh window, skipping the
/// management-surface choreography entirely.
///
/// Works whenever the session already carries the extension, which the
/// launch flags guarantee here. Also the strategy of choice for reopening
/// the surface after it was closed mid-test.
pub struct DirectNavigation;

#[async_trait]
impl SurfaceActivation for DirectNavigation {
    async fn activate(
        &self,
        session: &ExtensionSession,
        _platform: &Page,
        config: &HarnessConfig,
    ) -> FlowResult<Page> {
        let surface = open_surface_by_url(session, config).await?;
        info!(handle = %surface.handle(), "extension surface opened by navigation");
        Ok(surface)
    }
}

async fn open_surface_by_url(
    session: &ExtensionSession,
    config: &HarnessConfig,
) -> FlowResult<Page> {
    let url = config.popup_url();
    let surface = session.new_page().await?;
    surface.navigate(&url).await?;

    // A blank document means the runtime id is wrong or the extension
    // never loaded; surface that as setup, not as a later flow mystery.
    let title = surface.title().await?;
    if title.is_empty() && !surface.exists("body *").await? {
        return Err(FlowError::Setup(format!(
            "popup document at {url} rendered nothing; check the configured extension id"
        )));
    }
    Ok(surface)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_x_matches_calibration() {
        // Calibrated click point was x=1894 on a 1920-wide window.
        let x = x_at_width_percent(1920, DEV_TOGGLE_X_PERCENT);
        assert!((x - 1894.0).abs() < 1.0, "got {x}");
    }
}
