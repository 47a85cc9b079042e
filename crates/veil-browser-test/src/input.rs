//! Synthetic input for UI that lives outside any page DOM.
//!
//! The extension's activation surface (the developer-mode toggle and
//! load-unpacked button on `chrome://extensions`) cannot be reached through
//! DOM interaction: the controls sit in browser chrome, behind shadow
//! roots, at screen positions that vary with display resolution. The
//! activation technique is coordinate clicking, a percentage of the
//! window width plus a calibrated vertical offset.
//!
//! `RawInput` is the seam that keeps that fragility out of the
//! orchestrator. The default backend, `CdpInput`, dispatches trusted
//! `Input.*` events over CDP into a browser-chrome page. An OS-level
//! injector (xdotool, a uinput shim) can implement the same trait and be
//! swapped in without touching any flow code.

use crate::error::{BrowserError, Result};
use crate::page::Page;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, InsertTextParams, MouseButton,
};
use chromiumoxide::page::Page as ChromePage;
use std::sync::Arc;
use tracing::debug;

/// Keys the activation choreography needs by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKey {
    /// Confirm / submit.
    Enter,
    /// Move focus to the next control.
    Tab,
    /// Dismiss a dialog.
    Escape,
}

impl NamedKey {
    fn key(self) -> &'static str {
        match self {
            NamedKey::Enter => "Enter",
            NamedKey::Tab => "Tab",
            NamedKey::Escape => "Escape",
        }
    }

    fn code(self) -> &'static str {
        // DOM `code` values happen to match `key` for these three.
        self.key()
    }

    fn key_code(self) -> i64 {
        match self {
            NamedKey::Enter => 13,
            NamedKey::Tab => 9,
            NamedKey::Escape => 27,
        }
    }
}

/// OS-style input injection: pointer clicks at absolute coordinates,
/// raw keystrokes, free text entry, and viewport metrics.
///
/// Implementations are interchangeable; flow code only ever sees this
/// trait.
#[async_trait]
pub trait RawInput: Send + Sync {
    /// Clicks the primary button at absolute viewport coordinates.
    async fn click_at(&self, x: f64, y: f64) -> Result<()>;

    /// Types free text into whatever currently has focus.
    async fn insert_text(&self, text: &str) -> Result<()>;

    /// Presses and releases a named key.
    async fn press_key(&self, key: NamedKey) -> Result<()>;

    /// Current viewport size in CSS pixels, used for percentage-of-width
    /// coordinate computation.
    async fn viewport_size(&self) -> Result<(u32, u32)>;
}

/// Trusted-event input backend over CDP.
///
/// Events dispatched through `Input.*` carry the trusted flag, so the
/// browser-chrome UI treats them as real user input, unlike anything
/// synthesized from page JavaScript.
pub struct CdpInput {
    target: Arc<ChromePage>,
}

impl CdpInput {
    /// Creates an input backend dispatching into the given page's window.
    #[must_use]
    pub fn new(page: &Page) -> Self {
        Self { target: page.raw() }
    }

    async fn dispatch_mouse(
        &self,
        kind: DispatchMouseEventType,
        x: f64,
        y: f64,
    ) -> Result<()> {
        let params = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(BrowserError::InputDispatch)?;

        self.target
            .execute(params)
            .await
            .map_err(|e| BrowserError::InputDispatch(e.to_string()))?;
        Ok(())
    }

    async fn dispatch_key(&self, kind: DispatchKeyEventType, key: NamedKey) -> Result<()> {
        let params = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(key.key())
            .code(key.code())
            .windows_virtual_key_code(key.key_code())
            .native_virtual_key_code(key.key_code())
            .build()
            .map_err(BrowserError::InputDispatch)?;

        self.target
            .execute(params)
            .await
            .map_err(|e| BrowserError::InputDispatch(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl RawInput for CdpInput {
    async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        debug!(x, y, "synthetic click");
        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, x, y)
            .await?;
        self.dispatch_mouse(DispatchMouseEventType::MousePressed, x, y)
            .await?;
        self.dispatch_mouse(DispatchMouseEventType::MouseReleased, x, y)
            .await
    }

    async fn insert_text(&self, text: &str) -> Result<()> {
        debug!(len = text.len(), "synthetic text entry");
        self.target
            .execute(InsertTextParams::new(text))
            .await
            .map_err(|e| BrowserError::InputDispatch(e.to_string()))?;
        Ok(())
    }

    async fn press_key(&self, key: NamedKey) -> Result<()> {
        debug!(?key, "synthetic keypress");
        self.dispatch_key(DispatchKeyEventType::KeyDown, key).await?;
        self.dispatch_key(DispatchKeyEventType::KeyUp, key).await
    }

    async fn viewport_size(&self) -> Result<(u32, u32)> {
        let (width, height): (f64, f64) = self
            .target
            .evaluate("[window.innerWidth, window.innerHeight]")
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?
            .into_value()
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok((width.max(0.0) as u32, height.max(0.0) as u32))
    }
}

/// Computes an x coordinate as a percentage of the viewport width.
///
/// Browser-chrome controls anchor to the window edges, so a fraction of the
/// width tolerates varying display resolutions where a fixed pixel offset
/// would not. `percent` is clamped to `0.0..=100.0`.
#[must_use]
pub fn x_at_width_percent(viewport_width: u32, percent: f64) -> f64 {
    let clamped = percent.clamp(0.0, 100.0);
    f64::from(viewport_width) * clamped / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_percent_matches_calibration() {
        // Developer-mode toggle calibrated at x=1894 on a 1920-wide window.
        let x = x_at_width_percent(1920, 98.64);
        assert!((x - 1893.9).abs() < 0.5, "got {x}");
    }

    #[test]
    fn width_percent_clamps_out_of_range() {
        assert_eq!(x_at_width_percent(1000, -5.0), 0.0);
        assert_eq!(x_at_width_percent(1000, 250.0), 1000.0);
    }

    #[test]
    fn named_keys_carry_legacy_key_codes() {
        assert_eq!(NamedKey::Enter.key_code(), 13);
        assert_eq!(NamedKey::Tab.key_code(), 9);
        assert_eq!(NamedKey::Escape.key_code(), 27);
        assert_eq!(NamedKey::Enter.key(), "Enter");
    }
}
