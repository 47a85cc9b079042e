//! The mandatory flow: every run walks the same five transitions, in
//! order, exactly once.
//!
//! The state machine is deliberately rigid. There is no resume, no
//! skip-ahead, and no retry inside a run; a failed step poisons the flow
//! and the caller starts over with a fresh session. That rigidity is what
//! makes failures attributable: the step name in the error is the step
//! that broke.

use std::fmt;

use tracing::info;
use veil_browser_test::{ExtensionSession, WindowHandle, settle};

use crate::activate::{DevModeClickthrough, SurfaceActivation};
use crate::config::HarnessConfig;
use crate::diag::Diagnostics;
use crate::error::{FlowError, FlowResult};
use crate::oauth::OauthDriver;
use crate::pages::{PlatformPage, PopupPage};
use crate::registry::{WindowRegistry, WindowRole};

/// Position in the mandatory flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Nothing has happened yet.
    Uninitialized,
    /// The platform window is open and usable.
    PlatformReady,
    /// The extension surface is open.
    SurfaceActive,
    /// The OAuth sub-flow is running.
    Authenticating,
    /// Waiting out key material decryption.
    Decrypting,
    /// The session is authenticated and decrypted.
    Ready,
}

impl FlowState {
    fn name(self) -> &'static str {
        match self {
            FlowState::Uninitialized => "uninitialized",
            FlowState::PlatformReady => "platform-ready",
            FlowState::SurfaceActive => "surface-active",
            FlowState::Authenticating => "authenticating",
            FlowState::Decrypting => "decrypting",
            FlowState::Ready => "ready",
        }
    }

    fn next(self) -> Option<FlowState> {
        match self {
            FlowState::Uninitialized => Some(FlowState::PlatformReady),
            FlowState::PlatformReady => Some(FlowState::SurfaceActive),
            FlowState::SurfaceActive => Some(FlowState::Authenticating),
            FlowState::Authenticating => Some(FlowState::Decrypting),
            FlowState::Decrypting => Some(FlowState::Ready),
            FlowState::Ready => None,
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The two windows a completed flow leaves behind.
#[derive(Debug, Clone)]
pub struct ReadyWindows {
    /// The platform window.
    pub platform: WindowHandle,
    /// The extension surface window.
    pub surface: WindowHandle,
}

/// Orchestrates one run of the mandatory flow.
///
/// `run` consumes the flow; a retry is a new `MandatoryFlow` against a
/// fresh session.
pub struct MandatoryFlow<'a> {
    session: &'a ExtensionSession,
    config: &'a HarnessConfig,
    activation: Box<dyn SurfaceActivation + 'a>,
    diag: Diagnostics,
    state: FlowState,
}

impl<'a> MandatoryFlow<'a> {
    /// Builds a flow with the default activation gesture.
    #[must_use]
    pub fn new(session: &'a ExtensionSession, config: &'a HarnessConfig) -> Self {
        Self::with_activation(session, config, Box::new(DevModeClickthrough))
    }

    /// Builds a flow with a custom activation strategy.
    #[must_use]
    pub fn with_activation(
        session: &'a ExtensionSession,
        config: &'a HarnessConfig,
        activation: Box<dyn SurfaceActivation + 'a>,
    ) -> Self {
        let diag = Diagnostics::new(&config.artifact_dir);
        Self {
            session,
            config,
            activation,
            diag,
            state: FlowState::Uninitialized,
        }
    }

    /// The current flow position.
    #[must_use]
    pub fn state(&self) -> FlowState {
        self.state
    }

    fn advance(&mut self, to: FlowState) -> FlowResult<()> {
        if self.state.next() == Some(to) {
            info!(from = %self.state, to = %to, "flow transition");
            self.state = to;
            Ok(())
        } else {
            Err(FlowError::IllegalTransition {
                from: self.state.name(),
                to: to.name(),
            })
        }
    }

    async fn fail(&self, step: &'static str, err: FlowError) -> FlowError {
        self.diag
            .capture_any(self.session, &format!("flow-{step}"))
            .await;
        FlowError::Step {
            step,
            source: Box::new(err),
        }
    }

    /// Runs the flow to completion.
    ///
    /// On success returns the platform and surface handles plus the
    /// registry tracking them, ready for test bodies to use.
    ///
    /// # Errors
    ///
    /// A `Step` error naming the failed transition, with diagnostics
    /// already written under the artifact directory.
    pub async fn run(mut self) -> FlowResult<(ReadyWindows, WindowRegistry)> {
        // Fail fast on config problems before opening any window.
        self.config.credentials()?;

        let mut registry = WindowRegistry::new();

        // Platform window.
        self.advance(FlowState::PlatformReady)?;
        let platform = match self.open_platform().await {
            Ok(page) => page,
            Err(err) => return Err(self.fail("open-platform", err).await),
        };
        registry.register(WindowRole::Platform, platform.handle())?;

        // Extension surface.
        self.advance(FlowState::SurfaceActive)?;
        let surface = match self
            .activation
            .activate(self.session, &platform, self.config)
            .await
        {
            Ok(page) => page,
            Err(err) => return Err(self.fail("activate-surface", err).await),
        };
        registry.register(WindowRole::Surface, surface.handle())?;
        if let Err(err) = PopupPage::new(&surface)
            .wait_for_load(&self.config.timings)
            .await
        {
            return Err(self.fail("activate-surface", err.into()).await);
        }

        // Interactive sign-in.
        self.advance(FlowState::Authenticating)?;
        let driver = OauthDriver::new(self.session, self.config, &self.diag);
        if let Err(err) = driver.authenticate(&mut registry).await {
            return Err(self.fail("authenticate", err).await);
        }

        // Key material decryption has no observable signal; wait it out.
        self.advance(FlowState::Decrypting)?;
        settle(self.config.timings.decryption_settle(), "key material decryption").await;

        // Readiness check on the surface.
        self.advance(FlowState::Ready)?;
        let surface_handle = registry.resolve(WindowRole::Surface)?.clone();
        let outcome = self.verify_ready(&surface_handle).await;
        if let Err(err) = outcome {
            return Err(self.fail("verify-ready", err).await);
        }

        info!("mandatory flow complete");
        let windows = ReadyWindows {
            platform: registry.resolve(WindowRole::Platform)?.clone(),
            surface: surface_handle,
        };
        Ok((windows, registry))
    }

    async fn open_platform(&self) -> FlowResult<veil_browser_test::Page> {
        let page = self.session.new_page().await?;
        page.navigate(&self.config.platform_url).await?;

        let platform = PlatformPage::new(&page);
        if !platform.wait_for_composer(&self.config.timings).await {
            // A login wall is survivable; readiness is re-verified on the
            // extension surface later.
            info!("platform composer not found, continuing anyway");
        }
        Ok(page)
    }

    async fn verify_ready(&self, surface_handle: &WindowHandle) -> FlowResult<()> {
        let surface = self.session.page_for(surface_handle).await?;
        surface.bring_to_front().await?;
        let popup = PopupPage::new(&surface);
        popup.wait_authenticated(&self.config.timings).await?;

        if !popup.is_authenticated().await? {
            return Err(FlowError::Assertion(
                "surface lost its authenticated state during verification".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_advance_strictly_forward() {
        let order = [
            FlowState::Uninitialized,
            FlowState::PlatformReady,
            FlowState::SurfaceActive,
            FlowState::Authenticating,
            FlowState::Decrypting,
            FlowState::Ready,
        ];
        for pair in order.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1]));
        }
        assert_eq!(FlowState::Ready.next(), None);
    }

    #[test]
    fn skipping_a_state_is_illegal() {
        assert_ne!(
            FlowState::Uninitialized.next(),
            Some(FlowState::SurfaceActive)
        );
        assert_ne!(FlowState::PlatformReady.next(), Some(FlowState::Ready));
    }

    #[test]
    fn state_names_are_stable() {
        assert_eq!(FlowState::Uninitialized.to_string(), "uninitialized");
        assert_eq!(FlowState::Ready.to_string(), "ready");
    }
}
