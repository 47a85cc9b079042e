//! The OAuth consent sub-flow.
//!
//! The provider's consent window is the only part of the flow the harness
//! does not control: it is opened by the extension, lives in a separate
//! browser window, and closes itself when the provider redirects back.
//! That gives this module its shape: detect the window by diffing the
//! window set, drive it blind through fixed settles, then confirm the
//! outcome back on the extension surface rather than in the window that
//! no longer exists.

use tracing::{debug, info};
use veil_browser_test::{ExtensionSession, settle};

use crate::config::{Credentials, HarnessConfig};
use crate::diag::Diagnostics;
use crate::error::FlowResult;
use crate::pages::{ConsentPage, PopupPage};
use crate::registry::{self, WindowRegistry, WindowRole};

/// Drives interactive sign-in through the provider's consent window.
pub struct OauthDriver<'a> {
    session: &'a ExtensionSession,
    config: &'a HarnessConfig,
    diag: &'a Diagnostics,
}

impl<'a> OauthDriver<'a> {
    /// Creates a driver for the given session.
    #[must_use]
    pub fn new(
        session: &'a ExtensionSession,
        config: &'a HarnessConfig,
        diag: &'a Diagnostics,
    ) -> Self {
        Self {
            session,
            config,
            diag,
        }
    }

    /// Runs the full consent choreography and waits for the surface to
    /// report an authenticated session.
    ///
    /// Credentials are validated before any window is touched, so a
    /// misconfigured run fails without side effects. Any later failure
    /// captures diagnostics from whatever window still answers.
    ///
    /// # Errors
    ///
    /// `Setup` for missing credentials, `WindowNotFound` when the consent
    /// window never opens, and browser errors from the interaction steps.
    pub async fn authenticate(&self, registry: &mut WindowRegistry) -> FlowResult<()> {
        let credentials = self.config.credentials()?;

        let result = self.drive_consent(registry, &credentials).await;
        if result.is_err() {
            self.diag.capture_any(self.session, "oauth-failure").await;
        }
        result
    }

    /// Signs the authenticated session out through the popup header and
    /// waits for the signed-out header to come back.
    ///
    /// Unlike consent, sign-out happens entirely on the extension surface;
    /// no window diffing is involved. A failure still captures diagnostics
    /// before propagating.
    ///
    /// # Errors
    ///
    /// Browser errors from the surface, or a timeout when the sign-in
    /// affordance never reappears.
    pub async fn sign_out(&self, registry: &WindowRegistry) -> FlowResult<()> {
        let result = self.drive_sign_out(registry).await;
        if result.is_err() {
            self.diag.capture_any(self.session, "sign-out-failure").await;
        }
        result
    }

    async fn drive_sign_out(&self, registry: &WindowRegistry) -> FlowResult<()> {
        let timings = &self.config.timings;
        let surface_handle = registry.resolve(WindowRole::Surface)?.clone();

        let surface = self.session.page_for(&surface_handle).await?;
        surface.bring_to_front().await?;
        let popup = PopupPage::new(&surface);

        popup.click_sign_out(timings).await?;
        settle(timings.provider_step_settle(), "session teardown").await;
        popup.wait_signed_out(timings).await?;
        info!("signed-out header confirmed on extension surface");
        Ok(())
    }

    async fn drive_consent(
        &self,
        registry: &mut WindowRegistry,
        credentials: &Credentials,
    ) -> FlowResult<()> {
        let timings = &self.config.timings;
        let surface_handle = registry.resolve(WindowRole::Surface)?.clone();

        let surface = self.session.page_for(&surface_handle).await?;
        surface.bring_to_front().await?;
        let popup = PopupPage::new(&surface);

        if popup.is_authenticated().await? {
            info!("session already authenticated, skipping consent");
            return Ok(());
        }

        let before = self.session.windows().await?;
        popup.click_sign_in(timings).await?;
        popup.click_provider_button(timings).await?;

        let consent_handle =
            registry::wait_for_new_window(self.session, &before, timings).await?;
        registry.register(WindowRole::Oauth, consent_handle.clone())?;
        info!(%consent_handle, "consent window detected");

        let consent_page = self.session.page_for(&consent_handle).await?;
        consent_page.bring_to_front().await?;
        let consent = ConsentPage::new(&consent_page);

        consent.submit_email(&credentials.email, timings).await?;
        settle(timings.provider_step_settle(), "provider email step").await;

        consent.submit_password(&credentials.password, timings).await?;
        settle(timings.oauth_teardown_settle(), "consent window teardown").await;

        // The window closed itself on redirect; its handle is dead weight.
        registry.forget(WindowRole::Oauth);

        // The surface target can be briefly unresponsive while the
        // provider redirect lands. One retry covers the gap.
        let surface = match self.session.page_for(&surface_handle).await {
            Ok(page) => page,
            Err(err) => {
                debug!(%err, "surface not answering after consent, retrying");
                settle(timings.post_click_settle(), "surface refocus retry").await;
                self.session.page_for(&surface_handle).await?
            }
        };
        surface.bring_to_front().await?;

        PopupPage::new(&surface).wait_authenticated(timings).await?;
        info!("authenticated session confirmed on extension surface");
        Ok(())
    }
}
