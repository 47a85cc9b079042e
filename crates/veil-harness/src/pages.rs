//! Page objects: the locator knowledge for the three surfaces the flow
//! touches.
//!
//! Thin wrappers over `Page` so flow code reads as intent ("submit the
//! email step") instead of selector strings. This is deliberately not a
//! selector catalog; only what the orchestrator and the profile
//! operations actually consume lives here.

use crate::config::Timings;
use veil_browser_test::{Page, Result};

/// The extension's popup document.
pub struct PopupPage<'a> {
    page: &'a Page,
}

impl<'a> PopupPage<'a> {
    /// Sign-in affordance in the popup header.
    pub const SIGN_IN_BUTTON: &'static str = "#headerSignInBtn";
    /// Sign-out control; present only while authenticated.
    pub const SIGN_OUT_BUTTON: &'static str = "#headerSignOutBtn";
    /// Signed-in user chip.
    pub const USER_CHIP: &'static str = "#headerUserProfileContainer";
    /// Authentication modal.
    pub const AUTH_MODAL: &'static str = "#authModal";
    /// Identity-provider button inside the auth modal.
    pub const PROVIDER_BUTTON: &'static str = "#googleSignInBtn";
    /// Dedicated protected/ready indicator.
    pub const PROTECTED_STATUS: &'static str = r#"[data-testid="protected-status"]"#;
    /// Master protection on/off toggle.
    pub const MASTER_TOGGLE: &'static str = "#masterToggle";

    /// Profile dropdown.
    pub const PROFILE_SELECT: &'static str = "#profileSelect";
    /// Opens the profile creation form.
    pub const CREATE_PROFILE_BUTTON: &'static str = "#createProfileBtn";
    /// Deletes the currently selected profile.
    pub const DELETE_PROFILE_BUTTON: &'static str = r#"[data-action="delete-profile"]"#;
    /// Saves the profile form.
    pub const SAVE_PROFILE_BUTTON: &'static str = "#saveProfileBtn";
    /// Required profile-name input.
    pub const PROFILE_NAME_INPUT: &'static str = "#profileName";

    /// Wraps the popup page.
    #[must_use]
    pub fn new(page: &'a Page) -> Self {
        Self { page }
    }

    /// The underlying page.
    #[must_use]
    pub fn page(&self) -> &Page {
        self.page
    }

    /// Waits until the popup header has rendered (either auth state).
    ///
    /// # Errors
    ///
    /// Times out when neither header control appears.
    pub async fn wait_for_load(&self, timings: &Timings) -> Result<()> {
        veil_browser_test::wait_for_result(
            || async {
                Ok(self.page.exists(Self::SIGN_IN_BUTTON).await?
                    || self.page.exists(Self::USER_CHIP).await?)
            },
            timings.element_wait(),
            "popup header rendered",
        )
        .await
    }

    /// The single readiness predicate for the flow.
    ///
    /// Prefers the dedicated protected indicator; falls back to the
    /// sign-out control, which the popup only renders while a session is
    /// authenticated. Signed-in and decryption-complete are conflated by
    /// the tested surface itself; when it grows a real readiness signal,
    /// this is the one place to consume it.
    ///
    /// # Errors
    ///
    /// Fails only when the page cannot be queried at all.
    pub async fn is_authenticated(&self) -> Result<bool> {
        if self.page.exists(Self::PROTECTED_STATUS).await? {
            return Ok(true);
        }
        self.page.exists(Self::SIGN_OUT_BUTTON).await
    }

    /// Waits for the authenticated indicator to appear.
    ///
    /// # Errors
    ///
    /// Times out when the indicator never shows.
    pub async fn wait_authenticated(&self, timings: &Timings) -> Result<()> {
        veil_browser_test::wait_for_result(
            || async { self.is_authenticated().await },
            timings.element_wait(),
            "authenticated indicator visible",
        )
        .await
    }

    /// Clicks the sign-in affordance.
    ///
    /// # Errors
    ///
    /// Fails when the affordance is missing.
    pub async fn click_sign_in(&self, timings: &Timings) -> Result<()> {
        self.page
            .wait_for_selector(Self::SIGN_IN_BUTTON, timings.element_wait())
            .await?;
        self.page.click(Self::SIGN_IN_BUTTON).await
    }

    /// Clicks the identity-provider button once the auth modal is up.
    ///
    /// # Errors
    ///
    /// Fails when the modal or button never appears.
    pub async fn click_provider_button(&self, timings: &Timings) -> Result<()> {
        self.page
            .wait_for_selector(Self::AUTH_MODAL, timings.element_wait())
            .await?;
        self.page
            .wait_for_selector(Self::PROVIDER_BUTTON, timings.element_wait())
            .await?;
        self.page.click(Self::PROVIDER_BUTTON).await
    }

    /// Clicks the sign-out control.
    ///
    /// # Errors
    ///
    /// Fails when the control is missing.
    pub async fn click_sign_out(&self, timings: &Timings) -> Result<()> {
        self.page
            .wait_for_selector(Self::SIGN_OUT_BUTTON, timings.element_wait())
            .await?;
        self.page.click(Self::SIGN_OUT_BUTTON).await
    }

    /// Waits for the popup to return to its signed-out header state.
    ///
    /// # Errors
    ///
    /// Times out when the sign-in affordance never reappears.
    pub async fn wait_signed_out(&self, timings: &Timings) -> Result<()> {
        self.page
            .wait_for_selector(Self::SIGN_IN_BUTTON, timings.element_wait())
            .await?;
        Ok(())
    }

    /// Whether master protection is currently on.
    ///
    /// The popup renders the toggle either as a real checkbox or as a
    /// styled control carrying a `checked` class; both count.
    ///
    /// # Errors
    ///
    /// Fails when the page cannot be queried.
    pub async fn is_protection_enabled(&self) -> Result<bool> {
        self.page
            .evaluate(
                r"(() => {
                    const el = document.querySelector('#masterToggle');
                    if (!el) { return false; }
                    return !!el.checked || el.classList.contains('checked');
                })()",
            )
            .await
    }

    /// Flips the master protection toggle and lets the state persist.
    ///
    /// # Errors
    ///
    /// Fails when the toggle is missing.
    pub async fn toggle_protection(&self, timings: &Timings) -> Result<()> {
        self.page
            .wait_for_selector(Self::MASTER_TOGGLE, timings.element_wait())
            .await?;
        self.page.click(Self::MASTER_TOGGLE).await?;
        veil_browser_test::settle(timings.post_click_settle(), "toggle state persisted").await;
        Ok(())
    }
}

/// The supported platform page the extension augments.
pub struct PlatformPage<'a> {
    page: &'a Page,
}

impl<'a> PlatformPage<'a> {
    /// The interactive composer that marks the page as usable.
    pub const COMPOSER: &'static str = r#"textarea, [contenteditable="true"]"#;

    /// Wraps the platform page.
    #[must_use]
    pub fn new(page: &'a Page) -> Self {
        Self { page }
    }

    /// Best-effort wait for the composer marker.
    ///
    /// Returns whether the marker showed up. Absence is not fatal; the
    /// platform may be showing a login wall, and later flow steps
    /// re-verify readiness on the extension surface instead.
    pub async fn wait_for_composer(&self, timings: &Timings) -> bool {
        self.page
            .wait_for_selector(Self::COMPOSER, timings.element_wait())
            .await
            .is_ok()
    }
}

/// The identity provider's consent window.
pub struct ConsentPage<'a> {
    page: &'a Page,
}

impl<'a> ConsentPage<'a> {
    /// Email entry field.
    pub const EMAIL_INPUT: &'static str = r#"input[type="email"]"#;
    /// Next button after the email step.
    pub const EMAIL_NEXT: &'static str = "#identifierNext";
    /// Password entry field.
    pub const PASSWORD_INPUT: &'static str = r#"input[type="password"]"#;
    /// Next button after the password step.
    pub const PASSWORD_NEXT: &'static str = "#passwordNext";

    /// Wraps the consent page.
    #[must_use]
    pub fn new(page: &'a Page) -> Self {
        Self { page }
    }

    /// Fills and submits the email step.
    ///
    /// # Errors
    ///
    /// Fails when the email field never appears.
    pub async fn submit_email(&self, email: &str, timings: &Timings) -> Result<()> {
        self.page
            .wait_for_selector(Self::EMAIL_INPUT, timings.element_wait())
            .await?;
        self.page.fill(Self::EMAIL_INPUT, email).await?;

        // Some provider variants render no Next button and want Enter.
        if self.page.exists(Self::EMAIL_NEXT).await? {
            self.page.click(Self::EMAIL_NEXT).await
        } else {
            self.page.press_key(Self::EMAIL_INPUT, "Enter").await
        }
    }

    /// Fills and submits the password step.
    ///
    /// # Errors
    ///
    /// Fails when the password field never appears.
    pub async fn submit_password(&self, password: &str, timings: &Timings) -> Result<()> {
        self.page
            .wait_for_selector(Self::PASSWORD_INPUT, timings.element_wait())
            .await?;
        self.page.fill(Self::PASSWORD_INPUT, password).await?;

        if self.page.exists(Self::PASSWORD_NEXT).await? {
            self.page.click(Self::PASSWORD_NEXT).await
        } else {
            self.page.press_key(Self::PASSWORD_INPUT, "Enter").await
        }
    }
}
