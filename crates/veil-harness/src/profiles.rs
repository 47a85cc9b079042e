//! Profile lifecycle operations on the extension surface.
//!
//! Profiles pair a real value with the alias the extension substitutes
//! for it. Only the profile name is required; every real/alias field is
//! optional and skipped when absent, matching the form's own validation.

use tracing::info;
use veil_browser_test::{ExtensionSession, settle};

use crate::config::Timings;
use crate::error::{FlowError, FlowResult};
use crate::pages::PopupPage;
use crate::registry::{WindowRegistry, WindowRole};

/// A profile as entered into the creation form.
#[derive(Debug, Clone, Default)]
pub struct ProfileRecord {
    /// Required display name; also the dropdown's visible text.
    pub name: String,
    /// Real name to protect.
    pub real_name: Option<String>,
    /// Alias substituted for the real name.
    pub alias_name: Option<String>,
    /// Real email to protect.
    pub real_email: Option<String>,
    /// Alias substituted for the real email.
    pub alias_email: Option<String>,
    /// Real phone number to protect.
    pub real_phone: Option<String>,
    /// Alias substituted for the real phone number.
    pub alias_phone: Option<String>,
    /// Real street address to protect.
    pub real_address: Option<String>,
    /// Alias substituted for the real address.
    pub alias_address: Option<String>,
    /// Real company name to protect.
    pub real_company: Option<String>,
    /// Alias substituted for the real company name.
    pub alias_company: Option<String>,
}

impl ProfileRecord {
    /// A record with only the required name set.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the real/alias name pair.
    #[must_use]
    pub fn with_names(mut self, real: impl Into<String>, alias: impl Into<String>) -> Self {
        self.real_name = Some(real.into());
        self.alias_name = Some(alias.into());
        self
    }

    /// Sets the real/alias email pair.
    #[must_use]
    pub fn with_emails(mut self, real: impl Into<String>, alias: impl Into<String>) -> Self {
        self.real_email = Some(real.into());
        self.alias_email = Some(alias.into());
        self
    }

    /// Sets the real/alias phone pair.
    #[must_use]
    pub fn with_phones(mut self, real: impl Into<String>, alias: impl Into<String>) -> Self {
        self.real_phone = Some(real.into());
        self.alias_phone = Some(alias.into());
        self
    }

    /// Sets the real/alias address pair.
    #[must_use]
    pub fn with_addresses(mut self, real: impl Into<String>, alias: impl Into<String>) -> Self {
        self.real_address = Some(real.into());
        self.alias_address = Some(alias.into());
        self
    }

    /// Sets the real/alias company pair.
    #[must_use]
    pub fn with_companies(mut self, real: impl Into<String>, alias: impl Into<String>) -> Self {
        self.real_company = Some(real.into());
        self.alias_company = Some(alias.into());
        self
    }

    fn fields(&self) -> [(&'static str, Option<&String>); 10] {
        [
            ("#realName", self.real_name.as_ref()),
            ("#aliasName", self.alias_name.as_ref()),
            ("#realEmail", self.real_email.as_ref()),
            ("#aliasEmail", self.alias_email.as_ref()),
            ("#realPhone", self.real_phone.as_ref()),
            ("#aliasPhone", self.alias_phone.as_ref()),
            ("#realAddress", self.real_address.as_ref()),
            ("#aliasAddress", self.alias_address.as_ref()),
            ("#realCompany", self.real_company.as_ref()),
            ("#aliasCompany", self.alias_company.as_ref()),
        ]
    }
}

/// Create, select, and delete profiles against a ready session.
pub struct ProfileOps<'a> {
    session: &'a ExtensionSession,
    registry: &'a WindowRegistry,
    timings: &'a Timings,
}

impl<'a> ProfileOps<'a> {
    /// Binds profile operations to the registered extension surface.
    #[must_use]
    pub fn new(
        session: &'a ExtensionSession,
        registry: &'a WindowRegistry,
        timings: &'a Timings,
    ) -> Self {
        Self {
            session,
            registry,
            timings,
        }
    }

    async fn surface(&self) -> FlowResult<veil_browser_test::Page> {
        let handle = self.registry.resolve(WindowRole::Surface)?;
        let page = self.session.page_for(handle).await?;
        page.bring_to_front().await?;
        Ok(page)
    }

    /// Creates a profile through the form.
    ///
    /// # Errors
    ///
    /// `Setup` when the record has an empty name, otherwise browser
    /// errors from the form interaction.
    pub async fn create(&self, record: &ProfileRecord) -> FlowResult<()> {
        if record.name.trim().is_empty() {
            return Err(FlowError::Setup("profile name must not be empty".to_string()));
        }

        let page = self.surface().await?;
        page.wait_for_selector(PopupPage::CREATE_PROFILE_BUTTON, self.timings.element_wait())
            .await?;
        page.click(PopupPage::CREATE_PROFILE_BUTTON).await?;

        page.wait_for_selector(PopupPage::PROFILE_NAME_INPUT, self.timings.element_wait())
            .await?;
        page.fill(PopupPage::PROFILE_NAME_INPUT, &record.name).await?;

        for (selector, value) in record.fields() {
            if let Some(value) = value {
                page.fill(selector, value).await?;
            }
        }

        page.click(PopupPage::SAVE_PROFILE_BUTTON).await?;
        settle(self.timings.post_click_settle(), "profile save").await;
        info!(name = %record.name, "profile created");
        Ok(())
    }

    /// Selects a profile by visible name and returns the name read back
    /// from the dropdown.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` when no option carries that name, `Assertion`
    /// when the dropdown does not reflect the selection afterwards.
    pub async fn select(&self, name: &str) -> FlowResult<String> {
        let page = self.surface().await?;
        page.wait_for_selector(PopupPage::PROFILE_SELECT, self.timings.element_wait())
            .await?;
        page.select_option(PopupPage::PROFILE_SELECT, name).await?;
        settle(self.timings.post_click_settle(), "profile selection").await;

        let selected = page
            .selected_option_text(PopupPage::PROFILE_SELECT)
            .await?
            .ok_or_else(|| {
                FlowError::Assertion("profile dropdown has no selection".to_string())
            })?;
        if selected != name {
            return Err(FlowError::Assertion(format!(
                "selected profile is '{selected}', expected '{name}'"
            )));
        }
        Ok(selected)
    }

    /// The currently selected profile name, if any.
    ///
    /// # Errors
    ///
    /// Browser errors when the surface cannot be queried.
    pub async fn selected(&self) -> FlowResult<Option<String>> {
        let page = self.surface().await?;
        Ok(page
            .selected_option_text(PopupPage::PROFILE_SELECT)
            .await?)
    }

    /// Deletes whichever profile the dropdown currently shows.
    ///
    /// The delete control always acts on the current selection; callers
    /// that care which profile dies should `select` first.
    ///
    /// # Errors
    ///
    /// Browser errors when the control is missing.
    pub async fn delete_selected(&self) -> FlowResult<()> {
        let page = self.surface().await?;
        page.wait_for_selector(PopupPage::DELETE_PROFILE_BUTTON, self.timings.element_wait())
            .await?;
        page.click(PopupPage::DELETE_PROFILE_BUTTON).await?;
        settle(self.timings.post_click_settle(), "profile deletion").await;
        info!("selected profile deleted");
        Ok(())
    }

    /// Selects `name` and deletes it.
    ///
    /// # Errors
    ///
    /// As `select` and `delete_selected`.
    pub async fn delete(&self, name: &str) -> FlowResult<()> {
        self.select(name).await?;
        self.delete_selected().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_defaults_to_name_only() {
        let record = ProfileRecord::new("E2E Test Profile");
        assert_eq!(record.name, "E2E Test Profile");
        assert!(record.fields().iter().all(|(_, v)| v.is_none()));
    }

    #[test]
    fn pair_setters_fill_both_sides() {
        let record = ProfileRecord::new("p")
            .with_emails("real@example.com", "alias@example.com")
            .with_phones("+15550100", "+15550199");

        assert_eq!(record.real_email.as_deref(), Some("real@example.com"));
        assert_eq!(record.alias_email.as_deref(), Some("alias@example.com"));
        assert_eq!(record.alias_phone.as_deref(), Some("+15550199"));
        assert!(record.real_name.is_none());
    }

    #[test]
    fn fields_order_interleaves_real_and_alias() {
        let record = ProfileRecord::new("p").with_names("Ann", "Bea");
        let fields = record.fields();
        assert_eq!(fields[0].0, "#realName");
        assert_eq!(fields[1].0, "#aliasName");
        assert_eq!(fields[0].1.map(String::as_str), Some("Ann"));
        assert_eq!(fields[1].1.map(String::as_str), Some("Bea"));
    }
}
