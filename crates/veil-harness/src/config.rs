//! Harness configuration: an explicit object, not ambient process state.
//!
//! Everything environment-specific (target site, extension location and
//! runtime id, test-account credentials, tunable timings) is merged from
//! an optional `veil-e2e.toml` and `VEIL_E2E_*` environment variables into
//! one `HarnessConfig` that gets passed into the session factory and the
//! orchestrator. Multiple isolated runs can therefore carry different
//! configs in the same process.
//!
//! Credentials are optional at load time and checked at the authentication
//! step, which fails fast with a setup error before any window is touched.

use crate::error::{FlowError, FlowResult};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};
use veil_browser_test::{SessionConfig, WaitConfig};

/// Test-account credentials for the OAuth sub-flow.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Identity-provider account email.
    pub email: String,
    /// Identity-provider account password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    // Credentials end up in tracing output on failure paths; keep the
    // password out of artifacts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Named, tunable timing constants for every wait in the flow.
///
/// The settle values stand in for completions the tested surface gives us
/// no way to observe; they are constants here rather than inline sleeps so
/// a slow CI machine can stretch them from config without code changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Bounded element-wait timeout (ms).
    pub element_wait_ms: u64,
    /// Poll interval for element waits (ms).
    pub poll_interval_ms: u64,
    /// Settle after clicking an affordance that triggers UI work (ms).
    pub post_click_settle_ms: u64,
    /// Settle between identity-provider form steps (ms).
    pub provider_step_settle_ms: u64,
    /// Settle for consent-window teardown and credential delivery (ms).
    pub oauth_teardown_settle_ms: u64,
    /// Settle for the extension's key-derivation/health-check cycle (ms).
    pub decryption_settle_ms: u64,
    /// Interval between new-window snapshot diffs (ms).
    pub window_poll_interval_ms: u64,
    /// Maximum new-window snapshot-diff attempts.
    pub window_poll_attempts: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            element_wait_ms: 10_000,
            poll_interval_ms: 250,
            post_click_settle_ms: 1_000,
            provider_step_settle_ms: 2_000,
            oauth_teardown_settle_ms: 3_000,
            decryption_settle_ms: 5_000,
            window_poll_interval_ms: 1_000,
            window_poll_attempts: 10,
        }
    }
}

impl Timings {
    /// Wait configuration for bounded element waits.
    #[must_use]
    pub fn element_wait(&self) -> WaitConfig {
        WaitConfig::new(
            Duration::from_millis(self.element_wait_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    /// Settle after clicking an affordance.
    #[must_use]
    pub fn post_click_settle(&self) -> Duration {
        Duration::from_millis(self.post_click_settle_ms)
    }

    /// Settle between identity-provider form steps.
    #[must_use]
    pub fn provider_step_settle(&self) -> Duration {
        Duration::from_millis(self.provider_step_settle_ms)
    }

    /// Settle for consent-window teardown.
    #[must_use]
    pub fn oauth_teardown_settle(&self) -> Duration {
        Duration::from_millis(self.oauth_teardown_settle_ms)
    }

    /// Settle for the decryption/health-check cycle.
    #[must_use]
    pub fn decryption_settle(&self) -> Duration {
        Duration::from_millis(self.decryption_settle_ms)
    }

    /// Interval between new-window snapshot diffs.
    #[must_use]
    pub fn window_poll_interval(&self) -> Duration {
        Duration::from_millis(self.window_poll_interval_ms)
    }
}

/// Complete harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// The supported platform page the flow opens first.
    pub platform_url: String,

    /// Path to the built unpacked extension (`dist/`).
    pub extension_dir: PathBuf,

    /// Runtime id of the extension under test.
    ///
    /// Supplied by configuration because the engine does not report ids
    /// for input-driven installs.
    pub extension_id: String,

    /// Document name of the extension's primary UI surface.
    pub popup_document: String,

    /// Test-account email (checked at the authentication step).
    pub email: Option<String>,

    /// Test-account password (checked at the authentication step).
    pub password: Option<String>,

    /// Persistent profile directory; `None` means a fresh throwaway
    /// profile per session.
    pub profile_dir: Option<PathBuf>,

    /// Explicit Chrome executable path.
    pub chrome_path: Option<String>,

    /// Where failure screenshots and console tails are written.
    pub artifact_dir: PathBuf,

    /// Timing constants.
    pub timings: Timings,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            platform_url: "https://chatgpt.com".to_string(),
            extension_dir: PathBuf::new(),
            extension_id: String::new(),
            popup_document: "popup.html".to_string(),
            email: None,
            password: None,
            profile_dir: None,
            chrome_path: None,
            artifact_dir: PathBuf::from("reports/screenshots"),
            timings: Timings::default(),
        }
    }
}

impl HarnessConfig {
    /// Loads configuration: defaults ← `veil-e2e.toml` ← `VEIL_E2E_*` env.
    ///
    /// Nested keys use a double underscore in the environment
    /// (`VEIL_E2E_TIMINGS__DECRYPTION_SETTLE_MS=8000`).
    ///
    /// # Errors
    ///
    /// `Config` on malformed sources, `Setup` when the extension location
    /// or runtime id is missing.
    pub fn load() -> FlowResult<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(HarnessConfig::default()))
                .merge(Toml::file("veil-e2e.toml"))
                .merge(Env::prefixed("VEIL_E2E_").split("__")),
        )
    }

    /// Extracts and validates a config from a prepared figment.
    ///
    /// # Errors
    ///
    /// Same as [`HarnessConfig::load`].
    pub fn from_figment(figment: Figment) -> FlowResult<Self> {
        let config: HarnessConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> FlowResult<()> {
        if self.extension_dir.as_os_str().is_empty() {
            return Err(FlowError::Setup(
                "extension_dir is not set (VEIL_E2E_EXTENSION_DIR or veil-e2e.toml)".to_string(),
            ));
        }
        if self.extension_id.is_empty() {
            return Err(FlowError::Setup(
                "extension_id is not set; the engine does not report ids for \
                 input-driven installs, so it must come from configuration"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Credentials for the OAuth sub-flow.
    ///
    /// # Errors
    ///
    /// `Setup` when either value is absent; raised before any window is
    /// touched, since authentication is mandatory.
    pub fn credentials(&self) -> FlowResult<Credentials> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Ok(Credentials {
                    email: email.clone(),
                    password: password.clone(),
                })
            }
            _ => Err(FlowError::Setup(
                "missing VEIL_E2E_EMAIL or VEIL_E2E_PASSWORD; \
                 the mandatory flow requires real test-account credentials"
                    .to_string(),
            )),
        }
    }

    /// Session factory configuration derived from this config.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        let mut session = SessionConfig::new(self.extension_dir.clone());
        if let Some(dir) = &self.profile_dir {
            session = session.with_profile_dir(dir.clone());
        }
        if let Some(path) = &self.chrome_path {
            session = session.with_chrome_path(path.clone());
        }
        session
    }

    /// Direct URL of the extension's primary UI document.
    #[must_use]
    pub fn popup_url(&self) -> String {
        format!(
            "chrome-extension://{}/{}",
            self.extension_id, self.popup_document
        )
    }
}

/// Initializes tracing for harness runs and integration tests.
///
/// `RUST_LOG` overrides the default filter. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("veil_harness=info,veil_browser_test=info"));

    let fmt_layer = tracing_fmt::layer()
        .with_target(false)
        .with_level(true)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "veil-e2e.toml",
                r#"
                    extension_dir = "/from/toml"
                    extension_id = "toml-id"
                    platform_url = "https://example.com"
                "#,
            )?;
            jail.set_env("VEIL_E2E_EXTENSION_ID", "env-id");
            jail.set_env("VEIL_E2E_TIMINGS__DECRYPTION_SETTLE_MS", "8000");

            let config = HarnessConfig::load().expect("config loads");
            assert_eq!(config.extension_id, "env-id");
            assert_eq!(config.platform_url, "https://example.com");
            assert_eq!(config.timings.decryption_settle_ms, 8_000);
            Ok(())
        });
    }

    #[test]
    fn missing_extension_id_is_setup_error() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("VEIL_E2E_EXTENSION_DIR", "/some/dist");

            let err = HarnessConfig::load().unwrap_err();
            assert!(matches!(err, FlowError::Setup(_)), "got {err:?}");
            Ok(())
        });
    }

    #[test]
    fn missing_credentials_is_setup_error() {
        let config = HarnessConfig {
            extension_dir: PathBuf::from("/dist"),
            extension_id: "abc".to_string(),
            ..HarnessConfig::default()
        };

        let err = config.credentials().unwrap_err();
        assert!(matches!(err, FlowError::Setup(_)), "got {err:?}");
    }

    #[test]
    fn empty_credential_values_are_rejected() {
        let config = HarnessConfig {
            extension_dir: PathBuf::from("/dist"),
            extension_id: "abc".to_string(),
            email: Some(String::new()),
            password: Some("pw".to_string()),
            ..HarnessConfig::default()
        };

        assert!(config.credentials().is_err());
    }

    #[test]
    fn popup_url_is_constructed_from_id_and_document() {
        let config = HarnessConfig {
            extension_dir: PathBuf::from("/dist"),
            extension_id: "abcdefghijklmnop".to_string(),
            popup_document: "popup-v2.html".to_string(),
            ..HarnessConfig::default()
        };

        assert_eq!(
            config.popup_url(),
            "chrome-extension://abcdefghijklmnop/popup-v2.html"
        );
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials {
            email: "qa@veil.dev".to_string(),
            password: "hunter2".to_string(),
        };

        let rendered = format!("{creds:?}");
        assert!(rendered.contains("qa@veil.dev"));
        assert!(!rendered.contains("hunter2"));
    }
}
