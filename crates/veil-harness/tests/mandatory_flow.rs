//! End-to-end runs against a real browser and a built extension.
//!
//! These tests are ignored by default: they need a Chrome binary, an
//! unpacked extension build, and live provider credentials. Configure via
//! `veil-e2e.toml` or `VEIL_E2E_*` environment variables, then run with
//! `cargo test -- --ignored`.

use veil_browser_test::ExtensionSession;
use veil_harness::activate::DirectNavigation;
use veil_harness::pages::PopupPage;
use veil_harness::{
    Diagnostics, FlowError, HarnessConfig, MandatoryFlow, OauthDriver, ProfileOps,
    ProfileRecord, WindowRole, init_tracing, registry,
};

fn load_config() -> HarnessConfig {
    init_tracing();
    HarnessConfig::load().expect("harness configuration (extension dir, id, credentials)")
}

async fn launch(config: &HarnessConfig) -> ExtensionSession {
    ExtensionSession::launch(config.session_config())
        .await
        .expect("browser launch with extension loaded")
}

#[tokio::test]
#[ignore = "needs a Chrome binary, an extension build, and live credentials"]
async fn complete_lifecycle_create_select_delete() {
    let config = load_config();
    let session = launch(&config).await;

    let flow = MandatoryFlow::new(&session, &config);
    let (_windows, registry) = flow.run().await.expect("mandatory flow");

    let ops = ProfileOps::new(&session, &registry, &config.timings);
    let record = ProfileRecord::new("E2E Test Profile")
        .with_emails("real@example.com", "alias@example.com");
    ops.create(&record).await.expect("profile creation");

    let selected = ops.select("E2E Test Profile").await.expect("profile selection");
    assert_eq!(selected, "E2E Test Profile");

    ops.delete_selected().await.expect("profile deletion");

    // The deleted name must no longer be selectable.
    let err = ops.select("E2E Test Profile").await.unwrap_err();
    assert!(
        matches!(err, FlowError::Browser(_)),
        "expected a missing-option failure, got {err:?}"
    );

    session.close().await.expect("session shutdown");
}

#[tokio::test]
#[ignore = "needs a Chrome binary, an extension build, and live credentials"]
async fn profile_survives_surface_close_and_reopen() {
    let config = load_config();
    let session = launch(&config).await;

    let flow = MandatoryFlow::new(&session, &config);
    let (windows, mut registry) = flow.run().await.expect("mandatory flow");

    let ops = ProfileOps::new(&session, &registry, &config.timings);
    ops.create(&ProfileRecord::new("Persistent Profile"))
        .await
        .expect("profile creation");

    // Tear down the surface window entirely.
    let surface = session
        .page_for(registry.resolve(WindowRole::Surface).expect("surface handle"))
        .await
        .expect("surface page");
    surface.close().await.expect("surface close");

    // Reopen by direct navigation; the authenticated session and the
    // profile both live in extension storage and must survive.
    let platform = session
        .page_for(&windows.platform)
        .await
        .expect("platform page");
    let reopened = veil_harness::activate::SurfaceActivation::activate(
        &DirectNavigation,
        &session,
        &platform,
        &config,
    )
    .await
    .expect("surface reopen");
    registry.replace(WindowRole::Surface, reopened.handle());

    let popup = PopupPage::new(&reopened);
    popup
        .wait_authenticated(&config.timings)
        .await
        .expect("session still authenticated after reopen");

    let ops = ProfileOps::new(&session, &registry, &config.timings);
    let selected = ops.select("Persistent Profile").await.expect("profile selection");
    assert_eq!(selected, "Persistent Profile");

    session.close().await.expect("session shutdown");
}

#[tokio::test]
#[ignore = "needs a Chrome binary, an extension build, and live credentials"]
async fn sign_out_returns_popup_to_signed_out_state() {
    let config = load_config();
    let session = launch(&config).await;

    let flow = MandatoryFlow::new(&session, &config);
    let (windows, registry) = flow.run().await.expect("mandatory flow");

    let surface = session.page_for(&windows.surface).await.expect("surface page");
    let popup = PopupPage::new(&surface);

    // Protection controls are live while authenticated; flipping the
    // master toggle must change the reported state.
    let enabled = popup.is_protection_enabled().await.expect("toggle state");
    popup
        .toggle_protection(&config.timings)
        .await
        .expect("toggle click");
    let flipped = popup.is_protection_enabled().await.expect("toggle state");
    assert_ne!(enabled, flipped, "master toggle state did not change");

    let diag = Diagnostics::new(config.artifact_dir.clone());
    let driver = OauthDriver::new(&session, &config, &diag);
    driver.sign_out(&registry).await.expect("sign out");

    assert!(
        !popup.is_authenticated().await.expect("auth state"),
        "popup still reports an authenticated session after sign-out"
    );
    assert!(
        surface
            .exists(PopupPage::SIGN_IN_BUTTON)
            .await
            .expect("header query"),
        "sign-in affordance did not return"
    );

    session.close().await.expect("session shutdown");
}

#[tokio::test]
#[ignore = "needs a Chrome binary and an extension build (no credentials required)"]
async fn missing_consent_window_yields_timeout_and_artifact() {
    let config = load_config();
    let session = launch(&config).await;

    // A "before" snapshot containing every live window means no diff can
    // ever succeed; the poll must exhaust its attempt budget.
    let before = session.windows().await.expect("window enumeration");
    let mut timings = config.timings.clone();
    timings.window_poll_attempts = 2;
    timings.window_poll_interval_ms = 100;

    let err = registry::wait_for_new_window(&session, &before, &timings)
        .await
        .unwrap_err();
    assert!(
        matches!(err, FlowError::WindowNotFound { attempts: 2 }),
        "got {err:?}"
    );

    // The diagnostic boundary must still produce a screenshot from
    // whatever window answers.
    let artifacts = tempfile::tempdir().expect("tempdir");
    let diag = Diagnostics::new(artifacts.path());
    diag.capture_any(&session, "consent-window-missing").await;

    let captured_png = std::fs::read_dir(artifacts.path())
        .expect("artifact dir")
        .filter_map(std::result::Result::ok)
        .any(|entry| entry.path().extension().is_some_and(|ext| ext == "png"));
    assert!(captured_png, "no screenshot artifact was written");

    session.close().await.expect("session shutdown");
}

#[tokio::test]
#[ignore = "needs a Chrome binary and an extension build (no credentials required)"]
async fn flow_fails_cleanly_without_credentials() {
    init_tracing();
    let mut config =
        HarnessConfig::load().expect("harness configuration (extension dir and id)");
    config.email = None;
    config.password = None;

    let session = launch(&config).await;

    // Credentials are checked before any window opens.
    let err = MandatoryFlow::new(&session, &config)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Setup(_)), "got {err:?}");
    assert_eq!(
        session.windows().await.expect("window enumeration").len(),
        1,
        "only the browser's initial blank window should exist"
    );

    session.close().await.expect("session shutdown");
}
