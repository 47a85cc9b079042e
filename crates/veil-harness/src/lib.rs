//! # veil-harness
//!
//! The mandatory-flow orchestrator for Veil extension end-to-end tests.
//!
//! Every functional test needs an authenticated, decrypted extension
//! session before it can assert anything, and bringing that session into
//! existence is the hard part: three independently-evolving pieces of
//! state (the tested platform page, the extension's own popup document,
//! and a third-party OAuth consent window) have to be coordinated with no
//! events or callbacks to observe; everything is polled or time-boxed.
//!
//! ## Flow
//!
//! ```text
//! Uninitialized → PlatformReady → SurfaceActive → Authenticating
//!              → Decrypting → Ready
//! ```
//!
//! Strictly forward, single attempt per run. Failure at any step
//! invalidates the whole flow; retry means a fresh session.
//!
//! ## Example
//!
//! ```ignore
//! use veil_browser_test::{ExtensionSession, SessionConfig};
//! use veil_harness::{HarnessConfig, MandatoryFlow, ProfileOps, ProfileRecord};
//!
//! let config = HarnessConfig::load()?;
//! let session = ExtensionSession::launch(config.session_config()).await?;
//!
//! let flow = MandatoryFlow::new(&session, &config);
//! let (windows, registry) = flow.run().await?;
//!
//! let ops = ProfileOps::new(&session, &registry, &config.timings);
//! ops.create(&ProfileRecord::new("E2E Test Profile")).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod activate;
pub mod config;
pub mod diag;
pub mod error;
pub mod flow;
pub mod oauth;
pub mod pages;
pub mod profiles;
pub mod registry;

pub use activate::{DevModeClickthrough, DirectNavigation, SurfaceActivation};
pub use config::{Credentials, HarnessConfig, Timings, init_tracing};
pub use diag::Diagnostics;
pub use error::{FlowError, FlowResult};
pub use flow::{FlowState, MandatoryFlow, ReadyWindows};
pub use oauth::OauthDriver;
pub use profiles::{ProfileOps, ProfileRecord};
pub use registry::{WindowRegistry, WindowRole};
