//! # veil-browser-test
//!
//! Browser-session primitives for driving the Veil extension through a real
//! Chrome instance over the Chrome DevTools Protocol (chromiumoxide).
//!
//! Extension testing cannot run headless (Chrome refuses to load unpacked
//! extensions without a real window), so everything here assumes a headful
//! browser with an isolated user-data directory per session.
//!
//! ## Architecture
//!
//! - **ExtensionSession**: one Chrome process + one profile dir + the
//!   extension preloaded; owns every window opened during its lifetime
//! - **WindowHandle**: opaque identifier for one browsing context (CDP
//!   target); never reused after the context closes
//! - **Page**: a controllable tab: navigation, DOM interaction, screenshots
//! - **RawInput**: trusted input injection for browser-chrome UI that lives
//!   outside any page DOM (the extension toolbar / chrome://extensions)
//! - **WaitConfig / settle / poll_attempts**: every suspension point in the
//!   harness is either a bounded condition poll or a named fixed delay
//!
//! ## Example
//!
//! ```ignore
//! use veil_browser_test::{ExtensionSession, SessionConfig};
//!
//! let config = SessionConfig::new("/path/to/extension/dist");
//! let session = ExtensionSession::launch(config).await?;
//! let page = session.new_page().await?;
//! page.navigate("https://chatgpt.com").await?;
//! session.close().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod console;
pub mod error;
pub mod input;
pub mod page;
pub mod session;
pub mod wait;

pub use console::{ConsoleEntry, ConsoleTail};
pub use error::{BrowserError, Result};
pub use input::{CdpInput, NamedKey, RawInput, x_at_width_percent};
pub use page::Page;
pub use session::{ExtensionSession, SessionConfig, WindowHandle};
pub use wait::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, WaitConfig, poll_attempts, settle, wait_for, wait_for_result};
