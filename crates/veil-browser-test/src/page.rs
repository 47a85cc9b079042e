//! Page-level operations: navigation, DOM interaction, screenshots.
//!
//! `Page` wraps a chromiumoxide page and exposes the interaction surface
//! the harness needs: bounded element waits, click/fill/submit on form
//! controls, `<select>` manipulation, and full-page screenshots for the
//! diagnostic boundary. Selector strings are always JSON-encoded before
//! being spliced into scripts so hostile or merely odd selectors cannot
//! inject code.

use crate::console::ConsoleTail;
use crate::error::{BrowserError, Result};
use crate::session::WindowHandle;
use crate::wait::{WaitConfig, wait_for_result};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page as ChromePage;
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A controllable browser tab or popup window.
#[derive(Debug)]
pub struct Page {
    inner: Arc<ChromePage>,
    console: ConsoleTail,
    console_task: TaskGuard,
}

/// Aborts the wrapped task when dropped.
///
/// Pages are routinely looked up transiently and dropped without an
/// explicit `close()`; their console-listener tasks must not outlive
/// them.
#[derive(Debug)]
struct TaskGuard(JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Page {
    /// Wraps a chromiumoxide page and starts console capture.
    ///
    /// Constructed by `ExtensionSession`; harness code never builds a Page
    /// directly.
    pub(crate) fn new(page: ChromePage) -> Self {
        let console = ConsoleTail::new();
        let console_clone = console.clone();
        let page_arc = Arc::new(page);

        let page_for_task = page_arc.clone();
        let console_task = tokio::spawn(async move {
            if let Ok(mut events) = page_for_task
                .event_listener::<EventConsoleApiCalled>()
                .await
            {
                while let Some(event) = events.next().await {
                    console_clone.observe(&event);
                }
            }
        });

        Self {
            inner: page_arc,
            console,
            console_task: TaskGuard(console_task),
        }
    }

    /// The opaque handle identifying this window within its session.
    #[must_use]
    pub fn handle(&self) -> WindowHandle {
        WindowHandle::new(self.inner.target_id().clone())
    }

    /// The warning/error console tail captured on this page.
    #[must_use]
    pub fn console(&self) -> &ConsoleTail {
        &self.console
    }

    /// Navigates to an absolute URL and waits for the document to settle.
    ///
    /// # Errors
    ///
    /// `NavigationFailed` if the load fails or times out.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        self.wait_for_load(WaitConfig::default()).await?;
        Ok(())
    }

    /// Waits until `document.readyState` is `complete`.
    ///
    /// Called by `navigate()`; call it directly after navigations triggered
    /// from inside the page.
    ///
    /// # Errors
    ///
    /// `WaitTimeout` if the document never settles.
    pub async fn wait_for_load(&self, config: WaitConfig) -> Result<()> {
        wait_for_result(
            || {
                let page = self.inner.clone();
                async move {
                    let result = page
                        .evaluate("document.readyState")
                        .await
                        .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;

                    let ready = result
                        .value()
                        .and_then(|v| v.as_str())
                        .is_some_and(|s| s == "complete");

                    Ok(ready)
                }
            },
            config,
            "document ready",
        )
        .await
    }

    /// Executes JavaScript in the page context and deserializes the result.
    ///
    /// # Errors
    ///
    /// `ScriptExecutionFailed` if evaluation fails or the result cannot be
    /// deserialized into `T`.
    pub async fn evaluate<T>(&self, script: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let result = self
            .inner
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;

        result
            .into_value()
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))
    }

    /// Waits for a CSS selector to appear in the DOM.
    ///
    /// # Errors
    ///
    /// `WaitTimeout` naming the selector when it never appears.
    pub async fn wait_for_selector(&self, selector: &str, config: WaitConfig) -> Result<()> {
        let selector_owned = selector.to_string();

        wait_for_result(
            || {
                let page = self.inner.clone();
                let sel = selector_owned.clone();
                async move {
                    let escaped = encode_selector(&sel)?;
                    let script = format!("!!document.querySelector({escaped})");
                    let result = page
                        .evaluate(script.as_str())
                        .await
                        .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;

                    Ok(result
                        .value()
                        .and_then(serde_json::Value::as_bool)
                        .unwrap_or(false))
                }
            },
            config,
            &format!("selector '{selector}'"),
        )
        .await
    }

    /// Returns true if the selector matches an element right now.
    ///
    /// Single snapshot, no waiting. This is the building block for
    /// presence predicates like "is the sign-out control visible".
    ///
    /// # Errors
    ///
    /// `ScriptExecutionFailed` if the query cannot run at all.
    pub async fn exists(&self, selector: &str) -> Result<bool> {
        let escaped = encode_selector(selector)?;
        self.evaluate(&format!("!!document.querySelector({escaped})"))
            .await
    }

    /// Finds an element, failing with a typed error naming the selector.
    async fn find(&self, selector: &str) -> Result<Element> {
        self.inner
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::ElementNotFound {
                selector: selector.to_string(),
                reason: e.to_string(),
            })
    }

    /// Clicks the element matching `selector`.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` when nothing matches.
    pub async fn click(&self, selector: &str) -> Result<()> {
        let element = self.find(selector).await?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;
        Ok(())
    }

    /// Clears the element matching `selector` and types `text` into it.
    ///
    /// Clearing dispatches an `input` event so frameworks watching the
    /// field observe the reset, matching what a real user's select-all +
    /// delete would produce.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` when nothing matches.
    pub async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        let element = self.find(selector).await?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;
        element
            .call_js_fn(
                "function() { this.value = ''; this.dispatchEvent(new Event('input', { bubbles: true })); }",
                false,
            )
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;
        element
            .type_str(text)
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;
        Ok(())
    }

    /// Presses a named key (e.g. "Enter") on the element matching `selector`.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` when nothing matches.
    pub async fn press_key(&self, selector: &str, key: &str) -> Result<()> {
        let element = self.find(selector).await?;
        element
            .press_key(key)
            .await
            .map_err(|e| BrowserError::InputDispatch(e.to_string()))?;
        Ok(())
    }

    /// Selects the `<option>` with the given visible text in a `<select>`.
    ///
    /// Dispatches a `change` event, as a user-driven selection would.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` when the select or the option is missing.
    pub async fn select_option(&self, selector: &str, visible_text: &str) -> Result<()> {
        let sel = encode_selector(selector)?;
        let text = encode_selector(visible_text)?;
        let script = format!(
            "(() => {{
                const select = document.querySelector({sel});
                if (!select) return 'no-select';
                const option = Array.from(select.options).find(o => o.text === {text});
                if (!option) return 'no-option';
                select.value = option.value;
                select.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return 'ok';
            }})()"
        );

        let outcome: String = self.evaluate(&script).await?;
        match outcome.as_str() {
            "ok" => Ok(()),
            "no-select" => Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
                reason: "select element not present".to_string(),
            }),
            _ => Err(BrowserError::ElementNotFound {
                selector: format!("{selector} option[text={visible_text}]"),
                reason: "no option with that visible text".to_string(),
            }),
        }
    }

    /// Returns the visible text of the currently selected option, or `None`
    /// when the select is missing or empty.
    ///
    /// # Errors
    ///
    /// `ScriptExecutionFailed` if the query cannot run.
    pub async fn selected_option_text(&self, selector: &str) -> Result<Option<String>> {
        let sel = encode_selector(selector)?;
        let script = format!(
            "(() => {{
                const select = document.querySelector({sel});
                if (!select || select.selectedIndex < 0) return null;
                return select.options[select.selectedIndex].text;
            }})()"
        );
        self.evaluate(&script).await
    }

    /// Returns the trimmed inner text of the element matching `selector`.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` when nothing matches.
    pub async fn inner_text(&self, selector: &str) -> Result<String> {
        let element = self.find(selector).await?;
        let text = element
            .inner_text()
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    /// Focuses this window, making it the active browsing context.
    ///
    /// # Errors
    ///
    /// Fails when the underlying target is gone.
    pub async fn bring_to_front(&self) -> Result<()> {
        self.inner
            .bring_to_front()
            .await
            .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    /// Returns the current page URL.
    ///
    /// # Errors
    ///
    /// `ScriptExecutionFailed` if the query cannot run.
    pub async fn url(&self) -> Result<String> {
        self.evaluate("window.location.href").await
    }

    /// Returns the page title.
    ///
    /// # Errors
    ///
    /// `ScriptExecutionFailed` if the query cannot run.
    pub async fn title(&self) -> Result<String> {
        self.evaluate("document.title").await
    }

    /// Takes a full-page screenshot and returns PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if capture fails.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.inner
            .screenshot(chromiumoxide::page::ScreenshotParams::default())
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))
    }

    /// Closes this window. The handle becomes invalid; `page_for` on it
    /// afterwards reports `TargetGone`.
    ///
    /// # Errors
    ///
    /// Fails when the close command cannot be delivered.
    pub async fn close(self) -> Result<()> {
        // The console task is aborted by the TaskGuard when `self` drops.
        let page = self.inner.as_ref().clone();
        page.close()
            .await
            .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    /// Raw access for the synthetic-input backend in this crate.
    pub(crate) fn raw(&self) -> Arc<ChromePage> {
        self.inner.clone()
    }
}

/// JSON-encodes a string for safe splicing into a page script.
///
/// JSON string syntax is valid JavaScript string syntax, so this closes
/// injection via quotes, backticks, and newlines in one step.
pub(crate) fn encode_selector(s: &str) -> Result<String> {
    serde_json::to_string(s).map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_encoding_wraps_and_escapes() {
        let cases = vec![
            ("#profileSelect", r##""#profileSelect""##.to_string()),
            (r#"'); alert(1);//"#, serde_json::to_string(r#"'); alert(1);//"#).unwrap()),
        ];

        for (input, expected) in cases {
            assert_eq!(encode_selector(input).unwrap(), expected);
        }
    }

    #[test]
    fn selector_encoding_neutralizes_backticks_and_newlines() {
        let hostile = "`${alert(1)}`\nrest";
        let encoded = encode_selector(hostile).unwrap();
        assert!(encoded.starts_with('"') && encoded.ends_with('"'));
        assert!(!encoded.contains('\n'), "newline must be escaped");
    }

    #[tokio::test]
    async fn dropping_task_guard_aborts_the_task() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        // The task parks forever while owning the sender; only an abort
        // can release it and drop `tx`.
        let guard = TaskGuard(tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        }));

        drop(guard);

        // Sender dropped without a send means the task was torn down.
        assert!(rx.await.is_err());
    }
}
