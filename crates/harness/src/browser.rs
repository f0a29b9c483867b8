//! Per-session browser control
//!
//! Each actor session gets its own Chromium process with a throwaway
//! profile directory, so cookies and localStorage never cross between
//! roles. Element discovery goes through prioritized lookup lists; every
//! wait is a bounded condition poll, never a fixed sleep.

use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::config::{BrowserOptions, Timeouts, Viewport};
use crate::error::{HarnessError, HarnessResult};

/// Confidence of a lookup or resolution result. Exact means the match
/// keyed on the intended identifier; heuristic means a fallback strategy
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Exact,
    Heuristic,
}

/// One discovery strategy.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Plain CSS selector.
    Css(String),
    /// All elements matching `selector` whose inner text contains
    /// `needle`, case-insensitive.
    TextContains { selector: String, needle: String },
}

/// A (strategy, confidence) pair. Lookup lists are tried in order and
/// the first success wins, with the confidence propagated to callers.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub strategy: Strategy,
    pub confidence: Confidence,
}

impl Lookup {
    pub fn css(selector: impl Into<String>, confidence: Confidence) -> Self {
        Self { strategy: Strategy::Css(selector.into()), confidence }
    }

    pub fn text(
        selector: impl Into<String>,
        needle: impl Into<String>,
        confidence: Confidence,
    ) -> Self {
        Self {
            strategy: Strategy::TextContains {
                selector: selector.into(),
                needle: needle.into(),
            },
            confidence,
        }
    }
}

/// An isolated browser process plus its open page.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: PageHandle,
    // keeps the throwaway profile alive for the session's lifetime
    _profile_dir: TempDir,
}

impl BrowserSession {
    pub async fn launch(
        opts: &BrowserOptions,
        viewport: Viewport,
        timeouts: Timeouts,
    ) -> HarnessResult<Self> {
        let profile_dir = tempfile::tempdir()?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile_dir.path())
            .window_size(viewport.width, viewport.height)
            .no_sandbox();
        if !opts.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(HarnessError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::task::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        debug!(
            width = viewport.width,
            height = viewport.height,
            "browser session launched"
        );

        Ok(Self {
            browser,
            handler_task,
            page: PageHandle {
                page,
                slow_mo: Duration::from_millis(opts.slow_mo_ms),
                timeouts,
            },
            _profile_dir: profile_dir,
        })
    }

    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    /// Release the browsing context. Must be called exactly once per
    /// launch; if the session is dropped instead (whole-run timeout),
    /// the child process is killed on drop.
    pub async fn close(mut self) -> HarnessResult<()> {
        self.browser.close().await?;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }
}

/// Navigation and element access for one page.
pub struct PageHandle {
    page: Page,
    slow_mo: Duration,
    timeouts: Timeouts,
}

impl PageHandle {
    pub async fn goto(&self, url: &str) -> HarnessResult<()> {
        debug!(url, "navigating");
        self.page.goto(url).await?;
        self.pace().await;
        Ok(())
    }

    pub async fn current_url(&self) -> HarnessResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    /// Try each lookup in order; first success wins.
    pub async fn find_first(
        &self,
        lookups: &[Lookup],
    ) -> HarnessResult<Option<(Element, Confidence)>> {
        for lookup in lookups {
            match &lookup.strategy {
                Strategy::Css(selector) => {
                    if let Ok(element) = self.page.find_element(selector.as_str()).await {
                        trace!(selector, "css strategy matched");
                        return Ok(Some((element, lookup.confidence)));
                    }
                }
                Strategy::TextContains { selector, needle } => {
                    let needle = needle.to_lowercase();
                    let elements =
                        self.page.find_elements(selector.as_str()).await.unwrap_or_default();
                    for element in elements {
                        let text =
                            element.inner_text().await.ok().flatten().unwrap_or_default();
                        if text.to_lowercase().contains(&needle) {
                            trace!(selector, needle, "text strategy matched");
                            return Ok(Some((element, lookup.confidence)));
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    /// Same as [`find_first`](Self::find_first) but scoped to a
    /// container element, typically one order's row or card.
    pub async fn find_first_in(
        &self,
        scope: &Element,
        lookups: &[Lookup],
    ) -> HarnessResult<Option<(Element, Confidence)>> {
        for lookup in lookups {
            match &lookup.strategy {
                Strategy::Css(selector) => {
                    if let Ok(element) = scope.find_element(selector.as_str()).await {
                        return Ok(Some((element, lookup.confidence)));
                    }
                }
                Strategy::TextContains { selector, needle } => {
                    let needle = needle.to_lowercase();
                    let elements =
                        scope.find_elements(selector.as_str()).await.unwrap_or_default();
                    for element in elements {
                        let text =
                            element.inner_text().await.ok().flatten().unwrap_or_default();
                        if text.to_lowercase().contains(&needle) {
                            return Ok(Some((element, lookup.confidence)));
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    /// Poll for a lookup match until `timeout` elapses, yielding between
    /// probes.
    pub async fn wait_for(
        &self,
        lookups: &[Lookup],
        timeout: Duration,
    ) -> HarnessResult<Option<(Element, Confidence)>> {
        let start = Instant::now();
        loop {
            if let Some(found) = self.find_first(lookups).await? {
                return Ok(Some(found));
            }
            if start.elapsed() >= timeout {
                return Ok(None);
            }
            sleep(self.timeouts.poll_interval()).await;
        }
    }

    pub async fn click(&self, element: &Element) -> HarnessResult<()> {
        element.click().await?;
        self.pace().await;
        Ok(())
    }

    pub async fn fill(&self, element: &Element, value: &str) -> HarnessResult<()> {
        element.click().await?;
        element.type_str(value).await?;
        self.pace().await;
        Ok(())
    }

    pub async fn inner_text(&self, element: &Element) -> HarnessResult<Option<String>> {
        Ok(element.inner_text().await?)
    }

    pub async fn attribute(&self, element: &Element, name: &str) -> HarnessResult<Option<String>> {
        Ok(element.attribute(name).await?)
    }

    pub async fn find_all(&self, selector: &str) -> HarnessResult<Vec<Element>> {
        Ok(self.page.find_elements(selector).await.unwrap_or_default())
    }

    async fn pace(&self) {
        if !self.slow_mo.is_zero() {
            sleep(self.slow_mo).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_constructors_carry_confidence() {
        let css = Lookup::css("#checkout-btn", Confidence::Exact);
        assert!(matches!(css.strategy, Strategy::Css(ref s) if s == "#checkout-btn"));
        assert_eq!(css.confidence, Confidence::Exact);

        let text = Lookup::text("button", "Cobrar", Confidence::Heuristic);
        assert!(
            matches!(text.strategy, Strategy::TextContains { ref needle, .. } if needle == "Cobrar")
        );
        assert_eq!(text.confidence, Confidence::Heuristic);
    }

    #[test]
    fn confidence_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Confidence::Exact).unwrap(), "\"exact\"");
        assert_eq!(serde_json::to_string(&Confidence::Heuristic).unwrap(), "\"heuristic\"");
    }
}
