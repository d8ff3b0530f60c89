//! Rate-limited browser driver.
//!
//! [`NewsDriver`] gates every navigation and scroll step behind a minimum
//! inter-request interval, retries transient failures a bounded number of
//! times, and drives infinite-scroll pagination until content growth stalls.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, instrument, warn};

use super::browser::Browser;
use crate::error::{Error, Result};

/// Total navigation attempts before a scrape run is abandoned.
const NAVIGATION_ATTEMPTS: u32 = 3;
/// Total presence-wait attempts; the page is reloaded between attempts.
const ELEMENT_WAIT_ATTEMPTS: u32 = 3;
const ELEMENT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);
/// Consecutive unchanged height measurements that count as "end of content".
const STABLE_CHECKS: u32 = 3;

/// A browser session with request pacing and bounded retries.
pub struct NewsDriver<B: Browser> {
    browser: B,
    min_interval: Duration,
    last_visit: Option<Instant>,
}

impl<B: Browser> NewsDriver<B> {
    pub fn new(browser: B, min_interval: Duration) -> Self {
        Self {
            browser,
            min_interval,
            last_visit: None,
        }
    }

    /// Release the underlying browser session. Callers must invoke this on
    /// every exit path, including after a failed scrape.
    pub async fn close(self) -> Result<()> {
        self.browser.close().await
    }

    /// Sleep out the remainder of the minimum interval since the last gated
    /// request. The timestamp is taken when the gate is passed, so a slow
    /// request does not grant the next one a head start.
    async fn throttle(&mut self) {
        if let Some(last) = self.last_visit {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "throttling before next request");
                sleep(wait).await;
            }
        }
        self.last_visit = Some(Instant::now());
    }

    /// Navigate to `url`, retrying transient failures. Each attempt passes
    /// through the throttle; there is no extra backoff.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&mut self, url: &str) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.throttle().await;
            match self.browser.goto(url).await {
                Ok(()) => {
                    debug!(attempt, "navigation complete");
                    return Ok(());
                }
                Err(e) if attempt < NAVIGATION_ATTEMPTS => {
                    warn!(attempt, error = %e, "navigation failed; retrying");
                }
                Err(e) => {
                    error!(attempt, error = %e, "navigation failed; giving up");
                    return Err(e);
                }
            }
        }
    }

    /// Wait for an element to be present, reloading the page between
    /// attempts. The timeout per attempt is 10 seconds.
    #[instrument(level = "info", skip(self))]
    pub async fn wait_for_element(&mut self, id: &str) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.browser.wait_for_element(id, ELEMENT_WAIT_TIMEOUT).await {
                Ok(()) => return Ok(()),
                Err(Error::ElementTimeout(locator)) => {
                    warn!(%locator, attempt, "element not present; reloading page");
                    self.browser.refresh().await?;
                    if attempt >= ELEMENT_WAIT_ATTEMPTS {
                        return Err(Error::ElementTimeout(locator));
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Wait for a container and return its inner HTML.
    pub async fn container_html(&mut self, id: &str) -> Result<String> {
        self.wait_for_element(id).await?;
        self.browser.inner_html(id).await
    }

    /// Drive infinite-scroll pagination until the content height is unchanged
    /// for 3 consecutive measurements or the scroll budget is exhausted.
    /// Both stop conditions are a normal return: a stalled page and a
    /// finished page are indistinguishable from here, and the heuristic
    /// tolerates false completion.
    #[instrument(level = "info", skip(self))]
    pub async fn scroll_until_stable(
        &mut self,
        container_id: Option<&str>,
        max_scrolls: u32,
    ) -> Result<()> {
        if let Some(id) = container_id {
            self.wait_for_element(id).await?;
        }
        let mut scrolls = 0u32;
        let mut unchanged = 0u32;
        let mut last_height: Option<i64> = None;
        while unchanged < STABLE_CHECKS && scrolls < max_scrolls {
            self.browser.scroll_to_bottom(container_id).await?;
            self.throttle().await;
            let height = self.browser.content_height(container_id).await?;
            debug!(scrolls, ?last_height, height, "scroll step");
            if last_height == Some(height) {
                unchanged += 1;
            } else {
                unchanged = 0;
                scrolls += 1;
                last_height = Some(height);
            }
        }
        info!(scrolls, unchanged, "scrolling settled");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn browser(&self) -> &B {
        &self.browser
    }
}
