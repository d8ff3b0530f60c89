//! The browser seam.
//!
//! [`Browser`] is the narrow surface the driver needs from an automated
//! browser session: navigation, reload, presence waits, container HTML, and
//! the two scroll primitives. The production implementation speaks the
//! WebDriver protocol through `fantoccini`; tests drive the pager and fetcher
//! against a scripted fake instead of a real browser.

use std::time::Duration;

use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use tracing::{info, instrument};

use crate::error::{Error, Result};

/// Minimal browser surface used by [`super::driver::NewsDriver`].
///
/// Implementations must map a presence-wait timeout to
/// [`Error::ElementTimeout`] so the driver can tell "not there yet" apart
/// from a broken session.
pub trait Browser {
    async fn goto(&mut self, url: &str) -> Result<()>;
    async fn refresh(&mut self) -> Result<()>;
    async fn wait_for_element(&mut self, id: &str, timeout: Duration) -> Result<()>;
    /// Inner HTML of the element with the given id.
    async fn inner_html(&mut self, id: &str) -> Result<String>;
    /// Scroll the container (or the document, when `None`) to its bottom.
    async fn scroll_to_bottom(&mut self, container_id: Option<&str>) -> Result<()>;
    /// Scrollable content height of the container (or the document body).
    async fn content_height(&mut self, container_id: Option<&str>) -> Result<i64>;
    /// End the session. Must be called on every exit path; there is no
    /// implicit teardown.
    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// WebDriver-backed browser session.
pub struct WebDriverBrowser {
    client: Client,
}

impl WebDriverBrowser {
    /// Open a session against a WebDriver endpoint (e.g. chromedriver).
    #[instrument(level = "info", skip_all, fields(%webdriver_url, headless))]
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self> {
        let mut args = vec![
            "--disable-gpu",
            "--no-sandbox",
            "--mute-audio",
            "--disable-notifications",
            "--disable-popup-blocking",
            "--disable-background-networking",
        ];
        if headless {
            args.push("--headless");
        }
        let mut capabilities = serde_json::Map::new();
        capabilities.insert(
            "goog:chromeOptions".to_string(),
            serde_json::json!({ "args": args }),
        );

        let mut builder = ClientBuilder::rustls()
            .map_err(|e| Error::Session(format!("building webdriver client: {e}")))?;
        builder.capabilities(capabilities);
        let client = builder
            .connect(webdriver_url)
            .await
            .map_err(|e| Error::Session(format!("connecting to {webdriver_url}: {e}")))?;
        info!("browser session established");
        Ok(Self { client })
    }
}

impl Browser for WebDriverBrowser {
    async fn goto(&mut self, url: &str) -> Result<()> {
        Ok(self.client.goto(url).await?)
    }

    async fn refresh(&mut self) -> Result<()> {
        Ok(self.client.refresh().await?)
    }

    async fn wait_for_element(&mut self, id: &str, timeout: Duration) -> Result<()> {
        match self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Id(id))
            .await
        {
            Ok(_) => Ok(()),
            Err(CmdError::WaitTimeout) => Err(Error::ElementTimeout(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn inner_html(&mut self, id: &str) -> Result<String> {
        let element = self.client.find(Locator::Id(id)).await?;
        Ok(element.html(true).await?)
    }

    async fn scroll_to_bottom(&mut self, container_id: Option<&str>) -> Result<()> {
        match container_id {
            Some(id) => {
                self.client
                    .execute(
                        "document.getElementById(arguments[0]).scrollIntoView(false);",
                        vec![serde_json::json!(id)],
                    )
                    .await?;
            }
            None => {
                self.client
                    .execute("window.scrollTo(0, document.body.scrollHeight);", vec![])
                    .await?;
            }
        }
        Ok(())
    }

    async fn content_height(&mut self, container_id: Option<&str>) -> Result<i64> {
        let value = match container_id {
            Some(id) => {
                self.client
                    .execute(
                        "return document.getElementById(arguments[0]).scrollHeight;",
                        vec![serde_json::json!(id)],
                    )
                    .await?
            }
            None => {
                self.client
                    .execute("return document.body.scrollHeight;", vec![])
                    .await?
            }
        };
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .ok_or_else(|| Error::StructuralParse(format!("scroll height is not a number: {value}")))
    }

    async fn close(self) -> Result<()> {
        Ok(self.client.close().await?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Scripted browser for driver and extractor tests. Counts calls and can
    /// be primed with failures, wait timeouts, a height sequence (the last
    /// entry repeats once exhausted), and container HTML.
    #[derive(Debug, Default)]
    pub(crate) struct FakeBrowser {
        pub html: String,
        pub heights: Vec<i64>,
        pub goto_failures: u32,
        pub wait_timeouts: u32,
        pub goto_calls: u32,
        pub refresh_calls: u32,
        pub wait_calls: u32,
        pub scroll_calls: u32,
        pub height_cursor: usize,
    }

    impl Browser for FakeBrowser {
        async fn goto(&mut self, _url: &str) -> Result<()> {
            self.goto_calls += 1;
            if self.goto_failures > 0 {
                self.goto_failures -= 1;
                return Err(Error::Navigation("synthetic navigation failure".to_string()));
            }
            Ok(())
        }

        async fn refresh(&mut self) -> Result<()> {
            self.refresh_calls += 1;
            Ok(())
        }

        async fn wait_for_element(&mut self, id: &str, _timeout: Duration) -> Result<()> {
            self.wait_calls += 1;
            if self.wait_timeouts > 0 {
                self.wait_timeouts -= 1;
                return Err(Error::ElementTimeout(id.to_string()));
            }
            Ok(())
        }

        async fn inner_html(&mut self, _id: &str) -> Result<String> {
            Ok(self.html.clone())
        }

        async fn scroll_to_bottom(&mut self, _container_id: Option<&str>) -> Result<()> {
            self.scroll_calls += 1;
            Ok(())
        }

        async fn content_height(&mut self, _container_id: Option<&str>) -> Result<i64> {
            let height = self
                .heights
                .get(self.height_cursor)
                .or(self.heights.last())
                .copied()
                .unwrap_or(0);
            if self.height_cursor < self.heights.len() {
                self.height_cursor += 1;
            }
            Ok(height)
        }

        async fn close(self) -> Result<()> {
            Ok(())
        }
    }
}
