//! Runtime configuration, built once at startup and passed by reference into
//! the components that need it.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Settings for the news portal scrape.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Portal origin; relative article links resolve against this.
    pub base_url: String,
    /// Section path appended to the base URL for the headline stream.
    pub category: String,
    /// Minimum spacing between consecutive browser requests.
    pub request_interval: Duration,
    /// Scroll budget for the headline stream.
    pub scroll_passes: u32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hk.news.yahoo.com".to_string(),
            category: "archive".to_string(),
            request_interval: Duration::from_secs(3),
            scroll_passes: 7,
        }
    }
}

/// Settings for the LLM gateway. Present only when the gateway environment
/// variables are set; the scrape-only path never needs them.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway proxying the Azure OpenAI deployment.
    pub url: String,
    /// Deployment name addressed under `/openai/deployments/`.
    pub deployment: String,
    /// `api-version` query parameter.
    pub api_version: String,
    /// OAuth token endpoint for the client-credentials exchange.
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl GatewayConfig {
    fn from_env() -> Option<Self> {
        let url = env::var("LLM_GATEWAY_URL").ok()?;
        let token_url = env::var("OAUTH_TOKEN_URL").ok()?;
        let client_id = env::var("OAUTH_CLIENT_ID").ok()?;
        let client_secret = env::var("OAUTH_CLIENT_SECRET").ok()?;
        Some(Self {
            url,
            deployment: env::var("LLM_DEPLOYMENT")
                .unwrap_or_else(|_| "gpt-4o-deploy-gs".to_string()),
            api_version: env::var("LLM_API_VERSION").unwrap_or_else(|_| "2024-05-13".to_string()),
            token_url,
            client_id,
            client_secret,
        })
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the headline snapshot, the summary digest, and the
    /// subscriber registry.
    pub data_dir: PathBuf,
    /// WebDriver endpoint for the scraping browser session.
    pub webdriver_url: String,
    /// Whether to run the browser headless.
    pub headless: bool,
    pub portal: PortalConfig,
    pub gateway: Option<GatewayConfig>,
}

impl AppConfig {
    /// Read configuration from the environment. Everything except the
    /// gateway section has a working default.
    pub fn from_env() -> Self {
        let mut portal = PortalConfig::default();
        if let Ok(base_url) = env::var("NEWS_PORTAL_URL") {
            portal.base_url = base_url;
        }
        if let Ok(category) = env::var("NEWS_PORTAL_CATEGORY") {
            portal.category = category;
        }
        if let Some(secs) = env::var("NEWS_REQUEST_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            portal.request_interval = Duration::from_secs(secs);
        }
        if let Some(passes) = env::var("NEWS_SCROLL_PASSES")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            portal.scroll_passes = passes;
        }

        Self {
            data_dir: env::var("NEWS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            webdriver_url: env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| "http://localhost:9515".to_string()),
            headless: env::var("NEWS_HEADLESS")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            portal,
            gateway: GatewayConfig::from_env(),
        }
    }

    pub fn require_gateway(&self) -> Result<&GatewayConfig> {
        self.gateway.as_ref().ok_or_else(|| {
            Error::Config(
                "LLM_GATEWAY_URL, OAUTH_TOKEN_URL, OAUTH_CLIENT_ID and OAUTH_CLIENT_SECRET \
                 must be set to summarize"
                    .to_string(),
            )
        })
    }

    pub fn headlines_file(&self) -> PathBuf {
        self.data_dir.join("headlines.json")
    }

    pub fn summaries_file(&self) -> PathBuf {
        self.data_dir.join("summaries.json")
    }

    pub fn subscribers_file(&self) -> PathBuf {
        self.data_dir.join("subscribers.json")
    }
}
