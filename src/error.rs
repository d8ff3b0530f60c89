//! Error taxonomy for the scrape/summarize/deliver pipeline.
//!
//! Each variant maps to a distinct failure class with its own retry policy:
//! navigation and element waits are retried a fixed number of times inside
//! the driver, rate limits are retried with backoff by the summarization
//! client, and structural or format errors are fatal to the current cycle
//! and surfaced loudly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The browser failed to navigate to a page. Retried up to 3 times by
    /// the driver, then fatal to the scrape run.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// An expected element never appeared within the wait window. The driver
    /// reloads the page between attempts; after 3 attempts this is fatal.
    #[error("timed out waiting for element #{0}")]
    ElementTimeout(String),

    /// The page markup no longer matches the extraction heuristics. Fatal and
    /// never retried: a silent skip would produce empty or wrong snapshots.
    #[error("page structure changed: {0}")]
    StructuralParse(String),

    /// The model provider rejected the request with a rate limit. Retried
    /// with randomized exponential backoff, then re-raised.
    #[error("model provider rate limited the request: {0}")]
    RateLimit(String),

    /// The model's output could not be parsed or references headlines that
    /// do not exist. Fatal to the cycle; not worth an automatic re-query.
    #[error("model output could not be processed: {0}")]
    Format(String),

    /// Any non-429 failure status from the LLM gateway. Not retried.
    #[error("model gateway returned HTTP {status}: {body}")]
    Gateway { status: u16, body: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// Browser session setup or teardown failed.
    #[error("browser session error: {0}")]
    Session(String),

    #[error("webdriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("timestamp parse failed: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
