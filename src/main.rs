//! Pipeline entry point: scrape the headline stream, optionally summarize it
//! into a digest, and persist both as JSON snapshots.
//!
//! The browser session is acquired at the start of a scrape and released on
//! every exit path before the result propagates; a failed cycle aborts
//! without touching the previously persisted files.

use std::error::Error;

use chrono::Local;
use clap::Parser;
use tracing::{error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::{Cli, Command};
use hk_news_digest::config::AppConfig;
use hk_news_digest::models::{HeadlineSnapshot, SummaryDigest};
use hk_news_digest::scrapers::browser::WebDriverBrowser;
use hk_news_digest::scrapers::driver::NewsDriver;
use hk_news_digest::scrapers::yahoo;
use hk_news_digest::store;
use hk_news_digest::summarize::{ClientCredentialsTokenProvider, SummarizationClient};
use hk_news_digest::utils::format_timestamp;
use hk_news_digest::{enrich, Result};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("hk_news_digest starting up");

    let args = Cli::parse();
    let mut config = AppConfig::from_env();
    args.apply(&mut config);

    match args.command {
        Command::Scrape => {
            run_scrape(&config).await?;
        }
        Command::Summarize => {
            run_summarize(&config).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, "execution complete");
    Ok(())
}

/// One scrape cycle: acquire a browser session, scrape the stream, release
/// the session, then dedupe and persist the snapshot.
#[instrument(level = "info", skip_all)]
async fn run_scrape(config: &AppConfig) -> Result<HeadlineSnapshot> {
    let browser = WebDriverBrowser::connect(&config.webdriver_url, config.headless).await?;
    let mut driver = NewsDriver::new(browser, config.portal.request_interval);

    // The session is closed on both paths before the scrape result is
    // inspected; a scrape failure wins over a teardown failure.
    let scraped = yahoo::scrape_headlines(&mut driver, &config.portal).await;
    let closed = driver.close().await;
    let headlines = match scraped {
        Ok(headlines) => headlines,
        Err(e) => {
            error!(error = %e, "scrape failed");
            return Err(e);
        }
    };
    closed?;

    store::persist_snapshot(headlines, &config.headlines_file()).await
}

/// One summarization cycle: scrape, prompt the model, enrich the reply, and
/// persist the digest.
#[instrument(level = "info", skip_all)]
async fn run_summarize(config: &AppConfig) -> Result<()> {
    let snapshot = run_scrape(config).await?;

    let gateway = config.require_gateway()?;
    let tokens = ClientCredentialsTokenProvider::new(gateway)?;
    let client = SummarizationClient::new(gateway.clone(), tokens)?;

    let response = client.summarize(&snapshot.headlines).await?;
    let summaries = enrich::enrich(&response.raw, &snapshot.headlines)?;

    let digest = SummaryDigest {
        last_updated: format_timestamp(Local::now().naive_local()),
        model: response.model,
        usage: response.usage,
        duration: response.duration_seconds,
        summaries,
    };
    store::persist_digest(&digest, &config.summaries_file()).await
}
