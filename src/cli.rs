//! Command-line interface definitions.
//!
//! All options can be provided via command-line flags or environment
//! variables; unset options fall back to [`crate::config::AppConfig`]
//! defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use hk_news_digest::config::AppConfig;

/// Command-line arguments for the digest pipeline.
///
/// # Examples
///
/// ```sh
/// # Scrape the portal and persist the headline snapshot
/// hk_news_digest scrape
///
/// # Full cycle: scrape, summarize, persist the digest
/// hk_news_digest summarize
///
/// # Against a non-default chromedriver, with a visible browser window
/// hk_news_digest --webdriver-url http://localhost:4444 --headed scrape
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory for headlines.json, summaries.json and subscribers.json
    #[arg(short, long, env = "NEWS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// WebDriver endpoint for the scraping browser session
    #[arg(long, env = "WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// Run the browser with a visible window instead of headless
    #[arg(long)]
    pub headed: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape the portal and persist the deduplicated headline snapshot
    Scrape,
    /// Scrape, then cluster and summarize the headlines into a digest
    Summarize,
}

impl Cli {
    /// Fold command-line overrides into the environment-derived config.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(webdriver_url) = &self.webdriver_url {
            config.webdriver_url = webdriver_url.clone();
        }
        if self.headed {
            config.headless = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["hk_news_digest", "--data-dir", "/tmp/news", "scrape"]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/news")));
        assert!(matches!(cli.command, Command::Scrape));
    }

    #[test]
    fn test_cli_headed_override() {
        let cli = Cli::parse_from(["hk_news_digest", "--headed", "summarize"]);
        let mut config = AppConfig::from_env();
        config.headless = true;
        cli.apply(&mut config);
        assert!(!config.headless);
        assert!(matches!(cli.command, Command::Summarize));
    }
}
