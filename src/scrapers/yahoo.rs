//! Yahoo News Hong Kong headline-stream scraper.
//!
//! The archive page renders headlines into an infinite-scroll stream. The
//! scrape loads the page, scrolls the stream until it stops growing, and
//! parses the container's inner HTML into [`Headline`] records.
//!
//! Extraction is deliberately strict: when a structural query stops matching,
//! the portal has changed its markup and the scrape fails loudly instead of
//! silently producing an empty snapshot.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use super::browser::Browser;
use super::driver::NewsDriver;
use crate::config::PortalConfig;
use crate::error::{Error, Result};
use crate::models::Headline;

/// Id of the infinite-scroll stream container on the archive page.
pub const STREAM_CONTAINER_ID: &str = "stream-container-scroll-template";

/// Teaser text of the portal's ad-like search-promo blocks. Items carrying it
/// are noise specific to the portal, not malformed articles.
const FILLER_SUMMARY: &str = "為您搜羅最新熱門搜尋資訊，立即查看！睇更多";

/// Stream items sit in `li` wrappers; ad slots carry a `StreamAd` class. The
/// item body is the second-to-last `div` of the innermost wrapper.
static STREAM_ITEM: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("li:not([class*='StreamAd']) > div > div > div > div:nth-last-of-type(2)")
        .unwrap()
});

/// Scrape the headline stream: navigate, scroll until stable, extract.
///
/// Returns headlines in document order, duplicates included; deduplication
/// is the store's concern.
#[instrument(level = "info", skip_all)]
pub async fn scrape_headlines<B: Browser>(
    driver: &mut NewsDriver<B>,
    portal: &PortalConfig,
) -> Result<Vec<Headline>> {
    let stream_url = format!(
        "{}/{}",
        portal.base_url.trim_end_matches('/'),
        portal.category
    );
    driver.fetch(&stream_url).await?;
    driver
        .scroll_until_stable(Some(STREAM_CONTAINER_ID), portal.scroll_passes)
        .await?;
    let html = driver.container_html(STREAM_CONTAINER_ID).await?;
    let base = Url::parse(&portal.base_url)?;
    let headlines = extract_headlines(&html, &base)?;
    info!(count = headlines.len(), url = %stream_url, "extracted headlines");
    Ok(headlines)
}

/// Parse the stream container's inner HTML into headline records.
pub fn extract_headlines(html: &str, base: &Url) -> Result<Vec<Headline>> {
    let fragment = Html::parse_fragment(html);
    let mut headlines = Vec::new();
    for item in fragment.select(&STREAM_ITEM) {
        let summary = text_of(direct_child(&item, "p").ok_or_else(|| {
            Error::StructuralParse("stream item is missing its <p> teaser".to_string())
        })?);
        if summary == FILLER_SUMMARY {
            continue;
        }
        let heading = direct_child(&item, "h3").ok_or_else(|| {
            Error::StructuralParse("stream item is missing its <h3> heading".to_string())
        })?;
        let title = text_of(heading);
        let meta_line = text_of(direct_child(&item, "div").ok_or_else(|| {
            Error::StructuralParse("stream item is missing its metadata line".to_string())
        })?);
        let (publisher, time) = split_meta_line(&meta_line)?;
        let link = article_link(&heading, base)?;
        debug!(%title, %publisher, "scraped headline");
        headlines.push(Headline {
            publisher,
            time,
            title,
            summary,
            link,
        });
    }
    Ok(headlines)
}

/// Split `"publisher • time"` into its two parts. Any other shape means the
/// portal changed its metadata markup.
fn split_meta_line(line: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = line.split(" • ").collect();
    match parts.as_slice() {
        [publisher, time] => Ok(((*publisher).to_string(), (*time).to_string())),
        _ => Err(Error::StructuralParse(format!(
            "metadata line {line:?} did not split into publisher and time"
        ))),
    }
}

fn article_link(heading: &ElementRef<'_>, base: &Url) -> Result<String> {
    let anchor = direct_child(heading, "a").ok_or_else(|| {
        Error::StructuralParse("headline heading has no link".to_string())
    })?;
    let href = anchor
        .value()
        .attr("href")
        .ok_or_else(|| Error::StructuralParse("headline link has no href".to_string()))?;
    let absolute = base.join(href)?;
    let decoded = urlencoding::decode(absolute.as_str()).map_err(|e| {
        Error::StructuralParse(format!("headline link is not valid UTF-8 once decoded: {e}"))
    })?;
    Ok(decoded.into_owned())
}

/// All descendant text of an element, concatenated and trimmed.
fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn direct_child<'a>(el: &ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    el.children()
        .filter_map(ElementRef::wrap)
        .find(|c| c.value().name() == name)
}
