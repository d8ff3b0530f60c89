//! Snapshot persistence: title-keyed deduplication and atomic JSON files.

use std::path::Path;

use chrono::Local;
use itertools::Itertools;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::{Headline, HeadlineSnapshot, SummaryDigest};
use crate::utils::format_timestamp;

/// Collapse duplicate postings of the same story.
///
/// Identity is the title alone: publisher, display time, summary, and link
/// may all differ across duplicate postings. The first-seen instance wins and
/// first-seen order is preserved.
pub fn dedupe_headlines(headlines: Vec<Headline>) -> Vec<Headline> {
    headlines
        .into_iter()
        .unique_by(|h| h.title.clone())
        .collect()
}

/// Serialize `value` as pretty-printed JSON and swap it into place.
///
/// The content is written to a sibling temp file and renamed over the
/// target, so a cycle that dies mid-write never corrupts the previous file.
pub async fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Dedupe the scraped headlines and replace the snapshot file wholesale.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn persist_snapshot(headlines: Vec<Headline>, path: &Path) -> Result<HeadlineSnapshot> {
    let scraped = headlines.len();
    let snapshot = HeadlineSnapshot {
        last_updated: format_timestamp(Local::now().naive_local()),
        headlines: dedupe_headlines(headlines),
    };
    save_json(&snapshot, path).await?;
    info!(
        scraped,
        kept = snapshot.headlines.len(),
        "saved headline snapshot"
    );
    Ok(snapshot)
}

/// Replace the digest file wholesale.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn persist_digest(digest: &SummaryDigest, path: &Path) -> Result<()> {
    save_json(digest, path).await?;
    info!(topics = digest.summaries.len(), "saved summary digest");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headline(title: &str, publisher: &str) -> Headline {
        Headline {
            publisher: publisher.to_string(),
            time: "08:00".to_string(),
            title: title.to_string(),
            summary: format!("{title} via {publisher}"),
            link: format!("https://hk.news.yahoo.com/{publisher}.html"),
        }
    }

    #[test]
    fn test_dedupe_keys_by_title_alone() {
        let deduped = dedupe_headlines(vec![
            headline("Same story", "Outlet A"),
            headline("Same story", "Outlet B"),
        ]);
        assert_eq!(deduped.len(), 1);
        // First-seen instance wins.
        assert_eq!(deduped[0].publisher, "Outlet A");
    }

    #[test]
    fn test_dedupe_preserves_first_seen_order() {
        let deduped = dedupe_headlines(vec![
            headline("C", "x"),
            headline("A", "x"),
            headline("C", "y"),
            headline("B", "x"),
        ]);
        let titles: Vec<&str> = deduped.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn test_snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headlines.json");
        let snapshot = persist_snapshot(vec![headline("Story", "HK Daily")], &path)
            .await
            .unwrap();
        let loaded: HeadlineSnapshot = load_json(&path).await.unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_save_json_replaces_wholesale_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headlines.json");
        persist_snapshot(vec![headline("Old story", "HK Daily")], &path)
            .await
            .unwrap();
        persist_snapshot(vec![headline("New story", "HK Daily")], &path)
            .await
            .unwrap();

        let loaded: HeadlineSnapshot = load_json(&path).await.unwrap();
        assert_eq!(loaded.headlines.len(), 1);
        assert_eq!(loaded.headlines[0].title, "New story");
        assert!(!dir.path().join("headlines.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_json_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/headlines.json");
        persist_snapshot(vec![headline("Story", "HK Daily")], &path)
            .await
            .unwrap();
        assert!(path.exists());
    }
}
