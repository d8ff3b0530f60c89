//! Data models for scraped headlines and their summarized digests.
//!
//! This module defines the structures persisted between pipeline stages:
//! - [`Headline`]: one scraped news item
//! - [`HeadlineSnapshot`]: the full result of one scrape, overwritten wholesale
//! - [`TokenUsage`]: token accounting returned by the model gateway
//! - [`SummaryDigest`]: the chunked per-topic output of one summarization cycle

use serde::{Deserialize, Serialize};

/// One news item scraped from the portal's headline stream.
///
/// # Identity
///
/// Two headlines are the same story when their `title` fields match, even if
/// publisher, display time, summary, or link differ — duplicate postings of
/// the same story legitimately vary in those fields. Deduplication keys by
/// title alone (see [`crate::store::dedupe_headlines`]); the derived
/// `PartialEq` compares every field and is meant for tests, not identity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Headline {
    /// Outlet that published the item, as displayed on the portal.
    pub publisher: String,
    /// Site-local display time, kept as unparsed text (e.g. `"08:00"`).
    pub time: String,
    /// Headline text. The identity of the story.
    pub title: String,
    /// One-line teaser shown under the headline.
    pub summary: String,
    /// Absolute, percent-decoded article URL.
    pub link: String,
}

/// The persisted result of one scrape run.
///
/// Written as the sole content of the headlines file; each scrape replaces
/// the previous snapshot entirely (no append or merge across runs).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HeadlineSnapshot {
    /// Scrape completion time, `YYYY-MM-DD HH:MM:SS`.
    pub last_updated: String,
    /// Deduplicated headlines in first-seen order.
    pub headlines: Vec<Headline>,
}

/// Token accounting reported by the model gateway for one completion.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// The persisted output of one summarization cycle.
///
/// `summaries` holds one chunk group per topic, in the topic order the model
/// produced; within a group the fragments concatenate to the full rendered
/// message. The delivery layer sends the first fragment and appends the rest
/// by editing the message in place, so both orders are load-bearing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SummaryDigest {
    /// Cycle completion time, `YYYY-MM-DD HH:MM:SS`.
    pub last_updated: String,
    /// Model identifier reported by the gateway.
    pub model: String,
    /// Token counts for the completion call.
    pub usage: TokenUsage,
    /// Wall-clock duration of the model call, in seconds.
    pub duration: f64,
    /// One ordered chunk group per topic.
    pub summaries: Vec<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_headline() -> Headline {
        Headline {
            publisher: "HK Daily".to_string(),
            time: "08:00".to_string(),
            title: "Typhoon signal raised".to_string(),
            summary: "The observatory issued signal 8.".to_string(),
            link: "https://hk.news.yahoo.com/typhoon-123.html".to_string(),
        }
    }

    #[test]
    fn test_headline_serialization_field_order() {
        let json = serde_json::to_string(&sample_headline()).unwrap();
        // Persisted field order matches the snapshot file contract.
        let publisher_at = json.find("publisher").unwrap();
        let time_at = json.find("\"time\"").unwrap();
        let title_at = json.find("\"title\"").unwrap();
        let link_at = json.find("\"link\"").unwrap();
        assert!(publisher_at < time_at && time_at < title_at && title_at < link_at);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let snapshot = HeadlineSnapshot {
            last_updated: "2024-03-01 07:45:00".to_string(),
            headlines: vec![sample_headline()],
        };
        let json = serde_json::to_string_pretty(&snapshot).unwrap();
        let back: HeadlineSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_snapshot_preserves_non_ascii() {
        let mut headline = sample_headline();
        headline.title = "港鐵新綫通車".to_string();
        let json = serde_json::to_string(&headline).unwrap();
        assert!(json.contains("港鐵新綫通車"));
    }

    #[test]
    fn test_digest_round_trip() {
        let digest = SummaryDigest {
            last_updated: "2024-03-01 07:45:00".to_string(),
            model: "gpt-4o-2024-05-13".to_string(),
            usage: TokenUsage {
                prompt_tokens: 900,
                completion_tokens: 300,
                total_tokens: 1200,
            },
            duration: 12.5,
            summaries: vec![vec!["*header*\n".to_string(), "1\\. entry\n".to_string()]],
        };
        let json = serde_json::to_string(&digest).unwrap();
        let back: SummaryDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }

    #[test]
    fn test_token_usage_defaults_missing_fields() {
        let usage: TokenUsage = serde_json::from_str(r#"{"total_tokens": 42}"#).unwrap();
        assert_eq!(usage.total_tokens, 42);
        assert_eq!(usage.prompt_tokens, 0);
        assert_eq!(usage.completion_tokens, 0);
    }
}
