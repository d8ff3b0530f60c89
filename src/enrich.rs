//! Turn raw model output into chat-ready MarkdownV2 chunk groups.
//!
//! The model is asked for a JSON object mapping topic labels to a summary and
//! contributing headline indices, but replies sometimes arrive wrapped in a
//! code fence. Enrichment unwraps the fence if one is present, decodes the
//! object, and renders one chunk group per topic: a header fragment (topic
//! summary plus a separator rule) followed by one fragment per selected
//! headline, each a numbered linked title with publisher and a
//! blockquote-styled teaser closed by a spoiler marker.
//!
//! Topic order follows the object's key order and fragment order within a
//! group is header-first: the delivery layer reveals fragments by editing a
//! message in place, so both orders are load-bearing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::models::Headline;
use crate::utils::truncate_for_log;

/// Characters MarkdownV2 reserves; each unescaped occurrence in free text
/// must be prefixed with a backslash.
const RESERVED: &str = r"_*[]()~`>#+-=|{}.!";

/// Width of the rule under each topic header.
const SEPARATOR_WIDTH: usize = 50;

/// At most this many headlines are rendered per topic.
const MAX_HEADLINES_PER_TOPIC: usize = 5;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").unwrap());

#[derive(Debug, Deserialize)]
struct TopicDetails {
    #[serde(rename = "總結")]
    summary: String,
    #[serde(rename = "標題索引", default)]
    indices: Vec<Value>,
}

/// Extract the content of the first fenced code block (optionally tagged
/// `json`), falling back to the trimmed raw text when no fence is present.
pub fn capture_fenced(text: &str) -> &str {
    match FENCED_BLOCK.captures(text) {
        Some(captures) => captures
            .get(1)
            .map(|m| m.as_str().trim())
            .unwrap_or_default(),
        None => text.trim(),
    }
}

/// Escape MarkdownV2 reserved characters that are not already escaped.
///
/// A reserved character immediately preceded by a backslash is left alone,
/// so input that already carries escapes is not double-escaped here.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if RESERVED.contains(c) && prev != Some('\\') {
            escaped.push('\\');
        }
        escaped.push(c);
        prev = Some(c);
    }
    escaped
}

/// Parse the model's reply and render one chunk group per topic.
///
/// Indices are coerced from integers or numeric strings, sorted ascending,
/// and truncated to [`MAX_HEADLINES_PER_TOPIC`]; an index outside the
/// headline list is a [`Error::Format`] naming the offender rather than a
/// panic.
#[instrument(level = "info", skip_all, fields(headlines = headlines.len()))]
pub fn enrich(raw: &str, headlines: &[Headline]) -> Result<Vec<Vec<String>>> {
    let unwrapped = capture_fenced(raw);
    let topics: serde_json::Map<String, Value> =
        serde_json::from_str(unwrapped).map_err(|e| {
            Error::Format(format!(
                "model output is not a JSON object: {e} (payload: {})",
                truncate_for_log(unwrapped, 200)
            ))
        })?;

    let mut groups = Vec::with_capacity(topics.len());
    for (topic, details) in &topics {
        let details: TopicDetails = serde_json::from_value(details.clone()).map_err(|e| {
            Error::Format(format!("topic {topic:?} has an unexpected shape: {e}"))
        })?;

        let mut indices = details
            .indices
            .iter()
            .map(coerce_index)
            .collect::<Result<Vec<_>>>()?;
        indices.sort_unstable();
        indices.truncate(MAX_HEADLINES_PER_TOPIC);

        let mut chunks = Vec::with_capacity(indices.len() + 1);
        chunks.push(format!(
            "*{}*\n{}\n",
            escape_markdown_v2(&details.summary),
            escape_markdown_v2(&"-".repeat(SEPARATOR_WIDTH)),
        ));
        for (position, &idx) in indices.iter().enumerate() {
            let selected = headlines.get(idx).ok_or_else(|| {
                Error::Format(format!(
                    "topic {topic:?} references headline index {idx}, but only {} headlines exist",
                    headlines.len()
                ))
            })?;
            // Continuation lines of a multi-line teaser stay inside the quote.
            let summary = escape_markdown_v2(&selected.summary).replace('\n', "\n> ");
            chunks.push(format!(
                "{}\\. [*{}*]({}) \\- _{}_\n>{}||\n\n",
                position + 1,
                escape_markdown_v2(&selected.title),
                selected.link,
                escape_markdown_v2(&selected.publisher),
                summary,
            ));
        }
        groups.push(chunks);
    }
    Ok(groups)
}

fn coerce_index(value: &Value) -> Result<usize> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| Error::Format(format!("headline index {n} is not a non-negative integer"))),
        Value::String(s) => s
            .trim()
            .parse::<usize>()
            .map_err(|_| Error::Format(format!("headline index {s:?} is not an integer"))),
        other => Err(Error::Format(format!(
            "headline index has an unexpected type: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headline(n: usize) -> Headline {
        Headline {
            publisher: format!("Outlet {n}"),
            time: "08:00".to_string(),
            title: format!("Story {n}"),
            summary: format!("Teaser {n}."),
            link: format!("https://hk.news.yahoo.com/story-{n}.html"),
        }
    }

    fn headlines(count: usize) -> Vec<Headline> {
        (0..count).map(headline).collect()
    }

    #[test]
    fn test_escape_reserved_characters() {
        assert_eq!(escape_markdown_v2("hello.world"), "hello\\.world");
        assert_eq!(escape_markdown_v2("a-b (c)"), "a\\-b \\(c\\)");
        assert_eq!(escape_markdown_v2("plain text"), "plain text");
    }

    #[test]
    fn test_escape_leaves_existing_escapes_alone() {
        assert_eq!(escape_markdown_v2(r"already\."), r"already\.");
        assert_eq!(escape_markdown_v2(r"mixed\. and."), r"mixed\. and\.");
    }

    #[test]
    fn test_escape_then_unescape_round_trips() {
        // For input without backslashes, removing one backslash before each
        // reserved character must reproduce the original exactly.
        let original = "Breaking! Stocks (HSI) fell 2.5% - details_at #noon.";
        let escaped = escape_markdown_v2(original);
        let mut unescaped = String::new();
        let mut chars = escaped.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\\' && chars.peek().is_some_and(|n| RESERVED.contains(*n)) {
                continue;
            }
            unescaped.push(c);
        }
        assert_eq!(unescaped, original);
    }

    #[test]
    fn test_capture_fenced_variants() {
        assert_eq!(capture_fenced("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(capture_fenced("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(
            capture_fenced("noise before ```json\n{}\n``` noise after"),
            "{}"
        );
        // No fence: the trimmed raw text is used as-is.
        assert_eq!(capture_fenced("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_enrich_renders_header_then_entries() {
        let raw = r#"{"颱風": {"總結": "風暴消息。", "標題索引": [0, 1]}}"#;
        let groups = enrich(raw, &headlines(3)).unwrap();
        assert_eq!(groups.len(), 1);
        let chunks = &groups[0];
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("*風暴消息。*\n"));
        assert!(chunks[0].contains(&"\\-".repeat(50)));
        assert!(chunks[1].starts_with("1\\. [*Story 0*](https://hk.news.yahoo.com/story-0.html)"));
        assert!(chunks[1].contains("\\- _Outlet 0_"));
        assert!(chunks[1].contains(">Teaser 0\\."));
        assert!(chunks[1].ends_with("||\n\n"));
        assert!(chunks[2].starts_with("2\\. "));
    }

    #[test]
    fn test_enrich_truncates_to_five_and_preserves_topic_order() {
        // Two topics with 3 and 6 indices: the second is cut to 5 entries.
        let raw = r#"{
            "first": {"總結": "First topic.", "標題索引": [0, 1, 2]},
            "second": {"總結": "Second topic.", "標題索引": [0, 1, 2, 3, 4, 5]}
        }"#;
        let groups = enrich(raw, &headlines(7)).unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups[0][0].contains("First topic"));
        assert_eq!(groups[0].len(), 4);
        assert!(groups[1][0].contains("Second topic"));
        assert_eq!(groups[1].len(), 6);
        assert!(groups[1][5].contains("Story 4"));
    }

    #[test]
    fn test_enrich_sorts_indices_ascending() {
        let raw = r#"{"topic": {"總結": "s", "標題索引": [2, 0, 1]}}"#;
        let groups = enrich(raw, &headlines(3)).unwrap();
        assert!(groups[0][1].contains("Story 0"));
        assert!(groups[0][2].contains("Story 1"));
        assert!(groups[0][3].contains("Story 2"));
    }

    #[test]
    fn test_enrich_coerces_string_indices() {
        let raw = r#"{"topic": {"總結": "s", "標題索引": ["1", 0]}}"#;
        let groups = enrich(raw, &headlines(2)).unwrap();
        assert_eq!(groups[0].len(), 3);
        assert!(groups[0][1].contains("Story 0"));
    }

    #[test]
    fn test_enrich_unwraps_fenced_reply() {
        let raw = "```json\n{\"topic\": {\"總結\": \"s\", \"標題索引\": [0]}}\n```";
        let groups = enrich(raw, &headlines(1)).unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_enrich_out_of_range_index_names_offender() {
        let raw = r#"{"topic": {"總結": "s", "標題索引": [9]}}"#;
        let err = enrich(raw, &headlines(3)).unwrap_err();
        match err {
            Error::Format(message) => {
                assert!(message.contains("index 9"));
                assert!(message.contains("3 headlines"));
            }
            other => panic!("expected Format error, got {other:?}"),
        }
    }

    #[test]
    fn test_enrich_rejects_non_json_reply() {
        let err = enrich("I could not find any topics today.", &headlines(3)).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_enrich_multiline_teaser_stays_quoted() {
        let mut items = headlines(1);
        items[0].summary = "line one\nline two".to_string();
        let raw = r#"{"topic": {"總結": "s", "標題索引": [0]}}"#;
        let groups = enrich(raw, &items).unwrap();
        assert!(groups[0][1].contains(">line one\n> line two||"));
    }
}
