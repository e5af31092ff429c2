use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use studysync_core::config::ExtractorConfig;
use tracing::debug;

pub const TEXT_KIND: &str = "text";

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("markup pattern compiles"));

/// One fragment of an inbound message.
///
/// Wire: `{ "kind": "text", "text": "hello" }`. Other kinds (`data`, `file`)
/// are carried but never read. Both fields are optional so malformed parts
/// survive parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: Some(TEXT_KIND.to_string()),
            text: Some(text.into()),
        }
    }

    /// Lenient conversion: non-object parts and non-string fields become
    /// empty fields instead of errors.
    pub fn from_value(value: &Value) -> Self {
        Self {
            kind: value.get("kind").and_then(Value::as_str).map(String::from),
            text: value.get("text").and_then(Value::as_str).map(String::from),
        }
    }

    /// Parse a `parts` array. Anything that is not an array yields no parts.
    pub fn list_from_value(value: Option<&Value>) -> Vec<Self> {
        value
            .and_then(Value::as_array)
            .map(|items| items.iter().map(Self::from_value).collect())
            .unwrap_or_default()
    }

    /// The raw text of a `kind == "text"` part whose trimmed text is non-empty.
    fn usable_text(&self) -> Option<&str> {
        if self.kind.as_deref() != Some(TEXT_KIND) {
            return None;
        }
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Remove `<...>` markup and surrounding whitespace.
pub fn strip_markup(text: &str) -> String {
    MARKUP.replace_all(text, "").trim().to_string()
}

/// Picks the user's latest utterance out of a noisy part list.
///
/// Chat clients append their own status lines, error banners and agent
/// narration to the parts array, so the newest text part is not always what
/// the user typed. The extractor prefers the newest part that looks like real
/// input and falls back to the newest text part of any shape.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    min_length: usize,
    denylist: Vec<String>,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new(&ExtractorConfig::default())
    }
}

impl TextExtractor {
    /// Blank markers are dropped: an empty substring would match every part.
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            min_length: config.min_length,
            denylist: config
                .denylist
                .iter()
                .filter(|marker| !marker.trim().is_empty())
                .cloned()
                .collect(),
        }
    }

    /// Returns the cleaned text, or an empty string when no text part exists.
    pub fn extract(&self, parts: &[MessagePart]) -> String {
        debug!(parts = parts.len(), "extracting message text");

        let preferred = parts
            .iter()
            .rev()
            .filter_map(MessagePart::usable_text)
            .map(strip_markup)
            .find(|clean| self.looks_like_user_input(clean));
        if let Some(text) = preferred {
            debug!(text = %text, "selected user message");
            return text;
        }

        match parts.iter().rev().find_map(MessagePart::usable_text) {
            Some(raw) => {
                let text = strip_markup(raw);
                debug!(text = %text, "no clean part, using newest text part");
                text
            }
            None => String::new(),
        }
    }

    fn looks_like_user_input(&self, clean: &str) -> bool {
        !clean.is_empty()
            && clean.chars().count() > self.min_length
            && !self.denylist.iter().any(|marker| clean.contains(marker.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data_part() -> MessagePart {
        MessagePart {
            kind: Some("data".into()),
            text: None,
        }
    }

    #[test]
    fn strips_markup_and_whitespace() {
        assert_eq!(strip_markup("  <p>I want to <b>study</b></p>\n"), "I want to study");
        assert_eq!(strip_markup("<br/>"), "");
    }

    #[test]
    fn picks_last_qualifying_part() {
        let parts = vec![
            MessagePart::text("first long enough message"),
            MessagePart::text("<p>second long enough message</p>"),
        ];
        assert_eq!(
            TextExtractor::default().extract(&parts),
            "second long enough message"
        );
    }

    #[test]
    fn skips_noise_and_short_parts_from_the_end() {
        let parts = vec![
            MessagePart::text("Help me plan my chemistry revision"),
            MessagePart::text("ERROR: WebSocket closed unexpectedly"),
            MessagePart::text("Let me think about that for you"),
            MessagePart::text("ok"),
            data_part(),
        ];
        assert_eq!(
            TextExtractor::default().extract(&parts),
            "Help me plan my chemistry revision"
        );
    }

    #[test]
    fn falls_back_to_newest_text_part() {
        let parts = vec![
            MessagePart::text("Analyzing your request"),
            MessagePart::text("<i>hi</i>"),
            MessagePart::text("   "),
        ];
        assert_eq!(TextExtractor::default().extract(&parts), "hi");
    }

    #[test]
    fn empty_or_non_text_parts_yield_empty_string() {
        let extractor = TextExtractor::default();
        assert_eq!(extractor.extract(&[]), "");
        assert_eq!(extractor.extract(&[data_part(), MessagePart::default()]), "");
    }

    #[test]
    fn tolerates_malformed_parts() {
        let raw = json!([
            "not an object",
            {"kind": "text"},
            {"text": "missing kind but long enough"},
            {"kind": "text", "text": 42},
            {"kind": "text", "text": "<div>What is photosynthesis?</div>"}
        ]);
        let parts = MessagePart::list_from_value(Some(&raw));
        assert_eq!(parts.len(), 5);
        assert_eq!(
            TextExtractor::default().extract(&parts),
            "What is photosynthesis?"
        );
        assert!(MessagePart::list_from_value(Some(&json!({"kind": "text"}))).is_empty());
        assert!(MessagePart::list_from_value(None).is_empty());
    }

    #[test]
    fn extraction_is_idempotent() {
        let parts = vec![
            MessagePart::text("Quiz me on the French revolution"),
            MessagePart::text("WebSocket reconnecting"),
        ];
        let extractor = TextExtractor::default();
        let first = extractor.extract(&parts);
        assert_eq!(first, extractor.extract(&parts));
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn denylist_is_injectable() {
        let extractor = TextExtractor::new(&ExtractorConfig {
            min_length: 2,
            denylist: vec!["[bot]".into()],
        });
        let parts = vec![
            MessagePart::text("ERROR is fine here"),
            MessagePart::text("[bot] status update"),
        ];
        assert_eq!(extractor.extract(&parts), "ERROR is fine here");
    }

    #[test]
    fn blank_denylist_markers_are_ignored() {
        let extractor = TextExtractor::new(&ExtractorConfig {
            min_length: 2,
            denylist: vec!["".into(), "   ".into(), "[bot]".into()],
        });
        let parts = vec![
            MessagePart::text("Explain photosynthesis please"),
            MessagePart::text("ok"),
        ];
        assert_eq!(extractor.extract(&parts), "Explain photosynthesis please");
    }

    #[test]
    fn length_threshold_counts_characters() {
        // 11 chars, 22 bytes: qualifies on characters.
        let parts = vec![
            MessagePart::text("long enough sentence here"),
            MessagePart::text("ééééééééééé"),
        ];
        assert_eq!(TextExtractor::default().extract(&parts), "ééééééééééé");
    }
}
