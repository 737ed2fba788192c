//! Parser for the two-part model reply.
//!
//! The model is instructed to answer with a JSON metadata object followed by
//! the prose shown to the rep. Nothing enforces that, so every field is
//! optional and a reply without usable JSON is shown as-is.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// The only action the orchestrator acts on.
pub const SEND_EMAIL: &str = "send_email";

static PART_TWO_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:#+\s*)?(?:PART\s*2\s*[-:]*\s*(?:RESPONSE)?[^\n]*\n)")
        .expect("Invalid part label regex")
});

/// Classification the model attaches to a reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMetadata {
    pub confidence_level: i64,
    pub product_category: String,
    pub focus_area: String,
    pub key_takeaways: Vec<String>,
    pub requires_followup: bool,
    pub detected_language: String,
    /// `None` when the model requested no action.
    pub actions: Option<String>,
}

impl ResponseMetadata {
    pub fn wants_email(&self) -> bool {
        self.actions.as_deref() == Some(SEND_EMAIL)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub metadata: ResponseMetadata,
    /// Text shown to the rep.
    pub text: String,
    /// False when no metadata object could be decoded.
    pub has_metadata: bool,
}

/// Split a raw model reply into metadata and display text.
///
/// The metadata span runs from the first `{` to the first `}`, so a nested
/// object inside the metadata breaks decoding and the whole reply is shown.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let cleaned = clean_reply(raw);

    let span = match (cleaned.find('{'), cleaned.find('}')) {
        (Some(start), Some(end)) if end > start => Some((start, end)),
        _ => None,
    };

    let Some((start, end)) = span else {
        return ParsedResponse {
            metadata: ResponseMetadata::default(),
            text: cleaned,
            has_metadata: false,
        };
    };

    match serde_json::from_str::<Value>(&cleaned[start..=end]) {
        Ok(Value::Object(map)) => ParsedResponse {
            metadata: metadata_from_object(&map),
            text: cleaned[end + 1..].trim().to_string(),
            has_metadata: true,
        },
        _ => ParsedResponse {
            metadata: ResponseMetadata::default(),
            text: cleaned,
            has_metadata: false,
        },
    }
}

/// Strip code fences and "PART 2 - RESPONSE" labels.
fn clean_reply(raw: &str) -> String {
    let without_fences = raw.replace("```", "");
    PART_TWO_LABEL
        .replace_all(without_fences.trim(), "")
        .trim()
        .to_string()
}

fn metadata_from_object(map: &serde_json::Map<String, Value>) -> ResponseMetadata {
    let text = |key: &str| match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let key_takeaways = match map.get("key_takeaways") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };

    let requires_followup = match map.get("requires_followup") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };

    let actions = Some(text("actions")).filter(|a| !a.trim().is_empty());

    ResponseMetadata {
        confidence_level: confidence(map.get("confidence_level")),
        product_category: text("product_category"),
        focus_area: text("query_focus_area"),
        key_takeaways,
        requires_followup,
        detected_language: text("detected_language"),
        actions,
    }
}

/// Integers, floats (truncated) and numeric strings; anything else is 0.
fn confidence(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_then_text() {
        let parsed = parse_response(r#"{"confidence_level":5}Hello world"#);
        assert!(parsed.has_metadata);
        assert_eq!(parsed.metadata.confidence_level, 5);
        assert_eq!(parsed.text, "Hello world");
    }

    #[test]
    fn test_no_braces_returns_cleaned_text() {
        let parsed = parse_response("```\nJust some prose.\n```");
        assert!(!parsed.has_metadata);
        assert_eq!(parsed.metadata, ResponseMetadata::default());
        assert_eq!(parsed.text, "Just some prose.");
    }

    #[test]
    fn test_full_two_part_reply() {
        let raw = r#"PART 1:
{
  "confidence_level": 9,
  "product_category": "Order Information",
  "query_focus_area": "Order delay",
  "key_takeaways": ["Customer: Hillshire", "Order delayed"],
  "requires_followup": true,
  "detected_language": "English",
  "actions": ""
}

PART 2 - RESPONSE
Looks like order 31130481 is delayed."#;

        let parsed = parse_response(raw);
        let meta = &parsed.metadata;
        assert_eq!(meta.confidence_level, 9);
        assert_eq!(meta.product_category, "Order Information");
        assert_eq!(meta.focus_area, "Order delay");
        assert_eq!(meta.key_takeaways.len(), 2);
        assert!(meta.requires_followup);
        assert_eq!(meta.detected_language, "English");
        assert_eq!(meta.actions, None);
        assert_eq!(parsed.text, "Looks like order 31130481 is delayed.");
    }

    #[test]
    fn test_markdown_part_label_removed() {
        let raw = "{\"confidence_level\": 7}\n## Part 2: Response\nHere you go.";
        assert_eq!(parse_response(raw).text, "Here you go.");
    }

    #[test]
    fn test_send_email_action() {
        let parsed = parse_response(r#"{"confidence_level": 10, "actions": "send_email"} Drafting now."#);
        assert!(parsed.metadata.wants_email());
        assert_eq!(parsed.text, "Drafting now.");
    }

    #[test]
    fn test_lenient_confidence() {
        assert_eq!(parse_response(r#"{"confidence_level": "8"}x"#).metadata.confidence_level, 8);
        assert_eq!(parse_response(r#"{"confidence_level": 7.9}x"#).metadata.confidence_level, 7);
        assert_eq!(parse_response(r#"{"confidence_level": "high"}x"#).metadata.confidence_level, 0);
    }

    #[test]
    fn test_invalid_json_keeps_whole_text() {
        let parsed = parse_response("{not json} trailing");
        assert!(!parsed.has_metadata);
        assert_eq!(parsed.text, "{not json} trailing");
    }

    #[test]
    fn test_close_before_open_is_not_metadata() {
        let parsed = parse_response("} odd {");
        assert!(!parsed.has_metadata);
        assert_eq!(parsed.text, "} odd {");
    }

    #[test]
    fn test_nested_object_breaks_decoding() {
        let parsed = parse_response(r#"{"confidence_level": 9, "extra": {"a": 1}} Reply"#);
        assert!(!parsed.has_metadata);
        assert_eq!(parsed.metadata.confidence_level, 0);
    }
}
