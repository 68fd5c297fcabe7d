//! Tolerant JSON extraction for advisory responses.
//!
//! Models wrap JSON in Markdown code fences or surround it with prose.
//! Extraction strips fences first, then takes the first-brace/last-brace
//! span. Responses with no brace pair at all are rejected.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("valid fence regex"));

/// Extract the first well-formed-looking JSON object from `text`.
///
/// Returns None when no `{...}` span exists. The returned span is not
/// validated; callers parse it with serde and handle failures.
pub fn extract_json_object(text: &str) -> Option<String> {
    let body = match CODE_FENCE.captures(text) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(text),
        None => text,
    };

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(body[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json_passes_through() {
        let text = r#"{"strategy": "split"}"#;
        assert_eq!(extract_json_object(text).unwrap(), text);
    }

    #[test]
    fn test_fenced_json_is_unwrapped() {
        let text = "```json\n{\"confidence\": 0.8}\n```";
        assert_eq!(extract_json_object(text).unwrap(), r#"{"confidence": 0.8}"#);
    }

    #[test]
    fn test_fence_without_language_tag() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_object(text).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_prose_around_json_is_trimmed() {
        let text = "Here is my assessment:\n{\"event_name\": \"flu\"}\nLet me know!";
        assert_eq!(
            extract_json_object(text).unwrap(),
            r#"{"event_name": "flu"}"#
        );
    }

    #[test]
    fn test_no_object_returns_none() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("").is_none());
    }

    #[test]
    fn test_nested_objects_take_outer_span() {
        let text = r#"{"outer": {"inner": 1}}"#;
        assert_eq!(extract_json_object(text).unwrap(), text);
    }
}
