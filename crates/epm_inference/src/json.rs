//! Recovering typed documents from model output.
//!
//! Models wrap JSON in markdown fences or surround it with prose. The text is
//! unwrapped, parsed, and then deserialized into a schema type; anything that
//! does not conform is rejected as a whole and the caller falls back.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Strip markdown code fences (```` ```json ```` or bare ```` ``` ````).
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...) on the opening fence line.
    let body = match rest.find('\n') {
        Some(newline) if rest[..newline].chars().all(|c| c.is_ascii_alphanumeric()) => &rest[newline + 1..],
        _ => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Return the first balanced `{...}` or `[...]` block in `text`.
///
/// Brackets inside string literals are ignored, and a closing bracket of the
/// wrong kind ends the search.
pub fn extract_balanced(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c == '{' || c == '[')?;
    let mut expected: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => expected.push('}'),
            '[' => expected.push(']'),
            '}' | ']' => {
                if expected.pop() != Some(c) {
                    return None;
                }
                if expected.is_empty() {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse model output into a JSON value: direct parse first, then the first
/// balanced block.
pub fn parse_value(text: &str) -> Option<Value> {
    let stripped = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return Some(value);
    }
    let block = extract_balanced(stripped)?;
    serde_json::from_str(block).ok()
}

/// Parse and validate model output against `T`. `None` on any failure.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Option<T> {
    let value = parse_value(text)?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(schema = std::any::type_name::<T>(), error = %e, "model output does not match schema");
            None
        }
    }
}

/// `deserialize_with` helpers for fields a model may get wrong without
/// invalidating the whole document.
pub mod de {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Falls back to `T::default()` when the value has the wrong shape.
    /// Pair with `#[serde(default)]` so a missing field also defaults.
    pub fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// `None` when the value has the wrong shape, so callers can tell a
    /// malformed field from a present one.
    pub fn optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        articles: Vec<String>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Loose {
        #[serde(default, deserialize_with = "de::lenient")]
        score: f64,
        #[serde(default, deserialize_with = "de::optional")]
        tags: Option<Vec<String>>,
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```JSON\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_extract_balanced_ignores_brackets_in_strings() {
        let text = r#"Sure! {"title": "Q3 {draft} ]", "n": [1, {"x": 2}]} trailing } text"#;
        assert_eq!(
            extract_balanced(text),
            Some(r#"{"title": "Q3 {draft} ]", "n": [1, {"x": 2}]}"#)
        );
        assert_eq!(extract_balanced(r#"["a\"]", "b"]"#), Some(r#"["a\"]", "b"]"#));
    }

    #[test]
    fn test_extract_balanced_rejects_unbalanced() {
        assert_eq!(extract_balanced("no json here"), None);
        assert_eq!(extract_balanced("{\"a\": [1, 2}"), None);
        assert_eq!(extract_balanced("{\"a\": 1"), None);
    }

    #[test]
    fn test_parse_structured() {
        let direct: Payload = parse_structured(r#"{"articles":["a"]}"#).unwrap();
        assert_eq!(direct.articles, vec!["a"]);

        let fenced: Payload = parse_structured("```json\n{\"articles\":[]}\n```").unwrap();
        assert!(fenced.articles.is_empty());

        let wrapped: Payload =
            parse_structured("Here is the result:\n{\"articles\":[\"b\"]}\nHope it helps").unwrap();
        assert_eq!(wrapped.articles, vec!["b"]);
    }

    #[test]
    fn test_parse_structured_rejects_wrong_shape() {
        assert_eq!(parse_structured::<Payload>(r#"{"articles":"none"}"#), None);
        assert_eq!(parse_structured::<Payload>(r#"{"items":[]}"#), None);
        assert_eq!(parse_structured::<Payload>("total garbage"), None);
        assert_eq!(parse_structured::<Payload>(""), None);
    }

    #[test]
    fn test_lenient_fields() {
        let loose: Loose = parse_structured(r#"{"score":"high","tags":"x"}"#).unwrap();
        assert_eq!(loose, Loose { score: 0.0, tags: None });

        let loose: Loose = parse_structured(r#"{}"#).unwrap();
        assert_eq!(loose, Loose { score: 0.0, tags: None });

        let loose: Loose = parse_structured(r#"{"score":72,"tags":["a"]}"#).unwrap();
        assert_eq!(loose.score, 72.0);
        assert_eq!(loose.tags, Some(vec!["a".to_string()]));
    }
}
