//! Pulling a JSON document out of free-form model output

use super::StructuredError;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:json)?\s*(.*?)\s*```").expect("fence pattern is a valid regex")
});

/// Extract the JSON payload from a model reply
///
/// A fenced block (with or without a `json` tag) wins; otherwise the slice
/// from the first `{` to the last `}`, which is empty when the last `}`
/// precedes the first `{`. Input without braces comes back trimmed.
pub fn extract_json(raw: &str) -> &str {
    if raw.trim().is_empty() {
        return "";
    }

    if let Some(inner) = FENCED_BLOCK.captures(raw).and_then(|c| c.get(1)) {
        return inner.as_str().trim();
    }

    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => raw[start..=end].trim(),
        (Some(_), Some(_)) => "",
        _ => raw.trim(),
    }
}

/// Escape raw control characters that appear inside string literals
///
/// Models routinely put literal newlines inside long string values, which
/// strict JSON rejects.
pub fn escape_control_chars(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in json.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }

    out
}

/// Extract and parse a reply, tolerating control characters inside strings
pub fn parse_lenient<T: DeserializeOwned>(raw: &str) -> Result<T, StructuredError> {
    let extracted = extract_json(raw);
    if extracted.is_empty() {
        return Err(StructuredError::Empty);
    }

    serde_json::from_str(&escape_control_chars(extracted)).map_err(|e| {
        StructuredError::InvalidJson {
            message: e.to_string(),
            snippet: extracted.chars().take(200).collect(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use test_case::test_case;

    #[test_case("", "" ; "empty input")]
    #[test_case("   \n", "" ; "whitespace only")]
    #[test_case("```json\n{\"a\": 1}\n```", "{\"a\": 1}" ; "tagged fence")]
    #[test_case("```JSON {\"a\": 1} ```", "{\"a\": 1}" ; "uppercase tag")]
    #[test_case("好的：\n```\n{\"a\": 1}\n```\n以上", "{\"a\": 1}" ; "untagged fence")]
    #[test_case("结果是 {\"a\": {\"b\": 2}} 完毕", "{\"a\": {\"b\": 2}}" ; "brace slice")]
    #[test_case("  no json here  ", "no json here" ; "fallback trims")]
    #[test_case("结尾 } 然后 { 开头", "" ; "braces out of order")]
    fn test_extract_json(raw: &str, expected: &str) {
        assert_eq!(extract_json(raw), expected);
    }

    #[test]
    fn test_parse_lenient_accepts_raw_newlines() {
        let raw = "```json\n{\"pseudocode\": \"local a = 1\nreturn a\"}\n```";
        let value: Value = parse_lenient(raw).unwrap();
        assert_eq!(value, json!({"pseudocode": "local a = 1\nreturn a"}));
    }

    #[test]
    fn test_escaped_quotes_stay_intact() {
        let raw = "{\"code\": \"say \\\"hi\\\"\tnow\"}";
        let value: Value = parse_lenient(raw).unwrap();
        assert_eq!(value["code"], "say \"hi\"\tnow");
    }

    #[test]
    fn test_parse_lenient_errors() {
        assert!(matches!(parse_lenient::<Value>(""), Err(StructuredError::Empty)));
        assert!(matches!(
            parse_lenient::<Value>("{not json}"),
            Err(StructuredError::InvalidJson { .. })
        ));
    }
}
