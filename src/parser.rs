//! Best-effort JSON extraction from free-form LLM output.

use serde_json::Value;

/// Extract the substring from the first `{` to the last `}` inclusive and
/// parse it as JSON. Returns an empty object on any failure — callers treat
/// every field as optional and fill in schema defaults.
pub fn parse_analysis(text: &str) -> Value {
    let start = text.find('{');
    let end = text.rfind('}');

    let (Some(start), Some(end)) = (start, end) else {
        return Value::Object(Default::default());
    };
    if end < start {
        return Value::Object(Default::default());
    }

    serde_json::from_str(&text[start..=end]).unwrap_or_else(|_| Value::Object(Default::default()))
}

/// Mask a webhook URL for log lines, matching the source's truncate-the-middle style.
pub fn mask_webhook(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    if url.len() > 45 {
        let head = &url[..30.min(url.len())];
        let tail = &url[url.len().saturating_sub(8)..];
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_spanning_prose() {
        let text = r#"Sure, here is the analysis: {"a":1,"nested":{"b":2}} -- let me know if you need more."#;
        let value = parse_analysis(text);
        assert!(value.is_object());
        assert_eq!(value["a"], 1);
        assert_eq!(value["nested"]["b"], 2);
    }

    #[test]
    fn no_braces_yields_empty_object() {
        let value = parse_analysis("no braces here");
        assert_eq!(value, Value::Object(Default::default()));
    }

    #[test]
    fn malformed_json_yields_empty_object() {
        let value = parse_analysis("{not: valid json}");
        assert_eq!(value, Value::Object(Default::default()));
    }

    #[test]
    fn mask_webhook_truncates_long_urls() {
        let url = "https://hooks.example.com/services/T000/B000/xxxxxxxxxxxxxxxxxxxxxxxx";
        let masked = mask_webhook(url);
        assert!(masked.contains("..."));
        assert!(masked.len() < url.len());
    }

    #[test]
    fn mask_webhook_short_url_is_fully_redacted() {
        assert_eq!(mask_webhook("https://short.url"), "***");
        assert_eq!(mask_webhook(""), "");
    }
}
