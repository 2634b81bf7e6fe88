//! Pulling machine-readable JSON out of free-form collaborator text.
//!
//! Responses are prose wrapping a JSON payload, usually inside
//! `<json_output>` tags or a fenced code block. Every candidate slice is
//! validated by parsing before it is returned.

use regex::Regex;
use serde_json::Value;

/// Extract the JSON payload from a response that follows the
/// analysis-then-`<json_output>` convention. Falls back to the generic
/// extraction when the tags are absent or their content does not parse.
pub fn json_from_tagged(text: &str) -> Option<String> {
    let tag_re = Regex::new(r"(?s)<json_output>\s*(.*?)\s*</json_output>").expect("valid regex");
    if let Some(caps) = tag_re.captures(text) {
        let candidate = caps[1].trim();
        if parses(candidate) {
            return Some(candidate.to_string());
        }
    }
    json_from_text(text)
}

/// Best-effort JSON extraction: fenced ```json blocks, plain fences, tagged
/// output, then the outermost bracketed span.
pub fn json_from_text(text: &str) -> Option<String> {
    let fence_patterns = [
        r"(?s)```json\s*(.*?)\s*```",
        r"(?s)```\s*(.*?)\s*```",
        r"(?s)<json_output>\s*(.*?)\s*</json_output>",
    ];
    for pattern in fence_patterns {
        let re = Regex::new(pattern).expect("valid regex");
        for caps in re.captures_iter(text) {
            let candidate = caps[1].trim();
            if parses(candidate) {
                return Some(candidate.to_string());
            }
        }
    }

    // Outermost [ .. ] or { .. } span. Arrays first: the payloads here are
    // usually lists that may contain objects.
    for (open, close) in [('[', ']'), ('{', '}')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
            if start < end {
                let candidate = text[start..=end].trim();
                if parses(candidate) {
                    return Some(candidate.to_string());
                }
            }
        }
    }

    None
}

fn parses(candidate: &str) -> bool {
    serde_json::from_str::<Value>(candidate).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_json_output_tags() {
        let text = "<analysis>reasoning here</analysis>\n<json_output>\n{\"a\": 1}\n</json_output>";
        assert_eq!(json_from_tagged(text).as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn extracts_from_fenced_block() {
        let text = "Here you go:\n```json\n[{\"criterion\": \"c1\", \"weight\": 0.5}]\n```";
        let out = json_from_text(text).unwrap();
        assert!(out.starts_with('['));
        assert!(serde_json::from_str::<Value>(&out).is_ok());
    }

    #[test]
    fn extracts_nested_array_without_fences() {
        let text = "Scores below.\n[{\"scores\": [1, 2, 3]}]\nDone.";
        let out = json_from_text(text).unwrap();
        assert_eq!(out, "[{\"scores\": [1, 2, 3]}]");
    }

    #[test]
    fn prefers_tag_content_over_other_brackets() {
        let text = "ignore [this] part <json_output>[{\"k\": \"v\"}]</json_output>";
        assert_eq!(json_from_tagged(text).as_deref(), Some("[{\"k\": \"v\"}]"));
    }

    #[test]
    fn returns_none_for_prose() {
        assert!(json_from_text("no structured output here").is_none());
        assert!(json_from_tagged("<json_output>not json</json_output>").is_none());
    }
}
