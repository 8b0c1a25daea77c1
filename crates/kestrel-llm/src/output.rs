//! Structured output parsing and schema repair prompts.

use serde_json::Value;

/// Extracts a JSON object from generator output. Accepts raw JSON, fenced
/// ```json blocks, and objects embedded in prose. Only objects count as
/// valid structured output.
pub fn parse_structured(text: &str) -> Option<Value> {
    let trimmed = strip_fences(text.trim());

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    // Fall back to the outermost brace span.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    rest.strip_suffix("```").map(str::trim).unwrap_or(rest)
}

/// Prompt for one schema repair attempt.
pub fn repair_prompt(original_prompt: &str, bad_output: &str) -> String {
    format!(
        "The previous answer was not valid JSON.\n\
         Task:\n{original_prompt}\n\n\
         Previous answer:\n{bad_output}\n\n\
         Reply with ONLY a valid JSON object, no prose and no code fences."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_raw_json_objects() {
        let value = parse_structured(r#"{"tool": "search", "arguments": {"q": "x"}}"#).unwrap();
        assert_eq!(value["tool"], "search");
    }

    #[test]
    fn parses_fenced_blocks() {
        let value = parse_structured("```json\n{\"tool\": \"calc\"}\n```").unwrap();
        assert_eq!(value["tool"], "calc");
    }

    #[test]
    fn parses_objects_embedded_in_prose() {
        let value = parse_structured("Sure! Here you go: {\"a\": 1} hope that helps").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn rejects_non_objects_and_garbage() {
        assert!(parse_structured("[1, 2, 3]").is_none());
        assert!(parse_structured("42").is_none());
        assert!(parse_structured("not json at all").is_none());
        assert!(parse_structured("{broken").is_none());
    }
}
