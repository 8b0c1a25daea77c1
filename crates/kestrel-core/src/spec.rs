//! Task descriptions handed to the executor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of task intents. The intent picks the output schema, the
/// accuracy comparator and the validator heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Code,
    Qa,
    Summarize,
    ToolCall,
}

impl Intent {
    /// Whether the generator must produce parseable structured output for
    /// this intent (tool calls are emitted as JSON).
    pub fn requires_structured_output(&self) -> bool {
        matches!(self, Intent::ToolCall)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Code => "code",
            Intent::Qa => "qa",
            Intent::Summarize => "summarize",
            Intent::ToolCall => "tool_call",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One task to execute or evaluate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSpec {
    pub intent: Intent,
    pub prompt: String,
    /// Allow-list of tool identifiers the output may reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    /// Reference output; present on golden-set records used for accuracy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

impl PromptSpec {
    pub fn new(intent: Intent, prompt: impl Into<String>) -> Self {
        Self {
            intent,
            prompt: prompt.into(),
            tools: None,
            expected: None,
        }
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Intent::ToolCall).unwrap(), "\"tool_call\"");
        let parsed: Intent = serde_json::from_str("\"qa\"").unwrap();
        assert_eq!(parsed, Intent::Qa);
    }

    #[test]
    fn only_tool_calls_require_structured_output() {
        assert!(Intent::ToolCall.requires_structured_output());
        assert!(!Intent::Qa.requires_structured_output());
        assert!(!Intent::Code.requires_structured_output());
        assert!(!Intent::Summarize.requires_structured_output());
    }
}
