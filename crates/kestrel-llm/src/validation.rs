//! Output validators.
//!
//! The default is a heuristic composite; anything smarter (an LLM judge, a
//! task-specific checker) drops in behind the same trait.

use kestrel_core::PromptSpec;

use crate::output::parse_structured;

/// Validator plug-in: `score(spec, output) -> [0, 1]`.
pub trait Validator: Send + Sync {
    fn score(&self, spec: &PromptSpec, output_text: &str) -> f64;
}

/// Heuristic composite validator:
/// 30% length plausibility, 40% prompt keyword coverage, 30% schema
/// presence (trivially satisfied for intents without structured output).
pub struct HeuristicValidator;

impl HeuristicValidator {
    fn length_score(output: &str) -> f64 {
        let len = output.trim().len();
        match len {
            0 => 0.0,
            1..=9 => 0.5,
            10..=4000 => 1.0,
            4001..=12_000 => 0.6,
            _ => 0.3,
        }
    }

    fn coverage_score(prompt: &str, output: &str) -> f64 {
        let output_lower = output.to_lowercase();
        let keywords: Vec<String> = prompt
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 3)
            .map(|t| t.to_string())
            .collect();
        if keywords.is_empty() {
            return 1.0;
        }
        let covered = keywords.iter().filter(|k| output_lower.contains(*k)).count();
        // Half coverage of prompt keywords already counts as full marks;
        // answers legitimately compress.
        ((covered as f64 / keywords.len() as f64) * 2.0).min(1.0)
    }

    fn schema_score(spec: &PromptSpec, output: &str) -> f64 {
        if !spec.intent.requires_structured_output() {
            return 1.0;
        }
        if parse_structured(output).is_some() {
            1.0
        } else {
            0.0
        }
    }
}

impl Validator for HeuristicValidator {
    fn score(&self, spec: &PromptSpec, output_text: &str) -> f64 {
        if output_text.trim().is_empty() {
            return 0.0;
        }
        let composite = 0.3 * Self::length_score(output_text)
            + 0.4 * Self::coverage_score(&spec.prompt, output_text)
            + 0.3 * Self::schema_score(spec, output_text);
        composite.clamp(0.0, 1.0)
    }
}

/// Fixed-score validator for tests and calibration runs.
pub struct ConstValidator(pub f64);

impl Validator for ConstValidator {
    fn score(&self, _spec: &PromptSpec, _output_text: &str) -> f64 {
        self.0.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::Intent;

    #[test]
    fn empty_output_scores_zero() {
        let v = HeuristicValidator;
        let spec = PromptSpec::new(Intent::Qa, "what is rust?");
        assert_eq!(v.score(&spec, "   "), 0.0);
    }

    #[test]
    fn on_topic_answers_beat_off_topic() {
        let v = HeuristicValidator;
        let spec = PromptSpec::new(Intent::Qa, "explain thompson sampling for bandits");
        let on_topic =
            v.score(&spec, "Thompson sampling draws from each bandit arm's posterior and picks the argmax.");
        let off_topic = v.score(&spec, "I enjoy long walks on the beach.");
        assert!(on_topic > off_topic);
    }

    #[test]
    fn missing_schema_is_penalized_for_tool_calls() {
        let v = HeuristicValidator;
        let spec = PromptSpec::new(Intent::ToolCall, "call the search tool for rust docs");
        let json = v.score(&spec, r#"{"tool": "search", "arguments": {"q": "rust docs"}}"#);
        let prose = v.score(&spec, "I would call the search tool with query rust docs");
        assert!(json > prose);
    }

    #[test]
    fn const_validator_clamps() {
        let spec = PromptSpec::new(Intent::Qa, "q");
        assert_eq!(ConstValidator(2.0).score(&spec, "a"), 1.0);
        assert_eq!(ConstValidator(-1.0).score(&spec, "a"), 0.0);
    }
}
