//! Accuracy comparators, selected by intent.

use kestrel_core::Intent;

use crate::output::parse_structured;

/// Accuracy plug-in: `compare(expected, output, intent) -> [0, 1]`.
pub trait Comparator: Send + Sync {
    fn compare(&self, expected: &str, output_text: &str, intent: Intent) -> f64;
}

/// Normalized token-level F1 between two texts.
pub fn token_f1(expected: &str, output: &str) -> f64 {
    let expected_tokens = tokens(expected);
    let output_tokens = tokens(output);
    if expected_tokens.is_empty() || output_tokens.is_empty() {
        return if expected_tokens.is_empty() && output_tokens.is_empty() {
            1.0
        } else {
            0.0
        };
    }

    let mut remaining = expected_tokens.clone();
    let mut overlap = 0usize;
    for token in &output_tokens {
        if let Some(pos) = remaining.iter().position(|t| t == token) {
            remaining.swap_remove(pos);
            overlap += 1;
        }
    }
    if overlap == 0 {
        return 0.0;
    }

    let precision = overlap as f64 / output_tokens.len() as f64;
    let recall = overlap as f64 / expected_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Default comparator set:
/// - tool calls: structural JSON equality (exact match after parsing)
/// - QA and summaries: token F1
/// - code: execution-equivalence stand-in comparing normalized token
///   streams, with token F1 as partial credit
pub struct IntentComparator;

impl IntentComparator {
    fn compare_tool_call(expected: &str, output: &str) -> f64 {
        match (parse_structured(expected), parse_structured(output)) {
            (Some(a), Some(b)) if a == b => 1.0,
            (Some(_), Some(_)) => 0.0,
            _ => {
                if expected.trim() == output.trim() {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    fn compare_code(expected: &str, output: &str) -> f64 {
        if tokens(expected) == tokens(output) {
            return 1.0;
        }
        token_f1(expected, output)
    }
}

impl Comparator for IntentComparator {
    fn compare(&self, expected: &str, output_text: &str, intent: Intent) -> f64 {
        let score = match intent {
            Intent::ToolCall => Self::compare_tool_call(expected, output_text),
            Intent::Qa | Intent::Summarize => token_f1(expected, output_text),
            Intent::Code => Self::compare_code(expected, output_text),
        };
        score.clamp(0.0, 1.0)
    }
}
