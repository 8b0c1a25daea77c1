//! Curated evaluation records used to score genomes offline.

use serde::{Deserialize, Serialize};

use crate::error::{KestrelError, Result};
use crate::spec::{Intent, PromptSpec};

/// One golden-set record. The set is loaded once per optimize run and is
/// immutable for the duration of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenExample {
    pub prompt: String,
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default = "default_quality")]
    pub quality_score: f64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn default_quality() -> f64 {
    1.0
}

impl GoldenExample {
    /// Field-level validation applied by the golden-set loader.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(KestrelError::GoldenSetInvalid("record has an empty prompt".into()));
        }
        if !(0.0..=1.0).contains(&self.quality_score) {
            return Err(KestrelError::GoldenSetInvalid(format!(
                "quality_score {} outside [0, 1]",
                self.quality_score
            )));
        }
        Ok(())
    }

    /// The executable task for this record.
    pub fn to_spec(&self) -> PromptSpec {
        PromptSpec {
            intent: self.intent,
            prompt: self.prompt.clone(),
            tools: None,
            expected: self.expected.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_score_defaults_to_one() {
        let parsed: GoldenExample =
            serde_json::from_str(r#"{"prompt": "2+2?", "intent": "qa", "expected": "4"}"#).unwrap();
        assert_eq!(parsed.quality_score, 1.0);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn empty_prompt_is_invalid() {
        let parsed: GoldenExample =
            serde_json::from_str(r#"{"prompt": "  ", "intent": "qa"}"#).unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn out_of_range_quality_is_invalid() {
        let parsed: GoldenExample =
            serde_json::from_str(r#"{"prompt": "x", "intent": "code", "quality_score": 1.5}"#)
                .unwrap();
        assert!(parsed.validate().is_err());
    }
}
