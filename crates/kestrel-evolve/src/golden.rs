//! Golden set loading. One JSON file, read once per optimize run, with
//! every record validated before the run starts.

use std::path::Path;

use tracing::info;

use kestrel_core::GoldenExample;

use crate::EvolveError;

pub fn load_golden_set(path: &Path) -> Result<Vec<GoldenExample>, EvolveError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| EvolveError::GoldenSet(format!("cannot read {}: {e}", path.display())))?;

    let examples: Vec<GoldenExample> = serde_json::from_str(&text)
        .map_err(|e| EvolveError::GoldenSet(format!("cannot parse {}: {e}", path.display())))?;

    if examples.is_empty() {
        return Err(EvolveError::GoldenSet("golden set is empty".into()));
    }

    for (index, example) in examples.iter().enumerate() {
        example
            .validate()
            .map_err(|e| EvolveError::GoldenSet(format!("record {index}: {e}")))?;
    }

    info!(count = examples.len(), path = %path.display(), "golden set loaded");
    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn loads_a_valid_set() {
        let file = write_file(
            r#"[
                {"prompt": "what is 2+2?", "intent": "qa", "expected": "4"},
                {"prompt": "summarize rust", "intent": "summarize", "quality_score": 0.8}
            ]"#,
        );
        let examples = load_golden_set(file.path()).unwrap();
        assert_eq!(examples.len(), 2);
    }

    #[test]
    fn empty_set_is_invalid() {
        let file = write_file("[]");
        assert!(matches!(
            load_golden_set(file.path()),
            Err(EvolveError::GoldenSet(_))
        ));
    }

    #[test]
    fn bad_record_is_invalid() {
        let file = write_file(r#"[{"prompt": "", "intent": "qa"}]"#);
        assert!(matches!(
            load_golden_set(file.path()),
            Err(EvolveError::GoldenSet(_))
        ));
    }

    #[test]
    fn missing_file_is_invalid() {
        assert!(matches!(
            load_golden_set(Path::new("/nonexistent/golden.json")),
            Err(EvolveError::GoldenSet(_))
        ));
    }
}
