pub mod ledger;
pub mod normalize;

pub use ledger::{batch_fingerprint, BatchLedger, LedgerEntry, TARGET_JSON, TARGET_SQLITE};
pub use normalize::{normalize_batch, normalize_record, truncate_chars, NormalizedBatch, RejectedRecord};

use serde_json::Value;
use std::path::Path;

use crate::error::{Result, TriageError};

/// Read an enrichment batch: a JSON array of record objects.
///
/// A missing file is fatal for the run; an empty array is a valid, empty batch.
pub fn load_records(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        return Err(TriageError::MissingInput(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&content)? {
        Value::Array(records) => Ok(records),
        other => Err(TriageError::InvalidInput(format!(
            "{} must contain a JSON array of records, found {}",
            path.display(),
            match other {
                Value::Object(_) => "an object",
                Value::String(_) => "a string",
                Value::Number(_) => "a number",
                Value::Bool(_) => "a boolean",
                _ => "null",
            }
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_input_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_records(&temp_dir.path().join("enriched_diseases.json")).unwrap_err();
        assert!(matches!(err, TriageError::MissingInput(_)));
    }

    #[test]
    fn test_empty_array_is_valid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("batch.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(load_records(&path).unwrap().is_empty());
    }

    #[test]
    fn test_object_input_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("batch.json");
        std::fs::write(&path, r#"{"disease_name": "A"}"#).unwrap();
        let err = load_records(&path).unwrap_err();
        assert!(err.to_string().contains("an object"));
    }
}
