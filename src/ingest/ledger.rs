//! Applied-batch ledger: skip a batch whose exact content was already persisted.
//!
//! The fingerprint is the SHA-256 of the canonical JSON encoding of the
//! record array, so whitespace or key order in the input file does not matter.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::emit::write_atomic;
use crate::error::{Result, TriageError};

/// Ledger target for appends to the JSON node array.
pub const TARGET_JSON: &str = "json";
/// Ledger target for scripts applied to the SQLite store.
pub const TARGET_SQLITE: &str = "sqlite";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub target: String,
    pub fingerprint: String,
    pub applied_at: DateTime<Utc>,
    pub records: usize,
    pub first_id: Option<i64>,
    pub last_id: Option<i64>,
}

pub fn batch_fingerprint(records: &[Value]) -> Result<String> {
    let canonical = serde_json::to_vec(records)?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug)]
pub struct BatchLedger {
    path: PathBuf,
    entries: Vec<LedgerEntry>,
}

impl BatchLedger {
    /// Load the ledger; a missing file is an empty ledger.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| TriageError::CorruptStore {
                path: path.clone(),
                reason: e.to_string(),
            })?
        } else {
            Vec::new()
        };
        Ok(Self { path, entries })
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn find(&self, target: &str, fingerprint: &str) -> Option<&LedgerEntry> {
        self.entries
            .iter()
            .find(|e| e.target == target && e.fingerprint == fingerprint)
    }

    /// Record an applied batch and persist the ledger.
    pub fn record(&mut self, entry: LedgerEntry) -> Result<()> {
        self.entries.push(entry);
        let bytes = serde_json::to_vec_pretty(&self.entries)?;
        write_atomic(&self.path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn entry(target: &str, fingerprint: &str) -> LedgerEntry {
        LedgerEntry {
            target: target.to_string(),
            fingerprint: fingerprint.to_string(),
            applied_at: Utc::now(),
            records: 2,
            first_id: Some(10_000),
            last_id: Some(10_005),
        }
    }

    #[test]
    fn test_fingerprint_ignores_formatting() {
        let a: Vec<Value> = serde_json::from_str(r#"[{"disease_name":"A","species":"dog"}]"#).unwrap();
        let b: Vec<Value> =
            serde_json::from_str("[\n  { \"species\": \"dog\",\n    \"disease_name\": \"A\" }\n]").unwrap();
        assert_eq!(batch_fingerprint(&a).unwrap(), batch_fingerprint(&b).unwrap());

        let c = vec![json!({"disease_name": "B"})];
        assert_ne!(batch_fingerprint(&a).unwrap(), batch_fingerprint(&c).unwrap());
    }

    #[test]
    fn test_record_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.json");

        let mut ledger = BatchLedger::load(&path).unwrap();
        assert!(ledger.entries().is_empty());
        ledger.record(entry(TARGET_JSON, "abc")).unwrap();

        let reloaded = BatchLedger::load(&path).unwrap();
        assert!(reloaded.find(TARGET_JSON, "abc").is_some());
        assert!(reloaded.find(TARGET_SQLITE, "abc").is_none());
        assert!(reloaded.find(TARGET_JSON, "def").is_none());
    }

    #[test]
    fn test_corrupt_ledger_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.json");
        std::fs::write(&path, "[{").unwrap();
        assert!(matches!(BatchLedger::load(&path), Err(TriageError::CorruptStore { .. })));
    }
}
