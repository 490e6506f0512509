use std::path::PathBuf;
use thiserror::Error;

/// Main error type for triage graph construction and emission
#[derive(Error, Debug)]
pub enum TriageError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A record that cannot become a disease entry
    #[error("Validation error: {0}")]
    Validation(String),

    /// The enrichment input does not exist
    #[error("Input not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// The persisted node array cannot be parsed (e.g. truncated by a crash)
    #[error("Corrupt store {}: {reason}", .path.display())]
    CorruptStore { path: PathBuf, reason: String },

    /// Relational run without a known store maximum while one is required
    #[error("Id floor unverified: {0}")]
    IdFloorUnverified(String),

    /// A namespace counter ran out of values
    #[error("Id space exhausted for namespace {0}")]
    IdExhausted(&'static str),

    /// A built graph violates a structural invariant
    #[error("Graph invariant violated: {0}")]
    Graph(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using TriageError
pub type Result<T> = std::result::Result<T, TriageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TriageError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let triage_err: TriageError = rusqlite_err.into();
        assert!(matches!(triage_err, TriageError::Database(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let triage_err: TriageError = io_err.into();
        assert!(matches!(triage_err, TriageError::Io(_)));
    }

    #[test]
    fn test_corrupt_store_mentions_path() {
        let err = TriageError::CorruptStore {
            path: PathBuf::from("data/responses_full.json"),
            reason: "EOF while parsing".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("responses_full.json"));
        assert!(msg.contains("EOF"));
    }
}
