//! Source parsers. Flatten upstream report shapes into [`PeriodRecord`]s.
//!
//! - **QuickBooks**: a Profit & Loss report tree with one column per month.
//! - **Rootfi**: an array of period records with nested line items.

pub mod quickbooks;
pub mod rootfi;

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::SourceError;
use crate::periods::PeriodRecord;

pub use quickbooks::QuickBooksParser;
pub use rootfi::RootfiParser;

/// A parser for one upstream dataset format.
pub trait SourceParser {
    /// Human-readable source name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Flatten an already-read JSON document.
    fn parse_str(&self, json: &str) -> Result<Vec<PeriodRecord>, SourceError>;

    /// Read and flatten a JSON file.
    fn parse_file(&self, path: &Path) -> Result<Vec<PeriodRecord>, SourceError> {
        let json = read_source(self.name(), path)?;
        self.parse_str(&json)
    }
}

/// Read a source file, mapping a missing file to [`SourceError::NotFound`].
fn read_source(source_name: &str, path: &Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SourceError::NotFound {
                source_name: source_name.to_string(),
                path: path.to_path_buf(),
            }
        } else {
            SourceError::Unreadable {
                source_name: source_name.to_string(),
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        }
    })
}

/// Deserialize a source document.
///
/// Syntax errors become [`SourceError::InvalidJson`]; well-formed JSON of
/// the wrong shape becomes [`SourceError::Malformed`].
fn decode<T: DeserializeOwned>(source_name: &str, json: &str) -> Result<T, SourceError> {
    serde_json::from_str(json).map_err(|e| {
        if e.is_syntax() || e.is_eof() {
            SourceError::InvalidJson {
                source_name: source_name.to_string(),
                reason: e.to_string(),
            }
        } else {
            SourceError::Malformed {
                source_name: source_name.to_string(),
                reason: e.to_string(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = RootfiParser
            .parse_file(&tmp.path().join("nope.json"))
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
        assert!(err.to_string().starts_with("Rootfi data file not found"));
    }

    #[test]
    fn broken_json_is_invalid_json() {
        let err = QuickBooksParser.parse_str("{ not json").unwrap_err();
        assert!(matches!(err, SourceError::InvalidJson { .. }));
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let err = RootfiParser.parse_str(r#"{"records": []}"#).unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }
}
