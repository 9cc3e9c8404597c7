//! Error types for the LT Check reconciliation engine.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`CsvError`] - CSV reading and writing errors
//! - [`MatrixError`] - Feed matrix / options loading errors
//! - [`LedgerError`] - Top-level ledger rebuild errors
//! - [`SnapshotError`] - Reads against the published ledger snapshot
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Row-level problems (bad dates, non-numeric quantities, malformed kit
//! descriptions, unmapped aliases) are not errors. They are absorbed where
//! they occur and only show up as counters in the rebuild report.

use thiserror::Error;

use crate::models::Feed;

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors while reading or writing CSV data.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read or write a file.
    #[error("Failed to access file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode the byte content.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Invalid CSV structure.
    #[error("Invalid CSV at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// Writer failure.
    #[error("Failed to write CSV: {0}")]
    Write(String),
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(0);
        CsvError::Parse {
            line,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Matrix Errors
// =============================================================================

/// Errors while loading feed matrices or reconcile options.
#[derive(Debug, Error)]
pub enum MatrixError {
    /// JSON serialization/deserialization error.
    #[error("Matrix JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("Matrix IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A matrix was declared for another feed than the slot it fills.
    #[error("Matrix for feed '{found}' used where '{expected}' was expected")]
    FeedMismatch { expected: Feed, found: Feed },
}

// =============================================================================
// Ledger Errors (top-level)
// =============================================================================

/// Top-level ledger rebuild errors.
///
/// Only [`LedgerError::DataSourceUnavailable`] aborts a rebuild on its own;
/// the other variants are wrapped into it by the snapshot loader.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// One of the input snapshots cannot be obtained.
    #[error("Data source '{feed}' unavailable: {reason}")]
    DataSourceUnavailable { feed: Feed, reason: String },

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Matrix error.
    #[error("Matrix error: {0}")]
    Matrix(#[from] MatrixError),
}

impl LedgerError {
    pub fn unavailable(feed: Feed, reason: impl Into<String>) -> Self {
        LedgerError::DataSourceUnavailable {
            feed,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Snapshot Errors
// =============================================================================

/// Errors when reading the published ledger snapshot.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SnapshotError {
    /// No rebuild has been attempted yet.
    #[error("Ledger has not been loaded yet")]
    NotLoaded,

    /// The last rebuild failed. `stale` is true when an older snapshot is retained.
    #[error("Ledger unavailable: {reason}")]
    Unavailable { reason: String, stale: bool },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Rebuild error.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Snapshot not readable.
    #[error("{0}")]
    Snapshot(#[from] SnapshotError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Nothing matches the query.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for matrix loading.
pub type MatrixResult<T> = Result<T, MatrixError>;

/// Result type for ledger rebuilds.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result type for snapshot reads.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // CsvError -> LedgerError
        let csv_err = CsvError::EmptyFile;
        let ledger_err: LedgerError = csv_err.into();
        assert!(ledger_err.to_string().contains("empty"));

        // LedgerError -> ServerError
        let server_err: ServerError = LedgerError::unavailable(Feed::PurchaseOrders, "locked").into();
        assert!(server_err.to_string().contains("purchase_orders"));
        assert!(server_err.to_string().contains("locked"));
    }

    #[test]
    fn test_unavailable_format() {
        let err = SnapshotError::Unavailable {
            reason: "Data source 'aliases' unavailable: missing column NAV".into(),
            stale: true,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Ledger unavailable"));
        assert!(msg.contains("missing column NAV"));
    }
}
