//! Error type definitions.
//!
//! This module defines the error taxonomy shared by every backend and the
//! field-less kinds used for statistics.

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Error types for host database operations.
///
/// Validation errors (`InvalidRecord`, `UnknownField`, `ConfigError`) are raised
/// before any backend call. Backend failures are wrapped with the kind that
/// matches what went wrong and are never retried here, except merge
/// conflicts which the ingestion loop retries before giving up with
/// `MergeConflict`.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum DatabaseError {
    /// The record is malformed (missing address, inverted timestamps, ...).
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A filter named a field outside the record field catalogue.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// A filter does not fit the index mapping, or the index does not exist.
    #[error("Query error: {0}")]
    QueryError(String),

    /// Binary field text is not valid base64.
    #[error("Decode error: {0}")]
    DecodeError(#[from] base64::DecodeError),

    /// The backend rejected a write.
    #[error("Store error: {0}")]
    StoreError(String),

    /// The backend could not be reached or did not answer in time.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Concurrent writers kept changing the record being merged.
    #[error("Merge conflict for {addr} after {attempts} attempts")]
    MergeConflict {
        /// Address of the record being merged.
        addr: String,
        /// Number of attempts made, including the first.
        attempts: usize,
    },

    /// The connection URL or configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Field-less discriminant of [`DatabaseError`], used for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorKind {
    InvalidRecord,
    UnknownField,
    QueryError,
    DecodeError,
    StoreError,
    BackendUnavailable,
    MergeConflict,
    ConfigError,
}

impl DatabaseError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatabaseError::InvalidRecord(_) => ErrorKind::InvalidRecord,
            DatabaseError::UnknownField(_) => ErrorKind::UnknownField,
            DatabaseError::QueryError(_) => ErrorKind::QueryError,
            DatabaseError::DecodeError(_) => ErrorKind::DecodeError,
            DatabaseError::StoreError(_) => ErrorKind::StoreError,
            DatabaseError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            DatabaseError::MergeConflict { .. } => ErrorKind::MergeConflict,
            DatabaseError::ConfigError(_) => ErrorKind::ConfigError,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRecord => "Invalid record",
            ErrorKind::UnknownField => "Unknown field",
            ErrorKind::QueryError => "Query error",
            ErrorKind::DecodeError => "Decode error",
            ErrorKind::StoreError => "Store error",
            ErrorKind::BackendUnavailable => "Backend unavailable",
            ErrorKind::MergeConflict => "Merge conflict",
            ErrorKind::ConfigError => "Configuration error",
        }
    }
}
