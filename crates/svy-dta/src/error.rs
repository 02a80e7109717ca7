//! Error types for `.dta` file operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when reading or writing `.dta` files.
///
/// Variants fall into three families: format errors (malformed or
/// unsupported file content — fatal, no resynchronization), range errors
/// (rejected at the accessor, before invalid state can be set), and I/O
/// errors (file or store failures). Over-long labels, names, formats and
/// notes are never errors: they are truncated deterministically.
#[derive(Debug, Error)]
pub enum DtaError {
    /// Section token did not match the expected marker.
    #[error("expected token {expected}, found {found:?}")]
    TokenMismatch { expected: String, found: Vec<u8> },

    /// Unsupported format release (only "118" is handled).
    #[error("unsupported .dta release: {release}")]
    UnsupportedRelease { release: String },

    /// Byte order string was neither "MSF" nor "LSF".
    #[error("invalid byte order: {value}")]
    InvalidByteOrder { value: String },

    /// Unknown variable type code.
    #[error("invalid variable type code: {code}")]
    InvalidTypeCode { code: u16 },

    /// Unknown variable type name.
    #[error("invalid variable type name: {name}")]
    InvalidTypeName { name: String },

    /// Malformed section content.
    #[error("invalid .dta file: {message}")]
    InvalidFormat { message: String },

    /// Variable count out of range (maximum 65535).
    #[error("variable count {count} exceeds 65535")]
    TooManyVariables { count: u64 },

    /// Variable index past the declared variable count.
    #[error("variable index {index} out of bounds (variable count {count})")]
    VariableOutOfBounds { index: usize, count: usize },

    /// No variable with the given name.
    #[error("unknown variable: {name}")]
    UnknownVariable { name: String },

    /// Sort rank past the declared variable count.
    #[error("sort rank {rank} out of bounds (variable count {count})")]
    InvalidSortRank { rank: usize, count: usize },

    /// A dictionary entry referenced a value-label table that has not
    /// been defined.
    #[error("unknown enumeration: {name}")]
    UnknownEnumeration { name: String },

    /// Observation row id past the declared observation count.
    #[error("row id {row} out of bounds (observation count {count})")]
    RowOutOfBounds { row: u64, count: u64 },

    /// A field value cannot be represented in its variable's declared type.
    #[error("value for variable {name} does not fit type {type_name}")]
    ValueTypeMismatch { name: String, type_name: String },

    /// File does not carry the `.dta` extension.
    #[error("not a .dta file: {path}")]
    WrongExtension { path: PathBuf },

    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Document store failure.
    #[error("document store error: {0}")]
    Store(#[from] svy_store::StoreError),

    /// Model bundle (de)serialization failure.
    #[error("model serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for `.dta` operations.
pub type Result<T> = std::result::Result<T, DtaError>;

impl DtaError {
    /// Create an InvalidFormat error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Create a TokenMismatch error.
    pub fn token_mismatch(expected: impl Into<String>, found: &[u8]) -> Self {
        Self::TokenMismatch {
            expected: expected.into(),
            found: found.to_vec(),
        }
    }

    /// Create an UnknownVariable error.
    pub fn unknown_variable(name: impl Into<String>) -> Self {
        Self::UnknownVariable { name: name.into() }
    }

    /// Create an UnknownEnumeration error.
    pub fn unknown_enumeration(name: impl Into<String>) -> Self {
        Self::UnknownEnumeration { name: name.into() }
    }

    /// Whether this error is in the format family (unrecoverable parse
    /// failure, as opposed to a rejected accessor or an I/O fault).
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Self::TokenMismatch { .. }
                | Self::UnsupportedRelease { .. }
                | Self::InvalidByteOrder { .. }
                | Self::InvalidTypeCode { .. }
                | Self::InvalidTypeName { .. }
                | Self::InvalidFormat { .. }
        )
    }
}
