//! # Store Errors
//!
//! Every failure a store operation can report. Validation errors are raised
//! before anything is written, so a failed mutation never changes the file.

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error kinds reported by [`Store`](crate::Store) operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing file does not carry the expected extension
    #[error("The file you've specified a path to is of wrong type (expected: .{expected}, received: .{received})")]
    InvalidFormat { expected: String, received: String },

    /// Missing or empty key, or a key the operation requires to exist
    #[error("Invalid key: {message}")]
    InvalidKey { message: String },

    /// Missing value where one is required
    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    /// Operation attempted before `init()` recorded the marker
    #[error("Store is not initialized, call init() first")]
    NotInitialized,

    /// A lookup or search produced nothing
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// The stored value has the wrong type for the operation
    #[error("Illegal operation: {message}")]
    IllegalOperation { message: String },

    /// Malformed search options
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The file holds valid JSON whose top level is not an object
    #[error("Invalid document: expected a JSON object at the top level, found {found}")]
    InvalidDocument { found: String },

    /// Underlying storage failure
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// The file could not be parsed or the document could not be encoded
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn invalid_key<S: Into<String>>(msg: S) -> Self {
        StoreError::InvalidKey { message: msg.into() }
    }

    pub fn invalid_value<S: Into<String>>(msg: S) -> Self {
        StoreError::InvalidValue { message: msg.into() }
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        StoreError::NotFound { message: msg.into() }
    }

    pub fn illegal_operation<S: Into<String>>(msg: S) -> Self {
        StoreError::IllegalOperation { message: msg.into() }
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        StoreError::Validation { message: msg.into() }
    }
}
