//! Error types shared by the pure layers of rowmap.

use thiserror::Error;

/// Errors raised while describing records, building SQL or rewriting DDL.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed selector, options or record description.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unbalanced quotes or brackets in a `CREATE TABLE` statement.
    #[error("ddl parse error at byte {offset}: {message}")]
    DdlParse {
        /// Byte offset into the DDL text where the problem was detected.
        offset: usize,
        /// Human readable description.
        message: String,
    },

    /// A field value could not be encoded for storage.
    #[error("encode error on column `{column}`: {source}")]
    Encode {
        /// Column whose value failed to encode.
        column: String,
        /// Underlying conversion error.
        source: ValueError,
    },

    /// A cell could not be converted into the destination field.
    #[error("decode error on column `{column}`: {source}")]
    Decode {
        /// Column whose value failed to decode.
        column: String,
        /// Underlying conversion error.
        source: ValueError,
    },
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Conversion failure between a [`SqlValue`](crate::SqlValue) and a Rust type.
#[derive(Debug, Error)]
pub enum ValueError {
    /// The stored value has an incompatible type.
    #[error("expected {expected}, found {found}")]
    Mismatch {
        /// Type the destination expects.
        expected: &'static str,
        /// Storage class actually found.
        found: &'static str,
    },

    /// The value does not fit into the destination type.
    #[error("value out of range for {0}")]
    OutOfRange(&'static str),

    /// Text could not be parsed as a timestamp.
    #[error("invalid timestamp: {0}")]
    Time(String),

    /// JSON encoding or decoding failed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for rowmap-core operations.
pub type Result<T> = std::result::Result<T, Error>;
