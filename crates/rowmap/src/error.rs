//! Error types for the runtime.

use thiserror::Error;

/// Errors returned by sessions, drivers and automigrate.
#[derive(Debug, Error)]
pub enum OrmError {
    /// No row matched a single-row fetch.
    #[error("object not found")]
    NotFound,

    /// Malformed selector, options or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// The dialect or storage kind does not support the operation.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Stored `CREATE TABLE` text could not be parsed for rewriting.
    #[error("ddl parse error at byte {offset}: {message}")]
    DdlParse {
        /// Byte offset of the problem.
        offset: usize,
        /// Description.
        message: String,
    },

    /// A statement failed to execute.
    #[error("failed to execute `{sql}`: {source}")]
    Execution {
        /// The offending SQL text.
        sql: String,
        /// Driver error.
        source: sqlx::Error,
    },

    /// A cell could not be bound into the destination.
    #[error("decode error on column `{column}`: {message}")]
    Decode {
        /// Failing column.
        column: String,
        /// Description.
        message: String,
    },

    /// A field could not be encoded as an argument.
    #[error("encode error on column `{column}`: {message}")]
    Encode {
        /// Failing column.
        column: String,
        /// Description.
        message: String,
    },

    /// Pool or transaction level database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No driver is registered under the dialect name.
    #[error("unknown dialect `{0}`")]
    UnknownDialect(String),

    /// A driver name was registered twice.
    #[error("driver `{0}` is already registered")]
    DuplicateDriver(String),
}

impl OrmError {
    /// Whether this is [`OrmError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub(crate) fn execution(sql: &str) -> impl FnOnce(sqlx::Error) -> Self + '_ {
        move |source| Self::Execution {
            sql: sql.to_string(),
            source,
        }
    }
}

impl From<rowmap_core::Error> for OrmError {
    fn from(err: rowmap_core::Error) -> Self {
        match err {
            rowmap_core::Error::Validation(message) => Self::Validation(message),
            rowmap_core::Error::DdlParse { offset, message } => Self::DdlParse { offset, message },
            rowmap_core::Error::Decode { column, source } => Self::Decode {
                column,
                message: source.to_string(),
            },
            rowmap_core::Error::Encode { column, source } => Self::Encode {
                column,
                message: source.to_string(),
            },
        }
    }
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, OrmError>;
