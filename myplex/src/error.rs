//! Error types for myplex

use thiserror::Error;

/// Result type alias for myplex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during database operations.
///
/// Driver failures never leak out directly: they are folded into one of the
/// variants below together with the context needed to diagnose them (the
/// SQL that was attempted, the option that was being applied).
///
/// The type is `Clone` because a failed async query stores its error on the
/// [`AsyncResult`](crate::AsyncResult), which hands it out on every access.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Opening the channel (handshake or I/O) failed
    #[error("Connection error ({address}): {message}")]
    Connection { address: String, message: String },

    /// The server or the dispatch layer rejected a statement
    #[error("Query error: {message} [SQL: {sql}]")]
    Query { sql: String, message: String },

    /// The connection charset could not be applied
    #[error("Failed to set charset '{charset}': {message}")]
    Charset { charset: String, message: String },

    /// The default database could not be selected
    #[error("Failed to select default database '{database}': {message}")]
    DefaultDb { database: String, message: String },

    /// A parameter value could not be rendered as a SQL literal
    #[error("Quote error: {0}")]
    Quote(String),

    /// No pooled connection carries any of the requested tags
    #[error("No matching connection for tags [{}]", .tags.join(", "))]
    NoMatchingConnection { tags: Vec<String> },

    /// Internal pool bookkeeping is inconsistent
    #[error("Pool integrity violation: {0}")]
    PoolIntegrity(String),

    /// The body of a transaction failed.
    ///
    /// `rollback` holds the failure of the automatic rollback, if that
    /// failed as well.
    #[error("Transaction failed: {source}{}", rollback_note(.rollback))]
    Transaction {
        source: Box<Error>,
        rollback: Option<Box<Error>>,
    },

    /// The query builder was given criteria or rows it cannot compile
    #[error("Query builder error: {0}")]
    Builder(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Type conversion error
    #[error("Type conversion error: expected {expected}, got {actual}")]
    TypeConversion {
        expected: &'static str,
        actual: String,
    },

    /// Column not found in row
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Null value for non-optional field
    #[error("Unexpected null value for column: {0}")]
    UnexpectedNull(String),
}

fn rollback_note(rollback: &Option<Box<Error>>) -> String {
    match rollback {
        Some(err) => format!(" (rollback also failed: {err})"),
        None => String::new(),
    }
}

impl Error {
    pub(crate) fn query(sql: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::Query {
            sql: sql.into(),
            message: err.to_string(),
        }
    }

    /// The SQL text attached to a query error, if any.
    ///
    /// Transaction errors report the SQL of the failure they wrap.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query { sql, .. } => Some(sql),
            Error::Transaction { source, .. } => source.sql(),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_matching_connection_lists_tags() {
        let err = Error::NoMatchingConnection {
            tags: vec!["replica".to_string(), "reports".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "No matching connection for tags [replica, reports]"
        );
    }

    #[test]
    fn test_transaction_error_keeps_cause() {
        let err = Error::Transaction {
            source: Box::new(Error::query("wrong query", "syntax error")),
            rollback: None,
        };
        assert_eq!(err.sql(), Some("wrong query"));
        assert!(!err.to_string().contains("rollback also failed"));

        let both = Error::Transaction {
            source: Box::new(Error::query("wrong query", "syntax error")),
            rollback: Some(Box::new(Error::query("ROLLBACK", "gone away"))),
        };
        assert!(both.to_string().contains("rollback also failed"));
    }
}
