//! Error types for the Potiron aggregation engine.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, aggregating or exporting scores.
///
/// Missing data is never an error: absent keys and members are treated as
/// zero contributions by every component.
#[derive(Error, Debug)]
pub enum Error {
    /// Redis client error (lost connection, bad reply, ...).
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A key component cannot be used to build a store key.
    #[error("invalid key component '{component}': {reason}")]
    InvalidKey {
        /// Which part of the key was rejected (source, protocol, field).
        component: &'static str,
        /// Description of what's wrong.
        reason: String,
    },

    /// A date string did not match the expected layout.
    #[error("invalid date '{input}': {reason}")]
    InvalidDate {
        /// The rejected input.
        input: String,
        /// Description of what's wrong.
        reason: String,
    },

    /// A protocol catalog line could not be parsed.
    #[error("invalid protocol definition on line {line}: {reason}")]
    InvalidProtocol {
        /// 1-based line number in the catalog file.
        line: usize,
        /// Description of what's wrong.
        reason: String,
    },

    /// CSV serialization error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_key_display() {
        let err = Error::InvalidKey {
            component: "field",
            reason: "must not contain ':'".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("field"));
        assert!(msg.contains("must not contain ':'"));
    }

    #[test]
    fn test_invalid_date_display() {
        let err = Error::InvalidDate {
            input: "2024-13".to_string(),
            reason: "no such month".to_string(),
        };
        assert_eq!(err.to_string(), "invalid date '2024-13': no such month");
    }

    #[test]
    fn test_invalid_protocol_display() {
        let err = Error::InvalidProtocol {
            line: 3,
            reason: "missing name".to_string(),
        };
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_redis_error() {
        let redis_err = redis::RedisError::from((redis::ErrorKind::IoError, "connection refused"));
        let err: Error = redis_err.into();
        assert!(matches!(err, Error::Redis(_)));
        assert!(err.to_string().contains("connection refused"));
    }
}
