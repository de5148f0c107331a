use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DictError>;

/// Recoverable error conditions raised by dictionary operations.
///
/// Contract violations (out-of-range ids, non power-of-two capacities, corrupted
/// committed records) are not represented here; they panic.
#[derive(Debug, Error)]
pub enum DictError {
    #[error("dictionary payload unavailable at {path}")]
    PayloadUnavailable { path: PathBuf },

    #[error("dictionary files at {path} are locked by another handle")]
    Locked { path: PathBuf },

    #[error("{operation} is not supported for remote dictionaries")]
    UnsupportedRemote { operation: &'static str },

    #[error("unsupported string comparison operator: {op:?}")]
    UnsupportedOperator { op: String },

    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("string of {len} bytes exceeds the {max} byte dictionary limit")]
    StringTooLong { len: usize, max: usize },

    #[error("remote dictionary call failed: {reason}")]
    Remote { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
