use std::io;

use thiserror::Error;

/// Errors surfaced by the storage engine.
///
/// `Corruption` is recovered internally by the copy store whenever the other
/// slot is still valid; callers only ever observe it through a slot being
/// treated as invalid.
#[derive(Debug, Error)]
pub enum NvramError {
    #[error("key not found: {key}")]
    NotFound { key: String },

    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },

    #[error("system namespace is locked")]
    Unauthorized,

    #[error("corrupt snapshot: {reason}")]
    Corruption { reason: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, NvramError>;
