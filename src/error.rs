//! Error types for the outline cache.
//!
//! Storage and codec failures are kept apart so callers can treat a
//! `CodecError` as a plain cache miss while still surfacing real I/O or
//! database problems.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a `KeyValueStore` backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("I/O error at {path}: {source}")]
    PathIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid cache key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("store unavailable at {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },
}

/// Errors raised while decoding or encoding a cache envelope.
///
/// Any of these on the read path is equivalent to a cache miss.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("envelope does not start with the cache magic bytes")]
    BadMagic,

    #[error("unknown cache protocol version {0}")]
    UnknownProtocol(u8),

    #[error("envelope truncated ({0} bytes)")]
    Truncated(usize),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("compression error: {0}")]
    Compression(std::io::Error),
}

/// Top-level error returned by the cache facade.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("codec error: {0}")]
    CodecError(#[from] CodecError),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("no document cache is open")]
    NoDocumentOpen,
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
