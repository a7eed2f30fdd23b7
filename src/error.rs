//! Error taxonomy for the three collaborator boundaries.
//!
//! None of these are fatal: each periodic action catches them, logs, and
//! keeps its timer running. Only configuration errors at startup stop the
//! process, and those travel as `anyhow::Error`.

use thiserror::Error;

/// Sample history could not be read or written.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    Join(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The chain node or the version endpoint was unreachable or answered
/// with something we could not interpret.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("constant {pallet}::{name} not found in runtime metadata")]
    MissingConstant { pallet: String, name: String },

    #[error("runtime metadata: {0}")]
    Metadata(String),
}

/// A presence update was rejected. Rejections are scoped to one
/// destination and never abort updates to the others.
#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("permission denied for destination {destination}")]
    PermissionDenied { destination: u64 },

    #[error("rate limited, retry after {retry_after_secs:.1}s")]
    RateLimited { retry_after_secs: f64 },

    #[error("presence transport unavailable: {0}")]
    Transport(String),

    #[error("{0}")]
    Other(String),
}

impl PresenceError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, PresenceError::PermissionDenied { .. })
    }
}
