use std::path::PathBuf;

/// Core error type for the bridge.
///
/// Adapter crates map their specific failures into this type so callers can tell
/// a missing message from a broken collaborator without string matching.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("invalid segment: {0}")]
    InvalidSegment(String),

    #[error("message not found: {0}")]
    NotFound(String),

    #[error("empty resource (0 bytes): {}", path.display())]
    EmptyResource { path: PathBuf },

    #[error("forward nesting exceeds {limit} levels (at depth {depth})")]
    DepthExceeded { depth: usize, limit: usize },

    #[error("bundle upload failed: {0}")]
    Upload(String),

    #[error("backing query failed: {0}")]
    BackingQuery(String),

    #[error("media transport failed: {0}")]
    MediaTransport(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
