//! Error types for node backends

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    /// Filesystem failure inside a node directory
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Could not reach or talk to a remote node
    #[error("network error talking to {addr}: {source}")]
    Network {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Frame-level I/O failure on an established connection
    #[error("wire error: {0}")]
    Wire(#[source] std::io::Error),

    /// Nothing stored under the key on this node
    #[error("key {key:?} not stored on this node")]
    NotFound { key: String },

    /// Key cannot be used as an object name
    #[error("invalid key {key:?}")]
    InvalidKey { key: String },

    /// Malformed request or response body
    #[error("malformed frame: {0}")]
    Codec(#[from] binrw::Error),

    /// Frame length prefix exceeds the configured cap
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// Error reported by the remote side
    #[error("remote node error: {0}")]
    Remote(String),
}

pub type Result<T> = std::result::Result<T, NodeError>;
