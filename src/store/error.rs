//! Error types for object store operations

use crate::domain::NodeId;
use crate::galois::FieldError;
use crate::matrix::MatrixError;
use crate::node::NodeError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing, reading or repairing objects
#[derive(Debug, Error)]
pub enum StoreError {
    /// Read or fault injection on a key that was never written
    #[error("key {0:?} not found")]
    KeyNotFound(String),

    /// More rows missing or mismatched than parity can cover
    #[error("cannot reconstruct: {erased} rows erased but only {tolerated} can be recovered")]
    InsufficientRedundancy { erased: usize, tolerated: usize },

    /// A node backend failed; not retried
    #[error("node {node} failed: {source}")]
    Backend {
        node: NodeId,
        #[source]
        source: NodeError,
    },

    /// Repair needs to write to a node that is currently unreachable
    #[error("node {0} is unavailable")]
    NodeUnavailable(NodeId),

    /// A node returned a row of the wrong length
    #[error("node {node} returned {actual} bytes, expected {expected}")]
    RowLengthMismatch {
        node: NodeId,
        expected: usize,
        actual: usize,
    },

    /// Decoding failure in the linear algebra (internal error)
    #[error("matrix error: {0}")]
    Matrix(#[from] MatrixError),

    /// Field construction or arithmetic failure
    #[error("field error: {0}")]
    Field(#[from] FieldError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Key cannot be stored on a node
    #[error("invalid key {0:?}")]
    InvalidKey(String),

    /// More nodes requested for fault injection than the object has
    #[error("cannot fault {requested} nodes, object has only {available}")]
    InvalidFaultCount { requested: usize, available: usize },

    /// `obj_meta.json` could not be parsed or serialised
    #[error("metadata error in {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `obj_meta.json` parsed but is inconsistent
    #[error("corrupt metadata: {0}")]
    CorruptMetadata(String),

    /// Writing read output to the caller's sink failed
    #[error("failed to write output: {0}")]
    Output(#[source] std::io::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Wrap a node failure, lifting key validation errors to the store level
    pub(crate) fn backend(node: NodeId, source: NodeError) -> Self {
        match source {
            NodeError::InvalidKey { key } => StoreError::InvalidKey(key),
            source => StoreError::Backend { node, source },
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
