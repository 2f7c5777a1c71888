//! Per-node storage backends
//!
//! Every node of an object store implements [`NodeStore`]: keyed byte
//! storage plus the two fault-injection primitives the store relies on. The
//! availability flag is process-local on every backend and is never written
//! anywhere.

pub mod error;
pub mod local;
pub mod memory;
pub mod remote;
pub mod server;
pub mod wire;

pub use error::{NodeError, Result};
pub use local::LocalNode;
pub use memory::MemoryNode;
pub use remote::RemoteNode;
pub use server::NodeServer;

use crate::config::BackendKind;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::Path;

/// Storage capability of one node
///
/// Backends implement every operation; there are no default bodies.
pub trait NodeStore: Send {
    /// Directory backing this node (recorded in the store metadata)
    fn location(&self) -> &Path;

    /// Store `bytes` under `key`, replacing any previous value
    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Bytes stored under `key`
    fn read(&self, key: &str) -> Result<Vec<u8>>;

    fn alive(&self) -> bool;

    /// Mark the node unreachable; stored bytes are untouched
    fn crash(&mut self);

    fn recover(&mut self);

    /// Scramble the bytes stored under `key` in place; availability is unchanged
    fn corrupt(&mut self, key: &str) -> Result<()>;

    /// Release backend resources
    fn close(&mut self) -> Result<()>;
}

/// Open one node of the given backend kind rooted at `dir`
pub fn open_node(
    backend: BackendKind,
    dir: &Path,
    max_frame_len: usize,
) -> Result<Box<dyn NodeStore>> {
    let node: Box<dyn NodeStore> = match backend {
        BackendKind::Local => Box::new(LocalNode::open(dir)?),
        BackendKind::Memory => Box::new(MemoryNode::new(dir)),
        BackendKind::Remote => Box::new(RemoteNode::spawn(dir, max_frame_len)?),
    };
    Ok(node)
}

/// Reject keys that cannot name a file inside a node directory
pub fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);
    if bad {
        return Err(NodeError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Shuffle `bytes` in place.
///
/// A shuffle cannot change a row whose bytes are all equal, so an unchanged
/// result gets every bit flipped instead. Empty rows stay empty.
pub(crate) fn scramble<R: Rng + ?Sized>(bytes: &mut [u8], rng: &mut R) {
    let before = bytes.to_vec();
    bytes.shuffle(rng);
    if bytes == before.as_slice() {
        for byte in bytes.iter_mut() {
            *byte ^= 0xFF;
        }
    }
}
