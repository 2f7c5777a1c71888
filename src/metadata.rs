//! Persisted store metadata (`obj_meta.json`)
//!
//! The document is rewritten wholesale on close. Node availability is never
//! part of it; only placement, sizes and the damage flag survive a restart.

use crate::domain::{DamageState, NodeId};
use crate::galois::DEFAULT_MODULUS;
use crate::generator::CHECK_COUNT;
use crate::store::{Result, StoreError};
use crate::stripe::DEFAULT_CHUNK_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the metadata document inside the store root
pub const METADATA_FILE: &str = "obj_meta.json";

/// Placement and state of one stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Node for each data row, in row order
    pub data_nodes: Vec<NodeId>,
    /// Node for each parity row, in row order
    pub parity_nodes: [NodeId; CHECK_COUNT],
    /// Original content length in bytes
    pub size: usize,
    /// Classification left by the last read
    pub error: DamageState,
}

impl ObjectMetadata {
    /// All nodes of the object, data rows first
    pub fn all_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.data_nodes
            .iter()
            .chain(self.parity_nodes.iter())
            .copied()
    }
}

/// Whole-store metadata document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub node_count: usize,
    /// Stripe chunk size every stored row was laid out with
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Field modulus every parity row was computed under
    #[serde(default = "default_modulus")]
    pub modulus: u32,
    /// Backend location (directory) of every node, indexed by node id
    pub nodes: Vec<PathBuf>,
    pub keys: BTreeMap<String, ObjectMetadata>,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_modulus() -> u32 {
    DEFAULT_MODULUS
}

impl StoreMetadata {
    /// Fresh metadata for a new store
    pub fn new(node_count: usize, chunk_size: usize, modulus: u32, nodes: Vec<PathBuf>) -> Self {
        Self {
            node_count,
            chunk_size,
            modulus,
            nodes,
            keys: BTreeMap::new(),
        }
    }

    /// Load and sanity-check a persisted document
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let meta: StoreMetadata =
            serde_json::from_str(&text).map_err(|source| StoreError::Metadata {
                path: path.to_path_buf(),
                source,
            })?;
        meta.check()?;
        Ok(meta)
    }

    /// Write the document next to its final location, then rename over it
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(|source| StoreError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, text).map_err(|source| StoreError::Io {
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn check(&self) -> Result<()> {
        if self.nodes.len() != self.node_count {
            return Err(StoreError::CorruptMetadata(format!(
                "{} node locations for node_count {}",
                self.nodes.len(),
                self.node_count
            )));
        }
        if self.chunk_size == 0 {
            return Err(StoreError::CorruptMetadata("chunk size 0".to_string()));
        }
        let data_count = self.node_count.saturating_sub(CHECK_COUNT);

        for (key, object) in &self.keys {
            if object.data_nodes.len() != data_count {
                return Err(StoreError::CorruptMetadata(format!(
                    "key {:?} has {} data nodes, expected {}",
                    key,
                    object.data_nodes.len(),
                    data_count
                )));
            }
            let mut seen = vec![false; self.node_count];
            for node in object.all_nodes() {
                match seen.get_mut(node.as_usize()) {
                    Some(slot) if !*slot => *slot = true,
                    _ => {
                        return Err(StoreError::CorruptMetadata(format!(
                            "key {:?} references node {} twice or out of range",
                            key, node
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}
