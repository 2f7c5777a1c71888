//! Erasure-coded object store
//!
//! Each object is split into `node_count - 2` data rows plus two Vandermonde
//! parity rows, one row per node. The store owns the node handles and the
//! per-key metadata; reads detect and classify damage, and
//! [`ObjectStore::recover_corrupted_data`] rewrites the rows that reads
//! flagged.
//!
//! Metadata reaches disk only on fresh initialisation and on
//! [`ObjectStore::close`].

pub mod error;
mod read;
mod repair;
mod write;

pub use error::{Result, StoreError};
pub use read::ReadOutcome;
pub use repair::RepairReport;

use crate::config::{BackendKind, StoreConfig};
use crate::domain::NodeId;
use crate::galois::GaloisField;
use crate::generator::{GeneratorMatrix, Reconstruction, CHECK_COUNT};
use crate::matrix::Matrix;
use crate::metadata::{ObjectMetadata, StoreMetadata};
use crate::node::{self, NodeStore};
use crate::placement::{Placement, RandomPlacement};
use crate::stripe::StripeLayout;
use log::{debug, info, warn};
use std::fs;

pub struct ObjectStore {
    config: StoreConfig,
    field: GaloisField,
    generator: GeneratorMatrix,
    layout: StripeLayout,
    meta: StoreMetadata,
    nodes: Vec<Box<dyn NodeStore>>,
    placement: Box<dyn Placement>,
}

impl ObjectStore {
    /// Open the store under `config.root`, loading `obj_meta.json` if present.
    ///
    /// A persisted node count, chunk size and modulus win over the configured
    /// ones. Memory-backed stores never touch the filesystem.
    pub fn open(mut config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let persistent = config.backend != BackendKind::Memory;
        let metadata_path = config.metadata_path();

        let existing = if persistent && metadata_path.exists() {
            Some(StoreMetadata::load(&metadata_path)?)
        } else {
            None
        };

        let field = match &existing {
            Some(meta) => GaloisField::new(meta.modulus)?,
            None => GaloisField::new(config.modulus)?,
        };

        let meta = match existing {
            Some(meta) => {
                if meta.node_count != config.node_count {
                    warn!(
                        "Store at {} has {} nodes, ignoring configured {}",
                        config.root.display(),
                        meta.node_count,
                        config.node_count
                    );
                    config.node_count = meta.node_count;
                }
                if meta.chunk_size != config.chunk_size {
                    warn!(
                        "Store at {} uses chunk size {}, ignoring configured {}",
                        config.root.display(),
                        meta.chunk_size,
                        config.chunk_size
                    );
                    config.chunk_size = meta.chunk_size;
                }
                if meta.modulus != config.modulus {
                    warn!(
                        "Store at {} uses modulus {:#x}, ignoring configured {:#x}",
                        config.root.display(),
                        meta.modulus,
                        config.modulus
                    );
                    config.modulus = meta.modulus;
                }
                config.validate()?;
                info!(
                    "Opened store at {} ({} nodes, {} keys)",
                    config.root.display(),
                    meta.node_count,
                    meta.keys.len()
                );
                meta
            }
            None => {
                let nodes = (0..config.node_count).map(|i| config.node_dir(i)).collect();
                let meta =
                    StoreMetadata::new(config.node_count, config.chunk_size, field.modulus(), nodes);
                if persistent {
                    fs::create_dir_all(&config.root).map_err(|source| StoreError::Io {
                        path: config.root.clone(),
                        source,
                    })?;
                    meta.save(&metadata_path)?;
                }
                info!(
                    "Initialised store at {} with {} nodes",
                    config.root.display(),
                    config.node_count
                );
                meta
            }
        };

        let nodes = meta
            .nodes
            .iter()
            .enumerate()
            .map(|(i, dir)| {
                node::open_node(config.backend, dir, config.max_frame_len)
                    .map_err(|e| StoreError::backend(NodeId::new(i), e))
            })
            .collect::<Result<Vec<_>>>()?;

        let generator = GeneratorMatrix::build(config.data_count(), CHECK_COUNT, &field);
        let layout = StripeLayout::new(config.data_count(), config.chunk_size);
        let placement: Box<dyn Placement> = match config.seed {
            Some(seed) => Box::new(RandomPlacement::seeded(seed)),
            None => Box::new(RandomPlacement::from_entropy()),
        };

        Ok(Self {
            config,
            field,
            generator,
            layout,
            meta,
            nodes,
            placement,
        })
    }

    /// Replace the source of parity placement and fault victims
    pub fn with_placement(mut self, placement: impl Placement + 'static) -> Self {
        self.placement = Box::new(placement);
        self
    }

    /// Persist metadata and release every node
    pub fn close(mut self) -> Result<()> {
        if self.config.backend != BackendKind::Memory {
            self.meta.save(&self.config.metadata_path())?;
        }

        let mut first_error = None;
        for (i, node) in self.nodes.iter_mut().enumerate() {
            if let Err(e) = node.close() {
                warn!("Closing node {} failed: {}", i, e);
                first_error.get_or_insert(StoreError::backend(NodeId::new(i), e));
            }
        }

        info!(
            "Closed store at {} ({} keys)",
            self.config.root.display(),
            self.meta.keys.len()
        );
        first_error.map_or(Ok(()), Err)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn node_count(&self) -> usize {
        self.meta.node_count
    }

    pub fn data_count(&self) -> usize {
        self.generator.data_count()
    }

    pub fn metadata(&self) -> &StoreMetadata {
        &self.meta
    }

    pub fn object(&self, key: &str) -> Option<&ObjectMetadata> {
        self.meta.keys.get(key)
    }

    /// Stored keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.meta.keys.keys().map(String::as_str)
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn NodeStore> {
        self.nodes.get(id.as_usize()).map(|node| node.as_ref())
    }

    /// Mark `count` of the key's data nodes unreachable
    pub fn crash_data_nodes(&mut self, key: &str, count: usize) -> Result<Vec<NodeId>> {
        let candidates = self.entry(key)?.data_nodes.clone();
        self.crash_among(key, &candidates, count)
    }

    /// Mark `count` of the key's parity nodes unreachable
    pub fn crash_parity_nodes(&mut self, key: &str, count: usize) -> Result<Vec<NodeId>> {
        let candidates = self.entry(key)?.parity_nodes.to_vec();
        self.crash_among(key, &candidates, count)
    }

    /// Scramble the bytes of one of the key's data rows
    pub fn corrupt_data_node(&mut self, key: &str) -> Result<NodeId> {
        let candidates = self.entry(key)?.data_nodes.clone();
        self.corrupt_among(key, &candidates)
    }

    /// Scramble the bytes of one of the key's parity rows
    pub fn corrupt_parity_node(&mut self, key: &str) -> Result<NodeId> {
        let candidates = self.entry(key)?.parity_nodes.to_vec();
        self.corrupt_among(key, &candidates)
    }

    /// Make every node of `key` reachable again; corrupted bytes stay corrupted
    pub fn recover_all(&mut self, key: &str) -> Result<()> {
        let nodes: Vec<NodeId> = self.entry(key)?.all_nodes().collect();
        for id in nodes {
            self.nodes[id.as_usize()].recover();
        }
        debug!("Recovered all nodes of {:?}", key);
        Ok(())
    }

    fn crash_among(&mut self, key: &str, candidates: &[NodeId], count: usize) -> Result<Vec<NodeId>> {
        if count > candidates.len() {
            return Err(StoreError::InvalidFaultCount {
                requested: count,
                available: candidates.len(),
            });
        }

        let victims = self.placement.victims(candidates, count);
        for id in &victims {
            self.nodes[id.as_usize()].crash();
        }
        info!("Crashed nodes {:?} holding {:?}", victims, key);
        Ok(victims)
    }

    fn corrupt_among(&mut self, key: &str, candidates: &[NodeId]) -> Result<NodeId> {
        let victim = self
            .placement
            .victims(candidates, 1)
            .first()
            .copied()
            .ok_or(StoreError::InvalidFaultCount {
                requested: 1,
                available: candidates.len(),
            })?;

        self.nodes[victim.as_usize()]
            .corrupt(key)
            .map_err(|e| StoreError::backend(victim, e))?;
        info!("Corrupted {:?} on node {}", key, victim);
        Ok(victim)
    }

    fn entry(&self, key: &str) -> Result<&ObjectMetadata> {
        self.meta
            .keys
            .get(key)
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    fn is_alive(&self, id: NodeId) -> bool {
        self.nodes[id.as_usize()].alive()
    }

    /// Read one row and check it has the layout's length
    fn fetch_row(&self, key: &str, id: NodeId, row_len: usize) -> Result<Vec<u8>> {
        let bytes = self.nodes[id.as_usize()]
            .read(key)
            .map_err(|e| StoreError::backend(id, e))?;
        if bytes.len() != row_len {
            return Err(StoreError::RowLengthMismatch {
                node: id,
                expected: row_len,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }

    fn store_row(&mut self, key: &str, id: NodeId, bytes: &[u8]) -> Result<()> {
        self.nodes[id.as_usize()]
            .write(key, bytes)
            .map_err(|e| StoreError::backend(id, e))
    }

    /// Row indices (data rows first, then parity) whose nodes are unreachable
    fn unavailable_rows(&self, object: &ObjectMetadata) -> Vec<usize> {
        object
            .all_nodes()
            .enumerate()
            .filter(|&(_, id)| !self.is_alive(id))
            .map(|(row, _)| row)
            .collect()
    }

    /// Solve for every data row given the surviving rows in ascending row order
    fn decode(&self, erased: &[usize], surviving: &[Vec<u8>]) -> Result<Reconstruction> {
        if erased.len() > CHECK_COUNT {
            return Err(StoreError::InsufficientRedundancy {
                erased: erased.len(),
                tolerated: CHECK_COUNT,
            });
        }
        debug!("Reconstructing with erased rows {:?}", erased);
        let surviving = Matrix::from_rows(surviving)?;
        Ok(self.generator.reconstruct(&self.field, erased, &surviving)?)
    }
}
