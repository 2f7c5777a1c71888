//! Configuration for opening an object store

use crate::galois::DEFAULT_MODULUS;
use crate::generator::{CHECK_COUNT, MAX_DATA_COUNT};
use crate::metadata::METADATA_FILE;
use crate::store::{Result, StoreError};
use crate::stripe::DEFAULT_CHUNK_SIZE;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default cap on a single remote frame (256 MiB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// Storage backend used for every node of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// One directory per node on the local filesystem
    #[default]
    Local,
    /// Process-local maps; contents are lost on close
    Memory,
    /// A `NodeServer` per node on 127.0.0.1, reached over TCP
    Remote,
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "memory" => Ok(BackendKind::Memory),
            "remote" => Ok(BackendKind::Remote),
            other => Err(StoreError::InvalidConfig(format!(
                "unknown backend {:?} (expected local, memory or remote)",
                other
            ))),
        }
    }
}

/// Object store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding `obj_meta.json` and the node directories
    pub root: PathBuf,
    /// Total nodes per object (data + 2 parity)
    pub node_count: usize,
    /// Stripe chunk size in bytes
    pub chunk_size: usize,
    /// GF(2^8) reduction polynomial
    pub modulus: u32,
    pub backend: BackendKind,
    /// Fixed seed for parity placement and fault injection (None = OS entropy)
    pub seed: Option<u64>,
    /// Largest frame accepted from a remote node
    pub max_frame_len: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/tmp/raidstore"),
            node_count: 5,
            chunk_size: DEFAULT_CHUNK_SIZE,
            modulus: DEFAULT_MODULUS,
            backend: BackendKind::Local,
            seed: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>, node_count: usize) -> Self {
        Self {
            root: root.into(),
            node_count,
            ..Default::default()
        }
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn with_modulus(mut self, modulus: u32) -> Self {
        self.modulus = modulus;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_frame_len(mut self, bytes: usize) -> Self {
        self.max_frame_len = bytes;
        self
    }

    /// Build from the global CLI arguments (`--root`, `--nodes`, `--backend`, `--seed`)
    pub fn from_args(matches: &clap::ArgMatches) -> Result<Self> {
        let mut config = Self::default();

        if let Some(root) = matches.get_one::<String>("root") {
            config.root = PathBuf::from(root);
        }
        if let Some(nodes) = matches.get_one::<String>("nodes") {
            config.node_count = nodes
                .parse()
                .map_err(|_| StoreError::InvalidConfig(format!("invalid node count {:?}", nodes)))?;
        }
        if let Some(backend) = matches.get_one::<String>("backend") {
            config.backend = backend.parse()?;
        }
        if let Some(seed) = matches.get_one::<String>("seed") {
            config.seed = Some(
                seed.parse()
                    .map_err(|_| StoreError::InvalidConfig(format!("invalid seed {:?}", seed)))?,
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the codec cannot work with
    pub fn validate(&self) -> Result<()> {
        let min_nodes = CHECK_COUNT + 1;
        let max_nodes = MAX_DATA_COUNT + CHECK_COUNT;
        if !(min_nodes..=max_nodes).contains(&self.node_count) {
            return Err(StoreError::InvalidConfig(format!(
                "node count {} outside {}..={}",
                self.node_count, min_nodes, max_nodes
            )));
        }
        if self.chunk_size == 0 {
            return Err(StoreError::InvalidConfig(
                "chunk size must be > 0".to_string(),
            ));
        }
        if self.max_frame_len == 0 {
            return Err(StoreError::InvalidConfig(
                "max frame length must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of data rows per object
    pub fn data_count(&self) -> usize {
        self.node_count - CHECK_COUNT
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// Directory for node `index` under the store root
    pub fn node_dir(&self, index: usize) -> PathBuf {
        node_dir(&self.root, index)
    }
}

pub(crate) fn node_dir(root: &Path, index: usize) -> PathBuf {
    root.join(format!("node_{}", index))
}
