//! Erasure-coded object store over GF(2^8)
//!
//! Objects are striped across `N` nodes: `N - 2` data rows and two parity rows
//! from a Vandermonde generator. Any two missing rows can be rebuilt, and
//! reads compare parity against data to flag silent corruption for
//! [`ObjectStore::recover_corrupted_data`].

pub mod config;
pub mod domain;
pub mod galois;
pub mod generator;
pub mod matrix;
pub mod metadata;
pub mod node;
pub mod placement;
pub mod store;
pub mod stripe;

pub use config::{BackendKind, StoreConfig};
pub use domain::{DamageState, NodeId};
pub use galois::GaloisField;
pub use generator::GeneratorMatrix;
pub use matrix::Matrix;
pub use metadata::{ObjectMetadata, StoreMetadata};
pub use node::{NodeError, NodeStore};
pub use placement::{FixedPlacement, Placement, RandomPlacement};
pub use store::{ObjectStore, ReadOutcome, RepairReport, StoreError};
pub use stripe::StripeLayout;
