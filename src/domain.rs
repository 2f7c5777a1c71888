//! Core domain types for the object store
//!
//! `NodeId` keeps node numbers apart from row indices and byte counts, which
//! are all plain `usize` otherwise. `DamageState` is the per-object
//! classification left behind by read-time detection.

use serde::{Deserialize, Serialize};

/// Type-safe wrapper for storage node numbers (`0..node_count`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(index: usize) -> Self {
        NodeId(index)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        NodeId::new(index)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of an object was found inconsistent on the last read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageState {
    /// Data and parity agree (or were not checked)
    #[default]
    None,
    /// Exactly one parity row disagrees with the data
    Parity,
    /// Both parity rows disagree; a data row is assumed bad
    Data,
}

impl DamageState {
    /// Returns true if the object is waiting for repair
    pub fn needs_repair(&self) -> bool {
        !matches!(self, DamageState::None)
    }
}

impl std::fmt::Display for DamageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DamageState::None => "none",
            DamageState::Parity => "parity",
            DamageState::Data => "data",
        };
        f.write_str(name)
    }
}
