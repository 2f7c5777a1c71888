//! In-process node backed by a hash map

use super::{scramble, validate_key, NodeError, NodeStore, Result};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// Node whose objects live only as long as the handle
#[derive(Debug)]
pub struct MemoryNode {
    location: PathBuf,
    objects: FxHashMap<String, Vec<u8>>,
    alive: bool,
}

impl MemoryNode {
    /// `location` is only reported, nothing is created there
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            objects: FxHashMap::default(),
            alive: true,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl NodeStore for MemoryNode {
    fn location(&self) -> &Path {
        &self.location
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.objects.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| NodeError::NotFound {
                key: key.to_string(),
            })
    }

    fn alive(&self) -> bool {
        self.alive
    }

    fn crash(&mut self) {
        self.alive = false;
    }

    fn recover(&mut self) {
        self.alive = true;
    }

    fn corrupt(&mut self, key: &str) -> Result<()> {
        let bytes = self
            .objects
            .get_mut(key)
            .ok_or_else(|| NodeError::NotFound {
                key: key.to_string(),
            })?;
        scramble(bytes, &mut rand::rng());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.objects.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_node_roundtrip() {
        let mut node = MemoryNode::new("/nowhere");
        assert!(node.is_empty());

        node.write("a", &[1, 2, 3]).unwrap();
        assert_eq!(node.read("a").unwrap(), vec![1, 2, 3]);
        assert_eq!(node.len(), 1);
        assert!(matches!(node.read("b"), Err(NodeError::NotFound { .. })));
    }

    #[test]
    fn test_memory_node_faults() {
        let mut node = MemoryNode::new("/nowhere");
        node.write("a", &[7; 8]).unwrap();

        node.corrupt("a").unwrap();
        assert_eq!(node.read("a").unwrap(), vec![!7u8; 8]);

        node.crash();
        assert!(!node.alive());
        node.recover();
        assert!(node.alive());

        node.close().unwrap();
        assert!(node.is_empty());
    }
}
