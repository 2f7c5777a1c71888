//! Filesystem-backed node: one `<key>.obj` file per key

use super::{scramble, validate_key, NodeError, NodeStore, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const OBJECT_EXTENSION: &str = "obj";

#[derive(Debug)]
pub struct LocalNode {
    dir: PathBuf,
    alive: bool,
}

impl LocalNode {
    /// Open (creating if needed) the node directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| NodeError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, alive: true })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.{}", key, OBJECT_EXTENSION)))
    }
}

impl NodeStore for LocalNode {
    fn location(&self) -> &Path {
        &self.dir
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.object_path(key)?;
        fs::write(&path, bytes).map_err(|source| NodeError::Io { path, source })
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        fs::read(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => NodeError::NotFound {
                key: key.to_string(),
            },
            _ => NodeError::Io { path, source },
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
        let mut bytes = self.read(key)?;
        scramble(&mut bytes, &mut rand::rng());
        self.write(key, &bytes)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_read_overwrite() {
        let dir = TempDir::new().unwrap();
        let mut node = LocalNode::open(dir.path().join("node_0")).unwrap();

        node.write("obj", b"first").unwrap();
        node.write("obj", b"second").unwrap();

        assert_eq!(node.read("obj").unwrap(), b"second");
        assert!(dir.path().join("node_0").join("obj.obj").exists());
    }

    #[test]
    fn test_read_missing_key() {
        let dir = TempDir::new().unwrap();
        let node = LocalNode::open(dir.path()).unwrap();

        assert!(matches!(node.read("nope"), Err(NodeError::NotFound { .. })));
    }

    #[test]
    fn test_crash_keeps_bytes() {
        let dir = TempDir::new().unwrap();
        let mut node = LocalNode::open(dir.path()).unwrap();
        node.write("obj", b"payload").unwrap();

        node.crash();
        assert!(!node.alive());
        assert_eq!(node.read("obj").unwrap(), b"payload");

        node.recover();
        assert!(node.alive());
    }

    #[test]
    fn test_corrupt_keeps_node_alive() {
        let dir = TempDir::new().unwrap();
        let mut node = LocalNode::open(dir.path()).unwrap();
        let original: Vec<u8> = (0..=255).collect();
        node.write("obj", &original).unwrap();

        node.corrupt("obj").unwrap();

        assert!(node.alive());
        let stored = node.read("obj").unwrap();
        assert_eq!(stored.len(), original.len());
        assert_ne!(stored, original);
    }

    #[test]
    fn test_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        let mut node = LocalNode::open(dir.path()).unwrap();

        assert!(matches!(
            node.write("../escape", b"x"),
            Err(NodeError::InvalidKey { .. })
        ));
    }
}
