use super::{ObjectStore, Result, StoreError};
use crate::domain::{DamageState, NodeId};
use crate::metadata::ObjectMetadata;
use crate::node;
use log::debug;
use std::fs;
use std::path::Path;

impl ObjectStore {
    /// Encode `content` and store one row per node under `key`.
    ///
    /// Any previous object under `key` is replaced. Node writes are not
    /// atomic as a group: a failing node leaves the rows written before it in
    /// place and the previous metadata entry untouched.
    pub fn write(&mut self, key: &str, content: &[u8]) -> Result<()> {
        node::validate_key(key).map_err(|_| StoreError::InvalidKey(key.to_string()))?;

        let node_count = self.node_count();
        let parity_nodes = self.placement.parity_nodes(node_count);
        let data_nodes: Vec<NodeId> = (0..node_count)
            .map(NodeId::new)
            .filter(|id| !parity_nodes.contains(id))
            .collect();

        let data = self.layout.split(content);
        let parity = self.generator.encode(&data, &self.field)?;
        debug!(
            "Writing {:?}: {} bytes, {} stripes, data on {:?}, parity on {:?}",
            key,
            content.len(),
            self.layout.stripe_count(content.len()),
            data_nodes,
            parity_nodes
        );

        for (row, &id) in data.iter_rows().zip(&data_nodes) {
            self.store_row(key, id, row)?;
        }
        for (row, &id) in parity.iter_rows().zip(&parity_nodes) {
            self.store_row(key, id, row)?;
        }

        self.meta.keys.insert(
            key.to_string(),
            ObjectMetadata {
                data_nodes,
                parity_nodes,
                size: content.len(),
                error: DamageState::None,
            },
        );
        Ok(())
    }

    /// Store the contents of the file at `path` under `key`
    pub fn write_from_path(&mut self, key: &str, path: &Path) -> Result<()> {
        let content = fs::read(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.write(key, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::placement::FixedPlacement;
    use crate::stripe::DEFAULT_CHUNK_SIZE;
    use tempfile::TempDir;

    #[test]
    fn test_write_places_rows() {
        let dir = TempDir::new().unwrap();
        let mut store = ObjectStore::open(StoreConfig::new(dir.path(), 5))
            .unwrap()
            .with_placement(FixedPlacement::new(3, 1));

        let content: Vec<u8> = (0..100).collect();
        store.write("obj", &content).unwrap();

        let object = store.object("obj").unwrap();
        assert_eq!(
            object.data_nodes,
            vec![NodeId::new(0), NodeId::new(2), NodeId::new(4)]
        );
        assert_eq!(object.parity_nodes, [NodeId::new(3), NodeId::new(1)]);
        assert_eq!(object.size, 100);
        assert_eq!(object.error, DamageState::None);

        // 100 bytes over 3 rows of 16-byte chunks: 3 stripes
        let row_len = 3 * DEFAULT_CHUNK_SIZE;
        let first = store.node(NodeId::new(0)).unwrap().read("obj").unwrap();
        assert_eq!(first, content[..row_len].to_vec());

        // parity row 0 is the XOR of the data rows
        let rows: Vec<Vec<u8>> = object
            .data_nodes
            .iter()
            .map(|&id| store.node(id).unwrap().read("obj").unwrap())
            .collect();
        let xor: Vec<u8> = (0..row_len)
            .map(|i| rows[0][i] ^ rows[1][i] ^ rows[2][i])
            .collect();
        assert_eq!(store.node(NodeId::new(3)).unwrap().read("obj").unwrap(), xor);
    }

    #[test]
    fn test_write_rejects_bad_key() {
        let dir = TempDir::new().unwrap();
        let mut store = ObjectStore::open(StoreConfig::new(dir.path(), 5)).unwrap();

        assert!(matches!(
            store.write("a/b", b"x"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(store.object("a/b").is_none());
    }

    #[test]
    fn test_write_from_missing_path() {
        let dir = TempDir::new().unwrap();
        let mut store = ObjectStore::open(StoreConfig::new(dir.path(), 5)).unwrap();

        assert!(matches!(
            store.write_from_path("k", &dir.path().join("absent")),
            Err(StoreError::Io { .. })
        ));
    }
}
