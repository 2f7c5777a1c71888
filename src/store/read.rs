use super::{ObjectStore, Result, StoreError};
use crate::domain::DamageState;
use crate::generator::CHECK_COUNT;
use crate::matrix::Matrix;
use log::{debug, warn};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Content of a successful read plus what the read found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    pub content: Vec<u8>,
    /// Damage detected by comparing parity against the data rows
    pub damage: DamageState,
    /// Rows treated as erased (unreachable nodes, or row 0 for data damage)
    pub erased_rows: Vec<usize>,
    /// Whether the data rows were solved for rather than read directly
    pub reconstructed: bool,
}

impl ObjectStore {
    /// Read `key`, detecting corruption and reconstructing around erasures.
    ///
    /// With every data node reachable and both parity nodes reachable, the
    /// parity is recomputed and compared. One mismatching parity row marks
    /// the object `Parity` and returns the data as read. Two mismatching rows
    /// mark it `Data`; the faulty data row cannot be located, so row 0 is
    /// taken as erased and rebuilt from the others.
    ///
    /// With data nodes unreachable, up to two unreachable rows in total are
    /// rebuilt; beyond that the read fails with `InsufficientRedundancy`.
    pub fn read_with_report(&mut self, key: &str) -> Result<ReadOutcome> {
        let object = self.entry(key)?.clone();
        let data_count = self.data_count();
        let row_len = self.layout.row_len(object.size);
        let unavailable = self.unavailable_rows(&object);
        let data_lost = unavailable.iter().filter(|&&row| row < data_count).count();

        if data_lost == 0 {
            let data_rows = object
                .data_nodes
                .iter()
                .map(|&id| self.fetch_row(key, id, row_len))
                .collect::<Result<Vec<_>>>()?;

            let parity_rows = object
                .parity_nodes
                .iter()
                .filter(|&&id| self.is_alive(id))
                .map(|&id| self.fetch_row(key, id, row_len))
                .collect::<Result<Vec<_>>>()?;

            if parity_rows.len() < CHECK_COUNT {
                debug!("{:?}: parity incomplete, skipping detection", key);
                return Ok(self.direct_outcome(&data_rows, object.size, DamageState::None, unavailable));
            }

            let data = Matrix::from_rows(&data_rows)?;
            let expected = self.generator.encode(&data, &self.field)?;
            let mismatches = expected
                .iter_rows()
                .zip(&parity_rows)
                .filter(|(expected, actual)| *expected != actual.as_slice())
                .count();

            return match mismatches {
                0 => Ok(self.direct_outcome(&data_rows, object.size, DamageState::None, unavailable)),
                1 => {
                    warn!("{:?}: one parity row disagrees with the data", key);
                    self.flag(key, DamageState::Parity);
                    Ok(self.direct_outcome(&data_rows, object.size, DamageState::Parity, unavailable))
                }
                _ => {
                    warn!("{:?}: both parity rows disagree, rebuilding data row 0", key);
                    self.flag(key, DamageState::Data);

                    let surviving: Vec<Vec<u8>> = data_rows
                        .into_iter()
                        .skip(1)
                        .chain(parity_rows)
                        .collect();
                    let erased = vec![0];
                    let rebuilt = self.decode(&erased, &surviving)?;
                    Ok(ReadOutcome {
                        content: self.layout.merge(&rebuilt.data, object.size),
                        damage: DamageState::Data,
                        erased_rows: erased,
                        reconstructed: true,
                    })
                }
            };
        }

        if unavailable.len() > CHECK_COUNT {
            return Err(StoreError::InsufficientRedundancy {
                erased: unavailable.len(),
                tolerated: CHECK_COUNT,
            });
        }

        let surviving = object
            .all_nodes()
            .enumerate()
            .filter(|(row, _)| !unavailable.contains(row))
            .map(|(_, id)| self.fetch_row(key, id, row_len))
            .collect::<Result<Vec<_>>>()?;
        let rebuilt = self.decode(&unavailable, &surviving)?;

        Ok(ReadOutcome {
            content: self.layout.merge(&rebuilt.data, object.size),
            damage: DamageState::None,
            erased_rows: unavailable,
            reconstructed: true,
        })
    }

    /// Read `key` and return its content
    pub fn read(&mut self, key: &str) -> Result<Vec<u8>> {
        Ok(self.read_with_report(key)?.content)
    }

    /// Read `key` into `writer`; nothing is written if the read fails
    pub fn read_into<W: Write>(&mut self, key: &str, writer: &mut W) -> Result<usize> {
        let content = self.read(key)?;
        writer.write_all(&content).map_err(StoreError::Output)?;
        Ok(content.len())
    }

    /// Read `key` into the file at `path`; the file is only created on success
    pub fn read_to_path(&mut self, key: &str, path: &Path) -> Result<usize> {
        let content = self.read(key)?;
        fs::write(path, &content).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(content.len())
    }

    fn direct_outcome(
        &self,
        data_rows: &[Vec<u8>],
        size: usize,
        damage: DamageState,
        erased_rows: Vec<usize>,
    ) -> ReadOutcome {
        let mut content = data_rows.concat();
        content.truncate(size);
        ReadOutcome {
            content,
            damage,
            erased_rows,
            reconstructed: false,
        }
    }

    fn flag(&mut self, key: &str, damage: DamageState) {
        if let Some(object) = self.meta.keys.get_mut(key) {
            object.error = damage;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendKind, StoreConfig};
    use crate::domain::NodeId;
    use crate::placement::FixedPlacement;

    fn memory_store(nodes: usize) -> ObjectStore {
        let config = StoreConfig::new("/unused", nodes).with_backend(BackendKind::Memory);
        ObjectStore::open(config)
            .unwrap()
            .with_placement(FixedPlacement::new(0, 1))
    }

    #[test]
    fn test_clean_read_reports_nothing() {
        let mut store = memory_store(5);
        store.write("k", b"hello world").unwrap();

        let outcome = store.read_with_report("k").unwrap();
        assert_eq!(outcome.content, b"hello world");
        assert_eq!(outcome.damage, DamageState::None);
        assert!(outcome.erased_rows.is_empty());
        assert!(!outcome.reconstructed);
    }

    #[test]
    fn test_missing_parity_skips_detection() {
        let mut store = memory_store(5);
        store.write("k", b"hello world").unwrap();
        store.crash_parity_nodes("k", 1).unwrap();
        store.corrupt_parity_node("k").unwrap();

        let outcome = store.read_with_report("k").unwrap();
        assert_eq!(outcome.content, b"hello world");
        assert_eq!(outcome.erased_rows, vec![3]);
        assert_eq!(store.object("k").unwrap().error, DamageState::None);
    }

    #[test]
    fn test_erasure_rows_are_sorted() {
        let mut store = memory_store(7);
        let content: Vec<u8> = (0..=255).cycle().take(1000).collect();
        store.write("k", &content).unwrap();

        let parity = store.crash_parity_nodes("k", 1).unwrap();
        assert_eq!(parity, vec![NodeId::new(0)]);
        store.crash_data_nodes("k", 1).unwrap();

        let outcome = store.read_with_report("k").unwrap();
        assert_eq!(outcome.erased_rows, vec![0, 5]);
        assert!(outcome.reconstructed);
        assert_eq!(outcome.content, content);
    }

    #[test]
    fn test_failed_read_leaves_writer_untouched() {
        let mut store = memory_store(5);
        store.write("k", b"payload").unwrap();
        store.crash_data_nodes("k", 3).unwrap();

        let mut sink = Vec::new();
        assert!(matches!(
            store.read_into("k", &mut sink),
            Err(StoreError::InsufficientRedundancy {
                erased: 3,
                tolerated: 2
            })
        ));
        assert!(sink.is_empty());
    }
}
