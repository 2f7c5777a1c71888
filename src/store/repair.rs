use super::{ObjectStore, Result, StoreError};
use crate::domain::DamageState;
use crate::matrix::Matrix;
use crate::metadata::ObjectMetadata;
use log::{debug, info};

/// Keys rewritten by [`ObjectStore::recover_corrupted_data`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub data_repaired: Vec<String>,
    pub parity_repaired: Vec<String>,
}

impl RepairReport {
    pub fn total(&self) -> usize {
        self.data_repaired.len() + self.parity_repaired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl ObjectStore {
    /// Rewrite the rows of every object a read flagged as damaged.
    ///
    /// `Data` objects get data row 0 rebuilt from the other rows and written
    /// back to its node; `Parity` objects get both parity rows recomputed
    /// from the data. Each repaired key is reset to `DamageState::None`. Keys
    /// are visited in sorted order and the first failure stops the scan.
    pub fn recover_corrupted_data(&mut self) -> Result<RepairReport> {
        let flagged: Vec<(String, ObjectMetadata)> = self
            .meta
            .keys
            .iter()
            .filter(|(_, object)| object.error.needs_repair())
            .map(|(key, object)| (key.clone(), object.clone()))
            .collect();

        let mut report = RepairReport::default();
        for (key, object) in flagged {
            match object.error {
                DamageState::Data => {
                    self.repair_data_row(&key, &object)?;
                    report.data_repaired.push(key.clone());
                }
                DamageState::Parity => {
                    self.repair_parity_rows(&key, &object)?;
                    report.parity_repaired.push(key.clone());
                }
                DamageState::None => continue,
            }
            if let Some(entry) = self.meta.keys.get_mut(&key) {
                entry.error = DamageState::None;
            }
        }

        if !report.is_empty() {
            info!(
                "Repaired {} objects ({} data, {} parity)",
                report.total(),
                report.data_repaired.len(),
                report.parity_repaired.len()
            );
        }
        Ok(report)
    }

    fn repair_data_row(&mut self, key: &str, object: &ObjectMetadata) -> Result<()> {
        let target = object.data_nodes[0];
        if !self.is_alive(target) {
            return Err(StoreError::NodeUnavailable(target));
        }

        let row_len = self.layout.row_len(object.size);
        let mut erased = vec![0];
        erased.extend(self.unavailable_rows(object).into_iter().filter(|&row| row != 0));

        let surviving = object
            .all_nodes()
            .enumerate()
            .filter(|(row, _)| !erased.contains(row))
            .map(|(_, id)| self.fetch_row(key, id, row_len))
            .collect::<Result<Vec<_>>>()?;
        let rebuilt = self.decode(&erased, &surviving)?;

        debug!("{:?}: rewriting data row 0 on node {}", key, target);
        self.store_row(key, target, rebuilt.data.row(0))
    }

    fn repair_parity_rows(&mut self, key: &str, object: &ObjectMetadata) -> Result<()> {
        let unreachable = object
            .all_nodes()
            .find(|&id| !self.is_alive(id));
        if let Some(id) = unreachable {
            return Err(StoreError::NodeUnavailable(id));
        }

        let row_len = self.layout.row_len(object.size);
        let data_rows = object
            .data_nodes
            .iter()
            .map(|&id| self.fetch_row(key, id, row_len))
            .collect::<Result<Vec<_>>>()?;
        let parity = self
            .generator
            .encode(&Matrix::from_rows(&data_rows)?, &self.field)?;

        for (row, &id) in parity.iter_rows().zip(&object.parity_nodes) {
            debug!("{:?}: rewriting parity on node {}", key, id);
            self.store_row(key, id, row)?;
        }
        Ok(())
    }
}
