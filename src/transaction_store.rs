use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::filesystem::FilesystemAdapter;
use crate::transaction::Transaction;

/// Default number of transaction slots retained per connector before the oldest is evicted.
///
/// Mirrors the fixed-capacity ring buffer of `RequestQueueStorageStrategy.cpp`: once `CAPACITY`
/// transactions have been recorded for a connector, starting a new one evicts the oldest settled
/// record to make room.
pub const DEFAULT_CAPACITY: u32 = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Header {
    /// Oldest `tx_nr` still retained on disk.
    tx_nr_begin: u32,
    /// Next `tx_nr` to be allocated for a new transaction.
    tx_nr_end: u32,
}

/// Persists [`Transaction`] records per connector in a bounded ring buffer, recovering its
/// `(begin, end)` bounds from disk on boot without relying on a separate index file being
/// consistent with the slot contents -- each slot embeds its own `tx_nr`, so recovery is a scan
/// over present slots rather than the original positional pivot search (see DESIGN.md).
pub struct TransactionStore {
    root: PathBuf,
    capacity: u32,
    headers: BTreeMap<u32, Header>,
}

impl TransactionStore {
    pub fn new(root: impl Into<PathBuf>, capacity: u32) -> Self {
        Self {
            root: root.into(),
            capacity,
            headers: BTreeMap::new(),
        }
    }

    fn connector_dir(&self, connector_id: u32) -> PathBuf {
        self.root.join(format!("{connector_id}"))
    }

    fn slot_path(&self, connector_id: u32, tx_nr: u32) -> PathBuf {
        self.connector_dir(connector_id)
            .join(format!("{:010}", tx_nr % self.capacity))
    }

    /// Recover ring-buffer bounds for one connector by scanning its slot files. Called lazily
    /// the first time a connector is touched after boot.
    fn recover(&mut self, fs: &dyn FilesystemAdapter, connector_id: u32) -> Result<(), EngineError> {
        if self.headers.contains_key(&connector_id) {
            return Ok(());
        }
        let dir = self.connector_dir(connector_id);
        let names = fs
            .list(&dir)
            .map_err(|e| EngineError::Filesystem(e.to_string()))?;

        let mut min_tx_nr = None;
        let mut max_tx_nr = None;
        for name in names {
            let slot = dir.join(&name);
            let data = fs
                .read(&slot)
                .map_err(|e| EngineError::Filesystem(e.to_string()))?;
            let tx: Transaction = serde_json::from_slice(&data)
                .map_err(|e| EngineError::StoreCorrupted(e.to_string()))?;
            min_tx_nr = Some(min_tx_nr.map_or(tx.tx_nr, |m: u32| m.min(tx.tx_nr)));
            max_tx_nr = Some(max_tx_nr.map_or(tx.tx_nr, |m: u32| m.max(tx.tx_nr)));
        }

        let header = match (min_tx_nr, max_tx_nr) {
            (Some(min), Some(max)) => Header {
                tx_nr_begin: min,
                tx_nr_end: max + 1,
            },
            _ => Header {
                tx_nr_begin: 0,
                tx_nr_end: 0,
            },
        };
        self.headers.insert(connector_id, header);
        Ok(())
    }

    /// Allocate the next `tx_nr` for `connector_id` without yet writing a record; callers persist
    /// the WAL entry (the `Transaction` itself) immediately afterwards.
    pub fn allocate_tx_nr(
        &mut self,
        fs: &dyn FilesystemAdapter,
        connector_id: u32,
    ) -> Result<u32, EngineError> {
        self.recover(fs, connector_id)?;
        let header = self.headers.get_mut(&connector_id).unwrap();
        let tx_nr = header.tx_nr_end;
        header.tx_nr_end += 1;
        if header.tx_nr_end - header.tx_nr_begin > self.capacity {
            header.tx_nr_begin = header.tx_nr_end - self.capacity;
        }
        Ok(tx_nr)
    }

    pub fn save(
        &mut self,
        fs: &mut dyn FilesystemAdapter,
        tx: &Transaction,
    ) -> Result<(), EngineError> {
        self.recover(fs, tx.connector_id)?;
        let path = self.slot_path(tx.connector_id, tx.tx_nr);
        let data =
            serde_json::to_vec(tx).map_err(|e| EngineError::StoreCorrupted(e.to_string()))?;
        fs.write(&path, &data)
            .map_err(|e| EngineError::Filesystem(e.to_string()))
    }

    pub fn load(
        &mut self,
        fs: &dyn FilesystemAdapter,
        connector_id: u32,
        tx_nr: u32,
    ) -> Result<Option<Transaction>, EngineError> {
        self.recover(fs, connector_id)?;
        let path = self.slot_path(connector_id, tx_nr);
        if !fs.exists(&path) {
            return Ok(None);
        }
        let data = fs
            .read(&path)
            .map_err(|e| EngineError::Filesystem(e.to_string()))?;
        let tx: Transaction =
            serde_json::from_slice(&data).map_err(|e| EngineError::StoreCorrupted(e.to_string()))?;
        if tx.tx_nr != tx_nr {
            // The slot has wrapped and now holds a different, more recent transaction.
            return Ok(None);
        }
        Ok(Some(tx))
    }

    /// The currently active (not yet settled) transaction for a connector, if any, scanning back
    /// from the most recently allocated `tx_nr`.
    pub fn active_transaction(
        &mut self,
        fs: &dyn FilesystemAdapter,
        connector_id: u32,
    ) -> Result<Option<Transaction>, EngineError> {
        self.recover(fs, connector_id)?;
        let header = self.headers.get(&connector_id).cloned().unwrap();
        if header.tx_nr_end == 0 {
            return Ok(None);
        }
        let latest = header.tx_nr_end - 1;
        match self.load(fs, connector_id, latest)? {
            Some(tx) if !tx.is_settled() => Ok(Some(tx)),
            _ => Ok(None),
        }
    }

    pub fn path_root(&self) -> &Path {
        &self.root
    }

    /// Transactions on `connector_id` left in a state that still owes the CSMS a request: either
    /// `StartTransaction.conf` never arrived, or `StopTransaction.req` was written but never
    /// confirmed. Used on boot to re-enqueue the outstanding request after a crash or power loss,
    /// since the in-memory `RequestQueue` itself does not survive a reboot.
    pub fn pending(
        &mut self,
        fs: &dyn FilesystemAdapter,
        connector_id: u32,
    ) -> Result<Vec<Transaction>, EngineError> {
        self.recover(fs, connector_id)?;
        let header = self.headers.get(&connector_id).cloned().unwrap();
        if header.tx_nr_end == 0 {
            return Ok(vec![]);
        }
        let latest = header.tx_nr_end - 1;
        match self.load(fs, connector_id, latest)? {
            Some(tx) if !tx.started_confirmed || (tx.meter_stop.is_some() && !tx.stopped_confirmed) => Ok(vec![tx]),
            _ => Ok(vec![]),
        }
    }

    /// Remove every persisted transaction for a connector and forget its recovered bounds, used
    /// by the boot-loop escape path (see `boot::run_boot_stats`) when `attempts` exceeds the
    /// threshold.
    pub fn purge_connector(
        &mut self,
        fs: &mut dyn FilesystemAdapter,
        connector_id: u32,
    ) -> Result<(), EngineError> {
        let dir = self.connector_dir(connector_id);
        let names = fs.list(&dir).map_err(|e| EngineError::Filesystem(e.to_string()))?;
        for name in names {
            fs.remove(&dir.join(name))
                .map_err(|e| EngineError::Filesystem(e.to_string()))?;
        }
        self.headers.remove(&connector_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemFilesystem;

    #[test]
    fn allocate_and_save_roundtrip() {
        let mut fs = MemFilesystem::new();
        let mut store = TransactionStore::new("tx", DEFAULT_CAPACITY);
        let tx_nr = store.allocate_tx_nr(&fs, 1).unwrap();
        let tx = Transaction::new(1, tx_nr, "TAG".into(), 100);
        store.save(&mut fs, &tx).unwrap();
        let loaded = store.load(&fs, 1, tx_nr).unwrap().unwrap();
        assert_eq!(loaded, tx);
    }

    #[test]
    fn active_transaction_tracks_latest_unsettled() {
        let mut fs = MemFilesystem::new();
        let mut store = TransactionStore::new("tx", DEFAULT_CAPACITY);
        let nr1 = store.allocate_tx_nr(&fs, 1).unwrap();
        let mut tx1 = Transaction::new(1, nr1, "A".into(), 0);
        tx1.started_confirmed = true;
        tx1.stopped_confirmed = true;
        store.save(&mut fs, &tx1).unwrap();

        let nr2 = store.allocate_tx_nr(&fs, 1).unwrap();
        let mut tx2 = Transaction::new(1, nr2, "B".into(), 0);
        tx2.started_confirmed = true;
        store.save(&mut fs, &tx2).unwrap();

        let active = store.active_transaction(&fs, 1).unwrap().unwrap();
        assert_eq!(active.tx_nr, nr2);
    }

    #[test]
    fn recovery_reconstructs_bounds_from_disk() {
        let mut fs = MemFilesystem::new();
        {
            let mut store = TransactionStore::new("tx", DEFAULT_CAPACITY);
            for _ in 0..3 {
                let nr = store.allocate_tx_nr(&fs, 2).unwrap();
                let tx = Transaction::new(2, nr, "T".into(), 0);
                store.save(&mut fs, &tx).unwrap();
            }
        }
        let mut fresh_store = TransactionStore::new("tx", DEFAULT_CAPACITY);
        let next = fresh_store.allocate_tx_nr(&fs, 2).unwrap();
        assert_eq!(next, 3);
    }

    #[test]
    fn pending_reports_unconfirmed_start() {
        let mut fs = MemFilesystem::new();
        let mut store = TransactionStore::new("tx", DEFAULT_CAPACITY);
        let nr = store.allocate_tx_nr(&fs, 1).unwrap();
        let tx = Transaction::new(1, nr, "TAG".into(), 0);
        store.save(&mut fs, &tx).unwrap();

        let pending = store.pending(&fs, 1).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].tx_nr, nr);
    }

    #[test]
    fn pending_reports_unconfirmed_stop() {
        let mut fs = MemFilesystem::new();
        let mut store = TransactionStore::new("tx", DEFAULT_CAPACITY);
        let nr = store.allocate_tx_nr(&fs, 1).unwrap();
        let mut tx = Transaction::new(1, nr, "TAG".into(), 0);
        tx.started_confirmed = true;
        tx.meter_stop = Some(500);
        store.save(&mut fs, &tx).unwrap();

        let pending = store.pending(&fs, 1).unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn pending_is_empty_for_settled_transaction() {
        let mut fs = MemFilesystem::new();
        let mut store = TransactionStore::new("tx", DEFAULT_CAPACITY);
        let nr = store.allocate_tx_nr(&fs, 1).unwrap();
        let mut tx = Transaction::new(1, nr, "TAG".into(), 0);
        tx.started_confirmed = true;
        tx.stopped_confirmed = true;
        store.save(&mut fs, &tx).unwrap();

        assert!(store.pending(&fs, 1).unwrap().is_empty());
    }

    #[test]
    fn purge_connector_clears_slots_and_bounds() {
        let mut fs = MemFilesystem::new();
        let mut store = TransactionStore::new("tx", DEFAULT_CAPACITY);
        let nr = store.allocate_tx_nr(&fs, 1).unwrap();
        let tx = Transaction::new(1, nr, "TAG".into(), 0);
        store.save(&mut fs, &tx).unwrap();

        store.purge_connector(&mut fs, 1).unwrap();
        assert!(store.load(&fs, 1, nr).unwrap().is_none());
        let next = store.allocate_tx_nr(&fs, 1).unwrap();
        assert_eq!(next, 0, "bounds reset after purge");
    }

    #[test]
    fn ring_buffer_evicts_oldest_beyond_capacity() {
        let mut fs = MemFilesystem::new();
        let mut store = TransactionStore::new("tx", 2);
        for _ in 0..5 {
            let nr = store.allocate_tx_nr(&fs, 1).unwrap();
            let tx = Transaction::new(1, nr, "T".into(), 0);
            store.save(&mut fs, &tx).unwrap();
        }
        // tx_nr 0 should have been overwritten by tx_nr 2 (capacity 2, slot = tx_nr % 2).
        let slot0 = store.load(&fs, 1, 0).unwrap();
        assert!(slot0.is_none() || slot0.unwrap().tx_nr != 0);
    }
}
