//! The registry of tracked buffers.

use super::BufferInfo;
use crate::storage::{DumpRecord, DumpStore};
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use swapbuf_common::types::BufferId;
use swapbuf_common::utils::error::Result;

/// Shared byte storage of one buffer.
///
/// Empty while the buffer is dumped. The manager only replaces or resizes it
/// while the buffer holds no lock, so lock holders are the only writers.
pub(crate) type BufferData = Arc<RwLock<Vec<u8>>>;

pub(crate) struct Entry {
    pub(crate) info: BufferInfo,
    pub(crate) data: BufferData,
    pub(crate) dump: Option<DumpRecord>,
}

/// Buffers by id, plus the logical clock stamping `last_access`.
#[derive(Default)]
pub(crate) struct BufferTable {
    entries: HashMap<BufferId, Entry>,
    clock: u64,
}

impl BufferTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, id: BufferId) -> bool {
        self.entries.contains_key(&id)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, id: BufferId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: BufferId) -> Option<&mut Entry> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn info(&self, id: BufferId) -> Option<&BufferInfo> {
        self.entries.get(&id).map(|entry| &entry.info)
    }

    pub(crate) fn infos(&self) -> impl Iterator<Item = (BufferId, &BufferInfo)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, &entry.info))
    }

    /// Registers a loaded buffer holding `bytes`.
    pub(crate) fn insert(&mut self, id: BufferId, bytes: Vec<u8>) {
        let access = self.tick();
        let entry = Entry {
            info: BufferInfo::new(bytes.len(), access),
            data: Arc::new(RwLock::new(bytes)),
            dump: None,
        };
        self.entries.insert(id, entry);
    }

    pub(crate) fn remove(&mut self, id: BufferId) -> Option<Entry> {
        self.entries.remove(&id)
    }

    #[cfg(test)]
    pub(crate) fn touch(&mut self, id: BufferId) {
        let access = self.tick();
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.info.touch(access);
        }
    }

    /// Writes a buffer's bytes to disk and releases its memory.
    ///
    /// Returns false without side effects if the buffer is unknown, locked,
    /// already dumped, or empty, or if writing fails.
    pub(crate) fn dump(&mut self, store: &DumpStore, id: BufferId) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        if !entry.info.is_dumpable() {
            return false;
        }

        let mut data = entry.data.write();
        let record = match store.write(id, &data) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Failed to dump buffer {}: {}", id, e);
                return false;
            }
        };
        *data = Vec::new();
        drop(data);

        entry.info.mark_dumped(record.path().to_path_buf());
        entry.dump = Some(record);
        true
    }

    /// Reads a dumped buffer back into memory.
    ///
    /// Returns `Ok(false)` if the buffer is unknown or already loaded. On
    /// error the buffer stays dumped and its file is kept.
    pub(crate) fn restore(&mut self, store: &DumpStore, id: BufferId) -> Result<bool> {
        let access = self.tick();
        let Some(entry) = self.entries.get_mut(&id) else {
            return Ok(false);
        };
        let Some(record) = entry.dump.as_ref() else {
            return Ok(false);
        };

        let bytes = store.take(record).inspect_err(|e| {
            tracing::error!("Failed to restore buffer {}: {}", id, e);
        })?;

        *entry.data.write() = bytes;
        entry.dump = None;
        entry.info.mark_loaded();
        entry.info.touch(access);
        Ok(true)
    }

    /// Exchanges the content of two buffers. Both must be unlocked.
    pub(crate) fn swap(&mut self, a: BufferId, b: BufferId) {
        if a == b {
            return;
        }
        let access = self.tick();
        let Some(mut first) = self.entries.remove(&a) else {
            return;
        };
        if let Some(second) = self.entries.get_mut(&b) {
            std::mem::swap(&mut first.data, &mut second.data);
            std::mem::swap(&mut first.dump, &mut second.dump);
            first.info.swap_content(&mut second.info);
            second.info.touch(access);
        }
        first.info.touch(access);
        self.entries.insert(a, first);
    }

    /// Removes every entry, returning the backing files still on disk.
    pub(crate) fn drain_records(&mut self) -> Vec<DumpRecord> {
        self.entries
            .drain()
            .filter_map(|(_, entry)| entry.dump)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn id(n: u64) -> BufferId {
        BufferId::new(n)
    }

    #[test]
    fn test_dump_and_restore() {
        let root = tempdir().unwrap();
        let store = DumpStore::open(root.path(), "swapbuf-").unwrap();
        let mut table = BufferTable::new();
        table.insert(id(1), vec![7; 32]);

        assert!(table.dump(&store, id(1)));
        let entry = table.get(id(1)).unwrap();
        assert!(entry.info.is_dumped());
        assert!(entry.data.read().is_empty());
        let path = entry.info.file_path().unwrap().to_path_buf();
        assert!(path.exists());

        // Already dumped
        assert!(!table.dump(&store, id(1)));

        assert!(table.restore(&store, id(1)).unwrap());
        let entry = table.get(id(1)).unwrap();
        assert!(entry.info.is_loaded());
        assert_eq!(*entry.data.read(), vec![7; 32]);
        assert!(!path.exists());

        assert!(!table.restore(&store, id(1)).unwrap());
    }

    #[test]
    fn test_dump_refusals() {
        let root = tempdir().unwrap();
        let store = DumpStore::open(root.path(), "swapbuf-").unwrap();
        let mut table = BufferTable::new();
        table.insert(id(1), Vec::new());
        table.insert(id(2), vec![1; 4]);
        table.get_mut(id(2)).unwrap().info.acquire();

        assert!(!table.dump(&store, id(1)));
        assert!(!table.dump(&store, id(2)));
        assert!(!table.dump(&store, id(3)));
    }

    #[test]
    fn test_access_clock() {
        let mut table = BufferTable::new();
        table.insert(id(1), vec![0; 1]);
        table.insert(id(2), vec![0; 1]);
        assert!(table.info(id(1)).unwrap().last_access() < table.info(id(2)).unwrap().last_access());

        table.touch(id(1));
        assert!(table.info(id(1)).unwrap().last_access() > table.info(id(2)).unwrap().last_access());
    }

    #[test]
    fn test_swap() {
        let mut table = BufferTable::new();
        table.insert(id(1), vec![1; 2]);
        table.insert(id(2), vec![2; 5]);

        table.swap(id(1), id(2));
        assert_eq!(table.info(id(1)).unwrap().size(), 5);
        assert_eq!(*table.get(id(2)).unwrap().data.read(), vec![1; 2]);
    }
}
