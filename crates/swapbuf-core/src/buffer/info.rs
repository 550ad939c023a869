//! Per-buffer bookkeeping.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// What the manager knows about one buffer.
///
/// A loaded buffer holds its bytes in memory. A dumped buffer holds them in
/// the file at [`file_path`](BufferInfo::file_path) and keeps its size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferInfo {
    size: usize,
    loaded: bool,
    lock_count: u32,
    file_path: Option<PathBuf>,
    last_access: u64,
}

impl BufferInfo {
    pub(crate) fn new(size: usize, access: u64) -> Self {
        Self {
            size,
            loaded: true,
            lock_count: 0,
            file_path: None,
            last_access: access,
        }
    }

    /// Logical size in bytes, whether loaded or not.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns true if the bytes are in memory.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Returns true if the bytes are on disk.
    #[must_use]
    pub fn is_dumped(&self) -> bool {
        !self.loaded
    }

    /// Number of outstanding locks.
    #[must_use]
    pub fn lock_count(&self) -> u32 {
        self.lock_count
    }

    /// Returns true if at least one lock is held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock_count > 0
    }

    /// Backing file of a dumped buffer.
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Logical time of the last allocation, set, resize, lock, unlock, or
    /// restore. Larger is more recent.
    #[must_use]
    pub fn last_access(&self) -> u64 {
        self.last_access
    }

    /// Returns true if the buffer could be dumped: loaded, unlocked, and
    /// non-empty.
    #[must_use]
    pub fn is_dumpable(&self) -> bool {
        self.loaded && self.lock_count == 0 && self.size > 0
    }

    pub(crate) fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    pub(crate) fn touch(&mut self, access: u64) {
        self.last_access = access;
    }

    pub(crate) fn mark_dumped(&mut self, path: PathBuf) {
        self.loaded = false;
        self.file_path = Some(path);
    }

    pub(crate) fn mark_loaded(&mut self) {
        self.loaded = true;
        self.file_path = None;
    }

    pub(crate) fn acquire(&mut self) {
        self.lock_count += 1;
    }

    pub(crate) fn release(&mut self) {
        self.lock_count = self.lock_count.saturating_sub(1);
    }

    pub(crate) fn swap_content(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.size, &mut other.size);
        std::mem::swap(&mut self.loaded, &mut other.loaded);
        std::mem::swap(&mut self.file_path, &mut other.file_path);
    }
}

/// Aggregate figures over every tracked buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    /// Tracked buffers.
    pub buffer_count: usize,
    /// Buffers with at least one lock.
    pub locked_count: usize,
    /// Buffers whose bytes are on disk.
    pub dumped_count: usize,
    /// Sum of all logical sizes.
    pub total_managed: u64,
    /// Bytes held in memory.
    pub total_loaded: u64,
    /// Bytes held on disk.
    pub total_dumped: u64,
}

impl BufferStats {
    pub(crate) fn record(&mut self, info: &BufferInfo) {
        let size = info.size as u64;
        self.buffer_count += 1;
        self.total_managed += size;
        if info.is_locked() {
            self.locked_count += 1;
        }
        if info.loaded {
            self.total_loaded += size;
        } else {
            self.dumped_count += 1;
            self.total_dumped += size;
        }
    }

    /// Fraction of managed bytes currently on disk, from 0.0 to 1.0.
    #[must_use]
    pub fn dumped_ratio(&self) -> f64 {
        if self.total_managed == 0 {
            0.0
        } else {
            self.total_dumped as f64 / self.total_managed as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_loaded() {
        let info = BufferInfo::new(16, 3);
        assert!(info.is_loaded());
        assert!(!info.is_locked());
        assert!(info.is_dumpable());
        assert_eq!(info.file_path(), None);
        assert_eq!(info.last_access(), 3);
    }

    #[test]
    fn test_dump_and_load() {
        let mut info = BufferInfo::new(16, 0);
        info.mark_dumped(PathBuf::from("/tmp/x.raw"));
        assert!(info.is_dumped());
        assert!(!info.is_dumpable());
        assert_eq!(info.size(), 16);
        assert_eq!(info.file_path(), Some(Path::new("/tmp/x.raw")));

        info.mark_loaded();
        assert!(info.is_loaded());
        assert_eq!(info.file_path(), None);
    }

    #[test]
    fn test_empty_not_dumpable() {
        assert!(!BufferInfo::new(0, 0).is_dumpable());
    }

    #[test]
    fn test_stats() {
        let mut stats = BufferStats::default();
        let mut dumped = BufferInfo::new(30, 0);
        dumped.mark_dumped(PathBuf::from("a"));
        let mut locked = BufferInfo::new(10, 0);
        locked.acquire();

        stats.record(&dumped);
        stats.record(&locked);

        assert_eq!(stats.buffer_count, 2);
        assert_eq!(stats.locked_count, 1);
        assert_eq!(stats.dumped_count, 1);
        assert_eq!(stats.total_managed, 40);
        assert_eq!(stats.total_loaded, 10);
        assert!((stats.dumped_ratio() - 0.75).abs() < f64::EPSILON);
    }
}
