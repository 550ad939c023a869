//! Dump file management.

use super::TempFolder;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use swapbuf_common::types::BufferId;
use swapbuf_common::utils::error::{Error, Result, StorageError};

/// Where a dumped buffer's bytes went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRecord {
    path: PathBuf,
    len: usize,
    checksum: u32,
}

impl DumpRecord {
    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of bytes written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the CRC32 of the written bytes.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        self.checksum
    }
}

/// Moves buffer bytes between memory and files in a [`TempFolder`].
#[derive(Debug)]
pub struct DumpStore {
    folder: TempFolder,
    next_seq: AtomicU64,
}

impl DumpStore {
    /// Creates a store writing into `folder`.
    #[must_use]
    pub fn new(folder: TempFolder) -> Self {
        Self {
            folder,
            next_seq: AtomicU64::new(0),
        }
    }

    /// Creates a store in a fresh temp folder under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created.
    pub fn open(root: &Path, prefix: &str) -> io::Result<Self> {
        TempFolder::create(root, prefix).map(Self::new)
    }

    /// Returns the directory dump files are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.folder.path()
    }

    /// Writes `bytes` to a new file.
    ///
    /// The file is created exclusively; a partially written file is removed
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write(&self, id: BufferId, bytes: &[u8]) -> io::Result<DumpRecord> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let path = self
            .dir()
            .join(format!("buffer-{}-{}.raw", id.as_u64(), seq));

        if let Err(e) = write_file(&path, bytes) {
            let _ = fs::remove_file(&path);
            return Err(e);
        }

        tracing::debug!("Dumped {} bytes of buffer {} to {}", bytes.len(), id, path.display());
        Ok(DumpRecord {
            path,
            len: bytes.len(),
            checksum: crc32fast::hash(bytes),
        })
    }

    /// Reads a dumped buffer back without removing the file.
    ///
    /// # Errors
    ///
    /// - [`StorageError::MissingBackingFile`] if the file is gone
    /// - [`StorageError::Corruption`] if its length or checksum differ
    /// - [`StorageError::Unreadable`] for any other read failure
    pub fn read(&self, record: &DumpRecord) -> Result<Vec<u8>> {
        let file = match File::open(&record.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::MissingBackingFile(record.path.clone()).into());
            }
            Err(e) => return Err(unreadable(record, &e)),
        };

        let on_disk = file.metadata().map_err(|e| unreadable(record, &e))?.len();
        if on_disk != record.len as u64 {
            return Err(corruption(
                record,
                format!("expected {} bytes, found {}", record.len, on_disk),
            ));
        }

        let mut bytes = vec![0u8; record.len];
        let mut reader = BufReader::new(file);
        match reader.read_exact(&mut bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(corruption(record, "short read".to_string()));
            }
            Err(e) => return Err(unreadable(record, &e)),
        }

        let checksum = crc32fast::hash(&bytes);
        if checksum != record.checksum {
            return Err(corruption(
                record,
                format!(
                    "checksum mismatch (expected {:08x}, found {:08x})",
                    record.checksum, checksum
                ),
            ));
        }

        Ok(bytes)
    }

    /// Reads a dumped buffer back and deletes its file.
    ///
    /// # Errors
    ///
    /// Same as [`DumpStore::read`]. The file is kept when reading fails.
    pub fn take(&self, record: &DumpRecord) -> Result<Vec<u8>> {
        let bytes = self.read(record)?;
        self.discard(record);
        Ok(bytes)
    }

    /// Deletes a backing file that is no longer needed.
    pub fn discard(&self, record: &DumpRecord) {
        match fs::remove_file(&record.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("Failed to remove dump file {}: {}", record.path.display(), e);
            }
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}

fn corruption(record: &DumpRecord, reason: String) -> Error {
    StorageError::Corruption {
        path: record.path.clone(),
        reason,
    }
    .into()
}

fn unreadable(record: &DumpRecord, e: &io::Error) -> Error {
    StorageError::Unreadable {
        path: record.path.clone(),
        reason: e.to_string(),
    }
    .into()
}
