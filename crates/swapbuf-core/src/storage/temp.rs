//! Process-scoped temporary folder.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name of the marker file holding the owning process id.
pub const PID_MARKER: &str = "swapbuf.pid";

/// Directory that holds the dumped buffers of one manager.
///
/// The directory and everything in it is removed when the folder is dropped.
/// A process that dies without dropping it leaves the directory behind; the
/// PID marker lets a later process recognise and sweep it.
#[derive(Debug)]
pub struct TempFolder {
    dir: TempDir,
}

/// A candidate temp folder found under a root directory.
#[derive(Debug, Clone, Serialize)]
pub struct TempFolderEntry {
    /// Folder path.
    pub path: PathBuf,
    /// Owning process, if the marker could be read.
    pub pid: Option<u32>,
    /// Whether the owning process is still running.
    pub alive: bool,
    /// Whether the folder belongs to the calling process.
    pub is_current: bool,
    /// Number of dump files (the marker excluded).
    pub file_count: usize,
    /// Total size of the dump files.
    pub total_bytes: u64,
}

impl TempFolderEntry {
    /// Returns true if the folder can be removed safely.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.pid.is_some() && !self.alive && !self.is_current
    }
}

impl TempFolder {
    /// Creates a new uniquely named folder under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder or its marker cannot be created.
    pub fn create(root: &Path, prefix: &str) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(root)?;
        fs::write(dir.path().join(PID_MARKER), std::process::id().to_string())?;

        tracing::debug!("Created dump folder {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Returns the folder path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Lists the folders under `root` whose name starts with `prefix`.
    ///
    /// A missing `root` yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` exists but cannot be read.
    pub fn scan(root: &Path, prefix: &str) -> io::Result<Vec<TempFolderEntry>> {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let current = std::process::id();
        let mut found = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(prefix) || !entry.file_type()?.is_dir() {
                continue;
            }

            let path = entry.path();
            let pid = read_marker(&path);
            let (file_count, total_bytes) = dump_usage(&path);
            found.push(TempFolderEntry {
                alive: pid.is_none_or(process_alive),
                is_current: pid == Some(current),
                pid,
                path,
                file_count,
                total_bytes,
            });
        }

        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    /// Removes folders left behind by processes that are no longer running.
    ///
    /// Folders without a readable marker are kept: they may belong to a
    /// process that is still creating them.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` cannot be read. Failures to remove a single
    /// folder are logged and skipped.
    pub fn sweep_stale(root: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for entry in Self::scan(root, prefix)? {
            if !entry.is_stale() {
                continue;
            }
            match fs::remove_dir_all(&entry.path) {
                Ok(()) => {
                    tracing::info!(
                        "Removed stale dump folder {} (pid {:?})",
                        entry.path.display(),
                        entry.pid
                    );
                    removed.push(entry.path);
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to remove stale dump folder {}: {}",
                        entry.path.display(),
                        e
                    );
                }
            }
        }
        Ok(removed)
    }
}

fn read_marker(dir: &Path) -> Option<u32> {
    fs::read_to_string(dir.join(PID_MARKER))
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

fn dump_usage(dir: &Path) -> (usize, u64) {
    let Ok(entries) = fs::read_dir(dir) else {
        return (0, 0);
    };

    entries
        .filter_map(Result::ok)
        .filter(|e| e.file_name() != PID_MARKER)
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .fold((0, 0), |(count, bytes), m| (count + 1, bytes + m.len()))
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// Without a cheap liveness check every owner is assumed to be running.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}
