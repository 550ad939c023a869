//! On-disk side of the buffer manager.
//!
//! - [`TempFolder`] - Process-scoped directory holding dumped buffers, with a
//!   PID marker so folders left behind by crashed processes can be swept
//! - [`DumpStore`] - Writes buffer bytes to uniquely named files and reads
//!   them back, checking length and checksum
//!
//! # Layout
//!
//! ```text
//! $TMPDIR/
//! └── swapbuf-a1B2c3/          <- one per BufferManager
//!     ├── swapbuf.pid           <- owning process id
//!     ├── buffer-17-0.raw       <- dumped buffer #17
//!     └── buffer-42-1.raw
//! ```

mod dump;
mod temp;

pub use dump::{DumpRecord, DumpStore};
pub use temp::{PID_MARKER, TempFolder, TempFolderEntry};
