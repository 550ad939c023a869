//! Core type definitions for Swapbuf.
//!
//! - Identifier types ([`BufferId`])
//! - Size types ([`ByteSize`])

mod byte_size;
mod id;

pub use byte_size::{ByteSize, ByteSizeError};
pub use id::BufferId;
