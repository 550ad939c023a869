//! Identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a tracked buffer.
///
/// The manager keys its registry on this value. Two buffers never share an
/// id while both are registered; an id may be reused once its buffer has been
/// destroyed, in which case the new registration starts from a fresh record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferId(u64);

impl BufferId {
    /// Creates a buffer id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for BufferId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(BufferId::new(42).to_string(), "#42");
    }

    #[test]
    fn test_ordering() {
        assert!(BufferId::new(1) < BufferId::new(2));
        assert_eq!(BufferId::from(7).as_u64(), 7);
    }
}
