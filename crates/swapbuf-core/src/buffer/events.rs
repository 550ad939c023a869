//! Change notifications.
//!
//! Listeners run on the thread that performed the operation, after the
//! manager has released its lock, so they may query the manager.

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use swapbuf_common::types::BufferId;

/// Something that changed in the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferEvent {
    /// A zeroed buffer was registered.
    Allocated(BufferId),
    /// New content was installed.
    Set(BufferId),
    /// The buffer was resized.
    Reallocated(BufferId),
    /// The buffer was removed.
    Destroyed(BufferId),
    /// Two buffers exchanged content.
    Swapped(BufferId, BufferId),
    /// A lock was taken.
    Locked(BufferId),
    /// A lock was released.
    Unlocked(BufferId),
    /// The content moved to disk.
    Dumped(BufferId),
    /// The content came back from disk.
    Restored(BufferId),
    /// A policy was installed or one of its parameters changed.
    PolicyChanged,
}

/// Callback invoked for every [`BufferEvent`].
pub type Listener = Arc<dyn Fn(&BufferEvent) + Send + Sync>;

pub(crate) struct Listeners {
    entries: RwLock<IndexMap<u64, Listener>>,
    next_id: AtomicU64,
}

impl Listeners {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn subscribe(&self, listener: Listener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().insert(id, listener);
        tracing::debug!("Registered buffer listener {}", id);
        id
    }

    pub(crate) fn unsubscribe(&self, id: u64) -> bool {
        self.entries.write().shift_remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Delivers `events` in order to every listener, in registration order.
    pub(crate) fn emit(&self, events: impl IntoIterator<Item = BufferEvent>) {
        // Snapshot so a listener can subscribe or unsubscribe
        let listeners: Vec<Listener> = self.entries.read().values().cloned().collect();
        if listeners.is_empty() {
            return;
        }
        for event in events {
            for listener in &listeners {
                listener(&event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_emit_in_order() {
        let listeners = Listeners::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        listeners.subscribe(Arc::new(move |event| sink.lock().push(*event)));

        let id = BufferId::new(3);
        listeners.emit([BufferEvent::Allocated(id), BufferEvent::Dumped(id)]);
        assert_eq!(
            *seen.lock(),
            [BufferEvent::Allocated(id), BufferEvent::Dumped(id)]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let listeners = Listeners::new();
        let id = listeners.subscribe(Arc::new(|_| {}));
        assert_eq!(listeners.len(), 1);
        assert!(listeners.unsubscribe(id));
        assert!(!listeners.unsubscribe(id));
        assert_eq!(listeners.len(), 0);
    }
}
