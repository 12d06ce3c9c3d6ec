//! A thread-safe in-memory slot for the currently active evaluation
//! snapshot, allowing concurrent access for readers (evaluation calls) and
//! writers (initialize / background refresh).
use std::sync::{Arc, RwLock};

use crate::snapshot::Snapshot;

/// `SnapshotStore` provides a thread-safe (`Sync`) storage for the current
/// [`Snapshot`].
///
/// A `Snapshot` is immutable and can only be replaced completely: readers see
/// either the old or the new snapshot in full, never a mix of the two, and a
/// reader holding an `Arc` keeps a consistent view for the whole operation
/// regardless of concurrent replacement.
#[derive(Default)]
pub struct SnapshotStore {
    snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotStore {
    /// Create a new empty snapshot store.
    pub fn new() -> SnapshotStore {
        SnapshotStore::default()
    }

    /// Get the currently-active snapshot. Returns `None` if no snapshot has
    /// been installed yet. Never blocks on I/O; always serves from memory.
    pub fn get_snapshot(&self) -> Option<Arc<Snapshot>> {
        // self.snapshot.read() should always return Ok(). Err() is possible
        // only if the lock is poisoned (writer panicked while holding the
        // lock), which should never happen.
        let snapshot = self
            .snapshot
            .read()
            .expect("thread holding snapshot lock should not panic");

        snapshot.clone()
    }

    /// Install a new snapshot. Visible to subsequent reads only after the
    /// write completes in full.
    pub fn set_snapshot(&self, snapshot: Arc<Snapshot>) {
        let mut slot = self
            .snapshot
            .write()
            .expect("thread holding snapshot lock should not panic");

        *slot = Some(snapshot);
    }
}
