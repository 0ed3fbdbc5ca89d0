//! Count and byte ceilings for the snapshot stacks
//!
//! Eviction always removes the oldest undo entry (front of the queue). The
//! redo stack is never trimmed here: it only holds entries between an
//! undo/redo and the next push, which clears it.

use crate::metadata::MetadataIndex;
use crate::pixels::{Snapshot, SnapshotId};
use std::collections::VecDeque;

/// Default maximum number of undo entries
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Limits enforced on the snapshot stacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Maximum undo stack length (> 0)
    pub max_entries: usize,

    /// Optional ceiling on bytes held by both stacks (> 0)
    pub max_bytes: Option<u64>,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_bytes: None,
        }
    }
}

/// Estimated bytes held by a set of snapshots
pub fn total_bytes<'a>(snapshots: impl IntoIterator<Item = &'a Snapshot>) -> u64 {
    snapshots.into_iter().map(Snapshot::byte_size).sum()
}

impl EvictionPolicy {
    pub fn new(max_entries: usize, max_bytes: Option<u64>) -> Self {
        Self {
            max_entries,
            max_bytes,
        }
    }

    /// Run both passes, count first. Returns the evicted ids, oldest first.
    pub fn enforce(
        &self,
        undo: &mut VecDeque<Snapshot>,
        redo: &[Snapshot],
        index: &mut MetadataIndex,
    ) -> Vec<SnapshotId> {
        let mut evicted = self.enforce_count(undo, index);
        evicted.extend(self.enforce_bytes(undo, redo, index));
        evicted
    }

    /// Drop the oldest undo entries until the stack fits `max_entries`.
    pub fn enforce_count(
        &self,
        undo: &mut VecDeque<Snapshot>,
        index: &mut MetadataIndex,
    ) -> Vec<SnapshotId> {
        let mut evicted = Vec::new();
        while undo.len() > self.max_entries {
            match evict_oldest(undo, index) {
                Some(snapshot) => evicted.push(snapshot.id()),
                None => break,
            }
        }
        evicted
    }

    /// Drop the oldest undo entries until both stacks fit `max_bytes`.
    ///
    /// Stops once the undo stack is empty even if the redo stack alone is
    /// still over the ceiling.
    pub fn enforce_bytes(
        &self,
        undo: &mut VecDeque<Snapshot>,
        redo: &[Snapshot],
        index: &mut MetadataIndex,
    ) -> Vec<SnapshotId> {
        let mut evicted = Vec::new();
        let Some(max_bytes) = self.max_bytes else {
            return evicted;
        };

        let mut used = total_bytes(undo.iter()) + total_bytes(redo);
        while used > max_bytes {
            match evict_oldest(undo, index) {
                Some(snapshot) => {
                    used = used.saturating_sub(snapshot.byte_size());
                    evicted.push(snapshot.id());
                }
                None => break,
            }
        }
        evicted
    }
}

/// Remove the oldest undo entry together with its metadata
fn evict_oldest(undo: &mut VecDeque<Snapshot>, index: &mut MetadataIndex) -> Option<Snapshot> {
    let snapshot = undo.pop_front()?;
    index.remove(snapshot.id());
    tracing::trace!(id = %snapshot.id(), bytes = snapshot.byte_size(), "evicted snapshot");
    Some(snapshot)
}
