//! Per-snapshot metadata side-table
//!
//! Metadata lives beside the snapshot stacks, keyed by [`SnapshotId`]. The
//! store inserts an entry when a snapshot is captured and removes it in the
//! same step that removes the snapshot, so the table never holds an entry for
//! a snapshot that is gone.

use crate::pixels::SnapshotId;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Label for a push without an explicit action name
pub const LABEL_EDIT: &str = "edit";

/// Label for the visible state captured onto the undo stack by a redo
pub const LABEL_UNDO_BASE: &str = "undo-base";

/// Label for the visible state captured onto the redo stack by an undo
pub const LABEL_REDO_BASE: &str = "redo-base";

/// Milliseconds since the UNIX epoch, 0 if the clock is before it
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Metadata attached to one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Capture time in milliseconds since the UNIX epoch
    pub timestamp: u64,

    /// Action name, or one of the synthetic base labels
    pub label: String,

    /// Encoded preview (`data:image/png;base64,...`), attached later
    pub thumbnail: Option<String>,
}

impl EntryMetadata {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            timestamp: now_millis(),
            label: label.into(),
            thumbnail: None,
        }
    }
}

/// Identity-keyed metadata table
#[derive(Debug, Default)]
pub struct MetadataIndex {
    entries: HashMap<SnapshotId, EntryMetadata>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record metadata for a freshly captured snapshot
    pub fn insert(&mut self, id: SnapshotId, label: impl Into<String>) {
        let previous = self.entries.insert(id, EntryMetadata::new(label));
        debug_assert!(previous.is_none(), "snapshot id {id} reused");
    }

    /// Drop the entry for a snapshot leaving the store
    pub fn remove(&mut self, id: SnapshotId) -> Option<EntryMetadata> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: SnapshotId) -> Option<&EntryMetadata> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: SnapshotId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Attach an encoded preview to a live snapshot.
    ///
    /// Returns `false` and writes nothing if the id is no longer present.
    pub fn attach_thumbnail(&mut self, id: SnapshotId, thumbnail: String) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.thumbnail = Some(thumbnail);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove() {
        let mut index = MetadataIndex::new();
        let id = SnapshotId::new(1);

        index.insert(id, "crop");
        assert!(index.contains(id));
        assert_eq!(index.get(id).unwrap().label, "crop");
        assert!(index.get(id).unwrap().timestamp > 0);

        let removed = index.remove(id).unwrap();
        assert_eq!(removed.label, "crop");
        assert!(!index.contains(id));
        assert!(index.is_empty());
    }

    #[test]
    fn test_attach_thumbnail_requires_live_entry() {
        let mut index = MetadataIndex::new();
        let live = SnapshotId::new(1);
        let gone = SnapshotId::new(2);
        index.insert(live, LABEL_EDIT);

        assert!(index.attach_thumbnail(live, "data:image/png;base64,AAAA".to_string()));
        assert_eq!(
            index.get(live).unwrap().thumbnail.as_deref(),
            Some("data:image/png;base64,AAAA")
        );

        assert!(!index.attach_thumbnail(gone, "data:image/png;base64,BBBB".to_string()));
        assert!(!index.contains(gone));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut index = MetadataIndex::new();
        index.insert(SnapshotId::new(1), LABEL_UNDO_BASE);
        index.insert(SnapshotId::new(2), LABEL_REDO_BASE);
        index.clear();
        assert!(index.is_empty());
    }
}
