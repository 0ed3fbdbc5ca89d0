//! Update payload sent to the host after every history mutation
//!
//! The payload is the only contract toward the UI layer. It is rebuilt from
//! live state on every call; nothing here caches or diffs previous payloads.

use crate::pixels::SnapshotId;
use crate::thumbnail::ThumbnailSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Host callback receiving update payloads.
///
/// May be invoked from a background thread when a thumbnail lands.
pub type UpdateSink = Arc<dyn Fn(&HistoryUpdate) + Send + Sync>;

/// Limits currently in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryLimits {
    pub max_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_bytes: Option<u64>,
    pub protect_returned_buffers: bool,
}

/// One undo stack entry as shown to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    /// Position in the undo stack, 0 = oldest
    pub index: usize,
    pub id: SnapshotId,
    pub width: u32,
    pub height: u32,
    pub timestamp: u64,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub thumbnail: Option<String>,
}

/// Diagnostics payload describing the whole history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryUpdate {
    pub undo_count: usize,
    pub redo_count: usize,
    pub estimated_bytes: u64,
    pub limits: HistoryLimits,
    pub entries: Vec<EntrySummary>,
    pub thumbnails: ThumbnailSettings,
    /// Present only on the update where the taint flag changed
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tainted: Option<bool>,
}

impl HistoryUpdate {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A built payload together with the sink it is addressed to
pub(crate) struct PendingUpdate {
    sink: UpdateSink,
    update: HistoryUpdate,
}

impl PendingUpdate {
    pub(crate) fn new(sink: UpdateSink, update: HistoryUpdate) -> Self {
        Self { sink, update }
    }

    /// Hand the payload to the host. Call without holding the state lock
    /// but while still holding the delivery gate it was built under.
    pub(crate) fn deliver(self) {
        (self.sink)(&self.update);
    }
}

/// Deliver an update if one was prepared
pub(crate) fn dispatch(pending: Option<PendingUpdate>) {
    if let Some(pending) = pending {
        pending.deliver();
    }
}
