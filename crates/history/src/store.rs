//! Snapshot store: the undo/redo history itself
//!
//! `SnapshotHistory` owns the editor surface and two stacks of immutable
//! snapshots. Every mutation runs the eviction policy, keeps the metadata
//! table in step with the stacks and sends one update to the host.
//!
//! State shared with thumbnail completions lives behind a mutex. Completions
//! only hold a weak handle and find their snapshot by id, so a thumbnail that
//! lands after its snapshot was evicted, undone or cleared is dropped.
//! Surface reads happen before the state lock is taken and host callbacks
//! run after it is released, still in the order the state changed.

use crate::config::{validate_max_bytes, validate_max_entries, validate_thumbnail_height};
use crate::config::{ConfigError, HistoryConfig};
use crate::eviction::{total_bytes, EvictionPolicy};
use crate::metadata::{MetadataIndex, LABEL_EDIT, LABEL_REDO_BASE, LABEL_UNDO_BASE};
use crate::notify::{dispatch, EntrySummary, HistoryLimits, HistoryUpdate, PendingUpdate, UpdateSink};
use crate::pixels::{PixelBuffer, Snapshot, SnapshotId};
use crate::surface::{Surface, SurfaceError};
use crate::taint::{TaintState, TaintTracker};
use crate::thumbnail::{ThumbnailGenerator, ThumbnailSettings};
use parking_lot::Mutex;
use photo_editor_scheduler::{SchedulerError, SchedulerStats};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

/// Internal state guarded by the history mutex
struct HistoryState {
    /// Oldest at the front
    undo: VecDeque<Snapshot>,
    /// Most recent at the back
    redo: Vec<Snapshot>,
    index: MetadataIndex,
    taint: TaintTracker,
    policy: EvictionPolicy,
    thumbnail_settings: ThumbnailSettings,
    protect_returned_buffers: bool,
    next_id: u64,
    sink: Option<UpdateSink>,
}

impl HistoryState {
    fn new(config: &HistoryConfig) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            index: MetadataIndex::new(),
            taint: TaintTracker::new(),
            policy: EvictionPolicy::new(config.max_entries, config.max_bytes),
            thumbnail_settings: ThumbnailSettings {
                enabled: config.thumbnails_enabled,
                height: config.thumbnail_height,
            },
            protect_returned_buffers: config.protect_returned_buffers,
            next_id: 1,
            sink: None,
        }
    }

    /// Freeze pixels under a fresh id and record its metadata
    fn capture(&mut self, pixels: PixelBuffer, label: &str) -> Snapshot {
        let id = SnapshotId::new(self.next_id);
        self.next_id += 1;
        self.index.insert(id, label);
        Snapshot::from_buffer(id, pixels)
    }

    fn clear_redo(&mut self) {
        for snapshot in self.redo.drain(..) {
            self.index.remove(snapshot.id());
        }
    }

    fn enforce_limits(&mut self) {
        let evicted = self
            .policy
            .enforce(&mut self.undo, &self.redo, &mut self.index);
        if !evicted.is_empty() {
            tracing::debug!(
                evicted = evicted.len(),
                undo = self.undo.len(),
                bytes = self.estimated_bytes(),
                "history limits enforced"
            );
        }
    }

    fn estimated_bytes(&self) -> u64 {
        total_bytes(self.undo.iter()) + total_bytes(&self.redo)
    }

    fn limits(&self) -> HistoryLimits {
        HistoryLimits {
            max_entries: self.policy.max_entries,
            max_bytes: self.policy.max_bytes,
            protect_returned_buffers: self.protect_returned_buffers,
        }
    }

    fn entries(&self) -> Vec<EntrySummary> {
        self.undo
            .iter()
            .enumerate()
            .filter_map(|(index, snapshot)| {
                let meta = self.index.get(snapshot.id())?;
                Some(EntrySummary {
                    index,
                    id: snapshot.id(),
                    width: snapshot.width(),
                    height: snapshot.height(),
                    timestamp: meta.timestamp,
                    label: meta.label.clone(),
                    thumbnail: meta.thumbnail.clone(),
                })
            })
            .collect()
    }

    fn build_update(&self, tainted: Option<bool>) -> HistoryUpdate {
        HistoryUpdate {
            undo_count: self.undo.len(),
            redo_count: self.redo.len(),
            estimated_bytes: self.estimated_bytes(),
            limits: self.limits(),
            entries: self.entries(),
            thumbnails: self.thumbnail_settings,
            tainted,
        }
    }

    fn prepare_update(&self, tainted: Option<bool>) -> Option<PendingUpdate> {
        let sink = self.sink.clone()?;
        Some(PendingUpdate::new(sink, self.build_update(tainted)))
    }

    /// What undo/redo give back to the caller
    fn hand_out(&self, snapshot: Snapshot) -> Snapshot {
        if self.protect_returned_buffers {
            snapshot.deep_copy()
        } else {
            snapshot
        }
    }

    fn is_readable(&self) -> bool {
        !self.taint.is_tainted()
    }
}

/// State shared between the host thread and thumbnail completions
///
/// Lock order is `delivery` then `state`. Every path that builds an update
/// holds `delivery` from before it locks `state` until the update has been
/// handed to the sink, so the host sees updates in the order the state
/// changed. Queries take `state` alone.
struct Shared {
    delivery: Mutex<()>,
    state: Mutex<HistoryState>,
}

/// Bounded undo/redo history over a pixel surface
///
/// Operations are called serially by the host (`&mut self`). Thumbnail jobs
/// are the only concurrent writers, and they only attach previews.
pub struct SnapshotHistory<S> {
    surface: S,
    shared: Arc<Shared>,
    thumbnails: ThumbnailGenerator,
}

impl<S: Surface> SnapshotHistory<S> {
    /// Create a history over `surface`.
    ///
    /// Invalid config fields fall back to their defaults with a warning.
    /// Fails only if the thumbnail worker threads cannot be spawned.
    pub fn new(surface: S, config: HistoryConfig) -> Result<Self, SchedulerError> {
        let config = config.sanitized();
        let thumbnails = ThumbnailGenerator::new(config.thumbnail_workers)?;

        tracing::debug!(
            max_entries = config.max_entries,
            max_bytes = ?config.max_bytes,
            thumbnails = config.thumbnails_enabled,
            background = thumbnails.is_background(),
            "history created"
        );

        Ok(Self {
            surface,
            shared: Arc::new(Shared {
                delivery: Mutex::new(()),
                state: Mutex::new(HistoryState::new(&config)),
            }),
            thumbnails,
        })
    }

    /// Attach the host update callback
    pub fn with_update_sink(self, sink: UpdateSink) -> Self {
        self.shared.state.lock().sink = Some(sink);
        self
    }

    pub fn set_update_sink(&mut self, sink: Option<UpdateSink>) {
        self.shared.state.lock().sink = sink;
    }

    /// Capture the visible surface as a new undo entry.
    ///
    /// Returns `false` without touching the stacks if the surface cannot be
    /// read or has no pixels. A successful push clears the redo stack and
    /// lifts any taint.
    pub fn push(&mut self, label: Option<&str>) -> bool {
        let _delivery = self.shared.delivery.lock();
        let Some(pixels) = self.read_surface() else {
            return false;
        };
        if pixels.is_empty() {
            tracing::debug!("skipping push of an empty surface");
            return false;
        }

        let label = label.filter(|label| !label.is_empty()).unwrap_or(LABEL_EDIT);

        let (snapshot, thumbnail_height, pending) = {
            let mut state = self.shared.state.lock();
            let snapshot = state.capture(pixels, label);
            state.undo.push_back(snapshot.clone());
            state.clear_redo();
            let lifted = state.taint.clear();
            state.enforce_limits();

            let settings = state.thumbnail_settings;
            let thumbnail_height = (settings.enabled && state.index.contains(snapshot.id()))
                .then_some(settings.height);

            if lifted {
                tracing::info!("surface readable again, history resumed");
            }
            (snapshot, thumbnail_height, state.prepare_update(lifted.then_some(false)))
        };

        tracing::trace!(id = %snapshot.id(), label, "pushed snapshot");

        dispatch(pending);
        if let Some(height) = thumbnail_height {
            self.schedule_thumbnail(snapshot, height);
        }
        true
    }

    /// Step back one entry.
    ///
    /// The visible surface is captured onto the redo stack first. If the top
    /// undo entry already matches what is visible, it is dropped and the
    /// entry below it is returned instead; that entry stays on the undo
    /// stack as the new visible state. Returns `None` while tainted, when
    /// there is nothing to undo, or when the surface read fails.
    pub fn undo(&mut self) -> Option<Snapshot> {
        let _delivery = self.shared.delivery.lock();
        if !self.can_undo() {
            return None;
        }
        let pixels = self.read_surface()?;

        let (result, pending) = {
            let mut state = self.shared.state.lock();
            let top = state.undo.pop_back()?;

            let redo_base = if pixels.is_empty() {
                None
            } else {
                let base = state.capture(pixels, LABEL_REDO_BASE);
                state.redo.push(base.clone());
                Some(base)
            };

            state.index.remove(top.id());
            let result = match redo_base {
                Some(base) if top.same_pixels(&base) && !state.undo.is_empty() => {
                    state.undo.back().cloned()
                }
                _ => Some(top),
            };

            state.enforce_limits();
            let result = result.map(|snapshot| state.hand_out(snapshot));
            (result, state.prepare_update(None))
        };

        if let Some(snapshot) = &result {
            tracing::trace!(id = %snapshot.id(), "undo");
        }
        dispatch(pending);
        result
    }

    /// Step forward one entry.
    ///
    /// The visible surface is captured onto the undo stack, then the most
    /// recent redo entry is popped and returned.
    pub fn redo(&mut self) -> Option<Snapshot> {
        let _delivery = self.shared.delivery.lock();
        if !self.can_redo() {
            return None;
        }
        let pixels = self.read_surface()?;

        let (result, pending) = {
            let mut state = self.shared.state.lock();
            let top = state.redo.pop()?;

            if !pixels.is_empty() {
                let base = state.capture(pixels, LABEL_UNDO_BASE);
                state.undo.push_back(base);
            }

            state.index.remove(top.id());
            state.enforce_limits();
            let result = state.hand_out(top);
            (result, state.prepare_update(None))
        };

        tracing::trace!(id = %result.id(), "redo");
        dispatch(pending);
        Some(result)
    }

    /// Draw a snapshot returned by undo/redo back onto the surface
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), SurfaceError> {
        self.surface.write_pixels(&snapshot.to_buffer())
    }

    /// Drop both stacks and all metadata.
    ///
    /// Refused while tainted: the stacks stay frozen until a successful push
    /// lifts the taint. Returns whether the history was cleared.
    pub fn clear(&mut self) -> bool {
        let _delivery = self.shared.delivery.lock();
        let pending = {
            let mut state = self.shared.state.lock();
            if !state.is_readable() {
                tracing::debug!("history tainted, refusing to clear");
                return false;
            }
            state.undo.clear();
            state.redo.clear();
            state.index.clear();
            state.prepare_update(None)
        };
        tracing::debug!("history cleared");
        dispatch(pending);
        true
    }

    /// Change the undo entry limit.
    ///
    /// Takes effect immediately unless the history is tainted, in which case
    /// the trim waits for the next successful push.
    pub fn set_max_entries(&mut self, max_entries: usize) -> Result<(), ConfigError> {
        let max_entries = validate_max_entries(max_entries)?;
        self.update_limits(|state| state.policy.max_entries = max_entries);
        Ok(())
    }

    /// Change or remove the byte ceiling. Same deferral as [`set_max_entries`](Self::set_max_entries).
    pub fn set_max_bytes(&mut self, max_bytes: Option<u64>) -> Result<(), ConfigError> {
        let max_bytes = validate_max_bytes(max_bytes)?;
        self.update_limits(|state| state.policy.max_bytes = max_bytes);
        Ok(())
    }

    /// Thumbnail height for future pushes (48..=256)
    pub fn set_thumbnail_height(&mut self, height: u32) -> Result<(), ConfigError> {
        let height = validate_thumbnail_height(height)?;
        self.update_settings(|state| state.thumbnail_settings.height = height);
        Ok(())
    }

    pub fn set_thumbnails_enabled(&mut self, enabled: bool) {
        self.update_settings(|state| state.thumbnail_settings.enabled = enabled);
    }

    pub fn can_undo(&self) -> bool {
        let state = self.shared.state.lock();
        state.is_readable() && !state.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        let state = self.shared.state.lock();
        state.is_readable() && !state.redo.is_empty()
    }

    pub fn is_tainted(&self) -> bool {
        self.shared.state.lock().taint.is_tainted()
    }

    pub fn taint_state(&self) -> TaintState {
        self.shared.state.lock().taint.state()
    }

    pub fn undo_count(&self) -> usize {
        self.shared.state.lock().undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.shared.state.lock().redo.len()
    }

    /// Bytes held by both stacks (`w * h * 4` per snapshot)
    pub fn estimated_bytes(&self) -> u64 {
        self.shared.state.lock().estimated_bytes()
    }

    pub fn limits(&self) -> HistoryLimits {
        self.shared.state.lock().limits()
    }

    /// Undo stack entries, oldest first
    pub fn list_entries(&self) -> Vec<EntrySummary> {
        self.shared.state.lock().entries()
    }

    pub fn thumbnail_settings(&self) -> ThumbnailSettings {
        self.shared.state.lock().thumbnail_settings
    }

    /// The payload the next update would carry, without the taint field
    pub fn current_update(&self) -> HistoryUpdate {
        self.shared.state.lock().build_update(None)
    }

    /// Run queued thumbnail encodes on this thread. Returns how many ran.
    ///
    /// Needed when the history was built with zero thumbnail workers; with
    /// background workers it only picks up jobs they have not reached yet.
    pub fn run_idle_jobs(&self) -> usize {
        self.thumbnails.run_pending()
    }

    /// True when no thumbnail encode is queued or running
    pub fn thumbnails_idle(&self) -> bool {
        self.thumbnails.is_idle()
    }

    pub fn thumbnail_stats(&self) -> SchedulerStats {
        self.thumbnails.stats()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Read the surface, tainting the history on failure.
    /// Callers hold the delivery gate.
    fn read_surface(&self) -> Option<PixelBuffer> {
        match self.surface.read_pixels() {
            Ok(pixels) => Some(pixels),
            Err(err) => {
                let pending = {
                    let mut state = self.shared.state.lock();
                    let changed = state.taint.mark_tainted();
                    changed.then(|| state.prepare_update(Some(true))).flatten()
                };
                tracing::warn!(%err, "surface read failed, history reads disabled");
                dispatch(pending);
                None
            }
        }
    }

    fn update_limits(&mut self, apply: impl FnOnce(&mut HistoryState)) {
        let _delivery = self.shared.delivery.lock();
        let pending = {
            let mut state = self.shared.state.lock();
            apply(&mut *state);
            if state.is_readable() {
                state.enforce_limits();
            } else {
                tracing::debug!("history tainted, deferring eviction to the next push");
            }
            state.prepare_update(None)
        };
        dispatch(pending);
    }

    fn update_settings(&mut self, apply: impl FnOnce(&mut HistoryState)) {
        let _delivery = self.shared.delivery.lock();
        let pending = {
            let mut state = self.shared.state.lock();
            apply(&mut *state);
            state.prepare_update(None)
        };
        dispatch(pending);
    }

    fn schedule_thumbnail(&self, snapshot: Snapshot, height: u32) {
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        self.thumbnails
            .schedule(snapshot, height, move |snapshot, result| {
                let Some(shared) = shared.upgrade() else {
                    tracing::trace!(id = %snapshot.id(), "history dropped before thumbnail finished");
                    return;
                };
                let url = match result {
                    Ok(url) => url,
                    Err(err) => {
                        tracing::debug!(id = %snapshot.id(), %err, "thumbnail generation failed");
                        return;
                    }
                };

                let _delivery = shared.delivery.lock();
                let pending = {
                    let mut state = shared.state.lock();
                    if !state.index.attach_thumbnail(snapshot.id(), url) {
                        tracing::trace!(id = %snapshot.id(), "discarding stale thumbnail");
                        return;
                    }
                    state.prepare_update(None)
                };
                dispatch(pending);
            });
    }
}
