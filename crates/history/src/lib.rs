//! Photo Editor History Library
//!
//! Bounded undo/redo history of full-resolution pixel snapshots.
//!
//! The [`SnapshotHistory`] captures the editor surface after each edit,
//! keeps the undo and redo stacks inside count and byte ceilings, stops
//! reading history once the surface becomes unreadable (tainted), and
//! generates preview thumbnails in the background without holding up
//! the edit that triggered them.
//!
//! # Example
//!
//! ```
//! use photo_editor_history::{HistoryConfig, MemorySurface, PixelBuffer, SnapshotHistory};
//!
//! let surface = MemorySurface::new(PixelBuffer::filled(4, 4, [255, 0, 0, 255]));
//! let config = HistoryConfig::default().with_thumbnail_workers(0);
//! let mut history = SnapshotHistory::new(surface, config).unwrap();
//!
//! assert!(history.push(Some("fill red")));
//!
//! history.surface_mut().set_pixels(PixelBuffer::filled(4, 4, [0, 0, 255, 255]));
//! assert!(history.push(Some("fill blue")));
//!
//! let previous = history.undo().unwrap();
//! history.restore(&previous).unwrap();
//! assert_eq!(history.surface().pixels().data()[..4], [255, 0, 0, 255]);
//! ```

pub mod config;
pub mod eviction;
pub mod metadata;
pub mod notify;
pub mod pixels;
pub mod preferences;
pub mod store;
pub mod surface;
pub mod taint;
pub mod thumbnail;

pub use config::{ConfigError, HistoryConfig};
pub use eviction::EvictionPolicy;
pub use metadata::{EntryMetadata, MetadataIndex};
pub use notify::{EntrySummary, HistoryLimits, HistoryUpdate, UpdateSink};
pub use pixels::{PixelBuffer, PixelError, Snapshot, SnapshotId};
pub use preferences::{
    HistoryPreferences, JsonFilePreferenceStore, MemoryPreferenceStore, PreferenceStore,
    PreferencesError,
};
pub use store::SnapshotHistory;
pub use surface::{MemorySurface, Surface, SurfaceError};
pub use taint::{TaintState, TaintTracker};
pub use thumbnail::{ThumbnailError, ThumbnailGenerator, ThumbnailSettings};
