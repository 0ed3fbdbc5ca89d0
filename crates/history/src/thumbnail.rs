//! Background thumbnail generation
//!
//! Thumbnails are downscaled PNG previews of pushed snapshots, delivered as
//! `data:` URLs so the host can hand them straight to an image element. They
//! are encoded on the job scheduler at idle priority; a missing thumbnail
//! only affects the preview, never undo/redo.

use crate::pixels::Snapshot;
use base64::Engine;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use photo_editor_scheduler::{
    JobId, JobPriority, JobScheduler, SchedulerError, SchedulerStats, WorkerPool,
    WorkerPoolConfig,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default thumbnail height in pixels
pub const DEFAULT_THUMBNAIL_HEIGHT: u32 = 96;

/// Smallest accepted thumbnail height
pub const MIN_THUMBNAIL_HEIGHT: u32 = 48;

/// Largest accepted thumbnail height
pub const MAX_THUMBNAIL_HEIGHT: u32 = 256;

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Thumbnail preferences, reported to the host with every update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSettings {
    pub enabled: bool,
    pub height: u32,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            height: DEFAULT_THUMBNAIL_HEIGHT,
        }
    }
}

/// Errors from the encode step. These never leave the thumbnail job.
#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("cannot make a thumbnail of an empty snapshot")]
    EmptySource,

    #[error("snapshot pixels do not form a {width}x{height} RGBA image")]
    InvalidBuffer { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Output size for a thumbnail of the given target height.
///
/// Width keeps the source aspect ratio, rounded to the nearest pixel and
/// never below 1.
pub fn thumbnail_size(width: u32, height: u32, target_height: u32) -> (u32, u32) {
    let target_height = target_height.max(1);
    if height == 0 {
        return (1, target_height);
    }
    let scaled = (width as f64 * target_height as f64 / height as f64).round();
    let target_width = (scaled as u32).max(1);
    (target_width, target_height)
}

/// Downscale a snapshot and encode it as a PNG data URL
pub fn encode_thumbnail(snapshot: &Snapshot, target_height: u32) -> Result<String, ThumbnailError> {
    let (width, height) = (snapshot.width(), snapshot.height());
    if width == 0 || height == 0 {
        return Err(ThumbnailError::EmptySource);
    }

    let source = RgbaImage::from_raw(width, height, snapshot.pixels().to_vec())
        .ok_or(ThumbnailError::InvalidBuffer { width, height })?;

    let (thumb_width, thumb_height) = thumbnail_size(width, height, target_height);
    let thumb = imageops::resize(&source, thumb_width, thumb_height, FilterType::Triangle);

    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png).write_image(
        thumb.as_raw(),
        thumb_width,
        thumb_height,
        ExtendedColorType::Rgba8,
    )?;

    let mut url = String::with_capacity(DATA_URL_PREFIX.len() + png.len() * 4 / 3 + 4);
    url.push_str(DATA_URL_PREFIX);
    base64::engine::general_purpose::STANDARD.encode_string(&png, &mut url);
    Ok(url)
}

/// Decode the PNG bytes back out of a thumbnail data URL
pub fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let payload = url.strip_prefix(DATA_URL_PREFIX)?;
    base64::engine::general_purpose::STANDARD.decode(payload).ok()
}

/// Dispatches thumbnail encodes to the job scheduler
///
/// With one or more workers the encodes run on background threads. With
/// zero workers jobs only queue up, and the host runs them from its idle
/// hook through [`run_pending`](Self::run_pending).
pub struct ThumbnailGenerator {
    scheduler: Arc<JobScheduler>,
    // Dropped after the scheduler handle; dropping joins the workers
    pool: Option<WorkerPool>,
}

impl ThumbnailGenerator {
    /// Start a generator with `workers` background threads (0 = deferred)
    pub fn new(workers: usize) -> Result<Self, SchedulerError> {
        let scheduler = Arc::new(JobScheduler::new());
        let pool = if workers == 0 {
            None
        } else {
            let config = WorkerPoolConfig::new(workers).with_thread_name("history-thumbnail");
            Some(WorkerPool::new(scheduler.clone(), config)?)
        };
        Ok(Self { scheduler, pool })
    }

    /// Queue an encode for `snapshot`. `on_complete` runs on whichever
    /// thread executes the job, after the encode finishes or fails.
    pub fn schedule<F>(&self, snapshot: Snapshot, target_height: u32, on_complete: F) -> JobId
    where
        F: FnOnce(&Snapshot, Result<String, ThumbnailError>) + Send + 'static,
    {
        self.scheduler.submit(JobPriority::Idle, "thumbnail", move || {
            let result = encode_thumbnail(&snapshot, target_height);
            on_complete(&snapshot, result);
        })
    }

    /// Run queued encodes on the calling thread. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        self.scheduler.run_pending()
    }

    /// True when no encode is queued or running
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// True when encodes run on background threads
    pub fn is_background(&self) -> bool {
        self.pool.is_some()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }
}
