//! Photo Editor Scheduler Library
//!
//! Deferred job queue with priority ordering and background workers.
//!
//! Jobs are boxed closures ordered by priority (interactive, background,
//! idle) with FIFO ordering within each priority level. They are either
//! executed by a [`WorkerPool`] or drained on the calling thread with
//! [`JobScheduler::run_pending`] when the host is idle.
//!
//! # Example
//!
//! ```
//! use photo_editor_scheduler::{JobPriority, JobScheduler};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let scheduler = JobScheduler::new();
//! let ran = Arc::new(AtomicUsize::new(0));
//! let ran_clone = ran.clone();
//!
//! scheduler.submit(JobPriority::Idle, "thumbnail", move || {
//!     ran_clone.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! // Drain the queue on this thread when nothing else is going on
//! assert_eq!(scheduler.run_pending(), 1);
//! assert_eq!(ran.load(Ordering::SeqCst), 1);
//! ```

mod priority;
mod scheduler;
mod worker;

// Re-export public API
pub use priority::{Job, JobId, JobPriority, Task};
pub use scheduler::{JobScheduler, SchedulerStats};
pub use worker::{SchedulerError, WorkerPool, WorkerPoolConfig};
