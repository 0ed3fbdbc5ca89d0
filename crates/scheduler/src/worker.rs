//! Background worker pool for deferred jobs.
//!
//! Workers run on their own threads, pulling jobs from the job scheduler and
//! executing them. They never touch the caller's thread, so interactive work
//! is not blocked by whatever the jobs do.

use crate::JobScheduler;
use std::io;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Errors raised while starting a worker pool.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The OS refused to spawn a worker thread
    #[error("failed to spawn worker thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads to spawn.
    /// Default: 1, deferred work is latency-insensitive.
    pub num_workers: usize,

    /// How long an idle worker sleeps before polling the queue again.
    /// Default: 16ms (about one frame).
    pub poll_interval: Duration,

    /// Prefix for worker thread names.
    pub thread_name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 1,
            poll_interval: Duration::from_millis(16),
            thread_name: "history-worker".to_string(),
        }
    }
}

impl WorkerPoolConfig {
    /// Create a new worker pool configuration.
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Self::default()
        }
    }

    /// Set the poll interval for workers.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the thread name prefix.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Worker pool executing scheduler jobs in the background.
///
/// # Example
///
/// ```
/// use photo_editor_scheduler::{JobPriority, JobScheduler, WorkerPool, WorkerPoolConfig};
/// use std::sync::Arc;
///
/// let scheduler = Arc::new(JobScheduler::new());
/// let pool = WorkerPool::new(scheduler.clone(), WorkerPoolConfig::new(2)).unwrap();
///
/// scheduler.submit(JobPriority::Idle, "preview", || {
///     // ... encode a preview ...
/// });
///
/// // Shutdown waits for the running job, queued jobs stay queued
/// pool.shutdown();
/// ```
pub struct WorkerPool {
    workers: Vec<Worker>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Create and start a new worker pool.
    ///
    /// If any thread fails to spawn, the workers already started are
    /// stopped before the error is returned.
    pub fn new(scheduler: Arc<JobScheduler>, config: WorkerPoolConfig) -> Result<Self, SchedulerError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut pool = Self {
            workers: Vec::with_capacity(config.num_workers),
            shutdown: shutdown.clone(),
        };

        for id in 0..config.num_workers {
            let name = format!("{}-{}", config.thread_name, id);
            let worker = Worker::spawn(
                name,
                scheduler.clone(),
                shutdown.clone(),
                config.poll_interval,
            )?;
            pool.workers.push(worker);
        }

        tracing::debug!(workers = pool.workers.len(), "worker pool started");
        Ok(pool)
    }

    /// Get the number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Check if the worker pool is shutting down.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Shutdown the worker pool gracefully.
    ///
    /// Signals all workers to stop and blocks until each has finished its
    /// current job and exited.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        for worker in self.workers.drain(..) {
            worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A single worker thread in the worker pool.
struct Worker {
    name: String,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(
        name: String,
        scheduler: Arc<JobScheduler>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> Result<Self, SchedulerError> {
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::run(scheduler, shutdown, poll_interval))
            .map_err(|source| SchedulerError::Spawn {
                name: name.clone(),
                source,
            })?;

        Ok(Self {
            name,
            thread: Some(thread),
        })
    }

    /// Main worker loop.
    ///
    /// Pull a job, run it, repeat. Sleep for the poll interval when the queue
    /// is empty and check for shutdown between jobs.
    fn run(scheduler: Arc<JobScheduler>, shutdown: Arc<AtomicBool>, poll_interval: Duration) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            if let Some(job) = scheduler.next_job() {
                scheduler.execute(job);
            } else {
                thread::sleep(poll_interval);
            }
        }
    }

    fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!(worker = %self.name, "worker thread panicked");
            }
        }
    }
}
