//! Job scheduler implementation
//!
//! Provides a high-level job scheduler that manages job submission,
//! priority-based execution ordering, and job lifecycle.

use crate::priority::{Job, JobId, JobPriority, PriorityQueue};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};

/// Job scheduler statistics
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Total jobs submitted
    pub jobs_submitted: u64,

    /// Total jobs that ran to completion
    pub jobs_completed: u64,

    /// Total jobs whose task panicked
    pub jobs_failed: u64,

    /// Total jobs dropped from the queue without running
    pub jobs_discarded: u64,

    /// Jobs handed to a worker and not yet finished
    pub jobs_running: usize,

    /// Current queue size
    pub queue_size: usize,
}

impl SchedulerStats {
    /// Number of jobs that are queued or running
    pub fn pending_jobs(&self) -> u64 {
        self.jobs_submitted
            .saturating_sub(self.jobs_completed)
            .saturating_sub(self.jobs_failed)
            .saturating_sub(self.jobs_discarded)
    }
}

/// Job scheduler with priority queue
///
/// Thread-safe scheduler that manages job submission and execution ordering.
/// Submitted jobs cannot be cancelled. A job that outlives the state it was
/// created for has to detect that itself when it runs.
///
/// # Example
///
/// ```
/// use photo_editor_scheduler::{JobPriority, JobScheduler};
///
/// let scheduler = JobScheduler::new();
/// let job_id = scheduler.submit(JobPriority::Idle, "noop", || {});
///
/// if let Some(job) = scheduler.next_job() {
///     assert_eq!(job.id, job_id);
///     scheduler.execute(job);
/// }
/// assert!(scheduler.is_idle());
/// ```
pub struct JobScheduler {
    queue: PriorityQueue,
    state: Mutex<SchedulerStats>,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            state: Mutex::new(SchedulerStats::default()),
        }
    }

    /// Submit a task to the scheduler
    ///
    /// The task is queued according to its priority and runs when a worker
    /// (or [`run_pending`](Self::run_pending)) picks it up.
    pub fn submit<F>(&self, priority: JobPriority, name: &'static str, task: F) -> JobId
    where
        F: FnOnce() + Send + 'static,
    {
        // Counted before the push so a worker can never complete it first
        self.state.lock().jobs_submitted += 1;
        let job_id = self.queue.push(priority, name, Box::new(task));
        tracing::trace!(job_id, name, ?priority, "job submitted");
        job_id
    }

    /// Take the next job to execute
    ///
    /// The job counts as running until [`complete_job`](Self::complete_job)
    /// or [`fail_job`](Self::fail_job) is called for it.
    pub fn next_job(&self) -> Option<Job> {
        // Pop under the stats lock so `is_idle` never sees an empty queue
        // with the job not yet counted as running
        let mut state = self.state.lock();
        let job = self.queue.pop()?;
        state.jobs_running += 1;
        Some(job)
    }

    /// Mark a job as completed
    pub fn complete_job(&self, job_id: JobId) {
        let mut state = self.state.lock();
        state.jobs_completed += 1;
        state.jobs_running = state.jobs_running.saturating_sub(1);
        drop(state);

        tracing::trace!(job_id, "job completed");
    }

    /// Mark a job as failed (its task panicked)
    pub fn fail_job(&self, job_id: JobId) {
        let mut state = self.state.lock();
        state.jobs_failed += 1;
        state.jobs_running = state.jobs_running.saturating_sub(1);
        drop(state);

        tracing::warn!(job_id, "job panicked");
    }

    /// Run a job taken from [`next_job`](Self::next_job) on this thread
    ///
    /// A panicking task is caught and recorded as a failed job.
    pub fn execute(&self, job: Job) {
        let job_id = job.id;
        match panic::catch_unwind(AssertUnwindSafe(move || job.run())) {
            Ok(()) => self.complete_job(job_id),
            Err(_) => self.fail_job(job_id),
        }
    }

    /// Drain the queue on the calling thread
    ///
    /// Intended for hosts that run deferred work from their own idle hook
    /// instead of a worker pool. Jobs submitted while draining also run.
    /// Returns the number of jobs executed.
    pub fn run_pending(&self) -> usize {
        let mut executed = 0;
        while let Some(job) = self.next_job() {
            self.execute(job);
            executed += 1;
        }
        executed
    }

    /// Get the current number of queued jobs
    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    /// Check if the scheduler has any queued jobs
    pub fn has_pending_jobs(&self) -> bool {
        !self.queue.is_empty()
    }

    /// True when nothing is queued and nothing is running
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.state.lock().jobs_running == 0
    }

    /// Drop all queued jobs without running them
    pub fn clear(&self) -> usize {
        let discarded = self.queue.clear();
        if discarded > 0 {
            self.state.lock().jobs_discarded += discarded as u64;
            tracing::debug!(discarded, "discarded queued jobs");
        }
        discarded
    }

    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        let mut stats = self.state.lock().clone();
        stats.queue_size = self.queue.len();
        stats
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_scheduler_basic() {
        let scheduler = JobScheduler::new();

        assert_eq!(scheduler.pending_jobs(), 0);
        assert!(!scheduler.has_pending_jobs());

        let job_id = scheduler.submit(JobPriority::Idle, "test", || {});

        assert_eq!(scheduler.pending_jobs(), 1);
        assert!(scheduler.has_pending_jobs());

        let job = scheduler.next_job().unwrap();
        assert_eq!(job.id, job_id);
        assert!(!scheduler.is_idle());

        scheduler.execute(job);

        let stats = scheduler.stats();
        assert_eq!(stats.jobs_submitted, 1);
        assert_eq!(stats.jobs_completed, 1);
        assert_eq!(stats.jobs_running, 0);
        assert_eq!(stats.pending_jobs(), 0);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_scheduler_priority_ordering() {
        let scheduler = JobScheduler::new();

        scheduler.submit(JobPriority::Idle, "idle", || {});
        scheduler.submit(JobPriority::Background, "background", || {});
        scheduler.submit(JobPriority::Interactive, "interactive", || {});

        assert_eq!(
            scheduler.next_job().unwrap().priority,
            JobPriority::Interactive
        );
        assert_eq!(
            scheduler.next_job().unwrap().priority,
            JobPriority::Background
        );
        assert_eq!(scheduler.next_job().unwrap().priority, JobPriority::Idle);
        assert!(scheduler.next_job().is_none());
    }

    #[test]
    fn test_run_pending_executes_in_order() {
        let scheduler = JobScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (priority, tag) in [
            (JobPriority::Idle, 3),
            (JobPriority::Interactive, 1),
            (JobPriority::Background, 2),
        ] {
            let order = order.clone();
            scheduler.submit(priority, "ordered", move || order.lock().push(tag));
        }

        assert_eq!(scheduler.run_pending(), 3);
        assert_eq!(*order.lock(), vec![1, 2, 3]);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_run_pending_includes_jobs_submitted_while_draining() {
        let scheduler = Arc::new(JobScheduler::new());
        let inner = scheduler.clone();
        scheduler.submit(JobPriority::Idle, "outer", move || {
            inner.submit(JobPriority::Idle, "inner", || {});
        });

        assert_eq!(scheduler.run_pending(), 2);
        assert_eq!(scheduler.stats().jobs_completed, 2);
    }

    #[test]
    fn test_panicking_job_is_contained() {
        let scheduler = JobScheduler::new();
        scheduler.submit(JobPriority::Idle, "boom", || panic!("encode failed"));
        scheduler.submit(JobPriority::Idle, "fine", || {});

        assert_eq!(scheduler.run_pending(), 2);

        let stats = scheduler.stats();
        assert_eq!(stats.jobs_failed, 1);
        assert_eq!(stats.jobs_completed, 1);
        assert_eq!(stats.pending_jobs(), 0);
    }

    #[test]
    fn test_clear_discards_queued_jobs() {
        let scheduler = JobScheduler::new();
        scheduler.submit(JobPriority::Idle, "a", || {});
        scheduler.submit(JobPriority::Idle, "b", || {});

        assert_eq!(scheduler.clear(), 2);
        assert!(!scheduler.has_pending_jobs());

        let stats = scheduler.stats();
        assert_eq!(stats.jobs_discarded, 2);
        assert_eq!(stats.pending_jobs(), 0);
    }

    #[test]
    fn test_pending_jobs_never_underflows() {
        let stats = SchedulerStats {
            jobs_submitted: 1,
            jobs_completed: 2,
            ..SchedulerStats::default()
        };
        assert_eq!(stats.pending_jobs(), 0);
    }

    #[test]
    fn test_submit_counts_before_job_is_visible() {
        let scheduler = JobScheduler::new();
        scheduler.submit(JobPriority::Idle, "a", || {});

        let job = scheduler.next_job().unwrap();
        let stats = scheduler.stats();
        assert_eq!(stats.jobs_submitted, 1);
        assert_eq!(stats.jobs_running, 1);
        assert_eq!(stats.pending_jobs(), 1);
        assert!(!scheduler.is_idle());

        scheduler.execute(job);
        assert_eq!(scheduler.stats().pending_jobs(), 0);
    }
}
