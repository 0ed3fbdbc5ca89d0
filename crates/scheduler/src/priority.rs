//! Priority-based job queue
//!
//! Provides a priority queue for deferred jobs. Jobs are executed in
//! priority order, with higher priority jobs running first.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

/// Job priority levels
///
/// Higher numeric values have higher priority and are executed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    /// Runs only when nothing else is queued (thumbnails, previews)
    Idle = 0,

    /// Non-interactive work the user may be waiting on
    Background = 1,

    /// Work that must land before the next frame
    Interactive = 2,
}

/// Unique job identifier
pub type JobId = u64;

/// The unit of work carried by a job.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A scheduled job with priority
///
/// Jobs are ordered by priority (higher priority first), then by insertion order
/// (earlier jobs first) to ensure FIFO ordering within the same priority level.
pub struct Job {
    /// Unique job identifier
    pub id: JobId,

    /// Job priority level
    pub priority: JobPriority,

    /// Short name used in logs ("thumbnail", ...)
    pub name: &'static str,

    task: Task,

    /// Insertion order (used for FIFO within same priority)
    insertion_order: u64,
}

impl Job {
    /// Create a new job
    pub fn new(
        id: JobId,
        priority: JobPriority,
        name: &'static str,
        task: Task,
        insertion_order: u64,
    ) -> Self {
        Self {
            id,
            priority,
            name,
            task,
            insertion_order,
        }
    }

    /// Consume the job and run its task on the current thread.
    pub fn run(self) {
        (self.task)();
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("name", &self.name)
            .finish()
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            // BinaryHeap is a max heap, so earlier insertions must compare greater
            Ordering::Equal => other.insertion_order.cmp(&self.insertion_order),
            other => other,
        }
    }
}

/// Priority queue for jobs
///
/// Thread-safe job queue that orders jobs by priority and insertion order.
pub struct PriorityQueue {
    state: Mutex<QueueState>,
}

struct QueueState {
    heap: BinaryHeap<Job>,
    next_job_id: JobId,
    insertion_counter: u64,
}

impl PriorityQueue {
    /// Create a new empty priority queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_job_id: 1,
                insertion_counter: 0,
            }),
        }
    }

    /// Push a task onto the queue and return its assigned job ID.
    pub fn push(&self, priority: JobPriority, name: &'static str, task: Task) -> JobId {
        let mut state = self.state.lock();
        let job_id = state.next_job_id;
        state.next_job_id += 1;

        let insertion_order = state.insertion_counter;
        state.insertion_counter += 1;

        state
            .heap
            .push(Job::new(job_id, priority, name, task, insertion_order));

        job_id
    }

    /// Pop the highest priority job, or `None` if the queue is empty.
    pub fn pop(&self) -> Option<Job> {
        self.state.lock().heap.pop()
    }

    /// Get the number of jobs in the queue
    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.state.lock().heap.is_empty()
    }

    /// Drop all queued jobs without running them. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.heap.len();
        state.heap.clear();
        dropped
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}
