//! Generation Queue
//!
//! In-process task queue that hands job ids to a pool of tokio workers, each of
//! which runs one `GenerationJob` at a time. Delivery is at-least-once; an id
//! that is already queued or running is not queued again.

use crate::error::ApiError;
use crate::generation::{GenerationJob, JobOutcome};
use crate::store::JobStore;
use crate::types::JobId;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Where submissions hand off their job ids.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Schedule `job_id` for generation. Returns immediately.
    async fn enqueue(&self, job_id: JobId) -> Result<(), ApiError>;
}

/// Leaves submitted jobs in the store for a later `recover_pending` pass.
///
/// The pending record is the durable queue entry; this is what the CLI uses
/// when a submission should not be processed in the same process.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferredQueue;

#[async_trait]
impl TaskQueue for DeferredQueue {
    async fn enqueue(&self, job_id: JobId) -> Result<(), ApiError> {
        debug!(job_id = %job_id, "Job deferred to next worker run");
        Ok(())
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Number of queued job ids
    pub pending: usize,
    /// Number of jobs currently running
    pub processing: usize,
    /// Jobs that ended with questions created
    pub succeeded: usize,
    /// Jobs that ran out of tries
    pub failed: usize,
    /// Missing or already finished records
    pub skipped: usize,
    /// Runs aborted by a storage error
    pub errored: usize,
}

struct QueueState {
    pending: VecDeque<JobId>,
    /// Queued or in-flight ids
    active: HashSet<JobId>,
}

/// Worker pool over a FIFO of job ids
pub struct GenerationQueue {
    state: Arc<Mutex<QueueState>>,
    /// Notifier to wake workers when new items are enqueued
    notify: Arc<Notify>,
    workers: Arc<RwLock<Vec<tokio::task::JoinHandle<()>>>>,
    worker_count: usize,
    job: Arc<GenerationJob>,
    running: Arc<RwLock<bool>>,
    stats: Arc<RwLock<QueueStats>>,
}

impl GenerationQueue {
    pub fn new(job: Arc<GenerationJob>) -> Self {
        let worker_count = job.settings().workers.max(1);
        Self {
            state: Arc::new(Mutex::new(QueueState {
                pending: VecDeque::new(),
                active: HashSet::new(),
            })),
            notify: Arc::new(Notify::new()),
            workers: Arc::new(RwLock::new(Vec::new())),
            worker_count,
            job,
            running: Arc::new(RwLock::new(false)),
            stats: Arc::new(RwLock::new(QueueStats::default())),
        }
    }

    /// Start background workers
    pub fn start(&self) -> Result<(), ApiError> {
        let mut running = self.running.write();
        if *running {
            return Ok(());
        }
        *running = true;
        drop(running);

        let mut workers = self.workers.write();
        for i in 0..self.worker_count {
            let state = Arc::clone(&self.state);
            let notify = Arc::clone(&self.notify);
            let job = Arc::clone(&self.job);
            let running = Arc::clone(&self.running);
            let stats = Arc::clone(&self.stats);

            workers.push(tokio::spawn(async move {
                Self::worker_loop(i, state, notify, job, running, stats).await;
            }));
        }

        info!(worker_count = workers.len(), "Started generation queue workers");
        Ok(())
    }

    /// Stop background workers. A job that is mid-run finishes first.
    ///
    /// Ids still queued are dropped; their records stay pending in the store
    /// for the next `recover_pending`.
    pub async fn stop(&self) -> Result<(), ApiError> {
        let was_running = std::mem::replace(&mut *self.running.write(), false);
        if was_running {
            self.notify.notify_waiters();
            let workers = std::mem::take(&mut *self.workers.write());
            for handle in workers {
                let _ = handle.await;
            }
        }

        let mut state = self.state.lock().await;
        let dropped = state.pending.len();
        state.pending.clear();
        state.active.clear();
        drop(state);
        self.stats.write().pending = 0;

        if was_running {
            info!(dropped, "Stopped generation queue workers");
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        self.stats.read().clone()
    }

    /// Wait until nothing is queued or running
    pub async fn wait_for_completion(&self, timeout: Option<Duration>) -> Result<(), ApiError> {
        let start = Instant::now();
        loop {
            let state = self.state.lock().await;
            let idle = state.active.is_empty();
            drop(state);
            if idle {
                return Ok(());
            }

            if let Some(timeout) = timeout {
                if start.elapsed() >= timeout {
                    return Err(ApiError::QueueError(
                        "Timeout waiting for queue to drain".to_string(),
                    ));
                }
            }

            sleep(Duration::from_millis(50)).await;
        }
    }

    /// Queue every record whose outcome has not been written. Used after a restart.
    pub async fn recover_pending(&self, store: &dyn JobStore) -> Result<usize, ApiError> {
        let pending = store.list_pending()?;
        let count = pending.len();
        for record in pending {
            self.enqueue(record.id).await?;
        }
        if count > 0 {
            info!(count, "Re-queued unfinished jobs");
        }
        Ok(count)
    }

    async fn worker_loop(
        worker_id: usize,
        state: Arc<Mutex<QueueState>>,
        notify: Arc<Notify>,
        job: Arc<GenerationJob>,
        running: Arc<RwLock<bool>>,
        stats: Arc<RwLock<QueueStats>>,
    ) {
        debug!(worker_id, "Worker started");

        while *running.read() {
            let next = state.lock().await.pending.pop_front();

            let Some(job_id) = next else {
                // Wake on enqueue, or periodically to observe `running`.
                tokio::select! {
                    _ = notify.notified() => continue,
                    _ = sleep(Duration::from_millis(100)) => continue,
                }
            };

            {
                let mut stats = stats.write();
                stats.pending = stats.pending.saturating_sub(1);
                stats.processing += 1;
            }
            debug!(worker_id, job_id = %job_id, "Processing job");

            let result = job.run(job_id).await;

            {
                let mut stats = stats.write();
                stats.processing = stats.processing.saturating_sub(1);
                match &result {
                    Ok(JobOutcome::Succeeded { .. }) => stats.succeeded += 1,
                    Ok(JobOutcome::Failed { .. }) => stats.failed += 1,
                    Ok(JobOutcome::MissingRecord) | Ok(JobOutcome::AlreadyTerminal { .. }) => {
                        stats.skipped += 1
                    }
                    Err(_) => stats.errored += 1,
                }
            }
            if let Err(err) = &result {
                error!(worker_id, job_id = %job_id, error = %err, "Generation job aborted");
            }

            state.lock().await.active.remove(&job_id);
        }

        debug!(worker_id, "Worker stopped");
    }
}

#[async_trait]
impl TaskQueue for GenerationQueue {
    async fn enqueue(&self, job_id: JobId) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        if !state.active.insert(job_id) {
            debug!(job_id = %job_id, "Job already queued, ignoring duplicate");
            return Ok(());
        }
        state.pending.push_back(job_id);
        let queue_size = state.pending.len();
        drop(state);

        self.stats.write().pending += 1;
        self.notify.notify_one();
        debug!(job_id = %job_id, queue_size, "Enqueued generation job");
        Ok(())
    }
}
