//! In-memory delayed-delivery job queue.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::ports::JobQueue;
use crate::types::TranscriptionJob;

#[derive(Default)]
struct QueueInner {
    ready: VecDeque<TranscriptionJob>,
    delayed: Vec<TranscriptionJob>,
    in_flight: HashMap<Uuid, TranscriptionJob>,
    seen_keys: HashSet<String>,
}

impl QueueInner {
    /// Promote delayed jobs whose schedule has arrived.
    fn promote_due(&mut self) {
        let now = Utc::now();
        let mut still_delayed = Vec::with_capacity(self.delayed.len());
        let mut due: Vec<TranscriptionJob> = Vec::new();
        for job in self.delayed.drain(..) {
            if job.scheduled_at <= now {
                due.push(job);
            } else {
                still_delayed.push(job);
            }
        }
        due.sort_by_key(|job| job.scheduled_at);
        self.ready.extend(due);
        self.delayed = still_delayed;
    }
}

/// In-memory [`JobQueue`] with at-least-once lease semantics.
///
/// Jobs sit in one of three places: ready, delayed (not yet due), or in
/// flight (leased, awaiting ack/nack). Idempotency keys are remembered for
/// the queue's lifetime so duplicate enqueues are no-ops.
#[derive(Default)]
pub struct MemoryQueue {
    inner: Mutex<QueueInner>,
}

impl MemoryQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of jobs waiting on a delivery delay, for assertions on
    /// scheduling behavior.
    #[must_use]
    pub fn delayed_jobs(&self) -> Vec<TranscriptionJob> {
        self.inner.lock().delayed.clone()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: TranscriptionJob) -> Result<bool> {
        let mut inner = self.inner.lock();
        if !inner.seen_keys.insert(job.idempotency_key.clone()) {
            debug!(key = %job.idempotency_key, "duplicate enqueue suppressed");
            return Ok(false);
        }
        inner.ready.push_back(job);
        Ok(true)
    }

    async fn enqueue_delayed(&self, mut job: TranscriptionJob, delay: Duration) -> Result<bool> {
        let mut inner = self.inner.lock();
        if !inner.seen_keys.insert(job.idempotency_key.clone()) {
            debug!(key = %job.idempotency_key, "duplicate delayed enqueue suppressed");
            return Ok(false);
        }
        job.scheduled_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        inner.delayed.push(job);
        Ok(true)
    }

    async fn dequeue(&self) -> Result<Option<TranscriptionJob>> {
        let mut inner = self.inner.lock();
        inner.promote_due();
        let Some(job) = inner.ready.pop_front() else {
            return Ok(None);
        };
        inner.in_flight.insert(job.job_id, job.clone());
        Ok(Some(job))
    }

    async fn ack(&self, job_id: Uuid) -> Result<()> {
        self.inner.lock().in_flight.remove(&job_id);
        Ok(())
    }

    async fn nack(&self, job_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(job) = inner.in_flight.remove(&job_id) {
            inner.ready.push_back(job);
        }
        Ok(())
    }

    async fn pending(&self) -> Result<usize> {
        let inner = self.inner.lock();
        Ok(inner.ready.len() + inner.delayed.len() + inner.in_flight.len())
    }

    async fn next_due_in(&self) -> Result<Option<Duration>> {
        let mut inner = self.inner.lock();
        inner.promote_due();
        if !inner.ready.is_empty() {
            return Ok(Some(Duration::ZERO));
        }
        let now = Utc::now();
        Ok(inner
            .delayed
            .iter()
            .map(|job| {
                (job.scheduled_at - now)
                    .to_std()
                    .unwrap_or(Duration::ZERO)
            })
            .min())
    }
}
