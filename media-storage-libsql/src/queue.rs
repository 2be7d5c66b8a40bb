//! Persistent job queue over the `transcription_jobs` table.
//!
//! Lease-based at-least-once delivery: a dequeue stamps `leased_until`,
//! an ack deletes the row, a nack clears the lease. Expired leases make
//! the job deliverable again, so a crashed worker cannot strand work.
//! Idempotency-key uniqueness turns duplicate enqueues into no-ops.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{params, Connection};
use tracing::debug;
use uuid::Uuid;

use media_core::error::{Error, Result};
use media_core::ports::JobQueue;
use media_core::types::{EnginePolicy, TranscriptionJob};

use crate::storage::{from_i64, from_ms, parse_uuid, storage_err};

/// Default worker lease before a delivered job becomes redeliverable.
const DEFAULT_LEASE: Duration = Duration::from_secs(15 * 60);

/// Durable [`JobQueue`] sharing a libSQL database with [`crate::LibsqlDatabase`].
#[derive(Clone)]
pub struct LibsqlQueue {
    conn: Connection,
    lease: Duration,
}

impl LibsqlQueue {
    /// Wrap a connection whose database already carries the schema.
    #[must_use]
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            lease: DEFAULT_LEASE,
        }
    }

    /// Override the delivery lease; mainly for tests.
    #[must_use]
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    async fn insert(&self, job: &TranscriptionJob, scheduled_at_ms: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                r#"
                INSERT OR IGNORE INTO transcription_jobs (
                    job_id, asset_id, version_id, engine_policy, attempt,
                    idempotency_key, enqueued_at, scheduled_at, leased_until
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)
                "#,
                params![
                    job.job_id.to_string(),
                    job.asset_id.to_string(),
                    job.version_id.clone(),
                    serde_json::to_string(&job.engine_policy).map_err(Error::Serialization)?,
                    i64::from(job.attempt),
                    job.idempotency_key.clone(),
                    job.enqueued_at.timestamp_millis(),
                    scheduled_at_ms,
                ],
            )
            .await
            .map_err(storage_err)?;
        if changed == 0 {
            debug!(key = %job.idempotency_key, "duplicate enqueue suppressed");
        }
        Ok(changed > 0)
    }
}

#[async_trait]
impl JobQueue for LibsqlQueue {
    async fn enqueue(&self, job: TranscriptionJob) -> Result<bool> {
        let now = Utc::now().timestamp_millis();
        self.insert(&job, now).await
    }

    async fn enqueue_delayed(&self, job: TranscriptionJob, delay: Duration) -> Result<bool> {
        let due = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        self.insert(&job, due.timestamp_millis()).await
    }

    async fn dequeue(&self) -> Result<Option<TranscriptionJob>> {
        let now = Utc::now().timestamp_millis();
        let mut rows = self
            .conn
            .query(
                "SELECT job_id, asset_id, version_id, engine_policy, attempt, \
                 idempotency_key, enqueued_at, scheduled_at FROM transcription_jobs \
                 WHERE scheduled_at <= ?1 AND (leased_until IS NULL OR leased_until < ?1) \
                 ORDER BY scheduled_at LIMIT 1",
                params![now],
            )
            .await
            .map_err(storage_err)?;
        let Some(row) = rows.next().await.map_err(storage_err)? else {
            return Ok(None);
        };

        let job_id: String = row.get(0).map_err(storage_err)?;
        let asset_id: String = row.get(1).map_err(storage_err)?;
        let version_id: String = row.get(2).map_err(storage_err)?;
        let policy_json: String = row.get(3).map_err(storage_err)?;
        let attempt: i64 = row.get(4).map_err(storage_err)?;
        let idempotency_key: String = row.get(5).map_err(storage_err)?;
        let enqueued_at: i64 = row.get(6).map_err(storage_err)?;
        let scheduled_at: i64 = row.get(7).map_err(storage_err)?;

        let engine_policy: EnginePolicy =
            serde_json::from_str(&policy_json).map_err(Error::Serialization)?;
        let job = TranscriptionJob {
            job_id: parse_uuid(&job_id)?,
            asset_id: parse_uuid(&asset_id)?,
            version_id,
            engine_policy,
            attempt: u32::try_from(attempt).unwrap_or(0),
            idempotency_key,
            enqueued_at: from_ms(enqueued_at),
            scheduled_at: from_ms(scheduled_at),
        };

        let lease_ms = i64::try_from(self.lease.as_millis()).unwrap_or(i64::MAX);
        self.conn
            .execute(
                "UPDATE transcription_jobs SET leased_until = ? WHERE job_id = ?",
                params![now.saturating_add(lease_ms), job.job_id.to_string()],
            )
            .await
            .map_err(storage_err)?;
        Ok(Some(job))
    }

    async fn ack(&self, job_id: Uuid) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM transcription_jobs WHERE job_id = ?",
                params![job_id.to_string()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn nack(&self, job_id: Uuid) -> Result<()> {
        self.conn
            .execute(
                "UPDATE transcription_jobs SET leased_until = NULL WHERE job_id = ?",
                params![job_id.to_string()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn pending(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM transcription_jobs", ())
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => {
                let count: i64 = row.get(0).map_err(storage_err)?;
                Ok(usize::try_from(count).unwrap_or(0))
            }
            None => Ok(0),
        }
    }

    async fn next_due_in(&self) -> Result<Option<Duration>> {
        let now = Utc::now().timestamp_millis();
        let mut rows = self
            .conn
            .query(
                "SELECT MIN(scheduled_at) FROM transcription_jobs \
                 WHERE leased_until IS NULL OR leased_until < ?",
                params![now],
            )
            .await
            .map_err(storage_err)?;
        let Some(row) = rows.next().await.map_err(storage_err)? else {
            return Ok(None);
        };
        let earliest: Option<i64> = row.get(0).ok();
        Ok(earliest.map(|scheduled_at| {
            let wait_ms = scheduled_at.saturating_sub(now).max(0);
            Duration::from_millis(from_i64(wait_ms))
        }))
    }
}
