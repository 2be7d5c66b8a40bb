//! Retry and quarantine management.
//!
//! Classifies failures deterministically, schedules exponential-backoff
//! retries as fresh jobs, and parks terminal failures on the dead-letter
//! queue with an operator-facing triage classification.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ports::{JobQueue, MediaDatabase};
use crate::types::{AssetStatus, DlqItem, RetryConfig, TranscriptionJob, TriageState};

/// Failure classes recorded on dead-letter items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Codec problems, corruption, unsupported containers.
    MediaFormat,
    /// Model not found, invalid engine parameters.
    EngineConfig,
    /// Permission denied, quota exhausted without retry-after.
    PermanentDownstream,
    /// Timeouts, connection resets, rate limiting, unavailability.
    TransientNetwork,
    /// Engine busy, temporary compute exhaustion.
    TransientResource,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MediaFormat => "media_format",
            Self::EngineConfig => "engine_config",
            Self::PermanentDownstream => "permanent_downstream",
            Self::TransientNetwork => "transient_network",
            Self::TransientResource => "transient_resource",
        };
        write!(f, "{s}")
    }
}

/// Outcome of classifying one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// The failure class.
    pub kind: FailureKind,
    /// Whether the class is retryable at all.
    pub retryable: bool,
}

/// Deterministically classify a pipeline error.
#[must_use]
pub fn classify(error: &Error) -> Classification {
    match error {
        Error::MediaFormat(_) => Classification {
            kind: FailureKind::MediaFormat,
            retryable: false,
        },
        Error::EngineConfig(_) | Error::Serialization(_) => Classification {
            kind: FailureKind::EngineConfig,
            retryable: false,
        },
        Error::TransientResource(_) => Classification {
            kind: FailureKind::TransientResource,
            retryable: true,
        },
        Error::TransientNetwork(_) | Error::Timeout(_) | Error::Storage(_) | Error::Io(_) => {
            Classification {
                kind: FailureKind::TransientNetwork,
                retryable: true,
            }
        }
        Error::NotFound(_)
        | Error::AlreadyExists(_)
        | Error::PermanentDownstream(_)
        | Error::InvalidInput(_)
        | Error::Configuration(_)
        | Error::Internal(_) => Classification {
            kind: FailureKind::PermanentDownstream,
            retryable: false,
        },
    }
}

/// Map an external engine failure into the error taxonomy.
///
/// Engines report either a structured code or a bare message; the code wins
/// when present, otherwise a substring table over the message decides.
/// Adapters call this at the failure site so classification stays in one
/// place.
#[must_use]
pub fn classify_external(code: Option<&str>, message: &str) -> Error {
    let probe = code.unwrap_or(message).to_lowercase();
    let message = message.to_string();

    const MEDIA_FORMAT: &[&str] = &["codec", "corrupt", "unsupported", "undecodable"];
    const ENGINE_CONFIG: &[&str] = &["model not found", "invalid parameter", "bad model"];
    const TRANSIENT_RESOURCE: &[&str] = &["busy", "gpu", "overloaded", "capacity"];
    const TRANSIENT_NETWORK: &[&str] = &[
        "timeout",
        "timed out",
        "connection reset",
        "rate limit",
        "unavailable",
        "429",
        "503",
    ];
    const PERMANENT: &[&str] = &["permission denied", "forbidden", "quota", "unauthorized"];

    let matches = |needles: &[&str]| needles.iter().any(|needle| probe.contains(needle));

    if matches(MEDIA_FORMAT) {
        Error::MediaFormat(message)
    } else if matches(ENGINE_CONFIG) {
        Error::EngineConfig(message)
    } else if matches(PERMANENT) {
        Error::PermanentDownstream(message)
    } else if matches(TRANSIENT_RESOURCE) {
        Error::TransientResource(message)
    } else if matches(TRANSIENT_NETWORK) {
        Error::TransientNetwork(message)
    } else {
        // Unrecognized engine failures quarantine rather than spin.
        Error::PermanentDownstream(message)
    }
}

/// Operator guidance for a quarantined asset.
#[must_use]
pub fn triage_for(kind: FailureKind) -> (TriageState, &'static str) {
    match kind {
        FailureKind::MediaFormat => (
            TriageState::NeedsMediaFix,
            "Re-encode with supported codec or repair corruption",
        ),
        FailureKind::EngineConfig => (
            TriageState::NeedsEngineTuning,
            "Review engine configuration or choose alternative engine",
        ),
        FailureKind::PermanentDownstream => {
            (TriageState::Quarantined, "Manual investigation required")
        }
        FailureKind::TransientNetwork | FailureKind::TransientResource => (
            TriageState::Quarantined,
            "Manual investigation - retries exhausted",
        ),
    }
}

/// Backoff delay before retry number `attempt + 1`.
///
/// `min(base * 2^attempt, max)` with ±`jitter_factor` uniform jitter.
#[must_use]
pub fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exp_delay = config
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt));
    let delay = std::cmp::min(exp_delay, config.max_delay);

    if config.jitter_factor > 0.0 {
        #[allow(clippy::cast_precision_loss)]
        let jitter_range = delay.as_millis() as f64 * config.jitter_factor;
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
        #[allow(clippy::cast_precision_loss)]
        let adjusted_ms = (delay.as_millis() as f64 + jitter).max(0.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_ms = adjusted_ms as u64;
        Duration::from_millis(adjusted_ms)
    } else {
        delay
    }
}

/// What the manager did with a failed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDisposition {
    /// A fresh job with an incremented attempt was scheduled.
    Retried {
        /// Attempt number of the new job.
        attempt: u32,
        /// Delay before it becomes due.
        delay: Duration,
    },
    /// The failure was terminal; the job is parked for triage.
    Quarantined {
        /// Dead-letter entry holding the job snapshot.
        dlq_id: Uuid,
    },
}

/// Decides retry versus dead-letter for failed jobs and exposes the
/// operator triage actions.
pub struct RetryManager {
    db: Arc<dyn MediaDatabase>,
    queue: Arc<dyn JobQueue>,
    config: RetryConfig,
}

impl RetryManager {
    /// Wire a manager over the database and queue ports.
    pub fn new(db: Arc<dyn MediaDatabase>, queue: Arc<dyn JobQueue>, config: RetryConfig) -> Self {
        Self { db, queue, config }
    }

    /// Handle one failed job: schedule a delayed retry or park it.
    ///
    /// The caller still acks the original delivery; retries are new jobs
    /// with fresh idempotency keys.
    pub async fn handle_failure(
        &self,
        job: &TranscriptionJob,
        failure: &Error,
    ) -> Result<FailureDisposition> {
        let classification = classify(failure);
        let mut asset = self
            .db
            .get_asset(job.asset_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("asset {}", job.asset_id)))?;

        asset.last_error = Some(failure.to_string());
        asset.attempt_count = job.attempt + 1;
        asset.updated_at = Utc::now();

        if classification.retryable && job.attempt + 1 < self.config.max_attempts {
            let delay = backoff_delay(job.attempt, &self.config);
            let retry = TranscriptionJob::new(
                job.asset_id,
                &job.version_id,
                job.engine_policy.clone(),
                job.attempt + 1,
            );
            self.queue.enqueue_delayed(retry, delay).await?;

            asset.status = AssetStatus::PendingRetry;
            self.db.upsert_asset(&asset).await?;

            warn!(
                asset_id = %job.asset_id,
                version_id = %job.version_id,
                attempt = job.attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "transcription failed, retry scheduled"
            );
            return Ok(FailureDisposition::Retried {
                attempt: job.attempt + 1,
                delay,
            });
        }

        let (triage_state, recommended_action) = triage_for(classification.kind);
        let mut log_trail = Vec::new();
        if job.attempt > 0 {
            log_trail.push(format!("{} earlier attempts failed retryably", job.attempt));
        }
        log_trail.push(format!("attempt {}: {failure}", job.attempt));

        let item = DlqItem {
            dlq_id: Uuid::new_v4(),
            job: job.clone(),
            asset_id: job.asset_id,
            version_id: job.version_id.clone(),
            error_kind: classification.kind.to_string(),
            error_message: failure.to_string(),
            retryable: classification.retryable,
            log_trail,
            created_at: Utc::now(),
        };
        self.db.add_dlq_item(&item).await?;

        asset.status = AssetStatus::Quarantined;
        asset.triage_state = Some(triage_state);
        asset.recommended_action = Some(recommended_action.to_string());
        self.db.upsert_asset(&asset).await?;

        error!(
            asset_id = %job.asset_id,
            version_id = %job.version_id,
            kind = %classification.kind,
            triage = %triage_state,
            error = %failure,
            "transcription quarantined"
        );
        Ok(FailureDisposition::Quarantined {
            dlq_id: item.dlq_id,
        })
    }

    /// Operator action: give a quarantined asset a fresh attempt budget.
    ///
    /// Creates an attempt-0 job with a new idempotency key suffix so the
    /// original key does not suppress it, clears the triage fields, and
    /// moves the asset to pending-retry.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] when the asset is not quarantined.
    pub async fn triage_retry(&self, asset_id: Uuid) -> Result<TranscriptionJob> {
        let mut asset = self
            .db
            .get_asset(asset_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("asset {asset_id}")))?;
        if asset.status != AssetStatus::Quarantined {
            return Err(Error::InvalidInput(format!(
                "asset {asset_id} is {}, not quarantined",
                asset.status
            )));
        }

        let parked = self.db.list_dlq_items_for_asset(asset_id).await?;
        let (version_id, policy) = match parked.first() {
            Some(item) => (item.version_id.clone(), item.job.engine_policy.clone()),
            None => {
                let versions = self.db.list_versions(asset_id).await?;
                let latest = versions
                    .first()
                    .ok_or_else(|| Error::NotFound(format!("versions of asset {asset_id}")))?;
                (
                    latest.version_id.clone(),
                    crate::types::IngestConfig::default().engine_policy(),
                )
            }
        };

        let mut job = TranscriptionJob::new(asset_id, &version_id, policy, 0);
        let suffix = Uuid::new_v4().simple().to_string();
        job.idempotency_key = format!("{}:r{}", job.idempotency_key, &suffix[..8]);
        self.queue.enqueue(job.clone()).await?;

        asset.status = AssetStatus::PendingRetry;
        asset.triage_state = None;
        asset.recommended_action = None;
        asset.last_error = None;
        asset.attempt_count = 0;
        asset.updated_at = Utc::now();
        self.db.upsert_asset(&asset).await?;

        Ok(job)
    }

    /// Operator action: give up on a quarantined asset.
    ///
    /// Marks the asset failed, keeps the last error for the record, and
    /// removes its dead-letter entries.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] when the asset is not quarantined.
    pub async fn triage_skip(&self, asset_id: Uuid) -> Result<()> {
        let mut asset = self
            .db
            .get_asset(asset_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("asset {asset_id}")))?;
        if asset.status != AssetStatus::Quarantined {
            return Err(Error::InvalidInput(format!(
                "asset {asset_id} is {}, not quarantined",
                asset.status
            )));
        }

        asset.status = AssetStatus::Failed;
        asset.triage_state = None;
        asset.recommended_action = None;
        asset.updated_at = Utc::now();
        self.db.upsert_asset(&asset).await?;
        self.db.remove_dlq_for_asset(asset_id).await?;
        Ok(())
    }
}
