//! Ingest controller.
//!
//! Reacts to object store events: derives deterministic versions for new
//! content, creates asset records, and schedules transcription work. The
//! version id is a pure function of `(etag, size, mtime)`, which makes
//! every path through here idempotent — redelivered notifications and
//! restarted watchers converge on the same rows.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constants::SUPPORTED_MEDIA_EXTENSIONS;
use crate::error::{Error, Result};
use crate::ports::{JobQueue, MediaDatabase, ObjectStore};
use crate::types::{
    AssetVersion, MediaAsset, ObjectEvent, ObjectEventKind, PipelineConfig, ProcessingStatus,
    TranscriptionJob,
};

/// What an event handler did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Extension not in the supported media set; silently skipped.
    Ignored,
    /// New version recorded and a job enqueued.
    Created {
        /// Asset the version belongs to.
        asset_id: Uuid,
        /// The newly recorded version.
        version_id: String,
        /// Whether a job was actually enqueued (duplicate keys suppress).
        job_enqueued: bool,
    },
    /// The version already existed; nothing to do.
    AlreadyKnown {
        /// Asset the version belongs to.
        asset_id: Uuid,
        /// The previously recorded version.
        version_id: String,
    },
    /// Asset tombstoned and its transcript rows soft-deleted.
    Removed {
        /// The tombstoned asset.
        asset_id: Uuid,
    },
    /// Removal for a key this system never tracked.
    NotTracked,
}

/// Derive the deterministic version id for a content state.
///
/// Re-ingesting identical `(etag, size, mtime)` always yields the same id.
#[must_use]
pub fn derive_version_id(etag: &str, size: u64, mtime: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(etag.as_bytes());
    hasher.update([0x1f]);
    hasher.update(size.to_be_bytes());
    hasher.update([0x1f]);
    hasher.update(mtime.timestamp_millis().to_be_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(16).map(|b| format!("{b:02x}")).collect();
    format!("v_{hex}")
}

/// Whether a key's extension is in the supported media set.
#[must_use]
pub fn is_supported_media(key: &str) -> bool {
    key.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .is_some_and(|ext| SUPPORTED_MEDIA_EXTENSIONS.contains(&ext.as_str()))
}

/// Reacts to object events and schedules transcription work.
pub struct IngestController {
    db: Arc<dyn MediaDatabase>,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ObjectStore>,
    config: PipelineConfig,
}

impl IngestController {
    /// Wire a controller over the given ports.
    pub fn new(
        db: Arc<dyn MediaDatabase>,
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn ObjectStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            db,
            queue,
            store,
            config,
        }
    }

    /// Dispatch one event.
    ///
    /// # Errors
    ///
    /// Store unavailability propagates so the notification substrate
    /// redelivers; no partial writes are left behind.
    pub async fn handle_event(&self, event: &ObjectEvent) -> Result<IngestOutcome> {
        match event.kind {
            ObjectEventKind::Created => self.handle_created(event).await,
            ObjectEventKind::Removed => self.handle_removed(event).await,
        }
    }

    async fn handle_created(&self, event: &ObjectEvent) -> Result<IngestOutcome> {
        if !is_supported_media(&event.object_key) {
            debug!(key = %event.object_key, "unsupported extension, ignoring");
            return Ok(IngestOutcome::Ignored);
        }

        // Backfill anything the notification did not carry from the store.
        let (etag, size, mtime, content_type) = match (&event.etag, event.size) {
            (Some(etag), Some(size)) => (etag.clone(), size, event.timestamp, None),
            _ => {
                let metadata = self.store.head(&event.bucket, &event.object_key).await?;
                (
                    metadata.etag,
                    metadata.size,
                    metadata.last_modified,
                    metadata.content_type,
                )
            }
        };
        let version_id = derive_version_id(&etag, size, mtime);

        let mut asset = match self
            .db
            .get_asset_by_location(&event.bucket, &event.object_key)
            .await?
        {
            Some(existing) => existing,
            None => {
                let lineage_id = self
                    .db
                    .find_lineage(&event.bucket, &event.object_key)
                    .await?
                    .unwrap_or_else(Uuid::new_v4);
                MediaAsset::new(
                    &event.bucket,
                    &event.object_key,
                    lineage_id,
                    &etag,
                    size,
                    &self.config.ingest.default_engine,
                )
            }
        };
        asset.etag = etag.clone();
        asset.byte_size = size;
        if content_type.is_some() {
            asset.content_type = content_type;
        }
        asset.updated_at = Utc::now();

        let version = AssetVersion::new(&version_id, asset.asset_id, &etag, size);
        let newly_recorded = self.db.record_version(&asset, &version).await?;
        if !newly_recorded {
            // Redelivery. If a prior delivery recorded the version but died
            // before the enqueue, give it another job; the idempotency key
            // suppresses the attempt when one is already queued.
            let recorded = self
                .db
                .get_version(asset.asset_id, &version_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("version {version_id}")))?;
            if recorded.processing_status == ProcessingStatus::Ingested {
                let job = TranscriptionJob::new(
                    asset.asset_id,
                    &version_id,
                    self.config.ingest.engine_policy(),
                    0,
                );
                self.queue.enqueue(job).await?;
            }
            debug!(
                asset_id = %asset.asset_id,
                version_id = %version_id,
                "version already known, ingest is a no-op"
            );
            return Ok(IngestOutcome::AlreadyKnown {
                asset_id: asset.asset_id,
                version_id,
            });
        }

        let job = TranscriptionJob::new(
            asset.asset_id,
            &version_id,
            self.config.ingest.engine_policy(),
            0,
        );
        let job_enqueued = self.queue.enqueue(job).await?;
        info!(
            asset_id = %asset.asset_id,
            version_id = %version_id,
            bucket = %event.bucket,
            key = %event.object_key,
            "ingested new version"
        );
        Ok(IngestOutcome::Created {
            asset_id: asset.asset_id,
            version_id,
            job_enqueued,
        })
    }

    async fn handle_removed(&self, event: &ObjectEvent) -> Result<IngestOutcome> {
        let Some(asset) = self
            .db
            .get_asset_by_location(&event.bucket, &event.object_key)
            .await?
        else {
            warn!(
                bucket = %event.bucket,
                key = %event.object_key,
                "removal for untracked object"
            );
            return Ok(IngestOutcome::NotTracked);
        };

        self.db.tombstone_asset(asset.asset_id).await?;
        info!(asset_id = %asset.asset_id, key = %event.object_key, "asset tombstoned");
        Ok(IngestOutcome::Removed {
            asset_id: asset.asset_id,
        })
    }
}

/// Polling-based notification source for one bucket.
///
/// Keeps a process-local map of seen `(key, etag)` pairs and diffs it
/// against the current listing. The state resets on restart; previously
/// seen objects then re-emit created events, which the deterministic
/// version id absorbs downstream.
pub struct PollingWatcher {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    seen: HashMap<String, String>,
}

impl PollingWatcher {
    /// Watch one bucket.
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            seen: HashMap::new(),
        }
    }

    /// Diff the bucket against the seen set, emitting created and removed
    /// events for what changed.
    ///
    /// # Errors
    ///
    /// Propagates listing failures; the seen set is left untouched so the
    /// next poll retries the same diff.
    pub async fn poll(&mut self) -> Result<Vec<ObjectEvent>> {
        let entries = self.store.list(&self.bucket).await?;
        let now = Utc::now();
        let mut events = Vec::new();
        let mut current: HashMap<String, String> = HashMap::with_capacity(entries.len());

        for entry in entries {
            let changed = self.seen.get(&entry.key) != Some(&entry.metadata.etag);
            if changed {
                events.push(ObjectEvent {
                    kind: ObjectEventKind::Created,
                    bucket: self.bucket.clone(),
                    object_key: entry.key.clone(),
                    etag: Some(entry.metadata.etag.clone()),
                    size: Some(entry.metadata.size),
                    timestamp: entry.metadata.last_modified,
                });
            }
            current.insert(entry.key, entry.metadata.etag);
        }

        for key in self.seen.keys() {
            if !current.contains_key(key) {
                events.push(ObjectEvent {
                    kind: ObjectEventKind::Removed,
                    bucket: self.bucket.clone(),
                    object_key: key.clone(),
                    etag: None,
                    size: None,
                    timestamp: now,
                });
            }
        }

        self.seen = current;
        Ok(events)
    }
}
