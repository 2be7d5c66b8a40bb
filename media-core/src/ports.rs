//! # Port Abstractions
//!
//! Behavioral contracts the pipeline consumes. Concrete backends (object
//! stores, queue substrates, database engines, recognition engines,
//! embedding models) implement these traits; the core never names an
//! implementation. In-process reference adapters live in
//! [`crate::adapters`], a durable database adapter in the
//! `media-storage-libsql` crate.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    AsrCapabilities, AssetStatus, AssetVersion, DlqItem, MediaAsset, ObjectEntry, ObjectMetadata,
    PublishState, SearchFilter, SegmentHit, TranscribeOptions, TranscriptEmbedding,
    TranscriptOutput, TranscriptSegment, TranscriptionJob, Visibility,
};

/// S3-like object storage.
///
/// Reads are independent and need no locking. Notification is polling-based
/// in this codebase (see `ingest::PollingWatcher`); a push-capable adapter
/// may translate its events into [`crate::types::ObjectEvent`]s directly.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full object body.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Fetch authoritative object metadata.
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMetadata>;

    /// Whether the object exists.
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool>;

    /// List all objects in a bucket.
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectEntry>>;

    /// Store an object body.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()>;

    /// Remove an object.
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Produce a time-limited access URL.
    async fn presign_url(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String>;
}

/// Delayed-delivery FIFO with ack/nack semantics and at-least-once delivery.
///
/// Delivery order is not guaranteed; duplicate suppression relies on the
/// job's idempotency key. Dead-lettering is persisted through
/// [`MediaDatabase`] by the retry manager, not by the queue itself.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job for immediate delivery.
    ///
    /// Returns `false` when a job with the same idempotency key was already
    /// enqueued (the call is a no-op).
    async fn enqueue(&self, job: TranscriptionJob) -> Result<bool>;

    /// Enqueue a job for delivery no earlier than `delay` from now.
    ///
    /// Returns `false` on idempotency-key suppression, as [`Self::enqueue`].
    async fn enqueue_delayed(&self, job: TranscriptionJob, delay: Duration) -> Result<bool>;

    /// Lease the next due job, if any.
    ///
    /// The job stays in flight until [`Self::ack`] or [`Self::nack`].
    async fn dequeue(&self) -> Result<Option<TranscriptionJob>>;

    /// Acknowledge a delivered job, removing it permanently.
    async fn ack(&self, job_id: Uuid) -> Result<()>;

    /// Return a delivered job to pending for redelivery.
    async fn nack(&self, job_id: Uuid) -> Result<()>;

    /// Jobs not yet acknowledged (ready, delayed, and in flight).
    async fn pending(&self) -> Result<usize>;

    /// Time until the next delayed job becomes due.
    ///
    /// `Some(Duration::ZERO)` when a job is ready now; `None` when nothing
    /// is ready or scheduled.
    async fn next_due_in(&self) -> Result<Option<Duration>>;
}

/// Transactional metadata and transcript storage.
///
/// Every method is atomic: implementations enclose multi-row mutations
/// (`record_version`, `tombstone_asset`, `set_version_visibility`,
/// `replace_*`) in a transaction or an equivalent scheme. Upserts are
/// idempotent under the uniqueness keys of the data model.
///
/// The search primitives already enforce the reader filters: only
/// `Active` rows of an asset's current version, never tombstoned assets.
#[async_trait]
pub trait MediaDatabase: Send + Sync {
    // ========== Assets ==========

    /// Insert or replace an asset row.
    async fn upsert_asset(&self, asset: &MediaAsset) -> Result<()>;

    /// Fetch an asset by id.
    async fn get_asset(&self, asset_id: Uuid) -> Result<Option<MediaAsset>>;

    /// Fetch the non-tombstoned asset at a location, if any.
    async fn get_asset_by_location(&self, bucket: &str, key: &str) -> Result<Option<MediaAsset>>;

    /// Lineage id of the most recently tombstoned asset at a location.
    async fn find_lineage(&self, bucket: &str, key: &str) -> Result<Option<Uuid>>;

    /// All assets currently in a given status.
    async fn list_assets_by_status(&self, status: AssetStatus) -> Result<Vec<MediaAsset>>;

    // ========== Versions ==========

    /// Atomically upsert the asset row and create the version if absent.
    ///
    /// Returns `false` when the version already existed (idempotent
    /// re-ingest); the asset row is still refreshed.
    async fn record_version(&self, asset: &MediaAsset, version: &AssetVersion) -> Result<bool>;

    /// Fetch one version of an asset.
    async fn get_version(&self, asset_id: Uuid, version_id: &str)
    -> Result<Option<AssetVersion>>;

    /// All versions of an asset, newest first.
    async fn list_versions(&self, asset_id: Uuid) -> Result<Vec<AssetVersion>>;

    /// Replace a version row (status or publish-state change).
    async fn update_version(&self, version: &AssetVersion) -> Result<()>;

    /// Atomically set a version's publish state and the visibility of all
    /// its segments and embeddings.
    async fn set_version_visibility(
        &self,
        asset_id: Uuid,
        version_id: &str,
        publish_state: PublishState,
        visibility: Visibility,
    ) -> Result<()>;

    /// Point the asset at a new current version (or clear it).
    async fn set_current_version(&self, asset_id: Uuid, version_id: Option<&str>) -> Result<()>;

    // ========== Transcript rows ==========

    /// Replace the full segment set of a version.
    ///
    /// Keyed by `(asset_id, version_id)`; re-running a version converges on
    /// an identical set.
    async fn replace_segments(
        &self,
        asset_id: Uuid,
        version_id: &str,
        segments: &[TranscriptSegment],
    ) -> Result<()>;

    /// Replace the full embedding set of a version.
    async fn replace_embeddings(
        &self,
        asset_id: Uuid,
        version_id: &str,
        embeddings: &[TranscriptEmbedding],
    ) -> Result<()>;

    /// All segments of a version.
    async fn list_segments(
        &self,
        asset_id: Uuid,
        version_id: &str,
    ) -> Result<Vec<TranscriptSegment>>;

    /// All embeddings of a version.
    async fn list_embeddings(
        &self,
        asset_id: Uuid,
        version_id: &str,
    ) -> Result<Vec<TranscriptEmbedding>>;

    // ========== Lifecycle composites ==========

    /// Tombstone an asset: clear its current-version pointer, mark it
    /// deleted, and soft-delete all of its segments and embeddings, in one
    /// atomic step.
    async fn tombstone_asset(&self, asset_id: Uuid) -> Result<()>;

    // ========== Search primitives ==========

    /// Reader-visible segments containing at least one of `terms`.
    async fn keyword_candidates(
        &self,
        terms: &[String],
        filter: &SearchFilter,
    ) -> Result<Vec<SegmentHit>>;

    /// Reader-visible segments ordered by ascending cosine distance to
    /// `query`, paired with that distance.
    async fn semantic_candidates(
        &self,
        query: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<(SegmentHit, f32)>>;

    // ========== Dead-letter queue ==========

    /// Park a failed job for triage.
    async fn add_dlq_item(&self, item: &DlqItem) -> Result<()>;

    /// Fetch one parked item.
    async fn get_dlq_item(&self, dlq_id: Uuid) -> Result<Option<DlqItem>>;

    /// All parked items, newest first.
    async fn list_dlq_items(&self) -> Result<Vec<DlqItem>>;

    /// Parked items for one asset, newest first.
    async fn list_dlq_items_for_asset(&self, asset_id: Uuid) -> Result<Vec<DlqItem>>;

    /// Remove all parked items for an asset, returning how many were removed.
    async fn remove_dlq_for_asset(&self, asset_id: Uuid) -> Result<usize>;

    // ========== Retention ==========

    /// Delete archived versions (and their rows) created before the cutoff.
    ///
    /// Returns the number of versions purged.
    async fn purge_archived_versions(&self, older_than: DateTime<Utc>) -> Result<usize>;
}

/// A pluggable speech-recognition engine.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe one media object.
    ///
    /// # Errors
    ///
    /// Failures carry their classification: media problems as
    /// [`crate::Error::MediaFormat`], engine setup as
    /// [`crate::Error::EngineConfig`], and transport trouble as one of the
    /// transient variants.
    async fn transcribe(
        &self,
        media: &[u8],
        options: &TranscribeOptions,
    ) -> Result<TranscriptOutput>;

    /// What this engine can do.
    fn capabilities(&self) -> AsrCapabilities;
}

/// A text embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving order.
    ///
    /// Default implementation embeds one at a time.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Model name or identifier.
    fn model_name(&self) -> &str;

    /// Vector dimension this model produces.
    fn dimension(&self) -> usize;

    /// Maximum texts per [`Self::embed_batch`] call.
    fn batch_limit(&self) -> usize {
        crate::constants::DEFAULT_EMBED_BATCH_SIZE
    }
}
