use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{
    AssetStatus, ChunkingStrategy, ExecutionMode, MatchType, ProcessingStatus, PublishState,
    SearchMode, TriageState, Visibility,
};

// ============================================================================
// Entities
// ============================================================================

/// Canonical record for one `(bucket, object_key)` location.
///
/// The asset id is stable for the life of the row; the lineage id survives
/// delete/re-upload cycles of the same key. `current_version_id`, when set,
/// always references a version whose publish state is [`PublishState::Active`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Stable identifier of this asset row.
    pub asset_id: Uuid,
    /// Identity that survives tombstone and re-upload of the same key.
    pub lineage_id: Uuid,
    /// Source bucket.
    pub bucket: String,
    /// Source object key.
    pub object_key: String,
    /// The single active version, or none before first publish.
    pub current_version_id: Option<String>,
    /// Pipeline lifecycle state.
    pub status: AssetStatus,
    /// Set when quarantined.
    pub triage_state: Option<TriageState>,
    /// Operator guidance paired with the triage state.
    pub recommended_action: Option<String>,
    /// Selected transcription engine.
    pub engine: String,
    /// Last failure observed for this asset.
    pub last_error: Option<String>,
    /// Transcription attempts consumed so far.
    pub attempt_count: u32,
    /// Object size in bytes.
    pub byte_size: u64,
    /// Content type reported by the store, if any.
    pub content_type: Option<String>,
    /// Store entity tag of the most recent upload.
    pub etag: String,
    /// Media duration hint in seconds, once known.
    pub duration_secs: Option<f64>,
    /// Codec hint, once known.
    pub codec: Option<String>,
    /// Whether the underlying object was removed.
    pub tombstoned: bool,
    /// First ingest time.
    pub ingested_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl MediaAsset {
    /// Create a freshly ingested asset record.
    #[must_use]
    pub fn new(
        bucket: impl Into<String>,
        object_key: impl Into<String>,
        lineage_id: Uuid,
        etag: impl Into<String>,
        byte_size: u64,
        engine: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            asset_id: Uuid::new_v4(),
            lineage_id,
            bucket: bucket.into(),
            object_key: object_key.into(),
            current_version_id: None,
            status: AssetStatus::Ingested,
            triage_state: None,
            recommended_action: None,
            engine: engine.into(),
            last_error: None,
            attempt_count: 0,
            byte_size,
            content_type: None,
            etag: etag.into(),
            duration_secs: None,
            codec: None,
            tombstoned: false,
            ingested_at: now,
            updated_at: now,
        }
    }
}

/// One distinct content state of an asset.
///
/// The version id is a deterministic function of `(etag, size, mtime)`, so
/// re-ingesting identical content converges on the same row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetVersion {
    /// Deterministic content-derived identifier.
    pub version_id: String,
    /// Owning asset.
    pub asset_id: Uuid,
    /// Processing progress of this version.
    pub processing_status: ProcessingStatus,
    /// Publication state of this version.
    pub publish_state: PublishState,
    /// Entity tag of the content this version was derived from.
    pub etag: String,
    /// Content size in bytes.
    pub byte_size: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl AssetVersion {
    /// Create a staging version for an asset.
    #[must_use]
    pub fn new(
        version_id: impl Into<String>,
        asset_id: Uuid,
        etag: impl Into<String>,
        byte_size: u64,
    ) -> Self {
        Self {
            version_id: version_id.into(),
            asset_id,
            processing_status: ProcessingStatus::Ingested,
            publish_state: PublishState::Staging,
            etag: etag.into(),
            byte_size,
            created_at: Utc::now(),
        }
    }
}

/// A timed text chunk of one version's transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// `{version_id}_seg_{index}` — unique within `(asset_id, version_id)`.
    pub segment_id: String,
    /// Owning asset.
    pub asset_id: Uuid,
    /// Owning version.
    pub version_id: String,
    /// Start offset in milliseconds.
    pub start_ms: u64,
    /// End offset in milliseconds, never before `start_ms`.
    pub end_ms: u64,
    /// Transcribed text.
    pub text: String,
    /// Speaker label when diarization produced one.
    pub speaker: Option<String>,
    /// Recognizer confidence in `[0, 1]`.
    pub confidence: f32,
    /// Lifecycle tag; all segments of a version share one value.
    pub visibility: Visibility,
    /// Strategy that produced the boundaries.
    pub strategy: ChunkingStrategy,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A fixed-dimension vector for one segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEmbedding {
    /// `{segment_id}_emb` — at most one embedding per segment.
    pub embedding_id: String,
    /// Owning asset.
    pub asset_id: Uuid,
    /// Owning version.
    pub version_id: String,
    /// Segment this vector represents.
    pub segment_id: String,
    /// Exactly `dimension` f32 values.
    pub vector: Vec<f32>,
    /// Model that produced the vector.
    pub model: String,
    /// Configured vector dimension.
    pub dimension: usize,
    /// Mirrors the segment's visibility.
    pub visibility: Visibility,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl TranscriptEmbedding {
    /// Derive the embedding id for a segment.
    #[must_use]
    pub fn id_for_segment(segment_id: &str) -> String {
        format!("{segment_id}_emb")
    }
}

/// Per-job transcription engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnginePolicy {
    /// Engine selection.
    pub engine: String,
    /// Whether to request speaker diarization.
    pub diarization_enabled: bool,
    /// Where the engine executes.
    pub execution_mode: ExecutionMode,
    /// Media longer than this falls back to fixed-window chunking.
    pub compute_threshold_secs: u64,
    /// Overrides chunking strategy selection entirely when set.
    pub force_chunking_strategy: Option<ChunkingStrategy>,
}

/// A queued unit of transcription work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionJob {
    /// Queue-level identifier of this delivery.
    pub job_id: Uuid,
    /// Asset to process.
    pub asset_id: Uuid,
    /// Version to process.
    pub version_id: String,
    /// Engine configuration for this run.
    pub engine_policy: EnginePolicy,
    /// Zero-based attempt counter.
    pub attempt: u32,
    /// Deterministic duplicate-suppression key.
    pub idempotency_key: String,
    /// When the job was first enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// Earliest delivery time.
    pub scheduled_at: DateTime<Utc>,
}

impl TranscriptionJob {
    /// Create an immediate job for `(asset, version)` at the given attempt.
    #[must_use]
    pub fn new(
        asset_id: Uuid,
        version_id: impl Into<String>,
        engine_policy: EnginePolicy,
        attempt: u32,
    ) -> Self {
        let version_id = version_id.into();
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            asset_id,
            idempotency_key: Self::idempotency_key_for(asset_id, &version_id, attempt),
            version_id,
            engine_policy,
            attempt,
            enqueued_at: now,
            scheduled_at: now,
        }
    }

    /// The deterministic key suppressing duplicate enqueues.
    #[must_use]
    pub fn idempotency_key_for(asset_id: Uuid, version_id: &str, attempt: u32) -> String {
        format!("{asset_id}:{version_id}:{attempt}")
    }
}

/// A parked failed job with diagnostics for operator triage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqItem {
    /// Identifier of this dead-letter entry.
    pub dlq_id: Uuid,
    /// Snapshot of the job that failed.
    pub job: TranscriptionJob,
    /// Asset the job belonged to.
    pub asset_id: Uuid,
    /// Version the job belonged to.
    pub version_id: String,
    /// Classified terminal error kind.
    pub error_kind: String,
    /// Human-readable error message.
    pub error_message: String,
    /// Whether the underlying error class was retryable (exhausted) or not.
    pub retryable: bool,
    /// Chronological trail of attempt outcomes.
    pub log_trail: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Object store surface
// ============================================================================

/// Kind of object notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectEventKind {
    /// An object was created or overwritten.
    #[serde(rename = "ObjectCreated")]
    Created,
    /// An object was removed.
    #[serde(rename = "ObjectRemoved")]
    Removed,
}

/// A store notification consumed by the ingest controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEvent {
    /// Created or removed.
    #[serde(rename = "event_type")]
    pub kind: ObjectEventKind,
    /// Source bucket.
    pub bucket: String,
    /// Source object key.
    pub object_key: String,
    /// Entity tag, if the notification carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Object size, if the notification carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Event time.
    pub timestamp: DateTime<Utc>,
}

/// Authoritative object metadata from a head call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Entity tag.
    pub etag: String,
    /// Size in bytes.
    pub size: u64,
    /// Content type, if reported.
    pub content_type: Option<String>,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
}

/// One listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Object key.
    pub key: String,
    /// Metadata for the object.
    pub metadata: ObjectMetadata,
}

// ============================================================================
// Recognizer surface
// ============================================================================

/// Options passed to the speech recognizer per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeOptions {
    /// Engine selection.
    pub engine: String,
    /// Request speaker diarization.
    pub diarization: bool,
    /// Execution placement.
    pub execution_mode: ExecutionMode,
    /// Optional language hint.
    pub language: Option<String>,
    /// Content type of the media bytes.
    pub content_type: Option<String>,
    /// Duration hint in seconds, when known ahead of time.
    pub duration_hint_secs: Option<f64>,
}

/// One timed chunk of raw recognizer output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrSegment {
    /// Start offset in milliseconds.
    pub start_ms: u64,
    /// End offset in milliseconds.
    pub end_ms: u64,
    /// Recognized text.
    pub text: String,
    /// Speaker label when diarization is on.
    pub speaker: Option<String>,
    /// Recognizer confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Complete recognizer output for one media object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptOutput {
    /// Timed segments in media order.
    pub segments: Vec<AsrSegment>,
    /// Media duration in seconds.
    pub duration_secs: f64,
    /// Engine that produced the output.
    pub engine: String,
}

/// Static description of what a recognizer can do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrCapabilities {
    /// Supported media formats by extension.
    pub formats: Vec<String>,
    /// Whether speaker diarization is available.
    pub diarization: bool,
    /// Maximum media duration in seconds, if bounded.
    pub max_duration_secs: Option<u64>,
    /// Supported languages (BCP 47 tags).
    pub languages: Vec<String>,
}

// ============================================================================
// Search surface
// ============================================================================

/// Optional narrowing filters shared by all search modes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Restrict hits to one bucket.
    pub bucket: Option<String>,
    /// Restrict hits to one speaker label.
    pub speaker: Option<String>,
}

/// A search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// User query text.
    pub query: String,
    /// Keyword, semantic, or hybrid.
    #[serde(rename = "type", default)]
    pub mode: SearchMode,
    /// Narrowing filters.
    #[serde(flatten)]
    pub filter: SearchFilter,
    /// Page size, `1..=100`.
    #[serde(default = "default_search_limit")]
    pub limit: usize,
    /// Rows to skip before the page.
    #[serde(default)]
    pub offset: usize,
    /// Query vector for semantic and hybrid modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_vector: Option<Vec<f32>>,
    /// Caller-provided keyword weight for hybrid fusion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_weight: Option<f32>,
    /// Caller-provided semantic weight for hybrid fusion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_weight: Option<f32>,
}

fn default_search_limit() -> usize {
    crate::constants::DEFAULT_SEARCH_LIMIT
}

impl SearchRequest {
    /// Build a keyword request with default paging.
    #[must_use]
    pub fn keyword(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: SearchMode::Keyword,
            filter: SearchFilter::default(),
            limit: crate::constants::DEFAULT_SEARCH_LIMIT,
            offset: 0,
            query_vector: None,
            keyword_weight: None,
            semantic_weight: None,
        }
    }

    /// Build a semantic request with default paging.
    #[must_use]
    pub fn semantic(query: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            mode: SearchMode::Semantic,
            query_vector: Some(vector),
            ..Self::keyword(query)
        }
    }

    /// Build a hybrid request with default paging and weights.
    #[must_use]
    pub fn hybrid(query: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            mode: SearchMode::Hybrid,
            query_vector: Some(vector),
            ..Self::keyword(query)
        }
    }
}

/// Source location reference carried on every hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    /// Source bucket.
    pub bucket: String,
    /// Source object key.
    pub object_key: String,
}

/// A segment row joined with its asset location, as returned by the
/// database search primitives. Rows already satisfy the visibility,
/// current-version, and tombstone filters.
#[derive(Debug, Clone)]
pub struct SegmentHit {
    /// The matching segment.
    pub segment: TranscriptSegment,
    /// Source location of the owning asset.
    pub asset: AssetRef,
}

/// One search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Owning asset.
    pub asset_id: Uuid,
    /// Version the segment belongs to.
    pub version_id: String,
    /// Matching segment.
    pub segment_id: String,
    /// Segment start in milliseconds.
    pub start_ms: u64,
    /// Segment end in milliseconds.
    pub end_ms: u64,
    /// Display snippet.
    pub snippet: String,
    /// Relevance score in `[0, 1]`.
    pub score: f32,
    /// Which source produced the hit.
    pub match_type: MatchType,
    /// Speaker label, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Source location.
    pub asset: AssetRef,
}

/// Search response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Echo of the query text.
    pub query: String,
    /// Echo of the mode.
    #[serde(rename = "type")]
    pub mode: SearchMode,
    /// Matching segments before pagination.
    pub total: usize,
    /// The requested page of hits.
    pub results: Vec<SearchHit>,
}
