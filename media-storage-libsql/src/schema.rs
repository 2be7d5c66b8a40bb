//! Database schema definitions for libSQL storage.
//!
//! All timestamps are millisecond-precision UTC integers. Embedding
//! vectors are fixed-length little-endian f32 blobs.

/// SQL to create the media assets table
pub const CREATE_MEDIA_ASSETS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS media_assets (
    asset_id TEXT PRIMARY KEY NOT NULL,
    lineage_id TEXT NOT NULL,
    bucket TEXT NOT NULL,
    object_key TEXT NOT NULL,
    current_version_id TEXT,
    status TEXT NOT NULL,
    triage_state TEXT,
    recommended_action TEXT,
    engine TEXT NOT NULL,
    last_error TEXT,
    attempt_count INTEGER NOT NULL DEFAULT 0,
    byte_size INTEGER NOT NULL,
    content_type TEXT,
    etag TEXT NOT NULL,
    duration_secs REAL,
    codec TEXT,
    tombstoned INTEGER NOT NULL DEFAULT 0,
    ingested_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)
"#;

/// SQL to create the asset versions table
pub const CREATE_ASSET_VERSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS asset_versions (
    version_id TEXT NOT NULL,
    asset_id TEXT NOT NULL,
    processing_status TEXT NOT NULL,
    publish_state TEXT NOT NULL,
    etag TEXT NOT NULL,
    byte_size INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (asset_id, version_id)
)
"#;

/// SQL to create the transcript segments table
pub const CREATE_TRANSCRIPT_SEGMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transcript_segments (
    segment_id TEXT NOT NULL,
    asset_id TEXT NOT NULL,
    version_id TEXT NOT NULL,
    start_ms INTEGER NOT NULL,
    end_ms INTEGER NOT NULL,
    text TEXT NOT NULL,
    speaker TEXT,
    confidence REAL NOT NULL,
    visibility TEXT NOT NULL,
    strategy TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (asset_id, version_id, segment_id)
)
"#;

/// SQL to create the transcript embeddings table
pub const CREATE_TRANSCRIPT_EMBEDDINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transcript_embeddings (
    embedding_id TEXT NOT NULL,
    asset_id TEXT NOT NULL,
    version_id TEXT NOT NULL,
    segment_id TEXT NOT NULL,
    vector BLOB NOT NULL,
    model TEXT NOT NULL,
    dimension INTEGER NOT NULL,
    visibility TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (asset_id, version_id, segment_id)
)
"#;

/// SQL to create the transcription jobs table backing the persistent queue
pub const CREATE_TRANSCRIPTION_JOBS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transcription_jobs (
    job_id TEXT PRIMARY KEY NOT NULL,
    asset_id TEXT NOT NULL,
    version_id TEXT NOT NULL,
    engine_policy TEXT NOT NULL,
    attempt INTEGER NOT NULL DEFAULT 0,
    idempotency_key TEXT NOT NULL UNIQUE,
    enqueued_at INTEGER NOT NULL,
    scheduled_at INTEGER NOT NULL,
    leased_until INTEGER
)
"#;

/// SQL to create the dead-letter items table
pub const CREATE_DLQ_ITEMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS dlq_items (
    dlq_id TEXT PRIMARY KEY NOT NULL,
    asset_id TEXT NOT NULL,
    version_id TEXT NOT NULL,
    job TEXT NOT NULL,
    error_kind TEXT NOT NULL,
    error_message TEXT NOT NULL,
    retryable INTEGER NOT NULL,
    log_trail TEXT NOT NULL,
    created_at INTEGER NOT NULL
)
"#;

/// Index on asset location for ingest lookups
pub const CREATE_ASSETS_LOCATION_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_assets_location
ON media_assets(bucket, object_key, tombstoned)
"#;

/// Index on asset status for triage listings
pub const CREATE_ASSETS_STATUS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_assets_status
ON media_assets(status)
"#;

/// Index on segment visibility for reader queries
pub const CREATE_SEGMENTS_VISIBILITY_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_segments_visibility
ON transcript_segments(visibility, asset_id, version_id)
"#;

/// Index on version publish state for purge scans
pub const CREATE_VERSIONS_STATE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_versions_state
ON asset_versions(publish_state, created_at)
"#;

/// Index on job schedule for queue dequeues
pub const CREATE_JOBS_SCHEDULE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_jobs_schedule
ON transcription_jobs(scheduled_at, leased_until)
"#;

/// SQL to create the FTS5 virtual table for segment text
///
/// `segment_id` is UNINDEXED and only present for joins. The plain
/// unicode61 tokenizer matches whole tokens, so every full-text match is
/// also a substring match of the stored text, keeping ranking consistent
/// with the in-process scorer.
pub const CREATE_SEGMENTS_FTS_TABLE: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS segments_fts USING fts5(
    segment_id UNINDEXED,
    text,
    tokenize='unicode61'
)
"#;

/// Trigger keeping the FTS table in sync on segment insert
pub const CREATE_SEGMENTS_FTS_INSERT_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS segments_ai AFTER INSERT ON transcript_segments BEGIN
    INSERT INTO segments_fts(segment_id, text) VALUES (new.segment_id, new.text);
END
"#;

/// Trigger keeping the FTS table in sync on segment update
pub const CREATE_SEGMENTS_FTS_UPDATE_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS segments_au AFTER UPDATE OF text ON transcript_segments BEGIN
    UPDATE segments_fts SET text = new.text WHERE segment_id = new.segment_id;
END
"#;

/// Trigger keeping the FTS table in sync on segment delete
pub const CREATE_SEGMENTS_FTS_DELETE_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS segments_ad AFTER DELETE ON transcript_segments BEGIN
    DELETE FROM segments_fts WHERE segment_id = old.segment_id;
END
"#;

/// Every schema statement, in creation order.
pub const ALL_STATEMENTS: &[&str] = &[
    CREATE_MEDIA_ASSETS_TABLE,
    CREATE_ASSET_VERSIONS_TABLE,
    CREATE_TRANSCRIPT_SEGMENTS_TABLE,
    CREATE_TRANSCRIPT_EMBEDDINGS_TABLE,
    CREATE_TRANSCRIPTION_JOBS_TABLE,
    CREATE_DLQ_ITEMS_TABLE,
    CREATE_ASSETS_LOCATION_INDEX,
    CREATE_ASSETS_STATUS_INDEX,
    CREATE_SEGMENTS_VISIBILITY_INDEX,
    CREATE_VERSIONS_STATE_INDEX,
    CREATE_JOBS_SCHEDULE_INDEX,
    CREATE_SEGMENTS_FTS_TABLE,
    CREATE_SEGMENTS_FTS_INSERT_TRIGGER,
    CREATE_SEGMENTS_FTS_UPDATE_TRIGGER,
    CREATE_SEGMENTS_FTS_DELETE_TRIGGER,
];
