//! Pipeline-wide default values and limits.

/// Media file extensions accepted at ingest, lowercase.
pub const SUPPORTED_MEDIA_EXTENSIONS: &[&str] =
    &["wav", "mp3", "aac", "flac", "mp4", "mov", "mxf"];

/// Default embedding vector dimension.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Default maximum texts per embedding batch.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;

/// Default fixed-window chunk width in milliseconds.
pub const DEFAULT_FIXED_WINDOW_MS: u64 = 5_000;

/// Media longer than this (seconds) falls back to fixed-window chunking.
pub const DEFAULT_COMPUTE_THRESHOLD_SECS: u64 = 600;

/// Default maximum transcription attempts before quarantine.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base retry delay in milliseconds.
pub const DEFAULT_RETRY_BASE_MS: u64 = 1_000;

/// Default retry delay ceiling in milliseconds.
pub const DEFAULT_RETRY_MAX_MS: u64 = 300_000;

/// Retry delay jitter as a fraction of the computed delay.
pub const RETRY_JITTER_FACTOR: f64 = 0.25;

/// Default concurrent orchestrator workers.
pub const DEFAULT_JOB_CONCURRENCY: usize = 4;

/// Default per-job wall-clock timeout in seconds.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 600;

/// Default search page size.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Hard upper bound on search page size.
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Default retention for archived versions, in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Default transcription engine selected for new assets.
pub const DEFAULT_ENGINE: &str = "whisper-base";
