// ============================================================================
// Configuration
// ============================================================================

use std::time::Duration;

use crate::constants;
use crate::error::{Error, Result};

use super::enums::{BackendKind, ChunkingStrategy, ExecutionMode};
use super::structs::EnginePolicy;

/// Ingest-side configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Engine selected for newly ingested assets.
    pub default_engine: String,
    /// Whether jobs request diarization by default.
    pub diarization_enabled: bool,
    /// Default execution placement for engine runs.
    pub execution_mode: ExecutionMode,
    /// Media longer than this falls back to fixed-window chunking.
    pub compute_threshold_secs: u64,
    /// Fixed-window chunk width in milliseconds.
    pub fixed_window_ms: u64,
    /// Forced chunking strategy, overriding selection when set.
    pub force_chunking_strategy: Option<ChunkingStrategy>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_engine: constants::DEFAULT_ENGINE.to_string(),
            diarization_enabled: false,
            execution_mode: ExecutionMode::Local,
            compute_threshold_secs: constants::DEFAULT_COMPUTE_THRESHOLD_SECS,
            fixed_window_ms: constants::DEFAULT_FIXED_WINDOW_MS,
            force_chunking_strategy: None,
        }
    }
}

impl IngestConfig {
    /// Engine policy stamped onto jobs created under this configuration.
    #[must_use]
    pub fn engine_policy(&self) -> EnginePolicy {
        EnginePolicy {
            engine: self.default_engine.clone(),
            diarization_enabled: self.diarization_enabled,
            execution_mode: self.execution_mode,
            compute_threshold_secs: self.compute_threshold_secs,
            force_chunking_strategy: self.force_chunking_strategy,
        }
    }
}

/// Retry and quarantine policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts before a retryable failure is dead-lettered.
    pub max_attempts: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Delay ceiling.
    pub max_delay: Duration,
    /// Jitter applied to each delay, as a fraction.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(constants::DEFAULT_RETRY_BASE_MS),
            max_delay: Duration::from_millis(constants::DEFAULT_RETRY_MAX_MS),
            jitter_factor: constants::RETRY_JITTER_FACTOR,
        }
    }
}

impl RetryConfig {
    /// Override the attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Override the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Override the delay ceiling.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

/// Orchestrator worker configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Concurrent jobs processed at once.
    pub concurrency: usize,
    /// Wall-clock budget per job.
    pub job_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: constants::DEFAULT_JOB_CONCURRENCY,
            job_timeout: Duration::from_secs(constants::DEFAULT_JOB_TIMEOUT_SECS),
        }
    }
}

/// Embedding generation configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Vector dimension D.
    pub dimension: usize,
    /// Maximum texts per embedder call.
    pub batch_size: usize,
    /// Whether semantic indexing runs at all.
    pub semantic_enabled: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: constants::DEFAULT_EMBEDDING_DIMENSION,
            batch_size: constants::DEFAULT_EMBED_BATCH_SIZE,
            semantic_enabled: true,
        }
    }
}

/// Query layer configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Default hybrid keyword weight.
    pub keyword_weight: f32,
    /// Default hybrid semantic weight.
    pub semantic_weight: f32,
    /// Default page size.
    pub default_limit: usize,
    /// Hard page-size cap.
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keyword_weight: 0.5,
            semantic_weight: 0.5,
            default_limit: constants::DEFAULT_SEARCH_LIMIT,
            max_limit: constants::MAX_SEARCH_LIMIT,
        }
    }
}

/// Retention policy for superseded data.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Days an archived version is kept before purge.
    pub archived_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            archived_days: constants::DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Which infrastructure backends to wire.
    pub backend: BackendKind,
    /// Ingest defaults.
    pub ingest: IngestConfig,
    /// Retry policy.
    pub retry: RetryConfig,
    /// Worker pool sizing and timeouts.
    pub orchestrator: OrchestratorConfig,
    /// Embedding generation.
    pub embedding: EmbeddingConfig,
    /// Query layer defaults.
    pub search: SearchConfig,
    /// Archived-version retention.
    pub retention: RetentionConfig,
}

impl PipelineConfig {
    /// Load configuration from `MEDIA_*` environment variables, falling back
    /// to defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when a set variable fails to parse.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(backend) = read_env("MEDIA_BACKEND")? {
            config.backend = parse_env("MEDIA_BACKEND", &backend)?;
        }
        if let Some(dim) = read_env("MEDIA_EMBEDDING_DIMENSION")? {
            config.embedding.dimension = parse_env("MEDIA_EMBEDDING_DIMENSION", &dim)?;
        }
        if let Some(batch) = read_env("MEDIA_EMBED_BATCH_SIZE")? {
            config.embedding.batch_size = parse_env("MEDIA_EMBED_BATCH_SIZE", &batch)?;
        }
        if let Some(attempts) = read_env("MEDIA_MAX_ATTEMPTS")? {
            config.retry.max_attempts = parse_env("MEDIA_MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(base) = read_env("MEDIA_RETRY_BASE_MS")? {
            config.retry.base_delay =
                Duration::from_millis(parse_env("MEDIA_RETRY_BASE_MS", &base)?);
        }
        if let Some(max) = read_env("MEDIA_RETRY_MAX_MS")? {
            config.retry.max_delay = Duration::from_millis(parse_env("MEDIA_RETRY_MAX_MS", &max)?);
        }
        if let Some(concurrency) = read_env("MEDIA_JOB_CONCURRENCY")? {
            config.orchestrator.concurrency = parse_env("MEDIA_JOB_CONCURRENCY", &concurrency)?;
        }
        if let Some(timeout) = read_env("MEDIA_JOB_TIMEOUT_SECS")? {
            config.orchestrator.job_timeout =
                Duration::from_secs(parse_env("MEDIA_JOB_TIMEOUT_SECS", &timeout)?);
        }
        if let Some(weight) = read_env("MEDIA_HYBRID_KEYWORD_WEIGHT")? {
            config.search.keyword_weight = parse_env("MEDIA_HYBRID_KEYWORD_WEIGHT", &weight)?;
        }
        if let Some(weight) = read_env("MEDIA_HYBRID_SEMANTIC_WEIGHT")? {
            config.search.semantic_weight = parse_env("MEDIA_HYBRID_SEMANTIC_WEIGHT", &weight)?;
        }
        if let Some(days) = read_env("MEDIA_RETENTION_DAYS")? {
            config.retention.archived_days = parse_env("MEDIA_RETENTION_DAYS", &days)?;
        }
        if let Some(window) = read_env("MEDIA_FIXED_WINDOW_MS")? {
            config.ingest.fixed_window_ms = parse_env("MEDIA_FIXED_WINDOW_MS", &window)?;
        }
        if let Some(engine) = read_env("MEDIA_DEFAULT_ENGINE")? {
            config.ingest.default_engine = engine;
        }
        if let Some(threshold) = read_env("MEDIA_COMPUTE_THRESHOLD_SECS")? {
            config.ingest.compute_threshold_secs =
                parse_env("MEDIA_COMPUTE_THRESHOLD_SECS", &threshold)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] on an impossible combination.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(Error::Configuration(
                "embedding dimension must be positive".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Configuration("max attempts must be positive".into()));
        }
        if self.orchestrator.concurrency == 0 {
            return Err(Error::Configuration(
                "job concurrency must be positive".into(),
            ));
        }
        if self.search.keyword_weight < 0.0 || self.search.semantic_weight < 0.0 {
            return Err(Error::Configuration(
                "hybrid weights must be non-negative".into(),
            ));
        }
        if self.ingest.fixed_window_ms == 0 {
            return Err(Error::Configuration(
                "fixed window width must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn read_env(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::Configuration(format!("{name}: {e}"))),
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| Error::Configuration(format!("{name}={value}: {e}")))
}
