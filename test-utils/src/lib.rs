//! Testing utilities for the media pipeline.
//!
//! Provides a scripted recognition engine, transcript fixtures, and a
//! fully wired in-process pipeline so integration tests can drive ingest,
//! orchestration, and search end to end without external infrastructure.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use media_core::adapters::{MemoryDatabase, MemoryObjectStore, MemoryQueue};
use media_core::embeddings::HashEmbedder;
use media_core::ingest::{IngestController, IngestOutcome};
use media_core::orchestrator::Orchestrator;
use media_core::ports::{Embedder, ObjectStore, SpeechRecognizer};
use media_core::search::SearchService;
use media_core::types::{
    AsrCapabilities, AsrSegment, ObjectEvent, ObjectEventKind, PipelineConfig, SearchRequest,
    SearchResponse, TranscribeOptions, TranscriptOutput,
};
use media_core::{Error, Result};

/// Build a recognizer segment fixture.
#[must_use]
pub fn asr_segment(
    start_ms: u64,
    end_ms: u64,
    text: &str,
    speaker: Option<&str>,
    confidence: f32,
) -> AsrSegment {
    AsrSegment {
        start_ms,
        end_ms,
        text: text.to_string(),
        speaker: speaker.map(str::to_string),
        confidence,
    }
}

/// Build a transcript fixture from `(start_ms, end_ms, text)` triples.
#[must_use]
pub fn transcript(segments: &[(u64, u64, &str)], duration_secs: f64) -> TranscriptOutput {
    TranscriptOutput {
        segments: segments
            .iter()
            .map(|(start, end, text)| asr_segment(*start, *end, text, None, 0.95))
            .collect(),
        duration_secs,
        engine: "whisper-base".to_string(),
    }
}

/// A recognizer that replays a programmed script of results.
///
/// Each transcribe call consumes the next scripted entry; when the script
/// runs dry the fallback output is returned. The call count lets tests
/// assert how many engine invocations a flow consumed.
pub struct ScriptedRecognizer {
    script: Mutex<VecDeque<Result<TranscriptOutput>>>,
    fallback: TranscriptOutput,
    calls: Mutex<usize>,
}

impl ScriptedRecognizer {
    /// A recognizer that always returns `fallback`.
    #[must_use]
    pub fn new(fallback: TranscriptOutput) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: Mutex::new(0),
        }
    }

    /// Queue a successful response.
    pub fn push_ok(&self, output: TranscriptOutput) {
        self.script.lock().push_back(Ok(output));
    }

    /// Queue a failure.
    pub fn push_err(&self, error: Error) {
        self.script.lock().push_back(Err(error));
    }

    /// How many transcribe calls have been made.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn transcribe(
        &self,
        _media: &[u8],
        _options: &TranscribeOptions,
    ) -> Result<TranscriptOutput> {
        *self.calls.lock() += 1;
        match self.script.lock().pop_front() {
            Some(result) => result,
            None => Ok(self.fallback.clone()),
        }
    }

    fn capabilities(&self) -> AsrCapabilities {
        AsrCapabilities {
            formats: vec![
                "wav".to_string(),
                "mp3".to_string(),
                "mp4".to_string(),
            ],
            diarization: true,
            max_duration_secs: None,
            languages: vec!["en".to_string()],
        }
    }
}

/// A pipeline configuration tuned for fast tests: small vectors, retry
/// delays in single-digit milliseconds.
#[must_use]
pub fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.embedding.dimension = 32;
    config.retry = config
        .retry
        .with_base_delay(std::time::Duration::from_millis(5))
        .with_max_delay(std::time::Duration::from_millis(40));
    config
}

/// A complete in-process pipeline over the in-memory adapters.
pub struct LocalPipeline {
    /// Shared database.
    pub db: Arc<MemoryDatabase>,
    /// Shared object store.
    pub store: Arc<MemoryObjectStore>,
    /// Shared job queue.
    pub queue: Arc<MemoryQueue>,
    /// The scripted engine.
    pub recognizer: Arc<ScriptedRecognizer>,
    /// Deterministic embedder, also used to embed query text.
    pub embedder: Arc<HashEmbedder>,
    /// Ingest controller wired over the shared ports.
    pub ingest: IngestController,
    /// Orchestrator wired over the shared ports.
    pub orchestrator: Orchestrator,
    /// Query layer wired over the shared database.
    pub search: SearchService,
    /// The configuration everything was built with.
    pub config: PipelineConfig,
}

impl LocalPipeline {
    /// Wire a pipeline with the given configuration and fallback transcript.
    #[must_use]
    pub fn new(config: PipelineConfig, fallback: TranscriptOutput) -> Self {
        let db = Arc::new(MemoryDatabase::new());
        let store = Arc::new(MemoryObjectStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let recognizer = Arc::new(ScriptedRecognizer::new(fallback));
        let embedder = Arc::new(HashEmbedder::new(config.embedding.dimension));

        let ingest = IngestController::new(
            db.clone(),
            queue.clone(),
            store.clone(),
            config.clone(),
        );
        let orchestrator = Orchestrator::new(
            db.clone(),
            store.clone(),
            recognizer.clone(),
            embedder.clone(),
            queue.clone(),
            config.clone(),
        );
        let search = SearchService::new(db.clone(), config.search.clone(), config.embedding.dimension);

        Self {
            db,
            store,
            queue,
            recognizer,
            embedder,
            ingest,
            orchestrator,
            search,
            config,
        }
    }

    /// Wire a pipeline with [`fast_config`] and the given fallback.
    #[must_use]
    pub fn with_fallback(fallback: TranscriptOutput) -> Self {
        Self::new(fast_config(), fallback)
    }

    /// Store an object with explicit metadata and ingest its created event.
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        etag: &str,
        mtime: DateTime<Utc>,
    ) -> Result<IngestOutcome> {
        let size = bytes.len() as u64;
        self.store
            .put_with_metadata(bucket, key, bytes, etag, Some("audio/wav"), mtime);
        self.ingest
            .handle_event(&ObjectEvent {
                kind: ObjectEventKind::Created,
                bucket: bucket.to_string(),
                object_key: key.to_string(),
                etag: Some(etag.to_string()),
                size: Some(size),
                timestamp: mtime,
            })
            .await
    }

    /// Remove an object and ingest its removal event.
    pub async fn remove(&self, bucket: &str, key: &str) -> Result<IngestOutcome> {
        self.store.delete(bucket, key).await?;
        self.ingest
            .handle_event(&ObjectEvent {
                kind: ObjectEventKind::Removed,
                bucket: bucket.to_string(),
                object_key: key.to_string(),
                etag: None,
                size: None,
                timestamp: Utc::now(),
            })
            .await
    }

    /// Drain the queue to completion, including scheduled retries.
    pub async fn drain(&self) -> Result<usize> {
        self.orchestrator.run_until_idle().await
    }

    /// Keyword search with default paging.
    pub async fn search_keyword(&self, query: &str) -> Result<SearchResponse> {
        self.search.search(&SearchRequest::keyword(query)).await
    }

    /// Semantic search, embedding the query text with the pipeline's
    /// embedder.
    pub async fn search_semantic(&self, query: &str) -> Result<SearchResponse> {
        let vector = self.embedder.embed(query).await?;
        self.search
            .search(&SearchRequest::semantic(query, vector))
            .await
    }

    /// Hybrid search with optional caller weights.
    pub async fn search_hybrid(
        &self,
        query: &str,
        keyword_weight: Option<f32>,
        semantic_weight: Option<f32>,
    ) -> Result<SearchResponse> {
        let vector = self.embedder.embed(query).await?;
        let mut request = SearchRequest::hybrid(query, vector);
        request.keyword_weight = keyword_weight;
        request.semantic_weight = semantic_weight;
        self.search.search(&request).await
    }
}
