#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Media Core
//!
//! Ingestion and transcript indexing pipeline for a searchable media
//! library. The pipeline watches an object store for media uploads,
//! transcribes each object through a pluggable recognition engine,
//! embeds every transcript segment, and serves keyword, semantic, and
//! hybrid search — with the guarantee that readers never observe partial
//! or stale transcripts.
//!
//! ## Core Concepts
//!
//! - **Assets**: one record per `(bucket, object_key)`, with a lineage that
//!   survives delete/re-upload cycles
//! - **Versions**: deterministic content states, published by atomic cutover
//! - **Segments**: timed transcript chunks, sentence- or window-bounded
//! - **Embeddings**: fixed-dimension vectors mirroring segment visibility
//! - **Jobs**: queued transcription work with idempotency keys
//!
//! ## Module Organization
//!
//! ### Primary APIs
//! - [`ingest`]: object event handling and version derivation
//! - [`orchestrator`]: job consumption through transcribe/segment/embed/publish
//! - [`publish`]: atomic visibility cutover between versions
//! - [`retry`]: failure classification, backoff, dead-letter, triage
//! - [`search`]: keyword, semantic, and hybrid queries
//!
//! ### Support Modules
//! - [`types`]: entities, enumerations, configuration
//! - [`ports`]: the contracts infrastructure adapters implement
//! - [`adapters`]: in-process reference adapters (local backend, tests)
//! - [`embeddings`]: similarity math and the hash-based local embedder
//! - [`segment`]: chunking strategies
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use media_core::adapters::{MemoryDatabase, MemoryObjectStore, MemoryQueue};
//! use media_core::embeddings::HashEmbedder;
//! use media_core::ingest::IngestController;
//! use media_core::search::SearchService;
//! use media_core::types::{PipelineConfig, SearchRequest};
//!
//! # async fn example(recognizer: Arc<dyn media_core::ports::SpeechRecognizer>) -> media_core::Result<()> {
//! let config = PipelineConfig::from_env()?;
//! let db = Arc::new(MemoryDatabase::new());
//! let queue = Arc::new(MemoryQueue::new());
//! let store = Arc::new(MemoryObjectStore::new());
//! let embedder = Arc::new(HashEmbedder::new(config.embedding.dimension));
//!
//! let ingest = IngestController::new(db.clone(), queue.clone(), store.clone(), config.clone());
//! let orchestrator = media_core::orchestrator::Orchestrator::new(
//!     db.clone(), store, recognizer, embedder, queue, config.clone(),
//! );
//!
//! // Feed events (e.g. from a PollingWatcher), then drain the queue.
//! orchestrator.run_until_idle().await?;
//!
//! let search = SearchService::new(db, config.search.clone(), config.embedding.dimension);
//! let hits = search.search(&SearchRequest::keyword("hello")).await?;
//! println!("{} hits", hits.total);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod constants;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod orchestrator;
pub mod ports;
pub mod publish;
pub mod retry;
pub mod search;
pub mod segment;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use ingest::{derive_version_id, IngestController, IngestOutcome, PollingWatcher};
pub use orchestrator::{DeliveryOutcome, JobOutcome, Orchestrator};
pub use ports::{Embedder, JobQueue, MediaDatabase, ObjectStore, SpeechRecognizer};
pub use publish::VersionPublisher;
pub use retry::{
    backoff_delay, classify, classify_external, Classification, FailureDisposition, FailureKind,
    RetryManager,
};
pub use search::SearchService;
pub use types::{
    AssetStatus, AssetVersion, DlqItem, EnginePolicy, MediaAsset, ObjectEvent, ObjectEventKind,
    PipelineConfig, PublishState, SearchHit, SearchMode, SearchRequest, SearchResponse,
    TranscriptEmbedding, TranscriptSegment, TranscriptionJob, TriageState, Visibility,
};
