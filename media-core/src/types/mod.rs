//! Common types used across the pipeline: entities, enumerations, and
//! configuration structs.

pub mod config;
pub mod enums;
pub mod structs;

pub use config::{
    EmbeddingConfig, IngestConfig, OrchestratorConfig, PipelineConfig, RetentionConfig,
    RetryConfig, SearchConfig,
};
pub use enums::{
    AssetStatus, BackendKind, ChunkingStrategy, ExecutionMode, MatchType, ProcessingStatus,
    PublishState, SearchMode, TriageState, Visibility,
};
pub use structs::{
    AsrCapabilities, AsrSegment, AssetRef, AssetVersion, DlqItem, EnginePolicy, MediaAsset,
    ObjectEntry, ObjectEvent, ObjectEventKind, ObjectMetadata, SearchFilter, SearchHit,
    SearchRequest, SearchResponse, SegmentHit, TranscribeOptions, TranscriptEmbedding,
    TranscriptOutput, TranscriptSegment, TranscriptionJob,
};
