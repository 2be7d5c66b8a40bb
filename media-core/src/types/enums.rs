use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// Lifecycle state of an asset as driven by the pipeline.
///
/// `Indexed`, `Deleted`, and `Failed` are terminal; everything else is a
/// waypoint between ingest and publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Object observed and version recorded, transcription not yet started.
    Ingested,
    /// A worker is transcribing the current version.
    Transcribing,
    /// Segments (and embeddings) written at staging visibility.
    Transcribed,
    /// Current version published and searchable.
    Indexed,
    /// A retryable failure occurred; a delayed job is scheduled.
    PendingRetry,
    /// A terminal failure occurred; the asset awaits operator triage.
    Quarantined,
    /// An operator skipped the asset after triage.
    Failed,
    /// The underlying object was removed.
    Deleted,
}

impl AssetStatus {
    /// Whether the status admits no further pipeline-driven transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Indexed | Self::Failed | Self::Deleted)
    }
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ingested => "ingested",
            Self::Transcribing => "transcribing",
            Self::Transcribed => "transcribed",
            Self::Indexed => "indexed",
            Self::PendingRetry => "pending_retry",
            Self::Quarantined => "quarantined",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AssetStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ingested" => Ok(Self::Ingested),
            "transcribing" => Ok(Self::Transcribing),
            "transcribed" => Ok(Self::Transcribed),
            "indexed" => Ok(Self::Indexed),
            "pending_retry" => Ok(Self::PendingRetry),
            "quarantined" => Ok(Self::Quarantined),
            "failed" => Ok(Self::Failed),
            "deleted" => Ok(Self::Deleted),
            _ => Err(format!("unknown asset status: {s}")),
        }
    }
}

/// Processing state of one asset version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Version recorded, nothing transcribed yet.
    Ingested,
    /// Transcription in flight.
    Transcribing,
    /// Transcript rows written at staging visibility.
    Transcribed,
    /// Cutover complete; this version has been made visible at least once.
    Published,
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ingested => "ingested",
            Self::Transcribing => "transcribing",
            Self::Transcribed => "transcribed",
            Self::Published => "published",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ingested" => Ok(Self::Ingested),
            "transcribing" => Ok(Self::Transcribing),
            "transcribed" => Ok(Self::Transcribed),
            "published" => Ok(Self::Published),
            _ => Err(format!("unknown processing status: {s}")),
        }
    }
}

/// Publication state of a version. At most one version per asset is `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    /// Written but not reader-visible.
    Staging,
    /// The one searchable version of its asset.
    Active,
    /// Superseded by a newer active version.
    Archived,
    /// The underlying object was removed.
    SoftDeleted,
}

impl std::fmt::Display for PublishState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Staging => "staging",
            Self::Active => "active",
            Self::Archived => "archived",
            Self::SoftDeleted => "soft_deleted",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PublishState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "staging" => Ok(Self::Staging),
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            "soft_deleted" => Ok(Self::SoftDeleted),
            _ => Err(format!("unknown publish state: {s}")),
        }
    }
}

/// Per-row lifecycle tag on segments and embeddings.
///
/// Only `Active` rows are search-visible. Rows of one version always share a
/// visibility, and an embedding mirrors its segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Written by a worker, not yet published.
    Staging,
    /// Search-visible.
    Active,
    /// Superseded.
    Archived,
    /// Source object removed.
    SoftDeleted,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Staging => "staging",
            Self::Active => "active",
            Self::Archived => "archived",
            Self::SoftDeleted => "soft_deleted",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "staging" => Ok(Self::Staging),
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            "soft_deleted" => Ok(Self::SoftDeleted),
            _ => Err(format!("unknown visibility: {s}")),
        }
    }
}

/// Operator-facing classification of why an asset was quarantined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageState {
    /// The media itself needs fixing (codec, corruption).
    NeedsMediaFix,
    /// The engine configuration needs review.
    NeedsEngineTuning,
    /// Manual investigation required.
    Quarantined,
}

impl std::fmt::Display for TriageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NeedsMediaFix => "needs_media_fix",
            Self::NeedsEngineTuning => "needs_engine_tuning",
            Self::Quarantined => "quarantined",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TriageState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "needs_media_fix" => Ok(Self::NeedsMediaFix),
            "needs_engine_tuning" => Ok(Self::NeedsEngineTuning),
            "quarantined" => Ok(Self::Quarantined),
            _ => Err(format!("unknown triage state: {s}")),
        }
    }
}

/// Algorithm selecting transcript segment boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Re-split by sentence terminators, durations distributed by text length.
    #[default]
    Sentence,
    /// Group recognizer output into fixed-width time windows.
    FixedWindow,
}

impl std::fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sentence => "sentence",
            Self::FixedWindow => "fixed_window",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ChunkingStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sentence" => Ok(Self::Sentence),
            "fixed_window" => Ok(Self::FixedWindow),
            _ => Err(format!("unknown chunking strategy: {s}")),
        }
    }
}

/// Where the transcription engine executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run the engine on the worker host.
    #[default]
    Local,
    /// Dispatch to a remote compute tier.
    Offloaded,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Local => "local",
            Self::Offloaded => "offloaded",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "offloaded" => Ok(Self::Offloaded),
            _ => Err(format!("unknown execution mode: {s}")),
        }
    }
}

/// Search execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Tokenized text matching.
    #[default]
    Keyword,
    /// Vector distance ordering.
    Semantic,
    /// Weighted fusion of both.
    Hybrid,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Keyword => "keyword",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "keyword" => Ok(Self::Keyword),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(format!("unknown search mode: {s}")),
        }
    }
}

/// Which source produced a search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Keyword source only.
    Keyword,
    /// Semantic source only.
    Semantic,
    /// Both sources contributed.
    Hybrid,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Keyword => "keyword",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        };
        write!(f, "{s}")
    }
}

/// Infrastructure backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process adapters plus a local database file.
    #[default]
    Local,
    /// Externally provisioned stores and queues.
    Production,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            _ => Err(format!("unknown backend: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn asset_status_round_trips_through_strings() {
        for status in [
            AssetStatus::Ingested,
            AssetStatus::Transcribing,
            AssetStatus::Transcribed,
            AssetStatus::Indexed,
            AssetStatus::PendingRetry,
            AssetStatus::Quarantined,
            AssetStatus::Failed,
            AssetStatus::Deleted,
        ] {
            assert_eq!(AssetStatus::from_str(&status.to_string()), Ok(status));
        }
        assert!(AssetStatus::from_str("archived").is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(AssetStatus::Indexed.is_terminal());
        assert!(AssetStatus::Failed.is_terminal());
        assert!(AssetStatus::Deleted.is_terminal());
        assert!(!AssetStatus::PendingRetry.is_terminal());
        assert!(!AssetStatus::Quarantined.is_terminal());
    }

    #[test]
    fn visibility_and_publish_state_agree_on_spelling() {
        for (v, p) in [
            (Visibility::Staging, PublishState::Staging),
            (Visibility::Active, PublishState::Active),
            (Visibility::Archived, PublishState::Archived),
            (Visibility::SoftDeleted, PublishState::SoftDeleted),
        ] {
            assert_eq!(v.to_string(), p.to_string());
        }
    }

    #[test]
    fn search_mode_default_is_keyword() {
        assert_eq!(SearchMode::default(), SearchMode::Keyword);
        assert_eq!(SearchMode::from_str("hybrid"), Ok(SearchMode::Hybrid));
    }
}
