//! Query layer.
//!
//! Keyword, semantic, and hybrid search over published transcripts. Every
//! mode shares the same hard filters, enforced by the database primitives:
//! only `Active` rows of an asset's current version are readable, and
//! tombstoned assets never match. An empty result set is a valid answer,
//! not an error.

pub mod hybrid;
pub mod keyword;

use std::sync::Arc;

use tracing::debug;

use crate::embeddings::distance_to_score;
use crate::error::{Error, Result};
use crate::ports::MediaDatabase;
use crate::types::{
    MatchType, SearchConfig, SearchHit, SearchMode, SearchRequest, SearchResponse, SegmentHit,
};

pub use hybrid::{fuse, FusedHit, FusionWeights};
pub use keyword::{build_snippet, keyword_score, tokenize};

const SNIPPET_CHARS: usize = 160;

/// Executes search requests against the database port.
pub struct SearchService {
    db: Arc<dyn MediaDatabase>,
    config: SearchConfig,
    dimension: usize,
}

impl SearchService {
    /// Wire a service over the database port.
    pub fn new(db: Arc<dyn MediaDatabase>, config: SearchConfig, dimension: usize) -> Self {
        Self {
            db,
            config,
            dimension,
        }
    }

    /// Execute one request.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an empty query, an out-of-range limit,
    /// or a missing/mis-sized query vector in semantic and hybrid modes.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        self.validate(request)?;
        debug!(query = %request.query, mode = %request.mode, "executing search");

        let (total, results) = match request.mode {
            SearchMode::Keyword => self.keyword_search(request).await?,
            SearchMode::Semantic => self.semantic_search(request).await?,
            SearchMode::Hybrid => self.hybrid_search(request).await?,
        };

        Ok(SearchResponse {
            query: request.query.clone(),
            mode: request.mode,
            total,
            results,
        })
    }

    fn validate(&self, request: &SearchRequest) -> Result<()> {
        if request.query.trim().is_empty() {
            return Err(Error::InvalidInput("query must not be empty".into()));
        }
        if request.limit == 0 || request.limit > self.config.max_limit {
            return Err(Error::InvalidInput(format!(
                "limit must be in 1..={}, got {}",
                self.config.max_limit, request.limit
            )));
        }
        if matches!(request.mode, SearchMode::Semantic | SearchMode::Hybrid) {
            let Some(vector) = &request.query_vector else {
                return Err(Error::InvalidInput(format!(
                    "{} search requires a query vector",
                    request.mode
                )));
            };
            if vector.len() != self.dimension {
                return Err(Error::InvalidInput(format!(
                    "query vector has dimension {}, expected {}",
                    vector.len(),
                    self.dimension
                )));
            }
        }
        Ok(())
    }

    /// Keyword candidates with their normalized coverage scores, ranked.
    async fn scored_keyword_candidates(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<(SegmentHit, f32)>> {
        let terms = tokenize(&request.query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(SegmentHit, f32)> = self
            .db
            .keyword_candidates(&terms, &request.filter)
            .await?
            .into_iter()
            .map(|hit| {
                let score = keyword_score(&hit.segment.text, &terms);
                (hit, score)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.segment.created_at.cmp(&a.0.segment.created_at))
                .then_with(|| a.0.segment.segment_id.cmp(&b.0.segment.segment_id))
        });
        Ok(scored)
    }

    async fn keyword_search(
        &self,
        request: &SearchRequest,
    ) -> Result<(usize, Vec<SearchHit>)> {
        let terms = tokenize(&request.query);
        let scored = self.scored_keyword_candidates(request).await?;
        let total = scored.len();
        let results = page(scored, request.offset, request.limit)
            .into_iter()
            .map(|(hit, score)| to_hit(hit, score, MatchType::Keyword, &terms))
            .collect();
        Ok((total, results))
    }

    async fn semantic_search(
        &self,
        request: &SearchRequest,
    ) -> Result<(usize, Vec<SearchHit>)> {
        let vector = request.query_vector.as_deref().unwrap_or_default();
        let fetch = request.offset.saturating_add(request.limit);
        let candidates = self
            .db
            .semantic_candidates(vector, &request.filter, fetch)
            .await?;
        let total = candidates.len();
        let results = page(candidates, request.offset, request.limit)
            .into_iter()
            .map(|(hit, distance)| {
                let score = distance_to_score(distance);
                to_hit(hit, score, MatchType::Semantic, &[])
            })
            .collect();
        Ok((total, results))
    }

    async fn hybrid_search(
        &self,
        request: &SearchRequest,
    ) -> Result<(usize, Vec<SearchHit>)> {
        let terms = tokenize(&request.query);
        let keyword_scored = self.scored_keyword_candidates(request).await?;

        let vector = request.query_vector.as_deref().unwrap_or_default();
        let fetch = request.offset.saturating_add(request.limit);
        let semantic_scored: Vec<(SegmentHit, f32)> = self
            .db
            .semantic_candidates(vector, &request.filter, fetch)
            .await?
            .into_iter()
            .map(|(hit, distance)| (hit, distance_to_score(distance)))
            .collect();

        let weights = FusionWeights {
            keyword: request.keyword_weight.unwrap_or(self.config.keyword_weight),
            semantic: request
                .semantic_weight
                .unwrap_or(self.config.semantic_weight),
        };
        let fused = fuse(keyword_scored, semantic_scored, weights);
        let total = fused.len();
        let results = page(fused, request.offset, request.limit)
            .into_iter()
            .map(|fused_hit| {
                let match_type = fused_hit.match_type();
                to_hit(fused_hit.hit, fused_hit.combined, match_type, &terms)
            })
            .collect();
        Ok((total, results))
    }
}

fn page<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(offset).take(limit).collect()
}

fn to_hit(hit: SegmentHit, score: f32, match_type: MatchType, terms: &[String]) -> SearchHit {
    let snippet = build_snippet(&hit.segment.text, terms, SNIPPET_CHARS);
    SearchHit {
        asset_id: hit.segment.asset_id,
        version_id: hit.segment.version_id,
        segment_id: hit.segment.segment_id,
        start_ms: hit.segment.start_ms,
        end_ms: hit.segment.end_ms,
        snippet,
        score,
        match_type,
        speaker: hit.segment.speaker,
        asset: hit.asset,
    }
}
