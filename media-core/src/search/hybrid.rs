//! Hybrid fusion of keyword and semantic results.
//!
//! Both sources score in `[0, 1]`; the combined score is
//! `Wk * keyword + Ws * semantic` with caller-provided weights. A segment
//! present in only one source contributes only that term. Ordering ties
//! break on raw semantic score, then raw keyword score, then segment id.

use std::collections::HashMap;

use crate::types::{MatchType, SegmentHit};

/// Caller-provided fusion weights.
#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    /// Weight applied to the keyword score.
    pub keyword: f32,
    /// Weight applied to the semantic score.
    pub semantic: f32,
}

/// One fused result.
#[derive(Debug, Clone)]
pub struct FusedHit {
    /// The segment row.
    pub hit: SegmentHit,
    /// Keyword score, when the keyword source matched.
    pub keyword_score: Option<f32>,
    /// Semantic score, when the semantic source matched.
    pub semantic_score: Option<f32>,
    /// Weighted combination.
    pub combined: f32,
}

impl FusedHit {
    /// Which source(s) produced this hit.
    #[must_use]
    pub fn match_type(&self) -> MatchType {
        match (self.keyword_score, self.semantic_score) {
            (Some(_), Some(_)) => MatchType::Hybrid,
            (Some(_), None) => MatchType::Keyword,
            _ => MatchType::Semantic,
        }
    }
}

/// Fuse the two candidate sets per segment id and rank.
#[must_use]
pub fn fuse(
    keyword: Vec<(SegmentHit, f32)>,
    semantic: Vec<(SegmentHit, f32)>,
    weights: FusionWeights,
) -> Vec<FusedHit> {
    struct Entry {
        hit: SegmentHit,
        keyword: Option<f32>,
        semantic: Option<f32>,
    }

    let mut entries: HashMap<String, Entry> = HashMap::new();
    for (hit, score) in keyword {
        entries.insert(
            hit.segment.segment_id.clone(),
            Entry {
                hit,
                keyword: Some(score),
                semantic: None,
            },
        );
    }
    for (hit, score) in semantic {
        match entries.get_mut(&hit.segment.segment_id) {
            Some(entry) => entry.semantic = Some(score),
            None => {
                entries.insert(
                    hit.segment.segment_id.clone(),
                    Entry {
                        hit,
                        keyword: None,
                        semantic: Some(score),
                    },
                );
            }
        }
    }

    let mut fused: Vec<FusedHit> = entries
        .into_values()
        .map(|entry| {
            let combined = weights.keyword * entry.keyword.unwrap_or(0.0)
                + weights.semantic * entry.semantic.unwrap_or(0.0);
            FusedHit {
                hit: entry.hit,
                keyword_score: entry.keyword,
                semantic_score: entry.semantic,
                combined,
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.combined
            .partial_cmp(&a.combined)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.semantic_score
                    .unwrap_or(-1.0)
                    .partial_cmp(&a.semantic_score.unwrap_or(-1.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                b.keyword_score
                    .unwrap_or(-1.0)
                    .partial_cmp(&a.keyword_score.unwrap_or(-1.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.hit.segment.segment_id.cmp(&b.hit.segment.segment_id))
    });
    fused
}
