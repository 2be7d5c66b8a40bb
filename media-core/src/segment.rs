//! Transcript segmentation.
//!
//! Raw recognizer output is re-chunked before indexing. The default
//! strategy re-splits on sentence terminators, distributing each
//! recognizer window's duration proportionally to text length. Long media
//! falls back to fixed time windows, which cap segment count regardless of
//! how the recognizer chose its boundaries. Pure logic, no suspension
//! points.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::types::{
    AsrSegment, ChunkingStrategy, EnginePolicy, TranscriptOutput, TranscriptSegment, Visibility,
};

/// Pick the chunking strategy for a job.
///
/// A forced strategy in the policy wins. Otherwise media strictly longer
/// than the compute threshold uses fixed windows; anything up to and
/// including the threshold uses sentence chunking.
#[must_use]
pub fn select_strategy(policy: &EnginePolicy, duration_secs: f64) -> ChunkingStrategy {
    if let Some(forced) = policy.force_chunking_strategy {
        return forced;
    }
    #[allow(clippy::cast_precision_loss)]
    let threshold_secs = policy.compute_threshold_secs as f64;
    if duration_secs > threshold_secs {
        ChunkingStrategy::FixedWindow
    } else {
        ChunkingStrategy::Sentence
    }
}

/// Chunk recognizer output into staging transcript segments.
///
/// Segment ids are `{version_id}_seg_{index}` with a single running index,
/// so re-running the same output yields an identical set.
#[must_use]
pub fn chunk_transcript(
    output: &TranscriptOutput,
    strategy: ChunkingStrategy,
    asset_id: Uuid,
    version_id: &str,
    window_ms: u64,
) -> Vec<TranscriptSegment> {
    let pieces = match strategy {
        ChunkingStrategy::Sentence => sentence_pieces(&output.segments),
        ChunkingStrategy::FixedWindow => window_pieces(output, window_ms),
    };

    let created_at = Utc::now();
    pieces
        .into_iter()
        .enumerate()
        .map(|(index, piece)| TranscriptSegment {
            segment_id: format!("{version_id}_seg_{index}"),
            asset_id,
            version_id: version_id.to_string(),
            start_ms: piece.start_ms,
            end_ms: piece.end_ms,
            text: piece.text,
            speaker: piece.speaker,
            confidence: piece.confidence,
            visibility: Visibility::Staging,
            strategy,
            created_at,
        })
        .collect()
}

struct Piece {
    start_ms: u64,
    end_ms: u64,
    text: String,
    speaker: Option<String>,
    confidence: f32,
}

/// Re-split each recognizer window by sentence terminators, spreading the
/// window's duration proportionally to sentence length. The speaker and
/// confidence of the spanning window carry through to each sentence.
fn sentence_pieces(segments: &[AsrSegment]) -> Vec<Piece> {
    let mut pieces = Vec::new();
    for asr in segments {
        let sentences = split_sentences(&asr.text);
        if sentences.is_empty() {
            continue;
        }

        let span = asr.end_ms.saturating_sub(asr.start_ms);
        let total_chars: usize = sentences.iter().map(|s| s.chars().count()).sum();
        let mut consumed_chars = 0usize;
        let mut cursor = asr.start_ms;
        let last = sentences.len() - 1;

        for (i, sentence) in sentences.into_iter().enumerate() {
            consumed_chars += sentence.chars().count();
            // Accumulate from the window start so rounding never drifts; the
            // final sentence lands exactly on the window end.
            let end = if i == last || total_chars == 0 {
                asr.end_ms
            } else {
                asr.start_ms + span * consumed_chars as u64 / total_chars as u64
            };
            pieces.push(Piece {
                start_ms: cursor,
                end_ms: end.max(cursor),
                text: sentence,
                speaker: asr.speaker.clone(),
                confidence: asr.confidence,
            });
            cursor = end.max(cursor);
        }
    }
    pieces
}

/// Group recognizer segments into fixed windows of `window_ms`, keyed by
/// each segment's start offset. Every window carries the majority speaker
/// and the mean confidence of its contributors.
fn window_pieces(output: &TranscriptOutput, window_ms: u64) -> Vec<Piece> {
    let window_ms = window_ms.max(1);
    let mut windows: HashMap<u64, Vec<&AsrSegment>> = HashMap::new();
    for asr in &output.segments {
        if asr.text.trim().is_empty() {
            continue;
        }
        windows.entry(asr.start_ms / window_ms).or_default().push(asr);
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let media_end_ms = (output.duration_secs * 1000.0).round().max(0.0) as u64;

    let mut keys: Vec<u64> = windows.keys().copied().collect();
    keys.sort_unstable();

    let mut pieces = Vec::with_capacity(keys.len());
    for key in keys {
        let mut contributors = windows.remove(&key).unwrap_or_default();
        contributors.sort_by_key(|s| s.start_ms);

        let text = contributors
            .iter()
            .map(|s| s.text.trim())
            .collect::<Vec<_>>()
            .join(" ");
        #[allow(clippy::cast_precision_loss)]
        let confidence =
            contributors.iter().map(|s| s.confidence).sum::<f32>() / contributors.len() as f32;
        let last_contributor_end = contributors.iter().map(|s| s.end_ms).max().unwrap_or(0);

        let start_ms = key * window_ms;
        let end_ms = (start_ms + window_ms).min(media_end_ms.max(last_contributor_end));

        pieces.push(Piece {
            start_ms,
            end_ms: end_ms.max(start_ms),
            text,
            speaker: majority_speaker(&contributors),
            confidence,
        });
    }
    pieces
}

/// Most frequent speaker label among contributors; ties resolve to the
/// label seen first in time order.
fn majority_speaker(contributors: &[&AsrSegment]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for speaker in contributors.iter().filter_map(|s| s.speaker.as_deref()) {
        match counts.iter_mut().find(|(label, _)| *label == speaker) {
            Some((_, count)) => *count += 1,
            None => counts.push((speaker, 1)),
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(label, _)| label.to_string())
}

/// Split text into sentences on `.`, `!`, `?`, keeping the terminator.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecutionMode;

    fn policy(threshold_secs: u64, forced: Option<ChunkingStrategy>) -> EnginePolicy {
        EnginePolicy {
            engine: "whisper-base".to_string(),
            diarization_enabled: false,
            execution_mode: ExecutionMode::Local,
            compute_threshold_secs: threshold_secs,
            force_chunking_strategy: forced,
        }
    }

    fn asr(start_ms: u64, end_ms: u64, text: &str, speaker: Option<&str>) -> AsrSegment {
        AsrSegment {
            start_ms,
            end_ms,
            text: text.to_string(),
            speaker: speaker.map(str::to_string),
            confidence: 0.9,
        }
    }

    fn output(segments: Vec<AsrSegment>, duration_secs: f64) -> TranscriptOutput {
        TranscriptOutput {
            segments,
            duration_secs,
            engine: "whisper-base".to_string(),
        }
    }

    #[test]
    fn strategy_selection_at_threshold_stays_sentence() {
        let p = policy(600, None);
        assert_eq!(select_strategy(&p, 599.0), ChunkingStrategy::Sentence);
        assert_eq!(select_strategy(&p, 600.0), ChunkingStrategy::Sentence);
        assert_eq!(select_strategy(&p, 600.1), ChunkingStrategy::FixedWindow);
    }

    #[test]
    fn forced_strategy_overrides_selection() {
        let p = policy(600, Some(ChunkingStrategy::FixedWindow));
        assert_eq!(select_strategy(&p, 1.0), ChunkingStrategy::FixedWindow);
    }

    #[test]
    fn split_sentences_keeps_terminators() {
        let sentences = split_sentences("Hello world. How are you? Fine!");
        assert_eq!(sentences, vec!["Hello world.", "How are you?", "Fine!"]);
    }

    #[test]
    fn split_sentences_keeps_trailing_fragment() {
        let sentences = split_sentences("Complete sentence. trailing words");
        assert_eq!(sentences, vec!["Complete sentence.", "trailing words"]);
    }

    #[test]
    fn sentence_chunking_distributes_duration_proportionally() {
        let out = output(
            vec![asr(0, 1000, "Hello world. How are you doing today?", Some("s1"))],
            1.0,
        );
        let segments =
            chunk_transcript(&out, ChunkingStrategy::Sentence, Uuid::new_v4(), "v_1", 5000);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].segment_id, "v_1_seg_0");
        assert_eq!(segments[1].segment_id, "v_1_seg_1");
        assert_eq!(segments[0].start_ms, 0);
        // First sentence is 12 of 36 characters, so roughly a third of 1000ms.
        assert!(segments[0].end_ms >= 250 && segments[0].end_ms <= 400);
        assert_eq!(segments[1].start_ms, segments[0].end_ms);
        assert_eq!(segments[1].end_ms, 1000);
        assert_eq!(segments[0].speaker.as_deref(), Some("s1"));
        assert!(segments.iter().all(|s| s.visibility == Visibility::Staging));
        assert!(segments.iter().all(|s| s.start_ms <= s.end_ms));
    }

    #[test]
    fn sentence_chunking_without_terminator_spans_the_window() {
        let out = output(vec![asr(500, 1500, "hello world", None)], 1.5);
        let segments =
            chunk_transcript(&out, ChunkingStrategy::Sentence, Uuid::new_v4(), "v_1", 5000);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_ms, 500);
        assert_eq!(segments[0].end_ms, 1500);
        assert_eq!(segments[0].text, "hello world");
    }

    #[test]
    fn fixed_window_groups_by_start_offset() {
        let out = output(
            vec![
                asr(0, 2000, "first", Some("a")),
                asr(2500, 4500, "second", Some("b")),
                asr(6000, 8000, "third", Some("b")),
            ],
            8.0,
        );
        let segments = chunk_transcript(
            &out,
            ChunkingStrategy::FixedWindow,
            Uuid::new_v4(),
            "v_2",
            5000,
        );

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start_ms, 0);
        assert_eq!(segments[0].end_ms, 5000);
        assert_eq!(segments[0].text, "first second");
        assert_eq!(segments[1].start_ms, 5000);
        assert_eq!(segments[1].end_ms, 8000);
        assert_eq!(segments[1].text, "third");
        assert_eq!(segments[1].speaker.as_deref(), Some("b"));
    }

    #[test]
    fn fixed_window_majority_speaker_and_mean_confidence() {
        let mut a = asr(0, 1000, "one", Some("alice"));
        a.confidence = 0.8;
        let mut b = asr(1000, 2000, "two", Some("bob"));
        b.confidence = 0.6;
        let mut c = asr(2000, 3000, "three", Some("alice"));
        c.confidence = 1.0;
        let out = output(vec![a, b, c], 3.0);

        let segments = chunk_transcript(
            &out,
            ChunkingStrategy::FixedWindow,
            Uuid::new_v4(),
            "v_3",
            5000,
        );
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].speaker.as_deref(), Some("alice"));
        assert!((segments[0].confidence - 0.8).abs() < 0.001);
        // Window is clamped to the media end rather than the nominal 5s.
        assert_eq!(segments[0].end_ms, 3000);
    }

    #[test]
    fn empty_output_yields_no_segments() {
        let out = output(vec![], 0.0);
        for strategy in [ChunkingStrategy::Sentence, ChunkingStrategy::FixedWindow] {
            assert!(chunk_transcript(&out, strategy, Uuid::new_v4(), "v_4", 5000).is_empty());
        }
    }

    #[test]
    fn rerunning_produces_identical_segment_ids() {
        let out = output(vec![asr(0, 1000, "Hello there. Bye.", None)], 1.0);
        let asset_id = Uuid::new_v4();
        let first: Vec<String> =
            chunk_transcript(&out, ChunkingStrategy::Sentence, asset_id, "v_5", 5000)
                .into_iter()
                .map(|s| s.segment_id)
                .collect();
        let second: Vec<String> =
            chunk_transcript(&out, ChunkingStrategy::Sentence, asset_id, "v_5", 5000)
                .into_iter()
                .map(|s| s.segment_id)
                .collect();
        assert_eq!(first, second);
    }
}
