//! Cross-cutting consistency checks and idempotence laws, verified after
//! every lifecycle transition the pipeline can make.

use std::collections::HashSet;

use chrono::{TimeZone, Utc};

use media_core::ports::{JobQueue, MediaDatabase};
use media_core::types::{
    AssetStatus, MediaAsset, PublishState, TranscriptionJob, Visibility,
};
use media_core::{Error, IngestOutcome};
use test_utils::{transcript, LocalPipeline};

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap()
}

async fn all_assets(db: &media_core::adapters::MemoryDatabase) -> Vec<MediaAsset> {
    let mut assets = Vec::new();
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
        assets.extend(db.list_assets_by_status(status).await.unwrap());
    }
    assets
}

/// Check every quantified consistency property over the whole database.
async fn check_invariants(pipeline: &LocalPipeline) {
    let db = &pipeline.db;
    let dimension = pipeline.config.embedding.dimension;

    for asset in all_assets(db).await {
        let versions = db.list_versions(asset.asset_id).await.unwrap();

        // At most one active version per asset.
        let active_count = versions
            .iter()
            .filter(|v| v.publish_state == PublishState::Active)
            .count();
        assert!(
            active_count <= 1,
            "asset {} has {active_count} active versions",
            asset.asset_id
        );

        // A non-null current pointer references an existing active version
        // of a live asset.
        if let Some(current) = &asset.current_version_id {
            assert!(!asset.tombstoned, "tombstoned asset keeps a pointer");
            let version = versions
                .iter()
                .find(|v| &v.version_id == current)
                .unwrap_or_else(|| panic!("dangling current version {current}"));
            assert_eq!(version.publish_state, PublishState::Active);
        }

        for version in &versions {
            let segments = db
                .list_segments(asset.asset_id, &version.version_id)
                .await
                .unwrap();
            let embeddings = db
                .list_embeddings(asset.asset_id, &version.version_id)
                .await
                .unwrap();

            // Active rows only ever belong to the current version.
            for segment in &segments {
                if segment.visibility == Visibility::Active {
                    assert_eq!(
                        asset.current_version_id.as_deref(),
                        Some(segment.version_id.as_str()),
                        "active segment on a non-current version"
                    );
                }
                assert!(segment.start_ms <= segment.end_ms);
            }

            // Embeddings mirror their segment's visibility and dimension D.
            for embedding in &embeddings {
                assert_eq!(embedding.vector.len(), dimension);
                let segment = segments
                    .iter()
                    .find(|s| s.segment_id == embedding.segment_id)
                    .unwrap_or_else(|| panic!("orphan embedding {}", embedding.embedding_id));
                assert_eq!(embedding.visibility, segment.visibility);
                assert_eq!(embedding.version_id, segment.version_id);
            }
        }
    }
}

#[tokio::test]
async fn invariants_hold_across_the_full_lifecycle() {
    let pipeline = LocalPipeline::with_fallback(transcript(
        &[(0, 1000, "hello world. second sentence here.")],
        1.0,
    ));

    // Ingest.
    pipeline
        .upload("media", "clip.wav", vec![0u8; 1024], "E1", t0())
        .await
        .unwrap();
    check_invariants(&pipeline).await;

    // First publish.
    pipeline.drain().await.unwrap();
    check_invariants(&pipeline).await;

    // Overwrite and cutover.
    pipeline
        .recognizer
        .push_ok(transcript(&[(0, 700, "replacement text")], 0.7));
    pipeline
        .upload(
            "media",
            "clip.wav",
            vec![1u8; 2048],
            "E2",
            t0() + chrono::Duration::hours(1),
        )
        .await
        .unwrap();
    pipeline.drain().await.unwrap();
    check_invariants(&pipeline).await;

    // Quarantine on a second asset.
    pipeline
        .recognizer
        .push_err(Error::MediaFormat("bad codec".into()));
    pipeline
        .upload("media", "broken.mov", vec![2u8; 64], "E3", t0())
        .await
        .unwrap();
    pipeline.drain().await.unwrap();
    check_invariants(&pipeline).await;

    // Tombstone.
    pipeline.remove("media", "clip.wav").await.unwrap();
    check_invariants(&pipeline).await;
}

#[tokio::test]
async fn duplicate_enqueue_processes_once() {
    let pipeline = LocalPipeline::with_fallback(transcript(&[(0, 1000, "hello")], 1.0));
    let outcome = pipeline
        .upload("media", "clip.wav", vec![0u8; 100], "E1", t0())
        .await
        .unwrap();
    let IngestOutcome::Created { asset_id, version_id, .. } = outcome else {
        panic!("expected created outcome");
    };

    // Same idempotency key as the job ingest enqueued.
    let duplicate = TranscriptionJob::new(
        asset_id,
        &version_id,
        pipeline.config.ingest.engine_policy(),
        0,
    );
    assert!(!pipeline.queue.enqueue(duplicate).await.unwrap());

    let deliveries = pipeline.drain().await.unwrap();
    assert_eq!(deliveries, 1);
    assert_eq!(pipeline.recognizer.calls(), 1);
}

#[tokio::test]
async fn reprocessing_converges_to_the_same_row_set() {
    let pipeline = LocalPipeline::with_fallback(transcript(
        &[(0, 2000, "alpha beta. gamma delta.")],
        2.0,
    ));
    let outcome = pipeline
        .upload("media", "clip.wav", vec![0u8; 100], "E1", t0())
        .await
        .unwrap();
    let IngestOutcome::Created { asset_id, version_id, .. } = outcome else {
        panic!("expected created outcome");
    };
    pipeline.drain().await.unwrap();

    let segment_ids = |segments: Vec<media_core::TranscriptSegment>| -> HashSet<String> {
        segments.into_iter().map(|s| s.segment_id).collect()
    };
    let first = segment_ids(
        pipeline
            .db
            .list_segments(asset_id, &version_id)
            .await
            .unwrap(),
    );

    // A later duplicate delivery for the same version is absorbed by the
    // idempotency gate without touching the published rows.
    let replay = TranscriptionJob::new(
        asset_id,
        &version_id,
        pipeline.config.ingest.engine_policy(),
        7,
    );
    pipeline.queue.enqueue(replay).await.unwrap();
    pipeline.drain().await.unwrap();

    let second = segment_ids(
        pipeline
            .db
            .list_segments(asset_id, &version_id)
            .await
            .unwrap(),
    );
    assert_eq!(first, second);
    check_invariants(&pipeline).await;
}

#[tokio::test]
async fn republish_is_a_noop_and_reingest_is_absorbed() {
    let pipeline = LocalPipeline::with_fallback(transcript(&[(0, 1000, "hello")], 1.0));
    let outcome = pipeline
        .upload("media", "clip.wav", vec![0u8; 100], "E1", t0())
        .await
        .unwrap();
    let IngestOutcome::Created { asset_id, version_id, .. } = outcome else {
        panic!("expected created outcome");
    };
    pipeline.drain().await.unwrap();

    // Publishing the already-active version changes nothing.
    let publisher = media_core::VersionPublisher::new(pipeline.db.clone());
    publisher.publish(asset_id, &version_id).await.unwrap();
    check_invariants(&pipeline).await;

    // Identical content re-ingests as a no-op: same version id, no new
    // rows, no new job.
    let outcome = pipeline
        .upload("media", "clip.wav", vec![0u8; 100], "E1", t0())
        .await
        .unwrap();
    assert!(matches!(outcome, IngestOutcome::AlreadyKnown { .. }));
    assert_eq!(pipeline.db.list_versions(asset_id).await.unwrap().len(), 1);
    assert_eq!(pipeline.queue.pending().await.unwrap(), 0);
}

#[tokio::test]
async fn tombstone_then_reingest_shares_lineage() {
    let pipeline = LocalPipeline::with_fallback(transcript(&[(0, 1000, "hello")], 1.0));
    let outcome = pipeline
        .upload("media", "clip.wav", vec![0u8; 100], "E1", t0())
        .await
        .unwrap();
    let IngestOutcome::Created { asset_id, .. } = outcome else {
        panic!("expected created outcome");
    };
    pipeline.drain().await.unwrap();
    let original = pipeline.db.get_asset(asset_id).await.unwrap().unwrap();

    pipeline.remove("media", "clip.wav").await.unwrap();

    let outcome = pipeline
        .upload(
            "media",
            "clip.wav",
            vec![1u8; 200],
            "E2",
            t0() + chrono::Duration::hours(2),
        )
        .await
        .unwrap();
    let IngestOutcome::Created { asset_id: new_id, .. } = outcome else {
        panic!("expected created outcome");
    };
    pipeline.drain().await.unwrap();

    let replacement = pipeline.db.get_asset(new_id).await.unwrap().unwrap();
    assert_ne!(replacement.asset_id, original.asset_id);
    assert_eq!(replacement.lineage_id, original.lineage_id);
    assert_eq!(replacement.status, AssetStatus::Indexed);
    check_invariants(&pipeline).await;
}

#[tokio::test]
async fn exhausted_retries_stop_at_the_attempt_budget() {
    let pipeline = LocalPipeline::with_fallback(transcript(&[(0, 1000, "hello")], 1.0));
    // More failures than the budget of 5 attempts.
    for n in 1..=10 {
        pipeline
            .recognizer
            .push_err(Error::TransientResource(format!("gpu exhausted {n}")));
    }

    let outcome = pipeline
        .upload("media", "clip.wav", vec![0u8; 100], "E1", t0())
        .await
        .unwrap();
    let IngestOutcome::Created { asset_id, .. } = outcome else {
        panic!("expected created outcome");
    };
    let deliveries = pipeline.drain().await.unwrap();
    assert_eq!(deliveries, 5, "attempts 0 through 4, then quarantine");
    assert_eq!(pipeline.recognizer.calls(), 5);

    let asset = pipeline.db.get_asset(asset_id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Quarantined);
    assert_eq!(asset.attempt_count, 5);
    assert_eq!(pipeline.db.list_dlq_items().await.unwrap().len(), 1);
    check_invariants(&pipeline).await;
}
