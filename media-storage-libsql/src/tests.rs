//! Integration tests against a temporary database file.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use media_core::error::Result;
use media_core::ports::{JobQueue, MediaDatabase};
use media_core::types::{
    AssetStatus, AssetVersion, ChunkingStrategy, DlqItem, EnginePolicy, ExecutionMode,
    MediaAsset, PublishState, SearchFilter, TranscriptEmbedding, TranscriptSegment,
    TranscriptionJob, Visibility,
};

use crate::{LibsqlDatabase, LibsqlQueue};

async fn test_db() -> Result<(LibsqlDatabase, tempfile::TempDir)> {
    let dir = tempfile::tempdir()?;
    let db = LibsqlDatabase::connect(dir.path().join("media.db")).await?;
    Ok((db, dir))
}

fn asset(bucket: &str, key: &str) -> MediaAsset {
    MediaAsset::new(bucket, key, Uuid::new_v4(), "E1", 1024, "whisper-base")
}

fn segment(asset_id: Uuid, version_id: &str, index: usize, text: &str) -> TranscriptSegment {
    TranscriptSegment {
        segment_id: format!("{version_id}_seg_{index}"),
        asset_id,
        version_id: version_id.to_string(),
        start_ms: index as u64 * 1000,
        end_ms: index as u64 * 1000 + 1000,
        text: text.to_string(),
        speaker: None,
        confidence: 0.9,
        visibility: Visibility::Active,
        strategy: ChunkingStrategy::Sentence,
        created_at: Utc::now(),
    }
}

fn embedding(seg: &TranscriptSegment, vector: Vec<f32>) -> TranscriptEmbedding {
    TranscriptEmbedding {
        embedding_id: TranscriptEmbedding::id_for_segment(&seg.segment_id),
        asset_id: seg.asset_id,
        version_id: seg.version_id.clone(),
        segment_id: seg.segment_id.clone(),
        dimension: vector.len(),
        vector,
        model: "hash-embedder-v1".to_string(),
        visibility: Visibility::Active,
        created_at: Utc::now(),
    }
}

fn policy() -> EnginePolicy {
    EnginePolicy {
        engine: "whisper-base".to_string(),
        diarization_enabled: false,
        execution_mode: ExecutionMode::Local,
        compute_threshold_secs: 600,
        force_chunking_strategy: None,
    }
}

#[tokio::test]
async fn asset_round_trips_with_optional_fields() -> Result<()> {
    let (db, _dir) = test_db().await?;
    let mut original = asset("media", "hello.wav");
    original.content_type = Some("audio/wav".to_string());
    original.duration_secs = Some(12.5);
    original.last_error = Some("previous failure".to_string());

    db.upsert_asset(&original).await?;
    let reloaded = db.get_asset(original.asset_id).await?.expect("asset");

    assert_eq!(reloaded.bucket, "media");
    assert_eq!(reloaded.object_key, "hello.wav");
    assert_eq!(reloaded.status, AssetStatus::Ingested);
    assert_eq!(reloaded.content_type.as_deref(), Some("audio/wav"));
    assert_eq!(reloaded.duration_secs, Some(12.5));
    assert_eq!(reloaded.last_error.as_deref(), Some("previous failure"));
    assert!(reloaded.current_version_id.is_none());
    assert!(!reloaded.tombstoned);
    Ok(())
}

#[tokio::test]
async fn record_version_is_idempotent_across_connections() -> Result<()> {
    let (db, _dir) = test_db().await?;
    let a = asset("media", "hello.wav");
    let version = AssetVersion::new("v_1", a.asset_id, "E1", 1024);

    assert!(db.record_version(&a, &version).await?);
    assert!(!db.record_version(&a, &version).await?);
    assert_eq!(db.list_versions(a.asset_id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn location_lookup_and_lineage_after_tombstone() -> Result<()> {
    let (db, _dir) = test_db().await?;
    let a = asset("media", "hello.wav");
    db.upsert_asset(&a).await?;

    assert!(db.get_asset_by_location("media", "hello.wav").await?.is_some());
    db.tombstone_asset(a.asset_id).await?;
    assert!(db.get_asset_by_location("media", "hello.wav").await?.is_none());
    assert_eq!(db.find_lineage("media", "hello.wav").await?, Some(a.lineage_id));

    let reloaded = db.get_asset(a.asset_id).await?.expect("asset");
    assert_eq!(reloaded.status, AssetStatus::Deleted);
    assert!(reloaded.tombstoned);
    Ok(())
}

#[tokio::test]
async fn segments_and_embeddings_replace_idempotently() -> Result<()> {
    let (db, _dir) = test_db().await?;
    let a = asset("media", "hello.wav");
    let version = AssetVersion::new("v_1", a.asset_id, "E1", 1024);
    db.record_version(&a, &version).await?;

    let segs = vec![
        segment(a.asset_id, "v_1", 0, "hello world"),
        segment(a.asset_id, "v_1", 1, "second chunk"),
    ];
    db.replace_segments(a.asset_id, "v_1", &segs).await?;
    db.replace_segments(a.asset_id, "v_1", &segs).await?;
    let stored = db.list_segments(a.asset_id, "v_1").await?;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].text, "hello world");

    let embs = vec![embedding(&segs[0], vec![1.0, 0.0, 0.0])];
    db.replace_embeddings(a.asset_id, "v_1", &embs).await?;
    db.replace_embeddings(a.asset_id, "v_1", &embs).await?;
    let stored = db.list_embeddings(a.asset_id, "v_1").await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].vector, vec![1.0, 0.0, 0.0]);
    assert_eq!(stored[0].dimension, 3);
    Ok(())
}

#[tokio::test]
async fn keyword_candidates_respect_visibility_and_pointer() -> Result<()> {
    let (db, _dir) = test_db().await?;
    let mut a = asset("media", "hello.wav");
    a.current_version_id = Some("v_2".to_string());
    let v1 = AssetVersion::new("v_1", a.asset_id, "E1", 1024);
    let v2 = AssetVersion::new("v_2", a.asset_id, "E2", 2048);
    db.record_version(&a, &v1).await?;
    db.record_version(&a, &v2).await?;

    db.replace_segments(a.asset_id, "v_1", &[segment(a.asset_id, "v_1", 0, "hello old")])
        .await?;
    db.replace_segments(a.asset_id, "v_2", &[segment(a.asset_id, "v_2", 0, "hello new")])
        .await?;

    let hits = db
        .keyword_candidates(&["hello".to_string()], &SearchFilter::default())
        .await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].segment.version_id, "v_2");
    assert_eq!(hits[0].asset.object_key, "hello.wav");

    // Staging rows of the current version stay invisible too.
    let mut staged = segment(a.asset_id, "v_2", 1, "hello staged");
    staged.visibility = Visibility::Staging;
    db.replace_segments(
        a.asset_id,
        "v_2",
        &[segment(a.asset_id, "v_2", 0, "hello new"), staged],
    )
    .await?;
    let hits = db
        .keyword_candidates(&["hello".to_string()], &SearchFilter::default())
        .await?;
    assert_eq!(hits.len(), 1);
    Ok(())
}

#[tokio::test]
async fn keyword_candidates_filter_by_bucket() -> Result<()> {
    let (db, _dir) = test_db().await?;
    for bucket in ["media", "archive"] {
        let mut a = asset(bucket, "clip.wav");
        a.current_version_id = Some("v_1".to_string());
        let version = AssetVersion::new("v_1", a.asset_id, "E1", 1024);
        db.record_version(&a, &version).await?;
        db.replace_segments(a.asset_id, "v_1", &[segment(a.asset_id, "v_1", 0, "hello")])
            .await?;
    }

    let filter = SearchFilter {
        bucket: Some("media".to_string()),
        speaker: None,
    };
    let hits = db.keyword_candidates(&["hello".to_string()], &filter).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].asset.bucket, "media");
    Ok(())
}

#[tokio::test]
async fn semantic_candidates_order_by_distance() -> Result<()> {
    let (db, _dir) = test_db().await?;
    let mut a = asset("media", "hello.wav");
    a.current_version_id = Some("v_1".to_string());
    let version = AssetVersion::new("v_1", a.asset_id, "E1", 1024);
    db.record_version(&a, &version).await?;

    let near = segment(a.asset_id, "v_1", 0, "near");
    let far = segment(a.asset_id, "v_1", 1, "far");
    db.replace_segments(a.asset_id, "v_1", &[near.clone(), far.clone()])
        .await?;
    db.replace_embeddings(
        a.asset_id,
        "v_1",
        &[
            embedding(&near, vec![1.0, 0.0]),
            embedding(&far, vec![0.0, 1.0]),
        ],
    )
    .await?;

    let results = db
        .semantic_candidates(&[1.0, 0.0], &SearchFilter::default(), 10)
        .await?;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0.segment.segment_id, near.segment_id);
    assert!(results[0].1 < results[1].1);
    Ok(())
}

#[tokio::test]
async fn visibility_cutover_flips_version_and_rows() -> Result<()> {
    let (db, _dir) = test_db().await?;
    let a = asset("media", "hello.wav");
    let version = AssetVersion::new("v_1", a.asset_id, "E1", 1024);
    db.record_version(&a, &version).await?;
    let mut staged = segment(a.asset_id, "v_1", 0, "hello");
    staged.visibility = Visibility::Staging;
    db.replace_segments(a.asset_id, "v_1", &[staged]).await?;

    db.set_version_visibility(a.asset_id, "v_1", PublishState::Active, Visibility::Active)
        .await?;
    db.set_current_version(a.asset_id, Some("v_1")).await?;

    let version = db.get_version(a.asset_id, "v_1").await?.expect("version");
    assert_eq!(version.publish_state, PublishState::Active);
    let segments = db.list_segments(a.asset_id, "v_1").await?;
    assert!(segments.iter().all(|s| s.visibility == Visibility::Active));
    let reloaded = db.get_asset(a.asset_id).await?.expect("asset");
    assert_eq!(reloaded.current_version_id.as_deref(), Some("v_1"));
    Ok(())
}

#[tokio::test]
async fn dlq_round_trip_and_removal() -> Result<()> {
    let (db, _dir) = test_db().await?;
    let a = asset("media", "hello.wav");
    db.upsert_asset(&a).await?;

    let job = TranscriptionJob::new(a.asset_id, "v_1", policy(), 2);
    let item = DlqItem {
        dlq_id: Uuid::new_v4(),
        job: job.clone(),
        asset_id: a.asset_id,
        version_id: "v_1".to_string(),
        error_kind: "media_format".to_string(),
        error_message: "bad codec".to_string(),
        retryable: false,
        log_trail: vec!["attempt 2: media format error: bad codec".to_string()],
        created_at: Utc::now(),
    };
    db.add_dlq_item(&item).await?;

    let reloaded = db.get_dlq_item(item.dlq_id).await?.expect("dlq item");
    assert_eq!(reloaded.job.job_id, job.job_id);
    assert_eq!(reloaded.job.attempt, 2);
    assert_eq!(reloaded.error_kind, "media_format");
    assert_eq!(reloaded.log_trail.len(), 1);

    assert_eq!(db.list_dlq_items_for_asset(a.asset_id).await?.len(), 1);
    assert_eq!(db.remove_dlq_for_asset(a.asset_id).await?, 1);
    assert!(db.list_dlq_items().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn purge_removes_old_archived_versions_only() -> Result<()> {
    let (db, _dir) = test_db().await?;
    let a = asset("media", "hello.wav");
    let mut old = AssetVersion::new("v_old", a.asset_id, "E1", 1024);
    old.publish_state = PublishState::Archived;
    old.created_at = Utc::now() - chrono::Duration::days(60);
    let mut current = AssetVersion::new("v_new", a.asset_id, "E2", 2048);
    current.publish_state = PublishState::Active;
    db.record_version(&a, &old).await?;
    db.record_version(&a, &current).await?;
    db.replace_segments(a.asset_id, "v_old", &[segment(a.asset_id, "v_old", 0, "stale")])
        .await?;

    let cutoff = Utc::now() - chrono::Duration::days(30);
    assert_eq!(db.purge_archived_versions(cutoff).await?, 1);
    assert!(db.get_version(a.asset_id, "v_old").await?.is_none());
    assert!(db.list_segments(a.asset_id, "v_old").await?.is_empty());
    assert!(db.get_version(a.asset_id, "v_new").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn queue_delivery_cycle_persists() -> Result<()> {
    let (db, _dir) = test_db().await?;
    let queue = LibsqlQueue::new(db.connection());

    let job = TranscriptionJob::new(Uuid::new_v4(), "v_1", policy(), 0);
    let duplicate = TranscriptionJob {
        job_id: Uuid::new_v4(),
        ..job.clone()
    };
    assert!(queue.enqueue(job.clone()).await?);
    assert!(!queue.enqueue(duplicate).await?);
    assert_eq!(queue.pending().await?, 1);

    let leased = queue.dequeue().await?.expect("job");
    assert_eq!(leased.job_id, job.job_id);
    assert_eq!(leased.engine_policy.engine, "whisper-base");
    // Leased job is not redelivered while the lease holds.
    assert!(queue.dequeue().await?.is_none());

    queue.nack(leased.job_id).await?;
    let redelivered = queue.dequeue().await?.expect("job");
    assert_eq!(redelivered.job_id, job.job_id);

    queue.ack(redelivered.job_id).await?;
    assert_eq!(queue.pending().await?, 0);
    assert!(queue.next_due_in().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn delayed_jobs_report_their_due_time() -> Result<()> {
    let (db, _dir) = test_db().await?;
    let queue = LibsqlQueue::new(db.connection());

    let job = TranscriptionJob::new(Uuid::new_v4(), "v_1", policy(), 1);
    queue.enqueue_delayed(job, Duration::from_secs(60)).await?;

    assert!(queue.dequeue().await?.is_none());
    let due_in = queue.next_due_in().await?.expect("due time");
    assert!(due_in > Duration::from_secs(50));
    Ok(())
}
