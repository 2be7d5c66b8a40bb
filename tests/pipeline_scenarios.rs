//! Canonical end-to-end flows: upload through search, overwrite cutover,
//! deletion, retry exhaustion, and hybrid ranking.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use media_core::adapters::MemoryDatabase;
use media_core::derive_version_id;
use media_core::ports::MediaDatabase;
use media_core::search::SearchService;
use media_core::types::{
    AssetVersion, ChunkingStrategy, MatchType, MediaAsset, PublishState, SearchConfig,
    SearchRequest, TranscriptEmbedding, TranscriptSegment, Visibility,
};
use media_core::{AssetStatus, Error, TriageState};
use test_utils::{transcript, LocalPipeline};

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn scenario_happy_path() {
    let pipeline = LocalPipeline::with_fallback(transcript(&[(0, 1000, "hello world")], 1.0));
    let outcome = pipeline
        .upload("media", "hello.wav", vec![0u8; 1024], "E1", t0())
        .await
        .unwrap();
    let media_core::IngestOutcome::Created { asset_id, version_id, job_enqueued } = outcome
    else {
        panic!("expected created outcome, got {outcome:?}");
    };
    assert!(job_enqueued);
    assert_eq!(version_id, derive_version_id("E1", 1024, t0()));

    pipeline.drain().await.unwrap();

    let asset = pipeline.db.get_asset(asset_id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Indexed);
    assert_eq!(asset.current_version_id.as_deref(), Some(version_id.as_str()));

    let versions = pipeline.db.list_versions(asset_id).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].publish_state, PublishState::Active);

    let segments = pipeline.db.list_segments(asset_id, &version_id).await.unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].start_ms, 0);
    assert_eq!(segments[0].visibility, Visibility::Active);

    let embeddings = pipeline
        .db
        .list_embeddings(asset_id, &version_id)
        .await
        .unwrap();
    assert_eq!(embeddings.len(), 1);
    assert_eq!(
        embeddings[0].vector.len(),
        pipeline.config.embedding.dimension
    );
    assert_eq!(embeddings[0].visibility, Visibility::Active);

    let response = pipeline.search_keyword("hello").await.unwrap();
    assert_eq!(response.total, 1);
    assert_eq!(response.results[0].start_ms, 0);
    assert_eq!(response.results[0].asset.object_key, "hello.wav");
}

#[tokio::test]
async fn scenario_overwrite_cuts_over_atomically() {
    let pipeline = LocalPipeline::with_fallback(transcript(&[(0, 1000, "hello world")], 1.0));
    pipeline
        .upload("media", "hello.wav", vec![0u8; 1024], "E1", t0())
        .await
        .unwrap();
    pipeline.drain().await.unwrap();

    pipeline
        .recognizer
        .push_ok(transcript(&[(0, 500, "goodbye")], 0.5));
    let t1 = t0() + chrono::Duration::hours(1);
    let outcome = pipeline
        .upload("media", "hello.wav", vec![1u8; 2048], "E2", t1)
        .await
        .unwrap();
    let media_core::IngestOutcome::Created { asset_id, version_id: v2, .. } = outcome else {
        panic!("expected created outcome");
    };
    pipeline.drain().await.unwrap();

    let versions = pipeline.db.list_versions(asset_id).await.unwrap();
    assert_eq!(versions.len(), 2);
    let active: Vec<&AssetVersion> = versions
        .iter()
        .filter(|v| v.publish_state == PublishState::Active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].version_id, v2);
    assert_eq!(active[0].version_id, derive_version_id("E2", 2048, t1));

    let v1 = derive_version_id("E1", 1024, t0());
    let old_segments = pipeline.db.list_segments(asset_id, &v1).await.unwrap();
    assert!(old_segments
        .iter()
        .all(|s| s.visibility == Visibility::Archived));

    assert_eq!(pipeline.search_keyword("hello").await.unwrap().total, 0);
    let goodbye = pipeline.search_keyword("goodbye").await.unwrap();
    assert_eq!(goodbye.total, 1);
    assert_eq!(goodbye.results[0].version_id, v2);
}

#[tokio::test]
async fn scenario_delete_hides_everything() {
    let pipeline = LocalPipeline::with_fallback(transcript(&[(0, 1000, "hello world")], 1.0));
    let outcome = pipeline
        .upload("media", "hello.wav", vec![0u8; 1024], "E1", t0())
        .await
        .unwrap();
    let media_core::IngestOutcome::Created { asset_id, version_id, .. } = outcome else {
        panic!("expected created outcome");
    };
    pipeline.drain().await.unwrap();

    pipeline.remove("media", "hello.wav").await.unwrap();

    let asset = pipeline.db.get_asset(asset_id).await.unwrap().unwrap();
    assert!(asset.tombstoned);
    assert_eq!(asset.status, AssetStatus::Deleted);
    assert!(asset.current_version_id.is_none());

    let segments = pipeline.db.list_segments(asset_id, &version_id).await.unwrap();
    assert!(segments
        .iter()
        .all(|s| s.visibility == Visibility::SoftDeleted));
    let embeddings = pipeline
        .db
        .list_embeddings(asset_id, &version_id)
        .await
        .unwrap();
    assert!(embeddings
        .iter()
        .all(|e| e.visibility == Visibility::SoftDeleted));

    assert_eq!(pipeline.search_keyword("hello").await.unwrap().total, 0);
    assert_eq!(pipeline.search_semantic("hello").await.unwrap().total, 0);
    assert_eq!(
        pipeline
            .search_hybrid("hello", None, None)
            .await
            .unwrap()
            .total,
        0
    );
}

#[tokio::test]
async fn scenario_transient_failures_recover() {
    let pipeline = LocalPipeline::with_fallback(transcript(&[(0, 1000, "hello world")], 1.0));
    for n in 1..=3 {
        pipeline
            .recognizer
            .push_err(Error::TransientNetwork(format!("connection reset {n}")));
    }

    let outcome = pipeline
        .upload("media", "hello.wav", vec![0u8; 1024], "E1", t0())
        .await
        .unwrap();
    let media_core::IngestOutcome::Created { asset_id, .. } = outcome else {
        panic!("expected created outcome");
    };
    let deliveries = pipeline.drain().await.unwrap();
    assert_eq!(deliveries, 4, "original delivery plus three retries");
    assert_eq!(pipeline.recognizer.calls(), 4);

    let asset = pipeline.db.get_asset(asset_id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Indexed);
    let active = pipeline
        .db
        .list_versions(asset_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|v| v.publish_state == PublishState::Active)
        .count();
    assert_eq!(active, 1);
    assert!(pipeline.db.list_dlq_items().await.unwrap().is_empty());
}

#[tokio::test]
async fn scenario_media_format_failure_quarantines() {
    let pipeline = LocalPipeline::with_fallback(transcript(&[(0, 1000, "hello world")], 1.0));
    pipeline
        .recognizer
        .push_err(Error::MediaFormat("undecodable mxf container".into()));

    let outcome = pipeline
        .upload("media", "broken.mxf", vec![0u8; 64], "E1", t0())
        .await
        .unwrap();
    let media_core::IngestOutcome::Created { asset_id, version_id, .. } = outcome else {
        panic!("expected created outcome");
    };
    let deliveries = pipeline.drain().await.unwrap();
    assert_eq!(deliveries, 1, "no re-enqueues for a terminal failure");

    let asset = pipeline.db.get_asset(asset_id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Quarantined);
    assert_eq!(asset.triage_state, Some(TriageState::NeedsMediaFix));

    let items = pipeline.db.list_dlq_items().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].asset_id, asset_id);
    assert_eq!(items[0].version_id, version_id);
    assert_eq!(items[0].job.version_id, version_id);
}

#[tokio::test]
async fn scenario_happy_path_on_the_durable_backend() {
    use media_core::embeddings::HashEmbedder;
    use media_core::ingest::IngestController;
    use media_core::orchestrator::Orchestrator;
    use media_core::ports::ObjectStore;
    use media_core::types::{ObjectEvent, ObjectEventKind};
    use media_storage_libsql::{LibsqlDatabase, LibsqlQueue};
    use test_utils::{fast_config, ScriptedRecognizer};

    let dir = tempfile::tempdir().unwrap();
    let config = fast_config();
    let db = Arc::new(
        LibsqlDatabase::connect(dir.path().join("media.db"))
            .await
            .unwrap(),
    );
    let queue = Arc::new(LibsqlQueue::new(db.connection()));
    let store = Arc::new(media_core::adapters::MemoryObjectStore::new());
    store
        .put("media", "hello.wav", vec![0u8; 1024], Some("audio/wav"))
        .await
        .unwrap();

    let recognizer = Arc::new(ScriptedRecognizer::new(transcript(
        &[(0, 1000, "hello world")],
        1.0,
    )));
    let ingest = IngestController::new(db.clone(), queue.clone(), store.clone(), config.clone());
    let orchestrator = Orchestrator::new(
        db.clone(),
        store.clone(),
        recognizer,
        Arc::new(HashEmbedder::new(config.embedding.dimension)),
        queue.clone(),
        config.clone(),
    );

    let metadata = store.head("media", "hello.wav").await.unwrap();
    let outcome = ingest
        .handle_event(&ObjectEvent {
            kind: ObjectEventKind::Created,
            bucket: "media".to_string(),
            object_key: "hello.wav".to_string(),
            etag: Some(metadata.etag),
            size: Some(metadata.size),
            timestamp: metadata.last_modified,
        })
        .await
        .unwrap();
    let media_core::IngestOutcome::Created { asset_id, version_id, .. } = outcome else {
        panic!("expected created outcome");
    };

    orchestrator.run_until_idle().await.unwrap();

    let asset = db.get_asset(asset_id).await.unwrap().unwrap();
    assert_eq!(asset.status, AssetStatus::Indexed);
    assert_eq!(asset.current_version_id.as_deref(), Some(version_id.as_str()));

    let service = SearchService::new(
        db.clone(),
        SearchConfig::default(),
        config.embedding.dimension,
    );
    let response = service
        .search(&SearchRequest::keyword("hello"))
        .await
        .unwrap();
    assert_eq!(response.total, 1);
    assert_eq!(response.results[0].segment_id, format!("{version_id}_seg_0"));
}

#[tokio::test]
async fn scenario_hybrid_ranking_with_even_weights() {
    let db = Arc::new(MemoryDatabase::new());
    let mut asset = MediaAsset::new("media", "talk.mp4", Uuid::new_v4(), "E1", 10, "whisper-base");
    asset.current_version_id = Some("v_1".to_string());
    let version = AssetVersion::new("v_1", asset.asset_id, "E1", 10);
    db.record_version(&asset, &version).await.unwrap();

    let make_segment = |index: usize, text: &str| TranscriptSegment {
        segment_id: format!("v_1_seg_{index}"),
        asset_id: asset.asset_id,
        version_id: "v_1".to_string(),
        start_ms: index as u64 * 1000,
        end_ms: index as u64 * 1000 + 1000,
        text: text.to_string(),
        speaker: None,
        confidence: 0.9,
        visibility: Visibility::Active,
        strategy: ChunkingStrategy::Sentence,
        created_at: Utc::now(),
    };
    // A matches the keyword source only (no embedding row), B the semantic
    // source only, C both.
    let a = make_segment(0, "alpha spoken here");
    let b = make_segment(1, "entirely different words");
    let c = make_segment(2, "alpha appears again");
    db.replace_segments(asset.asset_id, "v_1", &[a.clone(), b.clone(), c.clone()])
        .await
        .unwrap();

    let embed = |segment: &TranscriptSegment, vector: Vec<f32>| TranscriptEmbedding {
        embedding_id: TranscriptEmbedding::id_for_segment(&segment.segment_id),
        asset_id: segment.asset_id,
        version_id: segment.version_id.clone(),
        segment_id: segment.segment_id.clone(),
        dimension: vector.len(),
        vector,
        model: "hash-embedder-v1".to_string(),
        visibility: Visibility::Active,
        created_at: segment.created_at,
    };
    db.replace_embeddings(
        asset.asset_id,
        "v_1",
        &[
            embed(&b, vec![1.0, 0.0, 0.0, 0.0]),
            embed(&c, vec![0.8, 0.6, 0.0, 0.0]),
        ],
    )
    .await
    .unwrap();

    let service = SearchService::new(db.clone(), SearchConfig::default(), 4);
    let mut request = SearchRequest::hybrid("alpha", vec![1.0, 0.0, 0.0, 0.0]);
    request.keyword_weight = Some(0.5);
    request.semantic_weight = Some(0.5);
    let response = service.search(&request).await.unwrap();

    assert_eq!(response.total, 3);
    // C scores 0.5*1.0 + 0.5*0.8 = 0.9; A and B both score 0.5, and the
    // semantic-score tie-break puts B ahead of A.
    assert_eq!(response.results[0].segment_id, c.segment_id);
    assert_eq!(response.results[0].match_type, MatchType::Hybrid);
    assert_eq!(response.results[1].segment_id, b.segment_id);
    assert_eq!(response.results[1].match_type, MatchType::Semantic);
    assert_eq!(response.results[2].segment_id, a.segment_id);
    assert_eq!(response.results[2].match_type, MatchType::Keyword);
    assert!((response.results[0].score - 0.9).abs() < 0.01);
}
