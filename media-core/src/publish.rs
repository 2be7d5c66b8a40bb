//! Version publisher.
//!
//! The sole mutator of active/archived publication state and the
//! current-version pointer. The cutover runs in three steps — activate the
//! new version's rows, flip the pointer, demote the old version's rows —
//! and every reader joins segments on `current_version_id`, so at no point
//! can a reader observe two active versions of one asset or a pointer at a
//! non-active version.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ports::MediaDatabase;
use crate::types::{AssetStatus, ProcessingStatus, PublishState, Visibility};

/// Performs atomic visibility cutovers between transcript versions.
pub struct VersionPublisher {
    db: Arc<dyn MediaDatabase>,
}

impl VersionPublisher {
    /// Wire a publisher over the database port.
    pub fn new(db: Arc<dyn MediaDatabase>) -> Self {
        Self { db }
    }

    /// Make `version_id` the asset's current searchable version.
    ///
    /// Publishing the already-active version is a no-op. A version with no
    /// segments still publishes; the asset simply has no searchable content.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the asset or version is missing;
    /// [`Error::Internal`] when the current-version pointer references a
    /// non-active version, in which case nothing is written.
    pub async fn publish(&self, asset_id: Uuid, version_id: &str) -> Result<()> {
        let mut asset = self
            .db
            .get_asset(asset_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("asset {asset_id}")))?;
        let mut version = self
            .db
            .get_version(asset_id, version_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("version {version_id}")))?;

        let previous = asset.current_version_id.clone();
        if let Some(current_id) = &previous {
            let current = self
                .db
                .get_version(asset_id, current_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("version {current_id}")))?;
            if current.publish_state != PublishState::Active {
                error!(
                    asset_id = %asset_id,
                    current_version = %current_id,
                    state = %current.publish_state,
                    "current-version pointer references a non-active version"
                );
                return Err(Error::Internal(format!(
                    "asset {asset_id} current version {current_id} is {}",
                    current.publish_state
                )));
            }
        }

        if previous.as_deref() == Some(version_id)
            && version.publish_state == PublishState::Active
        {
            info!(asset_id = %asset_id, version_id = %version_id, "version already published");
            return Ok(());
        }

        // Activate the incoming rows first: until the pointer moves, readers
        // still resolve the old version.
        self.db
            .set_version_visibility(asset_id, version_id, PublishState::Active, Visibility::Active)
            .await?;
        self.db
            .set_current_version(asset_id, Some(version_id))
            .await?;

        // Demote the superseded version last; the pointer no longer reaches
        // it, so the intermediate window only ever shows the new data.
        if let Some(old_id) = previous.filter(|old_id| old_id != version_id) {
            self.db
                .set_version_visibility(
                    asset_id,
                    &old_id,
                    PublishState::Archived,
                    Visibility::Archived,
                )
                .await?;
        }

        version.publish_state = PublishState::Active;
        version.processing_status = ProcessingStatus::Published;
        self.db.update_version(&version).await?;

        asset.current_version_id = Some(version_id.to_string());
        asset.status = AssetStatus::Indexed;
        asset.updated_at = Utc::now();
        self.db.upsert_asset(&asset).await?;

        info!(asset_id = %asset_id, version_id = %version_id, "version published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryDatabase;
    use crate::types::{
        AssetVersion, ChunkingStrategy, MediaAsset, TranscriptSegment,
    };

    async fn seed(db: &MemoryDatabase, version_id: &str, text: &str) -> MediaAsset {
        let asset = MediaAsset::new("media", "a.wav", Uuid::new_v4(), "E1", 100, "whisper-base");
        let version = AssetVersion::new(version_id, asset.asset_id, "E1", 100);
        db.record_version(&asset, &version).await.unwrap();
        let segment = TranscriptSegment {
            segment_id: format!("{version_id}_seg_0"),
            asset_id: asset.asset_id,
            version_id: version_id.to_string(),
            start_ms: 0,
            end_ms: 1000,
            text: text.to_string(),
            speaker: None,
            confidence: 0.9,
            visibility: Visibility::Staging,
            strategy: ChunkingStrategy::Sentence,
            created_at: Utc::now(),
        };
        db.replace_segments(asset.asset_id, version_id, &[segment])
            .await
            .unwrap();
        asset
    }

    async fn seed_second_version(db: &MemoryDatabase, asset: &MediaAsset, version_id: &str) {
        let asset = db.get_asset(asset.asset_id).await.unwrap().unwrap();
        let version = AssetVersion::new(version_id, asset.asset_id, "E2", 200);
        db.record_version(&asset, &version).await.unwrap();
        let segment = TranscriptSegment {
            segment_id: format!("{version_id}_seg_0"),
            asset_id: asset.asset_id,
            version_id: version_id.to_string(),
            start_ms: 0,
            end_ms: 500,
            text: "goodbye".to_string(),
            speaker: None,
            confidence: 0.9,
            visibility: Visibility::Staging,
            strategy: ChunkingStrategy::Sentence,
            created_at: Utc::now(),
        };
        db.replace_segments(asset.asset_id, version_id, &[segment])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn first_publish_activates_rows_and_pointer() {
        let db = Arc::new(MemoryDatabase::new());
        let asset = seed(&db, "v_1", "hello").await;
        let publisher = VersionPublisher::new(db.clone());

        publisher.publish(asset.asset_id, "v_1").await.unwrap();

        let reloaded = db.get_asset(asset.asset_id).await.unwrap().unwrap();
        assert_eq!(reloaded.current_version_id.as_deref(), Some("v_1"));
        assert_eq!(reloaded.status, AssetStatus::Indexed);

        let version = db.get_version(asset.asset_id, "v_1").await.unwrap().unwrap();
        assert_eq!(version.publish_state, PublishState::Active);
        assert_eq!(version.processing_status, ProcessingStatus::Published);

        let segments = db.list_segments(asset.asset_id, "v_1").await.unwrap();
        assert!(segments.iter().all(|s| s.visibility == Visibility::Active));
    }

    #[tokio::test]
    async fn cutover_archives_the_previous_version() {
        let db = Arc::new(MemoryDatabase::new());
        let asset = seed(&db, "v_1", "hello").await;
        let publisher = VersionPublisher::new(db.clone());
        publisher.publish(asset.asset_id, "v_1").await.unwrap();

        seed_second_version(&db, &asset, "v_2").await;
        publisher.publish(asset.asset_id, "v_2").await.unwrap();

        let reloaded = db.get_asset(asset.asset_id).await.unwrap().unwrap();
        assert_eq!(reloaded.current_version_id.as_deref(), Some("v_2"));

        let old = db.get_version(asset.asset_id, "v_1").await.unwrap().unwrap();
        assert_eq!(old.publish_state, PublishState::Archived);
        let old_segments = db.list_segments(asset.asset_id, "v_1").await.unwrap();
        assert!(old_segments
            .iter()
            .all(|s| s.visibility == Visibility::Archived));

        // Exactly one active version after the cutover.
        let active: Vec<AssetVersion> = db
            .list_versions(asset.asset_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|v| v.publish_state == PublishState::Active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].version_id, "v_2");
    }

    #[tokio::test]
    async fn republishing_the_active_version_is_a_noop() {
        let db = Arc::new(MemoryDatabase::new());
        let asset = seed(&db, "v_1", "hello").await;
        let publisher = VersionPublisher::new(db.clone());

        publisher.publish(asset.asset_id, "v_1").await.unwrap();
        publisher.publish(asset.asset_id, "v_1").await.unwrap();

        let version = db.get_version(asset.asset_id, "v_1").await.unwrap().unwrap();
        assert_eq!(version.publish_state, PublishState::Active);
        let reloaded = db.get_asset(asset.asset_id).await.unwrap().unwrap();
        assert_eq!(reloaded.current_version_id.as_deref(), Some("v_1"));
    }

    #[tokio::test]
    async fn empty_version_still_publishes() {
        let db = Arc::new(MemoryDatabase::new());
        let asset = MediaAsset::new("media", "b.wav", Uuid::new_v4(), "E1", 10, "whisper-base");
        let version = AssetVersion::new("v_empty", asset.asset_id, "E1", 10);
        db.record_version(&asset, &version).await.unwrap();
        db.replace_segments(asset.asset_id, "v_empty", &[])
            .await
            .unwrap();

        let publisher = VersionPublisher::new(db.clone());
        publisher.publish(asset.asset_id, "v_empty").await.unwrap();

        let version = db
            .get_version(asset.asset_id, "v_empty")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(version.publish_state, PublishState::Active);
    }

    #[tokio::test]
    async fn corrupt_pointer_aborts_without_writes() {
        let db = Arc::new(MemoryDatabase::new());
        let asset = seed(&db, "v_1", "hello").await;
        // Point the asset at a version that was never activated.
        db.set_current_version(asset.asset_id, Some("v_1")).await.unwrap();
        seed_second_version(&db, &asset, "v_2").await;

        let publisher = VersionPublisher::new(db.clone());
        let result = publisher.publish(asset.asset_id, "v_2").await;
        assert!(matches!(result, Err(Error::Internal(_))));

        // The incoming version was not activated.
        let version = db.get_version(asset.asset_id, "v_2").await.unwrap().unwrap();
        assert_eq!(version.publish_state, PublishState::Staging);
    }

    #[tokio::test]
    async fn missing_version_is_not_found() {
        let db = Arc::new(MemoryDatabase::new());
        let asset = seed(&db, "v_1", "hello").await;
        let publisher = VersionPublisher::new(db.clone());
        assert!(matches!(
            publisher.publish(asset.asset_id, "v_ghost").await,
            Err(Error::NotFound(_))
        ));
    }
}
