//! In-memory metadata and transcript database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::embeddings::cosine_distance;
use crate::error::{Error, Result};
use crate::ports::MediaDatabase;
use crate::types::{
    AssetRef, AssetStatus, AssetVersion, DlqItem, MediaAsset, PublishState, SearchFilter,
    SegmentHit, TranscriptEmbedding, TranscriptSegment, Visibility,
};

#[derive(Default)]
struct DbInner {
    assets: HashMap<Uuid, MediaAsset>,
    versions: HashMap<(Uuid, String), AssetVersion>,
    segments: HashMap<(Uuid, String), Vec<TranscriptSegment>>,
    embeddings: HashMap<(Uuid, String), Vec<TranscriptEmbedding>>,
    dlq: Vec<DlqItem>,
}

impl DbInner {
    /// Assets whose current version is reader-visible, with that version id.
    fn visible_assets<'a>(
        &'a self,
        filter: &'a SearchFilter,
    ) -> impl Iterator<Item = (&'a MediaAsset, &'a str)> + 'a {
        self.assets.values().filter_map(move |asset| {
            if asset.tombstoned {
                return None;
            }
            if let Some(bucket) = &filter.bucket {
                if &asset.bucket != bucket {
                    return None;
                }
            }
            asset
                .current_version_id
                .as_deref()
                .map(|version_id| (asset, version_id))
        })
    }
}

/// In-memory [`MediaDatabase`] for the local backend and tests.
///
/// A single `RwLock` over the whole state makes every method atomic, which
/// satisfies the port's transactional contract trivially.
#[derive(Default)]
pub struct MemoryDatabase {
    inner: RwLock<DbInner>,
}

impl MemoryDatabase {
    /// Create an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn segment_matches_filter(segment: &TranscriptSegment, filter: &SearchFilter) -> bool {
    match &filter.speaker {
        Some(speaker) => segment.speaker.as_deref() == Some(speaker.as_str()),
        None => true,
    }
}

#[async_trait]
impl MediaDatabase for MemoryDatabase {
    async fn upsert_asset(&self, asset: &MediaAsset) -> Result<()> {
        self.inner
            .write()
            .assets
            .insert(asset.asset_id, asset.clone());
        Ok(())
    }

    async fn get_asset(&self, asset_id: Uuid) -> Result<Option<MediaAsset>> {
        Ok(self.inner.read().assets.get(&asset_id).cloned())
    }

    async fn get_asset_by_location(&self, bucket: &str, key: &str) -> Result<Option<MediaAsset>> {
        Ok(self
            .inner
            .read()
            .assets
            .values()
            .find(|asset| !asset.tombstoned && asset.bucket == bucket && asset.object_key == key)
            .cloned())
    }

    async fn find_lineage(&self, bucket: &str, key: &str) -> Result<Option<Uuid>> {
        Ok(self
            .inner
            .read()
            .assets
            .values()
            .filter(|asset| asset.tombstoned && asset.bucket == bucket && asset.object_key == key)
            .max_by_key(|asset| asset.updated_at)
            .map(|asset| asset.lineage_id))
    }

    async fn list_assets_by_status(&self, status: AssetStatus) -> Result<Vec<MediaAsset>> {
        let mut assets: Vec<MediaAsset> = self
            .inner
            .read()
            .assets
            .values()
            .filter(|asset| asset.status == status)
            .cloned()
            .collect();
        assets.sort_by_key(|asset| asset.updated_at);
        Ok(assets)
    }

    async fn record_version(&self, asset: &MediaAsset, version: &AssetVersion) -> Result<bool> {
        let mut inner = self.inner.write();
        inner.assets.insert(asset.asset_id, asset.clone());
        let key = (version.asset_id, version.version_id.clone());
        if inner.versions.contains_key(&key) {
            debug!(version_id = %version.version_id, "version already recorded");
            return Ok(false);
        }
        inner.versions.insert(key, version.clone());
        Ok(true)
    }

    async fn get_version(
        &self,
        asset_id: Uuid,
        version_id: &str,
    ) -> Result<Option<AssetVersion>> {
        Ok(self
            .inner
            .read()
            .versions
            .get(&(asset_id, version_id.to_string()))
            .cloned())
    }

    async fn list_versions(&self, asset_id: Uuid) -> Result<Vec<AssetVersion>> {
        let mut versions: Vec<AssetVersion> = self
            .inner
            .read()
            .versions
            .values()
            .filter(|version| version.asset_id == asset_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(versions)
    }

    async fn update_version(&self, version: &AssetVersion) -> Result<()> {
        let mut inner = self.inner.write();
        let key = (version.asset_id, version.version_id.clone());
        if !inner.versions.contains_key(&key) {
            return Err(Error::NotFound(format!("version {}", version.version_id)));
        }
        inner.versions.insert(key, version.clone());
        Ok(())
    }

    async fn set_version_visibility(
        &self,
        asset_id: Uuid,
        version_id: &str,
        publish_state: PublishState,
        visibility: Visibility,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let key = (asset_id, version_id.to_string());
        let version = inner
            .versions
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(format!("version {version_id}")))?;
        version.publish_state = publish_state;
        if let Some(segments) = inner.segments.get_mut(&key) {
            for segment in segments {
                segment.visibility = visibility;
            }
        }
        if let Some(embeddings) = inner.embeddings.get_mut(&key) {
            for embedding in embeddings {
                embedding.visibility = visibility;
            }
        }
        Ok(())
    }

    async fn set_current_version(&self, asset_id: Uuid, version_id: Option<&str>) -> Result<()> {
        let mut inner = self.inner.write();
        let asset = inner
            .assets
            .get_mut(&asset_id)
            .ok_or_else(|| Error::NotFound(format!("asset {asset_id}")))?;
        asset.current_version_id = version_id.map(str::to_string);
        asset.updated_at = Utc::now();
        Ok(())
    }

    async fn replace_segments(
        &self,
        asset_id: Uuid,
        version_id: &str,
        segments: &[TranscriptSegment],
    ) -> Result<()> {
        self.inner
            .write()
            .segments
            .insert((asset_id, version_id.to_string()), segments.to_vec());
        Ok(())
    }

    async fn replace_embeddings(
        &self,
        asset_id: Uuid,
        version_id: &str,
        embeddings: &[TranscriptEmbedding],
    ) -> Result<()> {
        self.inner
            .write()
            .embeddings
            .insert((asset_id, version_id.to_string()), embeddings.to_vec());
        Ok(())
    }

    async fn list_segments(
        &self,
        asset_id: Uuid,
        version_id: &str,
    ) -> Result<Vec<TranscriptSegment>> {
        Ok(self
            .inner
            .read()
            .segments
            .get(&(asset_id, version_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_embeddings(
        &self,
        asset_id: Uuid,
        version_id: &str,
    ) -> Result<Vec<TranscriptEmbedding>> {
        Ok(self
            .inner
            .read()
            .embeddings
            .get(&(asset_id, version_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn tombstone_asset(&self, asset_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write();
        let asset = inner
            .assets
            .get_mut(&asset_id)
            .ok_or_else(|| Error::NotFound(format!("asset {asset_id}")))?;
        asset.tombstoned = true;
        asset.current_version_id = None;
        asset.status = AssetStatus::Deleted;
        asset.updated_at = Utc::now();

        for version in inner
            .versions
            .values_mut()
            .filter(|version| version.asset_id == asset_id)
        {
            version.publish_state = PublishState::SoftDeleted;
        }
        for ((owner, _), segments) in inner.segments.iter_mut() {
            if *owner == asset_id {
                for segment in segments {
                    segment.visibility = Visibility::SoftDeleted;
                }
            }
        }
        for ((owner, _), embeddings) in inner.embeddings.iter_mut() {
            if *owner == asset_id {
                for embedding in embeddings {
                    embedding.visibility = Visibility::SoftDeleted;
                }
            }
        }
        Ok(())
    }

    async fn keyword_candidates(
        &self,
        terms: &[String],
        filter: &SearchFilter,
    ) -> Result<Vec<SegmentHit>> {
        let inner = self.inner.read();
        let mut hits = Vec::new();
        for (asset, version_id) in inner.visible_assets(filter) {
            let Some(segments) = inner.segments.get(&(asset.asset_id, version_id.to_string()))
            else {
                continue;
            };
            for segment in segments {
                if segment.visibility != Visibility::Active {
                    continue;
                }
                if !segment_matches_filter(segment, filter) {
                    continue;
                }
                let text = segment.text.to_lowercase();
                if terms.iter().any(|term| text.contains(term.as_str())) {
                    hits.push(SegmentHit {
                        segment: segment.clone(),
                        asset: AssetRef {
                            bucket: asset.bucket.clone(),
                            object_key: asset.object_key.clone(),
                        },
                    });
                }
            }
        }
        Ok(hits)
    }

    async fn semantic_candidates(
        &self,
        query: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<(SegmentHit, f32)>> {
        let inner = self.inner.read();
        let mut scored = Vec::new();
        for (asset, version_id) in inner.visible_assets(filter) {
            let key = (asset.asset_id, version_id.to_string());
            let Some(embeddings) = inner.embeddings.get(&key) else {
                continue;
            };
            let segments = inner.segments.get(&key);
            for embedding in embeddings {
                if embedding.visibility != Visibility::Active {
                    continue;
                }
                let Some(segment) = segments.and_then(|segments| {
                    segments
                        .iter()
                        .find(|segment| segment.segment_id == embedding.segment_id)
                }) else {
                    continue;
                };
                if !segment_matches_filter(segment, filter) {
                    continue;
                }
                let distance = cosine_distance(query, &embedding.vector);
                scored.push((
                    SegmentHit {
                        segment: segment.clone(),
                        asset: AssetRef {
                            bucket: asset.bucket.clone(),
                            object_key: asset.object_key.clone(),
                        },
                    },
                    distance,
                ));
            }
        }
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn add_dlq_item(&self, item: &DlqItem) -> Result<()> {
        self.inner.write().dlq.push(item.clone());
        Ok(())
    }

    async fn get_dlq_item(&self, dlq_id: Uuid) -> Result<Option<DlqItem>> {
        Ok(self
            .inner
            .read()
            .dlq
            .iter()
            .find(|item| item.dlq_id == dlq_id)
            .cloned())
    }

    async fn list_dlq_items(&self) -> Result<Vec<DlqItem>> {
        let mut items = self.inner.read().dlq.clone();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn list_dlq_items_for_asset(&self, asset_id: Uuid) -> Result<Vec<DlqItem>> {
        let mut items: Vec<DlqItem> = self
            .inner
            .read()
            .dlq
            .iter()
            .filter(|item| item.asset_id == asset_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn remove_dlq_for_asset(&self, asset_id: Uuid) -> Result<usize> {
        let mut inner = self.inner.write();
        let before = inner.dlq.len();
        inner.dlq.retain(|item| item.asset_id != asset_id);
        Ok(before - inner.dlq.len())
    }

    async fn purge_archived_versions(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let mut inner = self.inner.write();
        let doomed: Vec<(Uuid, String)> = inner
            .versions
            .iter()
            .filter(|(_, version)| {
                version.publish_state == PublishState::Archived && version.created_at < older_than
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            inner.versions.remove(key);
            inner.segments.remove(key);
            inner.embeddings.remove(key);
        }
        Ok(doomed.len())
    }
}
