//! libSQL implementation of the media database port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Connection};
use tracing::{debug, info};
use uuid::Uuid;

use media_core::embeddings::cosine_distance;
use media_core::error::{Error, Result};
use media_core::ports::MediaDatabase;
use media_core::types::{
    AssetRef, AssetStatus, AssetVersion, DlqItem, MediaAsset, PublishState, SearchFilter,
    SegmentHit, TranscriptEmbedding, TranscriptSegment, TranscriptionJob, Visibility,
};

use crate::schema;

/// Durable [`MediaDatabase`] over a local libSQL database file.
///
/// Multi-statement mutations run inside `BEGIN IMMEDIATE` transactions;
/// single upserts rely on the statement-level atomicity of the engine.
#[derive(Clone)]
pub struct LibsqlDatabase {
    conn: Connection,
}

impl LibsqlDatabase {
    /// Open (creating if needed) a database file and initialize the schema.
    pub async fn connect(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = libsql::Builder::new_local(path.as_ref())
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;
        let storage = Self { conn };
        storage.initialize_schema().await?;
        Ok(storage)
    }

    /// Wrap an existing connection (shared with [`crate::LibsqlQueue`]).
    #[must_use]
    pub fn with_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// The underlying connection, for co-located adapters.
    #[must_use]
    pub fn connection(&self) -> Connection {
        self.conn.clone()
    }

    /// Create tables, indexes, and the FTS mirror if absent.
    pub async fn initialize_schema(&self) -> Result<()> {
        info!("initializing media database schema");
        for sql in schema::ALL_STATEMENTS {
            self.conn.execute(sql, ()).await.map_err(storage_err)?;
        }
        Ok(())
    }

    async fn begin(&self) -> Result<()> {
        self.conn
            .execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.conn.execute("COMMIT", ()).await.map_err(storage_err)?;
        Ok(())
    }

    async fn rollback(&self) {
        let _ = self.conn.execute("ROLLBACK", ()).await;
    }

    async fn write_asset(&self, asset: &MediaAsset) -> Result<()> {
        let sql = r#"
            INSERT OR REPLACE INTO media_assets (
                asset_id, lineage_id, bucket, object_key, current_version_id,
                status, triage_state, recommended_action, engine, last_error,
                attempt_count, byte_size, content_type, etag, duration_secs,
                codec, tombstoned, ingested_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;
        self.conn
            .execute(
                sql,
                params![
                    asset.asset_id.to_string(),
                    asset.lineage_id.to_string(),
                    asset.bucket.clone(),
                    asset.object_key.clone(),
                    asset.current_version_id.clone(),
                    asset.status.to_string(),
                    asset.triage_state.map(|t| t.to_string()),
                    asset.recommended_action.clone(),
                    asset.engine.clone(),
                    asset.last_error.clone(),
                    i64::from(asset.attempt_count),
                    to_i64(asset.byte_size),
                    asset.content_type.clone(),
                    asset.etag.clone(),
                    asset.duration_secs,
                    asset.codec.clone(),
                    i64::from(asset.tombstoned),
                    asset.ingested_at.timestamp_millis(),
                    asset.updated_at.timestamp_millis(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn write_segment(&self, segment: &TranscriptSegment) -> Result<()> {
        let sql = r#"
            INSERT OR REPLACE INTO transcript_segments (
                segment_id, asset_id, version_id, start_ms, end_ms, text,
                speaker, confidence, visibility, strategy, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;
        self.conn
            .execute(
                sql,
                params![
                    segment.segment_id.clone(),
                    segment.asset_id.to_string(),
                    segment.version_id.clone(),
                    to_i64(segment.start_ms),
                    to_i64(segment.end_ms),
                    segment.text.clone(),
                    segment.speaker.clone(),
                    f64::from(segment.confidence),
                    segment.visibility.to_string(),
                    segment.strategy.to_string(),
                    segment.created_at.timestamp_millis(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn write_embedding(&self, embedding: &TranscriptEmbedding) -> Result<()> {
        let sql = r#"
            INSERT OR REPLACE INTO transcript_embeddings (
                embedding_id, asset_id, version_id, segment_id, vector,
                model, dimension, visibility, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;
        self.conn
            .execute(
                sql,
                params![
                    embedding.embedding_id.clone(),
                    embedding.asset_id.to_string(),
                    embedding.version_id.clone(),
                    embedding.segment_id.clone(),
                    encode_vector(&embedding.vector),
                    embedding.model.clone(),
                    to_i64(embedding.dimension as u64),
                    embedding.visibility.to_string(),
                    embedding.created_at.timestamp_millis(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn query_assets(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Vec<MediaAsset>> {
        let mut rows = self.conn.query(sql, params).await.map_err(storage_err)?;
        let mut assets = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            assets.push(row_to_asset(&row)?);
        }
        Ok(assets)
    }
}

const ASSET_COLUMNS: &str = "asset_id, lineage_id, bucket, object_key, current_version_id, \
     status, triage_state, recommended_action, engine, last_error, attempt_count, byte_size, \
     content_type, etag, duration_secs, codec, tombstoned, ingested_at, updated_at";

const SEGMENT_HIT_COLUMNS: &str = "s.segment_id, s.asset_id, s.version_id, s.start_ms, \
     s.end_ms, s.text, s.speaker, s.confidence, s.visibility, s.strategy, s.created_at, \
     a.bucket, a.object_key";

#[async_trait]
impl MediaDatabase for LibsqlDatabase {
    async fn upsert_asset(&self, asset: &MediaAsset) -> Result<()> {
        debug!(asset_id = %asset.asset_id, "upserting asset");
        self.write_asset(asset).await
    }

    async fn get_asset(&self, asset_id: Uuid) -> Result<Option<MediaAsset>> {
        let sql = format!("SELECT {ASSET_COLUMNS} FROM media_assets WHERE asset_id = ?");
        Ok(self
            .query_assets(&sql, params![asset_id.to_string()])
            .await?
            .into_iter()
            .next())
    }

    async fn get_asset_by_location(&self, bucket: &str, key: &str) -> Result<Option<MediaAsset>> {
        let sql = format!(
            "SELECT {ASSET_COLUMNS} FROM media_assets \
             WHERE bucket = ? AND object_key = ? AND tombstoned = 0"
        );
        Ok(self
            .query_assets(&sql, params![bucket, key])
            .await?
            .into_iter()
            .next())
    }

    async fn find_lineage(&self, bucket: &str, key: &str) -> Result<Option<Uuid>> {
        let sql = "SELECT lineage_id FROM media_assets \
                   WHERE bucket = ? AND object_key = ? AND tombstoned = 1 \
                   ORDER BY updated_at DESC LIMIT 1";
        let mut rows = self
            .conn
            .query(sql, params![bucket, key])
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => {
                let lineage: String = row.get(0).map_err(storage_err)?;
                Ok(Some(parse_uuid(&lineage)?))
            }
            None => Ok(None),
        }
    }

    async fn list_assets_by_status(&self, status: AssetStatus) -> Result<Vec<MediaAsset>> {
        let sql = format!(
            "SELECT {ASSET_COLUMNS} FROM media_assets WHERE status = ? ORDER BY updated_at"
        );
        self.query_assets(&sql, params![status.to_string()]).await
    }

    async fn record_version(&self, asset: &MediaAsset, version: &AssetVersion) -> Result<bool> {
        self.begin().await?;
        let outcome = async {
            self.write_asset(asset).await?;
            let changed = self
                .conn
                .execute(
                    r#"
                    INSERT OR IGNORE INTO asset_versions (
                        version_id, asset_id, processing_status, publish_state,
                        etag, byte_size, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                    params![
                        version.version_id.clone(),
                        version.asset_id.to_string(),
                        version.processing_status.to_string(),
                        version.publish_state.to_string(),
                        version.etag.clone(),
                        to_i64(version.byte_size),
                        version.created_at.timestamp_millis(),
                    ],
                )
                .await
                .map_err(storage_err)?;
            Ok::<bool, Error>(changed > 0)
        }
        .await;
        match outcome {
            Ok(newly_recorded) => {
                self.commit().await?;
                Ok(newly_recorded)
            }
            Err(e) => {
                self.rollback().await;
                Err(e)
            }
        }
    }

    async fn get_version(
        &self,
        asset_id: Uuid,
        version_id: &str,
    ) -> Result<Option<AssetVersion>> {
        let sql = "SELECT version_id, asset_id, processing_status, publish_state, etag, \
                   byte_size, created_at FROM asset_versions \
                   WHERE asset_id = ? AND version_id = ?";
        let mut rows = self
            .conn
            .query(sql, params![asset_id.to_string(), version_id])
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_version(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_versions(&self, asset_id: Uuid) -> Result<Vec<AssetVersion>> {
        let sql = "SELECT version_id, asset_id, processing_status, publish_state, etag, \
                   byte_size, created_at FROM asset_versions \
                   WHERE asset_id = ? ORDER BY created_at DESC";
        let mut rows = self
            .conn
            .query(sql, params![asset_id.to_string()])
            .await
            .map_err(storage_err)?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            versions.push(row_to_version(&row)?);
        }
        Ok(versions)
    }

    async fn update_version(&self, version: &AssetVersion) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE asset_versions SET processing_status = ?, publish_state = ? \
                 WHERE asset_id = ? AND version_id = ?",
                params![
                    version.processing_status.to_string(),
                    version.publish_state.to_string(),
                    version.asset_id.to_string(),
                    version.version_id.clone(),
                ],
            )
            .await
            .map_err(storage_err)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("version {}", version.version_id)));
        }
        Ok(())
    }

    async fn set_version_visibility(
        &self,
        asset_id: Uuid,
        version_id: &str,
        publish_state: PublishState,
        visibility: Visibility,
    ) -> Result<()> {
        self.begin().await?;
        let outcome = async {
            let changed = self
                .conn
                .execute(
                    "UPDATE asset_versions SET publish_state = ? \
                     WHERE asset_id = ? AND version_id = ?",
                    params![
                        publish_state.to_string(),
                        asset_id.to_string(),
                        version_id
                    ],
                )
                .await
                .map_err(storage_err)?;
            if changed == 0 {
                return Err(Error::NotFound(format!("version {version_id}")));
            }
            self.conn
                .execute(
                    "UPDATE transcript_segments SET visibility = ? \
                     WHERE asset_id = ? AND version_id = ?",
                    params![visibility.to_string(), asset_id.to_string(), version_id],
                )
                .await
                .map_err(storage_err)?;
            self.conn
                .execute(
                    "UPDATE transcript_embeddings SET visibility = ? \
                     WHERE asset_id = ? AND version_id = ?",
                    params![visibility.to_string(), asset_id.to_string(), version_id],
                )
                .await
                .map_err(storage_err)?;
            Ok(())
        }
        .await;
        match outcome {
            Ok(()) => self.commit().await,
            Err(e) => {
                self.rollback().await;
                Err(e)
            }
        }
    }

    async fn set_current_version(&self, asset_id: Uuid, version_id: Option<&str>) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE media_assets SET current_version_id = ?, updated_at = ? \
                 WHERE asset_id = ?",
                params![
                    version_id.map(str::to_string),
                    Utc::now().timestamp_millis(),
                    asset_id.to_string(),
                ],
            )
            .await
            .map_err(storage_err)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("asset {asset_id}")));
        }
        Ok(())
    }

    async fn replace_segments(
        &self,
        asset_id: Uuid,
        version_id: &str,
        segments: &[TranscriptSegment],
    ) -> Result<()> {
        debug!(asset_id = %asset_id, version_id, count = segments.len(), "replacing segments");
        self.begin().await?;
        let outcome = async {
            self.conn
                .execute(
                    "DELETE FROM transcript_segments WHERE asset_id = ? AND version_id = ?",
                    params![asset_id.to_string(), version_id],
                )
                .await
                .map_err(storage_err)?;
            for segment in segments {
                self.write_segment(segment).await?;
            }
            Ok(())
        }
        .await;
        match outcome {
            Ok(()) => self.commit().await,
            Err(e) => {
                self.rollback().await;
                Err(e)
            }
        }
    }

    async fn replace_embeddings(
        &self,
        asset_id: Uuid,
        version_id: &str,
        embeddings: &[TranscriptEmbedding],
    ) -> Result<()> {
        self.begin().await?;
        let outcome = async {
            self.conn
                .execute(
                    "DELETE FROM transcript_embeddings WHERE asset_id = ? AND version_id = ?",
                    params![asset_id.to_string(), version_id],
                )
                .await
                .map_err(storage_err)?;
            for embedding in embeddings {
                self.write_embedding(embedding).await?;
            }
            Ok(())
        }
        .await;
        match outcome {
            Ok(()) => self.commit().await,
            Err(e) => {
                self.rollback().await;
                Err(e)
            }
        }
    }

    async fn list_segments(
        &self,
        asset_id: Uuid,
        version_id: &str,
    ) -> Result<Vec<TranscriptSegment>> {
        let sql = "SELECT segment_id, asset_id, version_id, start_ms, end_ms, text, speaker, \
                   confidence, visibility, strategy, created_at FROM transcript_segments \
                   WHERE asset_id = ? AND version_id = ? ORDER BY start_ms";
        let mut rows = self
            .conn
            .query(sql, params![asset_id.to_string(), version_id])
            .await
            .map_err(storage_err)?;
        let mut segments = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            segments.push(row_to_segment(&row)?);
        }
        Ok(segments)
    }

    async fn list_embeddings(
        &self,
        asset_id: Uuid,
        version_id: &str,
    ) -> Result<Vec<TranscriptEmbedding>> {
        let sql = "SELECT embedding_id, asset_id, version_id, segment_id, vector, model, \
                   dimension, visibility, created_at FROM transcript_embeddings \
                   WHERE asset_id = ? AND version_id = ?";
        let mut rows = self
            .conn
            .query(sql, params![asset_id.to_string(), version_id])
            .await
            .map_err(storage_err)?;
        let mut embeddings = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            embeddings.push(row_to_embedding(&row)?);
        }
        Ok(embeddings)
    }

    async fn tombstone_asset(&self, asset_id: Uuid) -> Result<()> {
        self.begin().await?;
        let outcome = async {
            let changed = self
                .conn
                .execute(
                    "UPDATE media_assets SET tombstoned = 1, current_version_id = NULL, \
                     status = ?, updated_at = ? WHERE asset_id = ?",
                    params![
                        AssetStatus::Deleted.to_string(),
                        Utc::now().timestamp_millis(),
                        asset_id.to_string(),
                    ],
                )
                .await
                .map_err(storage_err)?;
            if changed == 0 {
                return Err(Error::NotFound(format!("asset {asset_id}")));
            }
            self.conn
                .execute(
                    "UPDATE asset_versions SET publish_state = ? WHERE asset_id = ?",
                    params![PublishState::SoftDeleted.to_string(), asset_id.to_string()],
                )
                .await
                .map_err(storage_err)?;
            self.conn
                .execute(
                    "UPDATE transcript_segments SET visibility = ? WHERE asset_id = ?",
                    params![Visibility::SoftDeleted.to_string(), asset_id.to_string()],
                )
                .await
                .map_err(storage_err)?;
            self.conn
                .execute(
                    "UPDATE transcript_embeddings SET visibility = ? WHERE asset_id = ?",
                    params![Visibility::SoftDeleted.to_string(), asset_id.to_string()],
                )
                .await
                .map_err(storage_err)?;
            Ok(())
        }
        .await;
        match outcome {
            Ok(()) => self.commit().await,
            Err(e) => {
                self.rollback().await;
                Err(e)
            }
        }
    }

    async fn keyword_candidates(
        &self,
        terms: &[String],
        filter: &SearchFilter,
    ) -> Result<Vec<SegmentHit>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let match_expr = terms
            .iter()
            .map(|term| format!("\"{}\"", term.replace('"', "")))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT {SEGMENT_HIT_COLUMNS} \
             FROM segments_fts \
             JOIN transcript_segments s ON s.segment_id = segments_fts.segment_id \
             JOIN media_assets a ON a.asset_id = s.asset_id \
                 AND a.current_version_id = s.version_id \
             WHERE segments_fts MATCH ?1 \
               AND s.visibility = 'active' \
               AND a.tombstoned = 0 \
               AND (?2 IS NULL OR a.bucket = ?2) \
               AND (?3 IS NULL OR s.speaker = ?3)"
        );
        let mut rows = self
            .conn
            .query(
                &sql,
                params![match_expr, filter.bucket.clone(), filter.speaker.clone()],
            )
            .await
            .map_err(storage_err)?;
        let mut hits = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            hits.push(row_to_segment_hit(&row)?);
        }
        Ok(hits)
    }

    async fn semantic_candidates(
        &self,
        query: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<(SegmentHit, f32)>> {
        let sql = format!(
            "SELECT {SEGMENT_HIT_COLUMNS}, e.vector \
             FROM transcript_embeddings e \
             JOIN transcript_segments s ON s.asset_id = e.asset_id \
                 AND s.version_id = e.version_id AND s.segment_id = e.segment_id \
             JOIN media_assets a ON a.asset_id = e.asset_id \
                 AND a.current_version_id = e.version_id \
             WHERE e.visibility = 'active' \
               AND a.tombstoned = 0 \
               AND (?1 IS NULL OR a.bucket = ?1) \
               AND (?2 IS NULL OR s.speaker = ?2)"
        );
        let mut rows = self
            .conn
            .query(&sql, params![filter.bucket.clone(), filter.speaker.clone()])
            .await
            .map_err(storage_err)?;
        let mut scored = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let hit = row_to_segment_hit(&row)?;
            let blob: Vec<u8> = row.get(13).map_err(storage_err)?;
            let vector = decode_vector(&blob);
            scored.push((hit, cosine_distance(query, &vector)));
        }
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn add_dlq_item(&self, item: &DlqItem) -> Result<()> {
        let sql = r#"
            INSERT OR REPLACE INTO dlq_items (
                dlq_id, asset_id, version_id, job, error_kind, error_message,
                retryable, log_trail, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;
        self.conn
            .execute(
                sql,
                params![
                    item.dlq_id.to_string(),
                    item.asset_id.to_string(),
                    item.version_id.clone(),
                    serde_json::to_string(&item.job).map_err(Error::Serialization)?,
                    item.error_kind.clone(),
                    item.error_message.clone(),
                    i64::from(item.retryable),
                    serde_json::to_string(&item.log_trail).map_err(Error::Serialization)?,
                    item.created_at.timestamp_millis(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get_dlq_item(&self, dlq_id: Uuid) -> Result<Option<DlqItem>> {
        let sql = "SELECT dlq_id, asset_id, version_id, job, error_kind, error_message, \
                   retryable, log_trail, created_at FROM dlq_items WHERE dlq_id = ?";
        let mut rows = self
            .conn
            .query(sql, params![dlq_id.to_string()])
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_dlq(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_dlq_items(&self) -> Result<Vec<DlqItem>> {
        let sql = "SELECT dlq_id, asset_id, version_id, job, error_kind, error_message, \
                   retryable, log_trail, created_at FROM dlq_items ORDER BY created_at DESC";
        let mut rows = self.conn.query(sql, ()).await.map_err(storage_err)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            items.push(row_to_dlq(&row)?);
        }
        Ok(items)
    }

    async fn list_dlq_items_for_asset(&self, asset_id: Uuid) -> Result<Vec<DlqItem>> {
        let sql = "SELECT dlq_id, asset_id, version_id, job, error_kind, error_message, \
                   retryable, log_trail, created_at FROM dlq_items \
                   WHERE asset_id = ? ORDER BY created_at DESC";
        let mut rows = self
            .conn
            .query(sql, params![asset_id.to_string()])
            .await
            .map_err(storage_err)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            items.push(row_to_dlq(&row)?);
        }
        Ok(items)
    }

    async fn remove_dlq_for_asset(&self, asset_id: Uuid) -> Result<usize> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM dlq_items WHERE asset_id = ?",
                params![asset_id.to_string()],
            )
            .await
            .map_err(storage_err)?;
        Ok(usize::try_from(removed).unwrap_or(usize::MAX))
    }

    async fn purge_archived_versions(&self, older_than: DateTime<Utc>) -> Result<usize> {
        self.begin().await?;
        let outcome = async {
            let mut rows = self
                .conn
                .query(
                    "SELECT asset_id, version_id FROM asset_versions \
                     WHERE publish_state = 'archived' AND created_at < ?",
                    params![older_than.timestamp_millis()],
                )
                .await
                .map_err(storage_err)?;
            let mut doomed: Vec<(String, String)> = Vec::new();
            while let Some(row) = rows.next().await.map_err(storage_err)? {
                let asset_id: String = row.get(0).map_err(storage_err)?;
                let version_id: String = row.get(1).map_err(storage_err)?;
                doomed.push((asset_id, version_id));
            }
            for (asset_id, version_id) in &doomed {
                self.conn
                    .execute(
                        "DELETE FROM transcript_embeddings WHERE asset_id = ? AND version_id = ?",
                        params![asset_id.clone(), version_id.clone()],
                    )
                    .await
                    .map_err(storage_err)?;
                self.conn
                    .execute(
                        "DELETE FROM transcript_segments WHERE asset_id = ? AND version_id = ?",
                        params![asset_id.clone(), version_id.clone()],
                    )
                    .await
                    .map_err(storage_err)?;
                self.conn
                    .execute(
                        "DELETE FROM asset_versions WHERE asset_id = ? AND version_id = ?",
                        params![asset_id.clone(), version_id.clone()],
                    )
                    .await
                    .map_err(storage_err)?;
            }
            Ok(doomed.len())
        }
        .await;
        match outcome {
            Ok(count) => {
                self.commit().await?;
                info!(purged = count, "archived versions purged");
                Ok(count)
            }
            Err(e) => {
                self.rollback().await;
                Err(e)
            }
        }
    }
}

// ========== Row decoding ==========

fn row_to_asset(row: &libsql::Row) -> Result<MediaAsset> {
    let asset_id: String = row.get(0).map_err(storage_err)?;
    let lineage_id: String = row.get(1).map_err(storage_err)?;
    let bucket: String = row.get(2).map_err(storage_err)?;
    let object_key: String = row.get(3).map_err(storage_err)?;
    let current_version_id: Option<String> = row.get(4).ok();
    let status: String = row.get(5).map_err(storage_err)?;
    let triage_state: Option<String> = row.get(6).ok();
    let recommended_action: Option<String> = row.get(7).ok();
    let engine: String = row.get(8).map_err(storage_err)?;
    let last_error: Option<String> = row.get(9).ok();
    let attempt_count: i64 = row.get(10).map_err(storage_err)?;
    let byte_size: i64 = row.get(11).map_err(storage_err)?;
    let content_type: Option<String> = row.get(12).ok();
    let etag: String = row.get(13).map_err(storage_err)?;
    let duration_secs: Option<f64> = row.get(14).ok();
    let codec: Option<String> = row.get(15).ok();
    let tombstoned: i64 = row.get(16).map_err(storage_err)?;
    let ingested_at: i64 = row.get(17).map_err(storage_err)?;
    let updated_at: i64 = row.get(18).map_err(storage_err)?;

    Ok(MediaAsset {
        asset_id: parse_uuid(&asset_id)?,
        lineage_id: parse_uuid(&lineage_id)?,
        bucket,
        object_key,
        current_version_id,
        status: parse_tag(&status)?,
        triage_state: triage_state.as_deref().map(parse_tag).transpose()?,
        recommended_action,
        engine,
        last_error,
        attempt_count: u32::try_from(attempt_count).unwrap_or(0),
        byte_size: from_i64(byte_size),
        content_type,
        etag,
        duration_secs,
        codec,
        tombstoned: tombstoned != 0,
        ingested_at: from_ms(ingested_at),
        updated_at: from_ms(updated_at),
    })
}

fn row_to_version(row: &libsql::Row) -> Result<AssetVersion> {
    let version_id: String = row.get(0).map_err(storage_err)?;
    let asset_id: String = row.get(1).map_err(storage_err)?;
    let processing_status: String = row.get(2).map_err(storage_err)?;
    let publish_state: String = row.get(3).map_err(storage_err)?;
    let etag: String = row.get(4).map_err(storage_err)?;
    let byte_size: i64 = row.get(5).map_err(storage_err)?;
    let created_at: i64 = row.get(6).map_err(storage_err)?;

    Ok(AssetVersion {
        version_id,
        asset_id: parse_uuid(&asset_id)?,
        processing_status: parse_tag(&processing_status)?,
        publish_state: parse_tag(&publish_state)?,
        etag,
        byte_size: from_i64(byte_size),
        created_at: from_ms(created_at),
    })
}

fn decode_segment_columns(row: &libsql::Row) -> Result<TranscriptSegment> {
    let segment_id: String = row.get(0).map_err(storage_err)?;
    let asset_id: String = row.get(1).map_err(storage_err)?;
    let version_id: String = row.get(2).map_err(storage_err)?;
    let start_ms: i64 = row.get(3).map_err(storage_err)?;
    let end_ms: i64 = row.get(4).map_err(storage_err)?;
    let text: String = row.get(5).map_err(storage_err)?;
    let speaker: Option<String> = row.get(6).ok();
    let confidence: f64 = row.get(7).map_err(storage_err)?;
    let visibility: String = row.get(8).map_err(storage_err)?;
    let strategy: String = row.get(9).map_err(storage_err)?;
    let created_at: i64 = row.get(10).map_err(storage_err)?;

    Ok(TranscriptSegment {
        segment_id,
        asset_id: parse_uuid(&asset_id)?,
        version_id,
        start_ms: from_i64(start_ms),
        end_ms: from_i64(end_ms),
        text,
        speaker,
        #[allow(clippy::cast_possible_truncation)]
        confidence: confidence as f32,
        visibility: parse_tag(&visibility)?,
        strategy: parse_tag(&strategy)?,
        created_at: from_ms(created_at),
    })
}

fn row_to_segment(row: &libsql::Row) -> Result<TranscriptSegment> {
    decode_segment_columns(row)
}

fn row_to_segment_hit(row: &libsql::Row) -> Result<SegmentHit> {
    let segment = decode_segment_columns(row)?;
    let bucket: String = row.get(11).map_err(storage_err)?;
    let object_key: String = row.get(12).map_err(storage_err)?;
    Ok(SegmentHit {
        segment,
        asset: AssetRef { bucket, object_key },
    })
}

fn row_to_embedding(row: &libsql::Row) -> Result<TranscriptEmbedding> {
    let embedding_id: String = row.get(0).map_err(storage_err)?;
    let asset_id: String = row.get(1).map_err(storage_err)?;
    let version_id: String = row.get(2).map_err(storage_err)?;
    let segment_id: String = row.get(3).map_err(storage_err)?;
    let blob: Vec<u8> = row.get(4).map_err(storage_err)?;
    let model: String = row.get(5).map_err(storage_err)?;
    let dimension: i64 = row.get(6).map_err(storage_err)?;
    let visibility: String = row.get(7).map_err(storage_err)?;
    let created_at: i64 = row.get(8).map_err(storage_err)?;

    Ok(TranscriptEmbedding {
        embedding_id,
        asset_id: parse_uuid(&asset_id)?,
        version_id,
        segment_id,
        vector: decode_vector(&blob),
        model,
        dimension: usize::try_from(dimension).unwrap_or(0),
        visibility: parse_tag(&visibility)?,
        created_at: from_ms(created_at),
    })
}

fn row_to_dlq(row: &libsql::Row) -> Result<DlqItem> {
    let dlq_id: String = row.get(0).map_err(storage_err)?;
    let asset_id: String = row.get(1).map_err(storage_err)?;
    let version_id: String = row.get(2).map_err(storage_err)?;
    let job_json: String = row.get(3).map_err(storage_err)?;
    let error_kind: String = row.get(4).map_err(storage_err)?;
    let error_message: String = row.get(5).map_err(storage_err)?;
    let retryable: i64 = row.get(6).map_err(storage_err)?;
    let log_trail_json: String = row.get(7).map_err(storage_err)?;
    let created_at: i64 = row.get(8).map_err(storage_err)?;

    let job: TranscriptionJob =
        serde_json::from_str(&job_json).map_err(Error::Serialization)?;
    let log_trail: Vec<String> =
        serde_json::from_str(&log_trail_json).map_err(Error::Serialization)?;

    Ok(DlqItem {
        dlq_id: parse_uuid(&dlq_id)?,
        asset_id: parse_uuid(&asset_id)?,
        version_id,
        job,
        error_kind,
        error_message,
        retryable: retryable != 0,
        log_trail,
        created_at: from_ms(created_at),
    })
}

// ========== Value helpers ==========

pub(crate) fn storage_err(e: impl std::fmt::Display) -> Error {
    Error::Storage(e.to_string())
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Storage(format!("invalid uuid {value}: {e}")))
}

fn parse_tag<T>(value: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse::<T>().map_err(Error::Storage)
}

pub(crate) fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[allow(clippy::cast_possible_wrap)]
pub(crate) fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[allow(clippy::cast_sign_loss)]
pub(crate) fn from_i64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
