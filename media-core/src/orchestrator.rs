//! Job orchestrator.
//!
//! Consumes transcription jobs and drives each through five phases:
//! idempotency gate, fetch + transcribe, segmentation, embedding, publish.
//! Each phase is restartable: transcript rows are written with replace
//! semantics at staging visibility, so re-running a version converges on
//! the same final state and readers never see partial work.
//!
//! Acknowledgment policy: the delivered job is acked after publish, or
//! after the retry manager has recorded its decision — retries re-enter
//! the queue as new jobs, never as redeliveries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::ports::{Embedder, JobQueue, MediaDatabase, ObjectStore, SpeechRecognizer};
use crate::publish::VersionPublisher;
use crate::retry::{FailureDisposition, RetryManager};
use crate::segment::{chunk_transcript, select_strategy};
use crate::types::{
    AssetStatus, PipelineConfig, ProcessingStatus, PublishState, TranscribeOptions,
    TranscriptEmbedding, TranscriptSegment, TranscriptionJob, Visibility,
};

/// What processing one job accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The version was already processed; the job was absorbed.
    AlreadyProcessed,
    /// The version was transcribed, indexed, and published.
    Published {
        /// Segments written.
        segments: usize,
        /// Embeddings written.
        embeddings: usize,
    },
}

/// Terminal state of one queue delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The job completed and was acked.
    Completed(JobOutcome),
    /// The job failed; the retry manager decided what happens next.
    Failed(FailureDisposition),
}

/// Drives jobs from the queue through transcription to publication.
pub struct Orchestrator {
    db: Arc<dyn MediaDatabase>,
    store: Arc<dyn ObjectStore>,
    recognizer: Arc<dyn SpeechRecognizer>,
    embedder: Arc<dyn Embedder>,
    queue: Arc<dyn JobQueue>,
    publisher: VersionPublisher,
    retry: RetryManager,
    config: PipelineConfig,
}

impl Orchestrator {
    /// Wire an orchestrator over the given ports.
    pub fn new(
        db: Arc<dyn MediaDatabase>,
        store: Arc<dyn ObjectStore>,
        recognizer: Arc<dyn SpeechRecognizer>,
        embedder: Arc<dyn Embedder>,
        queue: Arc<dyn JobQueue>,
        config: PipelineConfig,
    ) -> Self {
        let publisher = VersionPublisher::new(db.clone());
        let retry = RetryManager::new(db.clone(), queue.clone(), config.retry.clone());
        Self {
            db,
            store,
            recognizer,
            embedder,
            queue,
            publisher,
            retry,
            config,
        }
    }

    /// Process deliveries until the queue has nothing ready or scheduled.
    ///
    /// Sleeps through delivery delays, so retried jobs are seen to their
    /// conclusion. Intended for tools and tests; services use [`Self::run`].
    pub async fn run_until_idle(&self) -> Result<usize> {
        let mut processed = 0usize;
        loop {
            match self.queue.dequeue().await? {
                Some(job) => {
                    self.handle_delivery(job).await?;
                    processed += 1;
                }
                None => match self.queue.next_due_in().await? {
                    Some(due) if due > Duration::ZERO => tokio::time::sleep(due).await,
                    Some(_) => {}
                    None => break,
                },
            }
        }
        Ok(processed)
    }

    /// Run `concurrency` workers until the shutdown signal flips true.
    pub async fn run(
        self: Arc<Self>,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Result<()> {
        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.orchestrator.concurrency {
            let orchestrator = Arc::clone(&self);
            let mut shutdown = shutdown.clone();
            workers.spawn(async move {
                debug!(worker_id, "worker started");
                loop {
                    if *shutdown.borrow() {
                        break;
                    }
                    match orchestrator.queue.dequeue().await {
                        Ok(Some(job)) => {
                            if let Err(e) = orchestrator.handle_delivery(job).await {
                                error!(worker_id, error = %e, "delivery handling failed");
                            }
                        }
                        Ok(None) => {
                            tokio::select! {
                                () = tokio::time::sleep(Duration::from_millis(250)) => {}
                                _ = shutdown.changed() => {}
                            }
                        }
                        Err(e) => {
                            error!(worker_id, error = %e, "dequeue failed");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
                debug!(worker_id, "worker stopped");
            });
        }
        while workers.join_next().await.is_some() {}
        Ok(())
    }

    /// Process one delivery end to end, including the ack and any retry
    /// decision.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures inside the retry manager itself
    /// propagate; in that case the delivery is nacked for redelivery.
    pub async fn handle_delivery(&self, job: TranscriptionJob) -> Result<DeliveryOutcome> {
        let budget = self.config.orchestrator.job_timeout;
        let outcome = match tokio::time::timeout(budget, self.process_job(&job)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout(format!(
                "job {} exceeded {budget:?}",
                job.job_id
            ))),
        };

        match outcome {
            Ok(outcome) => {
                self.queue.ack(job.job_id).await?;
                Ok(DeliveryOutcome::Completed(outcome))
            }
            Err(failure) => match self.retry.handle_failure(&job, &failure).await {
                Ok(disposition) => {
                    self.queue.ack(job.job_id).await?;
                    Ok(DeliveryOutcome::Failed(disposition))
                }
                Err(manager_error) => {
                    // Could not even record the failure; surrender the lease
                    // so the substrate redelivers.
                    self.queue.nack(job.job_id).await?;
                    Err(manager_error)
                }
            },
        }
    }

    async fn process_job(&self, job: &TranscriptionJob) -> Result<JobOutcome> {
        let mut version = self
            .db
            .get_version(job.asset_id, &job.version_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("version {}", job.version_id)))?;

        // Phase 1: idempotency gate.
        if matches!(
            version.processing_status,
            ProcessingStatus::Transcribed | ProcessingStatus::Published
        ) || matches!(
            version.publish_state,
            PublishState::Active | PublishState::Archived
        ) {
            debug!(
                asset_id = %job.asset_id,
                version_id = %job.version_id,
                "version already processed, absorbing job"
            );
            return Ok(JobOutcome::AlreadyProcessed);
        }

        // Phase 2: fetch and transcribe.
        let mut asset = self
            .db
            .get_asset(job.asset_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("asset {}", job.asset_id)))?;
        asset.status = AssetStatus::Transcribing;
        asset.updated_at = Utc::now();
        self.db.upsert_asset(&asset).await?;
        version.processing_status = ProcessingStatus::Transcribing;
        self.db.update_version(&version).await?;

        let media = self.store.get(&asset.bucket, &asset.object_key).await?;
        let options = TranscribeOptions {
            engine: job.engine_policy.engine.clone(),
            diarization: job.engine_policy.diarization_enabled,
            execution_mode: job.engine_policy.execution_mode,
            language: None,
            content_type: asset.content_type.clone(),
            duration_hint_secs: asset.duration_secs,
        };
        let output = self.recognizer.transcribe(&media, &options).await?;

        // Phase 3: segmentation.
        let strategy = select_strategy(&job.engine_policy, output.duration_secs);
        let segments = chunk_transcript(
            &output,
            strategy,
            job.asset_id,
            &job.version_id,
            self.config.ingest.fixed_window_ms,
        );
        self.db
            .replace_segments(job.asset_id, &job.version_id, &segments)
            .await?;

        // Phase 4: embedding.
        let mut embedding_count = 0;
        if self.config.embedding.semantic_enabled {
            let embeddings = self.embed_segments(&segments).await?;
            embedding_count = embeddings.len();
            self.db
                .replace_embeddings(job.asset_id, &job.version_id, &embeddings)
                .await?;
        }

        asset.duration_secs = Some(output.duration_secs);
        asset.status = AssetStatus::Transcribed;
        asset.updated_at = Utc::now();
        self.db.upsert_asset(&asset).await?;
        version.processing_status = ProcessingStatus::Transcribed;
        self.db.update_version(&version).await?;

        // Phase 5: publish.
        self.publisher.publish(job.asset_id, &job.version_id).await?;

        info!(
            asset_id = %job.asset_id,
            version_id = %job.version_id,
            segments = segments.len(),
            embeddings = embedding_count,
            strategy = %strategy,
            "job completed"
        );
        Ok(JobOutcome::Published {
            segments: segments.len(),
            embeddings: embedding_count,
        })
    }

    /// Embed segment texts in batches, validating every vector's dimension.
    async fn embed_segments(
        &self,
        segments: &[TranscriptSegment],
    ) -> Result<Vec<TranscriptEmbedding>> {
        let dimension = self.config.embedding.dimension;
        let batch_size = self
            .config
            .embedding
            .batch_size
            .min(self.embedder.batch_limit())
            .max(1);

        let mut embeddings = Vec::with_capacity(segments.len());
        let created_at = Utc::now();
        for batch in segments.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|s| s.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(Error::EngineConfig(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            for (segment, vector) in batch.iter().zip(vectors) {
                crate::embeddings::validate_dimension(&vector, dimension)?;
                embeddings.push(TranscriptEmbedding {
                    embedding_id: TranscriptEmbedding::id_for_segment(&segment.segment_id),
                    asset_id: segment.asset_id,
                    version_id: segment.version_id.clone(),
                    segment_id: segment.segment_id.clone(),
                    vector,
                    model: self.embedder.model_name().to_string(),
                    dimension,
                    visibility: Visibility::Staging,
                    created_at,
                });
            }
        }
        Ok(embeddings)
    }

    /// The retry manager, exposed for operator triage surfaces.
    #[must_use]
    pub fn retry_manager(&self) -> &RetryManager {
        &self.retry
    }
}
