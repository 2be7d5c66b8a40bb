//! Command implementations.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use media_core::embeddings::HashEmbedder;
use media_core::ports::{Embedder, MediaDatabase};
use media_core::types::{
    AssetStatus, BackendKind, PipelineConfig, SearchFilter, SearchMode, SearchRequest,
};
use media_core::{Error, Result, RetryManager};
use media_storage_libsql::{LibsqlDatabase, LibsqlQueue};

use crate::{Cli, Commands, TriageCommands};

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::from_env()?;
    if matches!(config.backend, BackendKind::Production) {
        return Err(Error::Configuration(
            "production backends are provisioned by the deployment; run with MEDIA_BACKEND=local"
                .to_string(),
        ));
    }

    let db_path = cli
        .db
        .clone()
        .or_else(|| std::env::var("MEDIA_DB_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./media.db"));
    let db = Arc::new(LibsqlDatabase::connect(&db_path).await?);

    match cli.command {
        Commands::Search {
            ref query,
            ref mode,
            ref bucket,
            ref speaker,
            limit,
            offset,
        } => {
            search(
                &db, &config, query, mode, bucket, speaker, limit, offset, cli.json,
            )
            .await
        }
        Commands::Triage(ref triage) => {
            let queue = Arc::new(LibsqlQueue::new(db.connection()));
            let manager = RetryManager::new(db.clone(), queue, config.retry.clone());
            match triage {
                TriageCommands::List => triage_list(&db, cli.json).await,
                TriageCommands::Retry { asset_id } => {
                    let asset_id = parse_asset_id(asset_id)?;
                    let job = manager.triage_retry(asset_id).await?;
                    println!(
                        "asset {asset_id} re-enqueued as job {} (attempt 0)",
                        job.job_id
                    );
                    Ok(())
                }
                TriageCommands::Skip { asset_id } => {
                    let asset_id = parse_asset_id(asset_id)?;
                    manager.triage_skip(asset_id).await?;
                    println!("asset {asset_id} marked failed, dead-letter entries removed");
                    Ok(())
                }
            }
        }
        Commands::Status { ref asset_id } => status(&db, asset_id, cli.json).await,
        Commands::Dlq => dlq_list(&db, cli.json).await,
        Commands::Purge { days } => {
            let days = days.unwrap_or(config.retention.archived_days);
            let cutoff = Utc::now() - Duration::days(i64::from(days));
            let purged = db.purge_archived_versions(cutoff).await?;
            println!("purged {purged} archived version(s) older than {days} day(s)");
            Ok(())
        }
    }
}

fn parse_asset_id(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::InvalidInput(format!("asset id {value}: {e}")))
}

#[allow(clippy::too_many_arguments)]
async fn search(
    db: &Arc<LibsqlDatabase>,
    config: &PipelineConfig,
    query: &str,
    mode: &str,
    bucket: &Option<String>,
    speaker: &Option<String>,
    limit: usize,
    offset: usize,
    json: bool,
) -> Result<()> {
    let mode: SearchMode = mode
        .parse()
        .map_err(Error::InvalidInput)?;

    let query_vector = match mode {
        SearchMode::Keyword => None,
        SearchMode::Semantic | SearchMode::Hybrid => {
            let embedder = HashEmbedder::new(config.embedding.dimension);
            Some(embedder.embed(query).await?)
        }
    };

    let request = SearchRequest {
        query: query.to_string(),
        mode,
        filter: SearchFilter {
            bucket: bucket.clone(),
            speaker: speaker.clone(),
        },
        limit,
        offset,
        query_vector,
        keyword_weight: None,
        semantic_weight: None,
    };

    let port: Arc<dyn MediaDatabase> = db.clone();
    let service =
        media_core::SearchService::new(port, config.search.clone(), config.embedding.dimension);
    let response = service.search(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!(
        "{} result(s) of {} for \"{}\" ({})",
        response.results.len(),
        response.total,
        response.query,
        response.mode
    );
    for hit in &response.results {
        let speaker = hit
            .speaker
            .as_deref()
            .map(|s| format!(" [{s}]"))
            .unwrap_or_default();
        println!(
            "  {:.3}  {}/{}  {}..{}ms{}  {}  ({})",
            hit.score,
            hit.asset.bucket,
            hit.asset.object_key,
            hit.start_ms,
            hit.end_ms,
            speaker,
            hit.snippet,
            hit.match_type
        );
    }
    Ok(())
}

async fn triage_list(db: &Arc<LibsqlDatabase>, json: bool) -> Result<()> {
    let assets = db.list_assets_by_status(AssetStatus::Quarantined).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&assets)?);
        return Ok(());
    }
    if assets.is_empty() {
        println!("no quarantined assets");
        return Ok(());
    }
    for asset in assets {
        println!(
            "{}  {}/{}  attempts={}  triage={}  action={}",
            asset.asset_id,
            asset.bucket,
            asset.object_key,
            asset.attempt_count,
            asset
                .triage_state
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            asset.recommended_action.as_deref().unwrap_or("-"),
        );
        if let Some(last_error) = &asset.last_error {
            println!("    last error: {last_error}");
        }
    }
    Ok(())
}

async fn status(db: &Arc<LibsqlDatabase>, asset_id: &str, json: bool) -> Result<()> {
    let asset_id = parse_asset_id(asset_id)?;
    let asset = db
        .get_asset(asset_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("asset {asset_id}")))?;
    let versions = db.list_versions(asset_id).await?;

    if json {
        let payload = serde_json::json!({ "asset": asset, "versions": versions });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("asset    {}", asset.asset_id);
    println!("location {}/{}", asset.bucket, asset.object_key);
    println!("status   {}", asset.status);
    println!(
        "current  {}",
        asset.current_version_id.as_deref().unwrap_or("-")
    );
    println!("engine   {}", asset.engine);
    if let Some(error) = &asset.last_error {
        println!("error    {error}");
    }
    for version in versions {
        println!(
            "  version {}  {}  {}  {} bytes",
            version.version_id, version.processing_status, version.publish_state, version.byte_size
        );
    }
    Ok(())
}

async fn dlq_list(db: &Arc<LibsqlDatabase>, json: bool) -> Result<()> {
    let items = db.list_dlq_items().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("dead-letter queue is empty");
        return Ok(());
    }
    for item in items {
        println!(
            "{}  asset={}  version={}  kind={}  retryable={}",
            item.dlq_id, item.asset_id, item.version_id, item.error_kind, item.retryable
        );
        println!("    {}", item.error_message);
        for line in &item.log_trail {
            println!("    | {line}");
        }
    }
    Ok(())
}
