//! Operational tool for the media pipeline: search the library, triage
//! quarantined assets, inspect the dead-letter queue, and purge archived
//! versions.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use media_core::Error;

#[derive(Parser)]
#[command(name = "media-cli")]
#[command(about = "Operational tool for the media transcript pipeline")]
#[command(version, long_about = None)]
struct Cli {
    /// Database file path (defaults to MEDIA_DB_PATH or ./media.db)
    #[arg(long, value_name = "FILE", global = true)]
    db: Option<PathBuf>,

    /// Emit machine-readable JSON instead of human-oriented output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search published transcripts
    Search {
        /// Query text
        query: String,
        /// keyword | semantic | hybrid
        #[arg(short = 't', long, default_value = "keyword")]
        mode: String,
        /// Restrict to one bucket
        #[arg(long)]
        bucket: Option<String>,
        /// Restrict to one speaker label
        #[arg(long)]
        speaker: Option<String>,
        /// Page size (1..=100)
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Rows to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Operate on quarantined assets
    #[command(subcommand)]
    Triage(TriageCommands),
    /// Show one asset's lifecycle state
    Status {
        /// Asset id
        asset_id: String,
    },
    /// List dead-letter items
    Dlq,
    /// Delete archived versions past retention
    Purge {
        /// Override the configured retention window
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Subcommand)]
enum TriageCommands {
    /// List quarantined assets with their triage classification
    List,
    /// Re-enqueue a quarantined asset with a fresh attempt budget
    Retry {
        /// Asset id
        asset_id: String,
    },
    /// Mark a quarantined asset failed and drop its dead-letter entries
    Skip {
        /// Asset id
        asset_id: String,
    },
}

/// sysexits-style mapping for scripts driving this tool.
fn exit_code(error: &Error) -> u8 {
    match error {
        Error::InvalidInput(_) | Error::NotFound(_) | Error::AlreadyExists(_) => 64,
        Error::Storage(_)
        | Error::Io(_)
        | Error::PermanentDownstream(_)
        | Error::Serialization(_) => 69,
        Error::TransientNetwork(_) | Error::TransientResource(_) | Error::Timeout(_) => 75,
        Error::Configuration(_) => 78,
        Error::MediaFormat(_) | Error::EngineConfig(_) | Error::Internal(_) => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(exit_code(&error))
        }
    }
}
