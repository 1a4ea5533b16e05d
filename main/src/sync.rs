use std::path::PathBuf;

use clap::Parser;
use common::{storage::db::SurrealDbClient, utils::config::get_config};
use sync_pipeline::run_sync;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Upsert the flat-file question corpus into the remote store.
#[derive(Parser)]
struct Args {
    /// Directory containing the corpus JSON files; defaults to the
    /// configured questions directory.
    folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Args::parse();
    let config = get_config()?;
    let folder = args
        .folder
        .unwrap_or_else(|| PathBuf::from(&config.questions_dir));

    let db = SurrealDbClient::new(
        &config.surrealdb_address,
        &config.surrealdb_username,
        &config.surrealdb_password,
        &config.surrealdb_namespace,
        &config.surrealdb_database,
    )
    .await?;

    // Remote store being unreachable is the one fatal startup error.
    db.ping().await?;
    info!("connected to remote store");

    let summary = run_sync(&db, &folder).await?;

    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        unchanged = summary.unchanged,
        failed = summary.failed,
        clean = summary.completed_cleanly(),
        "corpus sync finished"
    );

    Ok(())
}
