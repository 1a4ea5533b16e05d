use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use common::utils::config::get_config;
use ingestion_pipeline::{
    batcher::{BatcherConfig, PretrainedTokenEstimator, TopicBatcher},
    generator::OpenAiQuestionSource,
    links::extract_links,
    loader::DocumentLoader,
    scheduler::GenerationScheduler,
    store::CorpusStore,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Generate multiple-choice questions from a tree of MDX documents.
#[derive(Parser)]
struct Args {
    /// Root directory containing the documents; defaults to the configured
    /// pages directory.
    root: Option<PathBuf>,
    /// Batch documents whose topic key contains this substring into
    /// token-budgeted generation calls instead of one call per document.
    #[arg(long)]
    topic: Option<String>,
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
    let root = args
        .root
        .unwrap_or_else(|| PathBuf::from(&config.pages_dir));

    let loader = DocumentLoader::new(root);
    let documents = loader.load_all()?;
    for document in &documents {
        let links = extract_links(document);
        info!(
            file = %document.path.display(),
            metadata_keys = document.metadata.len(),
            links = links.len(),
            "loaded document"
        );
    }

    let source = Arc::new(OpenAiQuestionSource::from_config(&config));

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current item");
            signal_cancel.cancel();
        }
    });

    let summary = match args.topic {
        Some(topic) => {
            // Batched runs write a single topic file, no mirror.
            let store = CorpusStore::new(&config.questions_dir, None);
            let scheduler = GenerationScheduler::new(source, store, &config);
            let mut batcher = TopicBatcher::new(
                BatcherConfig::from_app(&config, &topic),
                Arc::new(PretrainedTokenEstimator),
            );
            scheduler.run_batched(&documents, &mut batcher, &cancel).await
        }
        None => {
            let store = CorpusStore::new(
                &config.questions_dir,
                config.public_questions_dir.clone().map(PathBuf::from),
            );
            let scheduler = GenerationScheduler::new(source, store, &config);
            scheduler.run_per_document(&documents, &cancel).await
        }
    };

    info!(
        processed = summary.processed,
        generated_questions = summary.generated_questions,
        unreadable = summary.unreadable,
        batching_failures = summary.batching_failures,
        generation_failures = summary.generation_failures,
        save_failures = summary.save_failures,
        clean = summary.completed_cleanly(),
        "generation run finished"
    );

    Ok(())
}
