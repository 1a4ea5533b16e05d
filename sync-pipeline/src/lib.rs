#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

//! Propagates the flat-file corpus into the remote store. Each flat file
//! becomes one remote record keyed by its stem; records are diffed against
//! the remote copy before writing so an unchanged corpus produces no writes.

use std::path::{Path, PathBuf};

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{corpus_record::CorpusRecord, question::Question},
    },
};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Aggregated result of one sync pass over a corpus directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl SyncSummary {
    pub fn completed_cleanly(&self) -> bool {
        self.failed == 0
    }
}

/// Enumerates the corpus files in a directory; order is
/// filesystem-dependent.
pub fn corpus_files(folder: &Path) -> Result<Vec<PathBuf>, AppError> {
    let pattern = format!("{}/*.json", folder.display());
    let paths = glob::glob(&pattern)
        .map_err(|e| AppError::InternalError(format!("invalid corpus pattern: {e}")))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .collect();
    Ok(paths)
}

fn load_questions(path: &Path) -> Result<Vec<Question>, AppError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Stamps provenance onto a file's questions: the source file key, and for
/// legacy files written before ids were persisted, a 1-based positional
/// `question_id`. Ids already present are kept untouched.
pub fn attach_provenance(key: &str, mut questions: Vec<Question>) -> Vec<Question> {
    for (position, question) in questions.iter_mut().enumerate() {
        if question.question_id.is_none() {
            question.question_id =
                Some(u32::try_from(position.saturating_add(1)).unwrap_or(u32::MAX));
        }
        question.source_file = Some(key.to_owned());
    }
    questions
}

/// Upserts one record: insert when absent, update the `questions` field when
/// the remote copy differs structurally, skip the write when identical.
pub async fn sync_record(
    db: &SurrealDbClient,
    key: &str,
    questions: Vec<Question>,
) -> Result<SyncOutcome, AppError> {
    match CorpusRecord::find_by_key(db, key).await? {
        Some(existing) if existing.questions == questions => {
            info!(key = %key, "remote record identical, skipping write");
            Ok(SyncOutcome::Unchanged)
        }
        Some(_) => {
            CorpusRecord::update_questions(db, key, &questions).await?;
            info!(key = %key, "updated remote record");
            Ok(SyncOutcome::Updated)
        }
        None => {
            CorpusRecord::new(key.to_owned(), questions).insert(db).await?;
            info!(key = %key, "inserted new remote record");
            Ok(SyncOutcome::Inserted)
        }
    }
}

/// Syncs every corpus file under `folder`. Per-key failures are logged and
/// counted; they never abort the remaining keys.
pub async fn run_sync(db: &SurrealDbClient, folder: &Path) -> Result<SyncSummary, AppError> {
    let files = corpus_files(folder)?;
    if files.is_empty() {
        warn!(folder = %folder.display(), "no corpus files found");
        return Ok(SyncSummary::default());
    }
    info!(count = files.len(), folder = %folder.display(), "syncing corpus files");

    let mut summary = SyncSummary::default();
    for file in &files {
        let key = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let outcome = match load_questions(file) {
            Ok(questions) => sync_record(db, &key, attach_provenance(&key, questions)).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(SyncOutcome::Inserted) => summary.inserted = summary.inserted.saturating_add(1),
            Ok(SyncOutcome::Updated) => summary.updated = summary.updated.saturating_add(1),
            Ok(SyncOutcome::Unchanged) => summary.unchanged = summary.unchanged.saturating_add(1),
            Err(err) => {
                warn!(key = %key, error = %err, "failed to sync corpus file");
                summary.failed = summary.failed.saturating_add(1);
            }
        }
    }

    Ok(summary)
}
