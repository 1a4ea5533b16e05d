use std::path::{Path, PathBuf};

use common::{
    error::AppError,
    storage::types::question::{Question, QuestionSet},
};
use tokio::fs;
use tracing::{info, warn};

/// Flat-file corpus store. Every save merges with whatever is already
/// persisted and rewrites the file wholesale; atomicity across a process
/// crash is not guaranteed, the next run reconciles through the same merge.
pub struct CorpusStore {
    primary_dir: PathBuf,
    mirror_dir: Option<PathBuf>,
}

impl CorpusStore {
    pub fn new(primary_dir: impl Into<PathBuf>, mirror_dir: Option<PathBuf>) -> Self {
        Self {
            primary_dir: primary_dir.into(),
            mirror_dir,
        }
    }

    /// Merges new questions into the persisted set for `file_name` and writes
    /// the result back, mirrored when a mirror directory is configured. Both
    /// writes are attempted independently; neither rolls back the other.
    /// Returns the merged set size.
    pub async fn save(
        &self,
        questions: Vec<Question>,
        file_name: &str,
    ) -> Result<usize, AppError> {
        let existing = Self::read_existing(&self.primary_dir.join(file_name)).await;

        let mut merged = QuestionSet::merged(existing, questions);
        merged.assign_missing_ids();
        let payload = serde_json::to_string_pretty(merged.questions())?;

        let primary = Self::write(&self.primary_dir, file_name, &payload).await;
        if let Err(err) = &primary {
            warn!(file = file_name, error = %err, "failed to write question set");
        }

        let mirror = match &self.mirror_dir {
            Some(dir) => {
                let result = Self::write(dir, file_name, &payload).await;
                if let Err(err) = &result {
                    warn!(file = file_name, error = %err, "failed to mirror question set");
                }
                result
            }
            None => Ok(()),
        };

        primary?;
        mirror?;
        Ok(merged.len())
    }

    async fn read_existing(path: &Path) -> Vec<Question> {
        match fs::read_to_string(path).await {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(questions) => questions,
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "existing question set is unparsable, treating as empty"
                    );
                    Vec::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read existing question set, treating as empty"
                );
                Vec::new()
            }
        }
    }

    async fn write(dir: &Path, file_name: &str, payload: &str) -> Result<(), AppError> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(file_name);
        fs::write(&path, payload).await?;
        info!(path = %path.display(), "saved question set");
        Ok(())
    }
}
