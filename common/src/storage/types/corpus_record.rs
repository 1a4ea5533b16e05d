use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{question::Question, StoredObject};
use crate::{error::AppError, storage::db::SurrealDbClient};

/// One remote document per topic key; the key doubles as the record id, so
/// uniqueness is enforced by the store itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub key: String,
    pub questions: Vec<Question>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct QuestionsPatch {
    questions: Vec<Question>,
}

impl StoredObject for CorpusRecord {
    fn table_name() -> &'static str {
        "corpus_record"
    }

    fn get_id(&self) -> &str {
        &self.key
    }
}

impl CorpusRecord {
    pub fn new(key: String, questions: Vec<Question>) -> Self {
        Self {
            key,
            questions,
            created_at: Utc::now(),
        }
    }

    pub async fn find_by_key(
        db: &SurrealDbClient,
        key: &str,
    ) -> Result<Option<Self>, AppError> {
        Ok(db.get_item::<Self>(key).await?)
    }

    pub async fn insert(self, db: &SurrealDbClient) -> Result<(), AppError> {
        db.store_item(self).await?;
        Ok(())
    }

    /// Replaces only the `questions` field of an existing record.
    pub async fn update_questions(
        db: &SurrealDbClient,
        key: &str,
        questions: &[Question],
    ) -> Result<(), AppError> {
        let _updated: Option<Self> = db
            .update((Self::table_name(), key))
            .merge(QuestionsPatch {
                questions: questions.to_vec(),
            })
            .await?;
        Ok(())
    }
}
