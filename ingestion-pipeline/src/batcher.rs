use std::{
    path::{Component, Path},
    sync::{Arc, OnceLock},
};

use common::{error::AppError, utils::config::AppConfig};

/// Derives a topic key from a document path: every directory segment except
/// the fixed root segment, joined with the file stem by underscores.
pub fn topic_key(path: &Path, root_segment: &str) -> String {
    let mut segments: Vec<String> = path
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .filter(|name| name != root_segment)
        .collect();

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    segments.push(stem);

    segments.join("_")
}

/// File name of the persisted question set for a document.
pub fn output_file_name(path: &Path, root_segment: &str) -> String {
    format!("{}.json", topic_key(path, root_segment))
}

/// Opaque token-count oracle used for the batch budget. The default
/// implementation loads a pretrained tokenizer; tests substitute a
/// deterministic one.
pub trait TokenEstimator: Send + Sync {
    fn count_tokens(&self, text: &str) -> Result<usize, AppError>;
}

pub struct PretrainedTokenEstimator;

impl TokenEstimator for PretrainedTokenEstimator {
    fn count_tokens(&self, text: &str) -> Result<usize, AppError> {
        let tokenizer = get_tokenizer()?;
        let encoding = tokenizer
            .encode(text, false)
            .map_err(|e| AppError::InternalError(format!("failed to tokenize batch text: {e}")))?;
        Ok(encoding.get_ids().len())
    }
}

fn get_tokenizer() -> Result<&'static tokenizers::Tokenizer, AppError> {
    static TOKENIZER: OnceLock<Result<tokenizers::Tokenizer, String>> = OnceLock::new();

    match TOKENIZER.get_or_init(|| {
        tokenizers::Tokenizer::from_pretrained("bert-base-cased", None)
            .map_err(|e| format!("failed to initialize tokenizer: {e}"))
    }) {
        Ok(tokenizer) => Ok(tokenizer),
        Err(err) => Err(AppError::InternalError(err.clone())),
    }
}

/// Accumulated content for one topic, reset on every flush.
#[derive(Debug, Clone, Default)]
pub struct TopicBatch {
    pub topic_key: String,
    pub text: String,
    pub doc_count: usize,
    pub token_count: usize,
}

#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Substring filter on derived topic keys; only matching documents are
    /// admitted into the batch.
    pub topic: String,
    pub max_batch_docs: usize,
    pub max_batch_tokens: usize,
}

impl BatcherConfig {
    pub fn from_app(config: &AppConfig, topic: &str) -> Self {
        Self {
            topic: topic.to_owned(),
            max_batch_docs: config.max_batch_docs,
            max_batch_tokens: config.max_batch_tokens,
        }
    }
}

pub struct TopicBatcher {
    config: BatcherConfig,
    estimator: Arc<dyn TokenEstimator>,
    batch: TopicBatch,
}

impl TopicBatcher {
    pub fn new(config: BatcherConfig, estimator: Arc<dyn TokenEstimator>) -> Self {
        let batch = TopicBatch {
            topic_key: config.topic.clone(),
            ..TopicBatch::default()
        };
        Self {
            config,
            estimator,
            batch,
        }
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    pub fn admits(&self, key: &str) -> bool {
        key.contains(&self.config.topic)
    }

    /// Appends one document section, prefixed by its own output key as a
    /// header. Returns the full batch when a threshold is crossed.
    pub fn push(&mut self, key: &str, content: &str) -> Result<Option<TopicBatch>, AppError> {
        let section = format!("\n\n{key}\n\n{content}");
        let tokens = self.estimator.count_tokens(&section)?;

        self.batch.text.push_str(&section);
        self.batch.token_count = self.batch.token_count.saturating_add(tokens);
        self.batch.doc_count = self.batch.doc_count.saturating_add(1);

        if self.should_flush() {
            Ok(self.take())
        } else {
            Ok(None)
        }
    }

    /// Either threshold triggers a flush: the configured document count or
    /// the configured token budget.
    pub fn should_flush(&self) -> bool {
        self.batch.doc_count >= self.config.max_batch_docs
            || self.batch.token_count >= self.config.max_batch_tokens
    }

    /// Drains whatever has accumulated, resetting the batch. Returns `None`
    /// when the batch is empty.
    pub fn take(&mut self) -> Option<TopicBatch> {
        if self.batch.doc_count == 0 {
            return None;
        }
        let fresh = TopicBatch {
            topic_key: self.config.topic.clone(),
            ..TopicBatch::default()
        };
        Some(std::mem::replace(&mut self.batch, fresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// One token per whitespace-separated word, deterministic for tests.
    struct WordCountEstimator;

    impl TokenEstimator for WordCountEstimator {
        fn count_tokens(&self, text: &str) -> Result<usize, AppError> {
            Ok(text.split_whitespace().count())
        }
    }

    fn batcher(max_docs: usize, max_tokens: usize) -> TopicBatcher {
        TopicBatcher::new(
            BatcherConfig {
                topic: "react".to_string(),
                max_batch_docs: max_docs,
                max_batch_tokens: max_tokens,
            },
            Arc::new(WordCountEstimator),
        )
    }

    #[test]
    fn topic_key_excludes_the_root_segment() {
        let path = PathBuf::from("pages/react/advanced/hooks.mdx");

        assert_eq!(topic_key(&path, "pages"), "react_advanced_hooks");
        assert_eq!(
            output_file_name(&path, "pages"),
            "react_advanced_hooks.json"
        );
    }

    #[test]
    fn topic_key_of_top_level_document_is_its_stem() {
        let path = PathBuf::from("pages/intro.mdx");

        assert_eq!(topic_key(&path, "pages"), "intro");
    }

    #[test]
    fn document_count_threshold_triggers_flush() {
        let mut batcher = batcher(2, 1_000_000);

        assert!(batcher
            .push("react_hooks", "use state")
            .expect("push")
            .is_none());
        let flushed = batcher
            .push("react_effects", "use effect")
            .expect("push")
            .expect("second document should flush");

        assert_eq!(flushed.doc_count, 2);
        assert_eq!(flushed.topic_key, "react");
        assert!(flushed.text.contains("react_hooks"));
        assert!(flushed.text.contains("use effect"));
        assert!(batcher.take().is_none());
    }

    #[test]
    fn token_budget_threshold_triggers_flush() {
        let mut batcher = batcher(1_000, 6);

        let flushed = batcher
            .push("react_hooks", "five words of body text")
            .expect("push")
            .expect("token budget should flush");

        // key header plus five body words
        assert_eq!(flushed.token_count, 6);
        assert_eq!(flushed.doc_count, 1);
    }

    #[test]
    fn take_drains_a_partial_batch_once() {
        let mut batcher = batcher(10, 1_000_000);

        batcher.push("react_hooks", "body").expect("push");
        let drained = batcher.take().expect("partial batch should drain");

        assert_eq!(drained.doc_count, 1);
        assert!(batcher.take().is_none());
    }

    #[test]
    fn admits_is_a_substring_match_on_the_key() {
        let batcher = batcher(10, 100);

        assert!(batcher.admits("react_hooks"));
        assert!(!batcher.admits("angular_cli"));
    }
}
