use std::{sync::Arc, time::Duration};

use common::utils::config::AppConfig;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    batcher::{output_file_name, TopicBatch, TopicBatcher},
    generator::QuestionSource,
    loader::Document,
    store::CorpusStore,
};

#[derive(Debug, Clone, Copy)]
pub struct PacingConfig {
    /// Number of generation calls between pauses; 0 disables pacing.
    pub pause_every: usize,
    pub pause: Duration,
}

impl PacingConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            pause_every: config.pause_every,
            pause: Duration::from_secs(config.pause_secs),
        }
    }
}

/// Run-level aggregation of what happened, so callers can report a summary
/// instead of relying on console diagnostics alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Generation calls attempted (per document or per flushed batch).
    pub processed: usize,
    pub generated_questions: usize,
    pub unreadable: usize,
    pub batching_failures: usize,
    pub generation_failures: usize,
    pub save_failures: usize,
}

impl RunSummary {
    pub fn completed_cleanly(&self) -> bool {
        self.batching_failures == 0 && self.generation_failures == 0 && self.save_failures == 0
    }
}

/// Drives the opaque generation service over documents or batches, pacing
/// calls to stay under the external rate limit. Failures are logged, counted
/// and skipped; there is no retry.
pub struct GenerationScheduler {
    source: Arc<dyn QuestionSource>,
    store: CorpusStore,
    pacing: PacingConfig,
    questions_per_call: u32,
    root_segment: String,
}

impl GenerationScheduler {
    pub fn new(source: Arc<dyn QuestionSource>, store: CorpusStore, config: &AppConfig) -> Self {
        Self {
            source,
            store,
            pacing: PacingConfig::from_app(config),
            questions_per_call: config.questions_per_call,
            root_segment: config.root_segment.clone(),
        }
    }

    /// One generation call per readable document, persisted under the
    /// document's own topic key.
    pub async fn run_per_document(
        &self,
        documents: &[Document],
        cancel: &CancellationToken,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        for document in documents {
            if cancel.is_cancelled() {
                warn!("cancellation requested, stopping generation run");
                break;
            }

            let Some(content) = document.content.as_deref() else {
                summary.unreadable = summary.unreadable.saturating_add(1);
                continue;
            };

            let file_name = output_file_name(&document.path, &self.root_segment);
            self.generate_and_save(content, &file_name, &mut summary)
                .await;
            self.pace(summary.processed, cancel).await;
        }

        summary
    }

    /// Accumulates topic-filtered documents into token-budgeted batches, one
    /// generation call per flushed batch plus a final drain of the remainder.
    pub async fn run_batched(
        &self,
        documents: &[Document],
        batcher: &mut TopicBatcher,
        cancel: &CancellationToken,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let file_name = format!("{}.json", batcher.topic());

        for document in documents {
            if cancel.is_cancelled() {
                warn!("cancellation requested, stopping generation run");
                break;
            }

            let Some(content) = document.content.as_deref() else {
                summary.unreadable = summary.unreadable.saturating_add(1);
                continue;
            };

            let key = output_file_name(&document.path, &self.root_segment);
            if !batcher.admits(&key) {
                continue;
            }

            match batcher.push(&key, content) {
                Ok(Some(batch)) => {
                    self.consume_batch(batch, &file_name, &mut summary).await;
                    self.pace(summary.processed, cancel).await;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(key = %key, error = %err, "failed to add document to batch, skipping");
                    summary.batching_failures = summary.batching_failures.saturating_add(1);
                }
            }
        }

        if !cancel.is_cancelled() {
            if let Some(batch) = batcher.take() {
                self.consume_batch(batch, &file_name, &mut summary).await;
            }
        }

        summary
    }

    async fn consume_batch(&self, batch: TopicBatch, file_name: &str, summary: &mut RunSummary) {
        info!(
            topic = %batch.topic_key,
            docs = batch.doc_count,
            tokens = batch.token_count,
            "flushing topic batch"
        );
        self.generate_and_save(&batch.text, file_name, summary).await;
    }

    async fn generate_and_save(&self, text: &str, file_name: &str, summary: &mut RunSummary) {
        summary.processed = summary.processed.saturating_add(1);

        let questions = match self.source.generate(text, self.questions_per_call).await {
            Ok(questions) => questions,
            Err(err) => {
                warn!(file = file_name, error = %err, "generation call failed, skipping item");
                summary.generation_failures = summary.generation_failures.saturating_add(1);
                return;
            }
        };

        if questions.is_empty() {
            warn!(file = file_name, "generation returned no questions");
            return;
        }
        summary.generated_questions = summary.generated_questions.saturating_add(questions.len());

        if let Err(err) = self.store.save(questions, file_name).await {
            warn!(file = file_name, error = %err, "failed to persist question set");
            summary.save_failures = summary.save_failures.saturating_add(1);
        }
    }

    /// Blocking pause after every `pause_every` calls, purely for external
    /// rate-limit compliance. The sleep races against cancellation so a
    /// shutdown is not stuck waiting it out.
    async fn pace(&self, processed: usize, cancel: &CancellationToken) {
        if self.pacing.pause_every == 0
            || processed == 0
            || processed % self.pacing.pause_every != 0
        {
            return;
        }

        info!(
            processed,
            pause_secs = self.pacing.pause.as_secs(),
            "pausing to respect generation rate limit"
        );
        tokio::select! {
            () = cancel.cancelled() => {}
            () = sleep(self.pacing.pause) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batcher::{BatcherConfig, TokenEstimator};
    use async_trait::async_trait;
    use common::{
        error::AppError,
        storage::types::question::{AnswerKey, Question},
    };
    use std::{
        collections::{BTreeMap, HashMap},
        path::{Path, PathBuf},
        sync::atomic::{AtomicUsize, Ordering},
    };

    struct StaticSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StaticSource {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl QuestionSource for StaticSource {
        async fn generate(
            &self,
            text: &str,
            _num_questions: u32,
        ) -> Result<Vec<Question>, AppError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::LLMParsing("malformed response".to_string()));
            }
            let options = BTreeMap::from([
                (AnswerKey::A, "one".to_string()),
                (AnswerKey::B, "two".to_string()),
                (AnswerKey::C, "three".to_string()),
                (AnswerKey::D, "four".to_string()),
            ]);
            Ok(vec![Question {
                question: format!("call {call}: {}?", text.len()),
                options,
                correct_answer: AnswerKey::A,
                question_id: None,
                source_file: None,
            }])
        }
    }

    struct WordCountEstimator;

    impl TokenEstimator for WordCountEstimator {
        fn count_tokens(&self, text: &str) -> Result<usize, AppError> {
            Ok(text.split_whitespace().count())
        }
    }

    fn document(path: &str, content: Option<&str>) -> Document {
        Document {
            path: PathBuf::from(path),
            filename: Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            metadata: HashMap::new(),
            content: content.map(str::to_owned),
            raw_content: content.map(str::to_owned),
            error: content.is_none().then(|| "read failed".to_string()),
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            pause_every: 1_000,
            pause_secs: 0,
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn per_document_run_saves_one_file_per_readable_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = StaticSource::new(false);
        let scheduler = GenerationScheduler::new(
            source.clone(),
            CorpusStore::new(dir.path(), None),
            &test_config(),
        );
        let documents = vec![
            document("pages/react/hooks.mdx", Some("hooks body")),
            document("pages/react/broken.mdx", None),
            document("pages/angular/cli.mdx", Some("cli body")),
        ];

        let summary = scheduler
            .run_per_document(&documents, &CancellationToken::new())
            .await;

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.unreadable, 1);
        assert_eq!(summary.generation_failures, 0);
        assert!(summary.completed_cleanly());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(dir.path().join("react_hooks.json").exists());
        assert!(dir.path().join("angular_cli.json").exists());
    }

    #[tokio::test]
    async fn generation_failures_are_counted_and_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheduler = GenerationScheduler::new(
            StaticSource::new(true),
            CorpusStore::new(dir.path(), None),
            &test_config(),
        );
        let documents = vec![document("pages/react/hooks.mdx", Some("body"))];

        let summary = scheduler
            .run_per_document(&documents, &CancellationToken::new())
            .await;

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.generation_failures, 1);
        assert!(!summary.completed_cleanly());
        assert!(!dir.path().join("react_hooks.json").exists());
    }

    #[tokio::test]
    async fn cancellation_stops_the_run_early() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = StaticSource::new(false);
        let scheduler = GenerationScheduler::new(
            source.clone(),
            CorpusStore::new(dir.path(), None),
            &test_config(),
        );
        let documents = vec![
            document("pages/a.mdx", Some("a")),
            document("pages/b.mdx", Some("b")),
        ];
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = scheduler.run_per_document(&documents, &cancel).await;

        assert_eq!(summary.processed, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn batched_run_flushes_on_threshold_and_drains_the_remainder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = StaticSource::new(false);
        let scheduler = GenerationScheduler::new(
            source.clone(),
            CorpusStore::new(dir.path(), None),
            &test_config(),
        );
        let mut batcher = TopicBatcher::new(
            BatcherConfig {
                topic: "react".to_string(),
                max_batch_docs: 2,
                max_batch_tokens: 1_000_000,
            },
            Arc::new(WordCountEstimator),
        );
        let documents = vec![
            document("pages/react/hooks.mdx", Some("hooks body")),
            document("pages/angular/cli.mdx", Some("filtered out")),
            document("pages/react/effects.mdx", Some("effects body")),
            document("pages/react/context.mdx", Some("context body")),
        ];

        let summary = scheduler
            .run_batched(&documents, &mut batcher, &CancellationToken::new())
            .await;

        // one full batch of two react documents, one drained remainder
        assert_eq!(summary.processed, 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(dir.path().join("react.json").exists());
        assert!(batcher.take().is_none());
    }
}
