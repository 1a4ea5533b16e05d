#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod batcher;
pub mod generator;
pub mod links;
pub mod loader;
pub mod scheduler;
pub mod store;

pub use batcher::{output_file_name, topic_key, BatcherConfig, TopicBatch, TopicBatcher};
pub use generator::{OpenAiQuestionSource, QuestionSource};
pub use loader::{parse_front_matter, Document, DocumentLoader};
pub use scheduler::{GenerationScheduler, RunSummary};
pub use store::CorpusStore;
