use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

// Credentials deliberately default to empty: their absence is not validated
// up front, a downstream connection failure is the signal.
#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    #[serde(default)]
    pub surrealdb_address: String,
    #[serde(default)]
    pub surrealdb_username: String,
    #[serde(default)]
    pub surrealdb_password: String,
    #[serde(default = "default_namespace")]
    pub surrealdb_namespace: String,
    #[serde(default = "default_database")]
    pub surrealdb_database: String,
    #[serde(default = "default_pages_dir")]
    pub pages_dir: String,
    #[serde(default = "default_questions_dir")]
    pub questions_dir: String,
    /// Parallel output root; every saved question set is mirrored here so a
    /// second consumer can read identical content from its own root.
    #[serde(default)]
    pub public_questions_dir: Option<String>,
    /// Path segment stripped when deriving a document's topic key.
    #[serde(default = "default_root_segment")]
    pub root_segment: String,
    #[serde(default = "default_questions_per_call")]
    pub questions_per_call: u32,
    #[serde(default = "default_max_batch_docs")]
    pub max_batch_docs: usize,
    #[serde(default = "default_max_batch_tokens")]
    pub max_batch_tokens: usize,
    /// Number of generation calls between rate-limit pauses.
    #[serde(default = "default_pause_every")]
    pub pause_every: usize,
    #[serde(default = "default_pause_secs")]
    pub pause_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_generation_model() -> String {
    "gpt-4o-2024-08-06".to_string()
}

fn default_namespace() -> String {
    "corpus".to_string()
}

fn default_database() -> String {
    "corpus".to_string()
}

fn default_pages_dir() -> String {
    "pages".to_string()
}

fn default_questions_dir() -> String {
    "questions".to_string()
}

fn default_root_segment() -> String {
    "pages".to_string()
}

fn default_questions_per_call() -> u32 {
    10
}

fn default_max_batch_docs() -> usize {
    10
}

fn default_max_batch_tokens() -> usize {
    8_000
}

fn default_pause_every() -> usize {
    20
}

fn default_pause_secs() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            generation_model: default_generation_model(),
            surrealdb_address: String::new(),
            surrealdb_username: String::new(),
            surrealdb_password: String::new(),
            surrealdb_namespace: default_namespace(),
            surrealdb_database: default_database(),
            pages_dir: default_pages_dir(),
            questions_dir: default_questions_dir(),
            public_questions_dir: None,
            root_segment: default_root_segment(),
            questions_per_call: default_questions_per_call(),
            max_batch_docs: default_max_batch_docs(),
            max_batch_tokens: default_max_batch_tokens(),
            pause_every: default_pause_every(),
            pause_secs: default_pause_secs(),
        }
    }
}

/// A `config` file in the parent directory takes precedence over one in the
/// current directory; the process environment wins over both. Missing
/// credentials are not validated here, a downstream connection failure is
/// the signal.
pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(File::with_name("../config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
