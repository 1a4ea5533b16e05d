use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use common::error::AppError;
use tracing::{info, warn};

/// Only files with this extension are discovered.
pub const DOC_EXTENSION: &str = "mdx";

const FRONT_MATTER_DELIMITER: &str = "---";

/// One discovered source document. Immutable after creation; `content` is
/// `None` when the file could not be read, in which case `error` carries the
/// reason and the rest of the pipeline skips the document.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub filename: String,
    pub metadata: HashMap<String, String>,
    pub content: Option<String>,
    pub raw_content: Option<String>,
    pub error: Option<String>,
}

pub struct DocumentLoader {
    root: PathBuf,
}

impl DocumentLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Recursively enumerates document files under the root directory. The
    /// order is filesystem-dependent and not guaranteed sorted.
    pub fn discover(&self) -> Result<Vec<PathBuf>, AppError> {
        let pattern = format!("{}/**/*.{DOC_EXTENSION}", self.root.display());
        let paths = glob::glob(&pattern)
            .map_err(|e| AppError::InternalError(format!("invalid discovery pattern: {e}")))?
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

    /// Reads a single document, splitting front matter from the body. A read
    /// failure is non-fatal: it is logged and recorded on the returned
    /// `Document`.
    pub fn load(&self, path: &Path) -> Document {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        match fs::read_to_string(path) {
            Ok(raw) => {
                let (metadata, body) = parse_front_matter(&raw);
                Document {
                    path: path.to_path_buf(),
                    filename,
                    metadata,
                    content: Some(body.to_owned()),
                    raw_content: Some(raw),
                    error: None,
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read document");
                Document {
                    path: path.to_path_buf(),
                    filename,
                    metadata: HashMap::new(),
                    content: None,
                    raw_content: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Discovers and loads every document, preserving discovery order and
    /// never short-circuiting on individual read failures.
    pub fn load_all(&self) -> Result<Vec<Document>, AppError> {
        let paths = self.discover()?;
        info!(count = paths.len(), root = %self.root.display(), "discovered documents");
        Ok(paths.iter().map(|path| self.load(path)).collect())
    }
}

/// Splits a delimited front-matter header from the body. Text that does not
/// begin with the delimiter, or yields fewer than three parts when split on
/// the first two delimiter occurrences, is treated as having no header and
/// returned unchanged. Header lines without a colon are dropped silently.
pub fn parse_front_matter(raw: &str) -> (HashMap<String, String>, &str) {
    if !raw.starts_with(FRONT_MATTER_DELIMITER) {
        return (HashMap::new(), raw);
    }

    let mut parts = raw.splitn(3, FRONT_MATTER_DELIMITER);
    let (Some(_), Some(header), Some(body)) = (parts.next(), parts.next(), parts.next()) else {
        return (HashMap::new(), raw);
    };

    let mut metadata = HashMap::new();
    for line in header.trim().lines() {
        if let Some((key, value)) = line.split_once(':') {
            metadata.insert(key.trim().to_owned(), value.trim().to_owned());
        }
    }

    (metadata, body.trim())
}
