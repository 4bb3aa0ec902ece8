//! Reference data subsystem.
//!
//! # Data Flow
//! ```text
//! labels CSV (pattern/prompt/text, task/label)   builtin.rs canonical table
//!             \                                   /
//!              → FileReferenceSource (labels first, then canonical)
//!              → Vec<ReferenceItem> snapshot
//!              → Router initialization
//! ```
//!
//! # Design Decisions
//! - A source returns a complete snapshot per call; the router never
//!   mixes two snapshots
//! - Curated labels come first so they win insertion-order ties
//! - Malformed rows are skipped, a missing file is not an error
//! - An unusable labels file is skipped while the builtin table is on

pub mod builtin;
pub mod labels;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::routing::types::ReferenceItem;

/// Errors from loading or writing reference data.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} has no {column} column")]
    MissingColumn { path: PathBuf, column: &'static str },
}

/// Supplies the reference set the router compiles.
pub trait ReferenceSource: Send + Sync {
    fn get_reference_items(&self) -> Result<Vec<ReferenceItem>, SourceError>;
}

/// A fixed in-memory reference set.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    items: Vec<ReferenceItem>,
}

impl StaticSource {
    pub fn new(items: Vec<ReferenceItem>) -> Self {
        Self { items }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(pattern, task)| ReferenceItem::new(pattern, task))
                .collect(),
        )
    }
}

impl ReferenceSource for StaticSource {
    fn get_reference_items(&self) -> Result<Vec<ReferenceItem>, SourceError> {
        Ok(self.items.clone())
    }
}

/// Labeled prompts from a CSV file, optionally followed by the canonical
/// table.
#[derive(Debug, Clone)]
pub struct FileReferenceSource {
    labels_path: Option<PathBuf>,
    include_builtin: bool,
}

impl FileReferenceSource {
    pub fn new(labels_path: Option<PathBuf>, include_builtin: bool) -> Self {
        Self {
            labels_path,
            include_builtin,
        }
    }

    pub fn labels_path(&self) -> Option<&Path> {
        self.labels_path.as_deref()
    }
}

impl ReferenceSource for FileReferenceSource {
    /// Fails only when the labels file is unusable and there is no builtin
    /// table to fall back on.
    fn get_reference_items(&self) -> Result<Vec<ReferenceItem>, SourceError> {
        let mut items = match &self.labels_path {
            Some(path) if path.exists() => match read_labels(path) {
                Ok(items) => items,
                Err(e) if self.include_builtin => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Ignoring unreadable labels file, using builtin prompts only"
                    );
                    Vec::new()
                }
                Err(e) => return Err(e),
            },
            Some(path) => {
                tracing::debug!(path = %path.display(), "Labels file not found, skipping");
                Vec::new()
            }
            None => Vec::new(),
        };
        let labeled = items.len();

        if self.include_builtin {
            items.extend(builtin::canonical_items());
        }

        tracing::debug!(labeled, total = items.len(), "Loaded reference items");
        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
struct LabelRow {
    #[serde(alias = "prompt", alias = "text", default)]
    pattern: Option<String>,
    #[serde(alias = "label", default)]
    task: Option<String>,
}

/// Read labeled rows, skipping any with an empty pattern or task or that
/// cannot be decoded. A missing column or an I/O failure fails the file.
pub fn read_labels(path: &Path) -> Result<Vec<ReferenceItem>, SourceError> {
    let csv_err = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    let has = |names: &[&str]| headers.iter().any(|h| names.contains(&h));
    if !has(&["pattern", "prompt", "text"]) {
        return Err(SourceError::MissingColumn {
            path: path.to_path_buf(),
            column: "pattern",
        });
    }
    if !has(&["task", "label"]) {
        return Err(SourceError::MissingColumn {
            path: path.to_path_buf(),
            column: "task",
        });
    }

    let mut items = Vec::new();
    for (line, row) in reader.deserialize::<LabelRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) if e.is_io_error() => return Err(csv_err(e)),
            Err(e) => {
                tracing::warn!(path = %path.display(), row = line + 1, error = %e, "Skipping undecodable label row");
                continue;
            }
        };
        match (row.pattern, row.task) {
            (Some(pattern), Some(task)) if !pattern.trim().is_empty() && !task.trim().is_empty() => {
                items.push(ReferenceItem::new(pattern, task.trim()));
            }
            _ => tracing::debug!(path = %path.display(), row = line + 1, "Skipping malformed label row"),
        }
    }
    Ok(items)
}
