//! Labeled prompt maintenance.
//!
//! # Responsibilities
//! - Append curated (prompt, task) pairs to the labels file
//! - Promote prompts from the verified log into the labels file
//!
//! # Design Decisions
//! - The labels file is created with a `prompt,task` header on first write
//! - Exact (prompt, task) duplicates are never appended
//! - A running router picks up new labels only after reinitialization

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::reference::SourceError;

/// A prompt considered for promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledPrompt {
    pub prompt: String,
    pub task: String,
}

/// Outcome of [`promote_verified`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PromotionReport {
    /// Entries appended (or that would be, in a dry run).
    pub promoted: Vec<LabeledPrompt>,
    /// Entries already present in the labels file.
    pub already_present: Vec<LabeledPrompt>,
    pub dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct PairRow {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    task: Option<String>,
}

fn read_pairs(path: &Path) -> Result<Vec<LabeledPrompt>, SourceError> {
    let csv_err = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let mut pairs = Vec::new();
    for row in reader.deserialize::<PairRow>() {
        let row = row.map_err(csv_err)?;
        if let (Some(prompt), Some(task)) = (row.prompt, row.task) {
            let (prompt, task) = (prompt.trim(), task.trim());
            if !prompt.is_empty() && !task.is_empty() {
                pairs.push(LabeledPrompt {
                    prompt: prompt.to_string(),
                    task: task.to_string(),
                });
            }
        }
    }
    Ok(pairs)
}

fn existing_pairs(labels_path: &Path) -> Result<HashSet<(String, String)>, SourceError> {
    if !labels_path.exists() {
        return Ok(HashSet::new());
    }
    Ok(read_pairs(labels_path)?
        .into_iter()
        .map(|p| (p.prompt, p.task))
        .collect())
}

fn append_rows(labels_path: &Path, rows: &[LabeledPrompt]) -> Result<(), SourceError> {
    let io_err = |source| SourceError::Io {
        path: labels_path.to_path_buf(),
        source,
    };
    let csv_err = |source| SourceError::Csv {
        path: labels_path.to_path_buf(),
        source,
    };

    if let Some(parent) = labels_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let needs_header = fs::metadata(labels_path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(labels_path)
        .map_err(io_err)?;

    let mut writer = csv::Writer::from_writer(file);
    if needs_header {
        writer.write_record(["prompt", "task"]).map_err(csv_err)?;
    }
    for row in rows {
        writer
            .write_record([row.prompt.as_str(), row.task.as_str()])
            .map_err(csv_err)?;
    }
    writer.flush().map_err(io_err)?;
    Ok(())
}

/// Append one labeled prompt. Returns `false` when the exact pair exists.
pub fn append_labeled_prompt(labels_path: &Path, prompt: &str, task: &str) -> Result<bool, SourceError> {
    let existing = existing_pairs(labels_path)?;
    if existing.contains(&(prompt.to_string(), task.to_string())) {
        return Ok(false);
    }
    append_rows(
        labels_path,
        &[LabeledPrompt {
            prompt: prompt.to_string(),
            task: task.to_string(),
        }],
    )?;
    Ok(true)
}

/// Copy (prompt, task) pairs from the verified log into the labels file.
pub fn promote_verified(
    verified_path: &Path,
    labels_path: &Path,
    dry_run: bool,
) -> Result<PromotionReport, SourceError> {
    let mut report = PromotionReport {
        dry_run,
        ..PromotionReport::default()
    };
    if !verified_path.exists() {
        tracing::info!(path = %verified_path.display(), "No verified prompts to promote");
        return Ok(report);
    }

    let mut existing = existing_pairs(labels_path)?;
    for candidate in read_pairs(verified_path)? {
        let key = (candidate.prompt.clone(), candidate.task.clone());
        if existing.insert(key) {
            report.promoted.push(candidate);
        } else {
            report.already_present.push(candidate);
        }
    }

    if !dry_run && !report.promoted.is_empty() {
        append_rows(labels_path, &report.promoted)?;
    }

    tracing::info!(
        promoted = report.promoted.len(),
        already_present = report.already_present.len(),
        dry_run,
        "Promotion finished"
    );
    Ok(report)
}
