//! Result sinks.
//!
//! # Responsibilities
//! - Persist routing outcomes handed over by recorder workers
//! - Keep verified (routed) and failed prompts in separate logs
//! - Avoid logging the same prompt twice in one log
//!
//! # Design Decisions
//! - Sinks are called from several worker threads at once
//! - A failure is reported to the caller; retrying is not the sink's job
//! - Dedupe is seeded from the existing file when the sink is opened

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use dashmap::DashSet;
use thiserror::Error;

use crate::recording::job::RecordingJob;

/// Errors from persisting a routing result.
#[derive(Debug, Error)]
pub enum SinkError {
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
}

/// Destination for routing outcomes.
pub trait ResultSink: Send + Sync {
    fn record_routing_result(&self, job: &RecordingJob) -> Result<(), SinkError>;
}

/// Emits each outcome as a tracing event and persists nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn record_routing_result(&self, job: &RecordingJob) -> Result<(), SinkError> {
        tracing::info!(
            job_id = %job.id,
            status = %job.result.status,
            task = ?job.result.task,
            score = ?job.result.score,
            timestamp = %job.timestamp.to_rfc3339(),
            "Routing result"
        );
        Ok(())
    }
}

const VERIFIED_HEADER: [&str; 5] = ["prompt", "task", "score", "source", "ts"];
const FAILURE_HEADER: [&str; 5] = ["prompt", "error", "score", "source", "ts"];

/// An append-only CSV log keyed by its first column.
#[derive(Debug)]
struct PromptLog {
    path: PathBuf,
    header: &'static [&'static str],
    /// First-column keys of every row in the file, kept for the process
    /// lifetime. Grows exactly as the file does; a key is only held while
    /// its row is on disk.
    seen: DashSet<String>,
    write_lock: Mutex<()>,
}

impl PromptLog {
    fn open(path: &Path, header: &'static [&'static str]) -> Result<Self, SinkError> {
        let seen = DashSet::new();
        if path.exists() {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .from_path(path)
                .map_err(|source| SinkError::Csv {
                    path: path.to_path_buf(),
                    source,
                })?;
            for record in reader.records() {
                let record = record.map_err(|source| SinkError::Csv {
                    path: path.to_path_buf(),
                    source,
                })?;
                if let Some(prompt) = record.get(0) {
                    seen.insert(prompt.to_string());
                }
            }
            tracing::debug!(path = %path.display(), entries = seen.len(), "Loaded existing prompt log");
        }

        Ok(Self {
            path: path.to_path_buf(),
            header,
            seen,
            write_lock: Mutex::new(()),
        })
    }

    /// Append `row` unless `prompt` is already logged. Returns whether a row
    /// was written.
    fn append(&self, prompt: &str, row: &[String]) -> Result<bool, SinkError> {
        if !self.seen.insert(prompt.to_string()) {
            return Ok(false);
        }

        let written = {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.write_row(row)
        };

        if written.is_err() {
            // Let a later job for the same prompt try again.
            self.seen.remove(prompt);
        }
        written.map(|()| true)
    }

    fn write_row(&self, row: &[String]) -> Result<(), SinkError> {
        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };
        let csv_err = |source| SinkError::Csv {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;

        let mut writer = csv::Writer::from_writer(file);
        if needs_header {
            writer.write_record(self.header).map_err(csv_err)?;
        }
        writer.write_record(row).map_err(csv_err)?;
        writer.flush().map_err(io_err)?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Writes routed prompts to a verified log and everything else to a
/// failure log.
#[derive(Debug)]
pub struct CsvResultSink {
    verified: PromptLog,
    failure: PromptLog,
    source_tag: String,
}

impl CsvResultSink {
    pub fn open(
        verified_path: &Path,
        failure_path: &Path,
        source_tag: impl Into<String>,
    ) -> Result<Self, SinkError> {
        Ok(Self {
            verified: PromptLog::open(verified_path, &VERIFIED_HEADER)?,
            failure: PromptLog::open(failure_path, &FAILURE_HEADER)?,
            source_tag: source_tag.into(),
        })
    }

    /// Number of distinct prompts in the verified log.
    pub fn verified_count(&self) -> usize {
        self.verified.len()
    }

    /// Number of distinct prompts in the failure log.
    pub fn failure_count(&self) -> usize {
        self.failure.len()
    }
}

impl ResultSink for CsvResultSink {
    fn record_routing_result(&self, job: &RecordingJob) -> Result<(), SinkError> {
        let result = &job.result;
        let score = result.score.map(|s| s.to_string()).unwrap_or_default();
        let ts = job.timestamp.to_rfc3339();

        let written = if result.is_routed() {
            self.verified.append(
                &job.prompt,
                &[
                    job.prompt.clone(),
                    result.task.clone().unwrap_or_default(),
                    score,
                    self.source_tag.clone(),
                    ts,
                ],
            )?
        } else {
            self.failure.append(
                &job.prompt,
                &[
                    job.prompt.clone(),
                    result.status.to_string(),
                    score,
                    self.source_tag.clone(),
                    ts,
                ],
            )?
        };

        if !written {
            tracing::trace!(job_id = %job.id, "Prompt already logged, skipping");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::types::RoutingResult;

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        csv::Reader::from_path(path)
            .unwrap()
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_routed_and_failed_go_to_separate_logs() {
        let dir = tempfile::tempdir().unwrap();
        let verified = dir.path().join("verified.csv");
        let failure = dir.path().join("failure.csv");
        let sink = CsvResultSink::open(&verified, &failure, "router").unwrap();

        let ok = RecordingJob::new("Fix bug", RoutingResult::routed("Feature_Development", 1.0, "fix bug"));
        let miss = RecordingJob::new("weather?", RoutingResult::no_match());
        sink.record_routing_result(&ok).unwrap();
        sink.record_routing_result(&miss).unwrap();

        let rows = read_rows(&verified);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "Fix bug");
        assert_eq!(rows[0][1], "Feature_Development");
        assert_eq!(rows[0][3], "router");

        let rows = read_rows(&failure);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], "no_match");
    }

    #[test]
    fn test_duplicate_prompts_are_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let verified = dir.path().join("verified.csv");
        let failure = dir.path().join("failure.csv");
        let sink = CsvResultSink::open(&verified, &failure, "router").unwrap();

        for _ in 0..3 {
            let job = RecordingJob::new("say, \"hi\"", RoutingResult::below_threshold(0.2, "hi"));
            sink.record_routing_result(&job).unwrap();
        }
        let rows = read_rows(&failure);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "say, \"hi\"");
        assert_eq!(rows[0][2], "0.2");
    }

    #[test]
    fn test_dedupe_is_seeded_from_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let verified = dir.path().join("nested/verified.csv");
        let failure = dir.path().join("nested/failure.csv");

        {
            let sink = CsvResultSink::open(&verified, &failure, "router").unwrap();
            let job = RecordingJob::new("fix bug", RoutingResult::routed("dev", 1.0, "fix bug"));
            sink.record_routing_result(&job).unwrap();
        }

        let sink = CsvResultSink::open(&verified, &failure, "router").unwrap();
        assert_eq!(sink.verified_count(), 1);
        let job = RecordingJob::new("fix bug", RoutingResult::routed("dev", 1.0, "fix bug"));
        sink.record_routing_result(&job).unwrap();
        assert_eq!(read_rows(&verified).len(), 1);
    }

    #[test]
    fn test_dedupe_set_tracks_log_rows() {
        let dir = tempfile::tempdir().unwrap();
        let verified = dir.path().join("verified.csv");
        let failure = dir.path().join("failure.csv");
        let sink = CsvResultSink::open(&verified, &failure, "router").unwrap();

        for round in 0..3 {
            for i in 0..20 {
                let prompt = format!("prompt {}", i % 7);
                let result = if i % 2 == 0 {
                    RoutingResult::routed("dev", 1.0, "prompt")
                } else {
                    RoutingResult::no_match()
                };
                sink.record_routing_result(&RecordingJob::new(prompt, result)).unwrap();
            }
            assert_eq!(sink.verified_count(), read_rows(&verified).len(), "round {round}");
            assert_eq!(sink.failure_count(), read_rows(&failure).len(), "round {round}");
        }
        assert_eq!(sink.verified_count() + sink.failure_count(), 14);

        let reopened = CsvResultSink::open(&verified, &failure, "router").unwrap();
        assert_eq!(reopened.verified_count(), sink.verified_count());
        assert_eq!(reopened.failure_count(), sink.failure_count());
    }

    #[test]
    fn test_log_sink_never_fails() {
        let job = RecordingJob::new("x", RoutingResult::no_match());
        assert!(LogSink.record_routing_result(&job).is_ok());
    }
}
