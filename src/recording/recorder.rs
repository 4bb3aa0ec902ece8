//! Background recorder: bounded queue + fixed worker pool.
//!
//! # Responsibilities
//! - Accept recording jobs without blocking the submitter
//! - Persist jobs on worker threads through a [`ResultSink`]
//! - Drain in-flight work on shutdown, bounded by a grace period
//!
//! # Design Decisions
//! - Drop-on-full: a full queue rejects the job immediately
//! - Each job is dequeued by exactly one worker; no ordering guarantee
//! - Sink failures are logged and counted, never retried
//! - Workers are plain OS threads sharing one receiver behind a mutex
//! - After the grace deadline, queued jobs are discarded, not persisted

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::config::schema::RecorderConfig;
use crate::observability::metrics;
use crate::recording::job::RecordingJob;
use crate::recording::sink::ResultSink;

/// Snapshot of recorder counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecorderStats {
    /// Jobs enqueued.
    pub accepted: u64,
    /// Jobs rejected at submission (queue full or shut down).
    pub dropped: u64,
    /// Jobs the sink stored.
    pub persisted: u64,
    /// Jobs the sink failed to store.
    pub failed: u64,
    /// Jobs still queued when the shutdown grace period ran out.
    pub discarded: u64,
}

/// Outcome of [`Recorder::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Workers that exited within the grace period.
    pub completed_workers: usize,
    /// Workers still busy at the deadline, left detached.
    pub abandoned_workers: usize,
    pub stats: RecorderStats,
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    dropped: AtomicU64,
    persisted: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> RecorderStats {
        RecorderStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// State shared with worker threads.
struct Shared {
    receiver: Mutex<mpsc::Receiver<RecordingJob>>,
    sink: Arc<dyn ResultSink>,
    counters: Counters,
    drain_deadline: OnceLock<Instant>,
}

impl Shared {
    fn past_deadline(&self) -> bool {
        self.drain_deadline
            .get()
            .is_some_and(|deadline| Instant::now() >= *deadline)
    }
}

struct Inner {
    sender: ArcSwapOption<mpsc::Sender<RecordingJob>>,
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    capacity: usize,
}

/// Handle to the recorder pool. Clones share the same pool.
#[derive(Clone)]
pub struct Recorder {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("capacity", &self.inner.capacity)
            .field("accepting", &self.is_accepting())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Recorder {
    /// Spawn `pool_size` workers consuming a queue of `queue_capacity`.
    pub fn start(config: &RecorderConfig, sink: Arc<dyn ResultSink>) -> std::io::Result<Self> {
        let capacity = config.queue_capacity.max(1);
        let pool_size = config.pool_size.max(1);
        let (tx, rx) = mpsc::channel(capacity);

        let shared = Arc::new(Shared {
            receiver: Mutex::new(rx),
            sink,
            counters: Counters::default(),
            drain_deadline: OnceLock::new(),
        });

        let mut workers = Vec::with_capacity(pool_size);
        for id in 0..pool_size {
            let shared = shared.clone();
            let handle = thread::Builder::new()
                .name(format!("recorder-{id}"))
                .spawn(move || worker_loop(id, shared))?;
            workers.push(handle);
        }

        tracing::info!(pool_size, queue_capacity = capacity, "Recorder started");

        Ok(Self {
            inner: Arc::new(Inner {
                sender: ArcSwapOption::from_pointee(tx),
                shared,
                workers: Mutex::new(workers),
                capacity,
            }),
        })
    }

    /// Enqueue a job. Returns `false` without waiting when the queue is
    /// full or the recorder is shut down.
    pub fn submit(&self, job: RecordingJob) -> bool {
        let counters = &self.inner.shared.counters;
        let guard = self.inner.sender.load();
        let Some(sender) = &*guard else {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::record_recording("dropped");
            tracing::debug!(job_id = %job.id, "Recorder shut down, dropping job");
            return false;
        };

        match sender.try_send(job) {
            Ok(()) => {
                counters.accepted.fetch_add(1, Ordering::Relaxed);
                metrics::record_recording("accepted");
                metrics::record_queue_depth(self.inner.capacity - sender.capacity());
                true
            }
            Err(TrySendError::Full(job)) | Err(TrySendError::Closed(job)) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::record_recording("dropped");
                tracing::debug!(job_id = %job.id, "Recorder queue full, dropping job");
                false
            }
        }
    }

    pub fn stats(&self) -> RecorderStats {
        self.inner.shared.counters.snapshot()
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.sender.load().is_some()
    }

    /// Stop accepting jobs and wait up to `grace` for workers to drain the
    /// queue. Jobs dequeued after the deadline are discarded.
    pub fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let deadline = Instant::now() + grace;
        let shared = &self.inner.shared;
        let _ = shared.drain_deadline.set(deadline);

        // Dropping the last sender closes the channel; workers exit once empty.
        if self.inner.sender.swap(None).is_some() {
            tracing::info!(grace_ms = grace.as_millis() as u64, "Recorder shutting down");
        }

        let mut pending = std::mem::take(
            &mut *self.inner.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let mut completed_workers = 0;
        loop {
            let (finished, running): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(|h| h.is_finished());
            for handle in finished {
                if handle.join().is_err() {
                    tracing::error!("Recorder worker panicked");
                }
                completed_workers += 1;
            }
            pending = running;

            let now = Instant::now();
            if pending.is_empty() || now >= deadline {
                break;
            }
            thread::sleep(Duration::from_millis(5).min(deadline - now));
        }

        let abandoned_workers = pending.len();
        if abandoned_workers > 0 {
            // Every worker may be stuck in the sink, leaving jobs queued.
            if let Ok(mut rx) = shared.receiver.try_lock() {
                while let Ok(job) = rx.try_recv() {
                    shared.counters.discarded.fetch_add(1, Ordering::Relaxed);
                    metrics::record_recording("discarded");
                    tracing::debug!(job_id = %job.id, "Discarding queued job after grace period");
                }
            }
            tracing::warn!(
                abandoned_workers,
                "Recorder workers still busy after grace period, detaching"
            );
        }

        let report = ShutdownReport {
            completed_workers,
            abandoned_workers,
            stats: self.stats(),
        };
        tracing::info!(
            persisted = report.stats.persisted,
            failed = report.stats.failed,
            dropped = report.stats.dropped,
            discarded = report.stats.discarded,
            "Recorder stopped"
        );
        report
    }
}

fn worker_loop(id: usize, shared: Arc<Shared>) {
    loop {
        let job = {
            let mut rx = shared.receiver.lock().unwrap_or_else(PoisonError::into_inner);
            rx.blocking_recv()
        };
        let Some(job) = job else { break };

        if shared.past_deadline() {
            shared.counters.discarded.fetch_add(1, Ordering::Relaxed);
            metrics::record_recording("discarded");
            continue;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            shared.sink.record_routing_result(&job)
        }));
        match outcome {
            Ok(Ok(())) => {
                shared.counters.persisted.fetch_add(1, Ordering::Relaxed);
                metrics::record_recording("persisted");
            }
            Ok(Err(e)) => {
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                metrics::record_recording("failed");
                tracing::warn!(worker = id, job_id = %job.id, error = %e, "Failed to record routing result");
            }
            Err(_) => {
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                metrics::record_recording("failed");
                tracing::error!(worker = id, job_id = %job.id, "Result sink panicked");
            }
        }
    }
    tracing::debug!(worker = id, "Recorder worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::sink::SinkError;
    use crate::routing::types::RoutingResult;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingSink {
        calls: AtomicUsize,
    }

    impl ResultSink for CountingSink {
        fn record_routing_result(&self, _job: &RecordingJob) -> Result<(), SinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSink;

    impl ResultSink for FailingSink {
        fn record_routing_result(&self, _job: &RecordingJob) -> Result<(), SinkError> {
            Err(SinkError::Io {
                path: "unwritable.csv".into(),
                source: std::io::Error::other("disk full"),
            })
        }
    }

    struct PanickingSink;

    impl ResultSink for PanickingSink {
        fn record_routing_result(&self, _job: &RecordingJob) -> Result<(), SinkError> {
            panic!("sink bug");
        }
    }

    fn config(pool_size: usize, queue_capacity: usize) -> RecorderConfig {
        RecorderConfig {
            pool_size,
            queue_capacity,
            ..RecorderConfig::default()
        }
    }

    fn job() -> RecordingJob {
        RecordingJob::new("prompt", RoutingResult::no_match())
    }

    #[test]
    fn test_jobs_are_persisted_once() {
        let sink = Arc::new(CountingSink::default());
        let recorder = Recorder::start(&config(3, 64), sink.clone()).unwrap();
        for _ in 0..50 {
            assert!(recorder.submit(job()));
        }
        let report = recorder.shutdown(Duration::from_secs(5));

        assert_eq!(report.completed_workers, 3);
        assert_eq!(report.abandoned_workers, 0);
        assert_eq!(report.stats.accepted, 50);
        assert_eq!(report.stats.persisted, 50);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_submit_after_shutdown_is_dropped() {
        let recorder = Recorder::start(&config(1, 4), Arc::new(CountingSink::default())).unwrap();
        recorder.shutdown(Duration::from_secs(1));
        assert!(!recorder.is_accepting());
        assert!(!recorder.submit(job()));
        assert_eq!(recorder.stats().dropped, 1);
    }

    #[test]
    fn test_sink_failures_are_counted() {
        let recorder = Recorder::start(&config(2, 8), Arc::new(FailingSink)).unwrap();
        for _ in 0..4 {
            recorder.submit(job());
        }
        let report = recorder.shutdown(Duration::from_secs(5));
        assert_eq!(report.stats.failed, 4);
        assert_eq!(report.stats.persisted, 0);
    }

    #[test]
    fn test_sink_panic_does_not_kill_worker() {
        let recorder = Recorder::start(&config(1, 8), Arc::new(PanickingSink)).unwrap();
        for _ in 0..3 {
            recorder.submit(job());
        }
        let report = recorder.shutdown(Duration::from_secs(5));
        assert_eq!(report.stats.failed, 3);
        assert_eq!(report.completed_workers, 1);
    }
}
