//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use prompt_router::recording::{RecordingJob, ResultSink, SinkError};
use prompt_router::reference::{ReferenceSource, SourceError, StaticSource};
use prompt_router::routing::ReferenceItem;
use prompt_router::Router;

/// Reference source that counts loads and can be slowed down or made to
/// panic once.
pub struct InstrumentedSource {
    items: Vec<ReferenceItem>,
    delay: Duration,
    panic_next: AtomicBool,
    loads: AtomicUsize,
}

impl InstrumentedSource {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            items: pairs.iter().map(|(p, t)| ReferenceItem::new(*p, *t)).collect(),
            delay: Duration::ZERO,
            panic_next: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn panic_once(self) -> Self {
        self.panic_next.store(true, Ordering::SeqCst);
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ReferenceSource for InstrumentedSource {
    fn get_reference_items(&self) -> Result<Vec<ReferenceItem>, SourceError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("reference store exploded");
        }
        Ok(self.items.clone())
    }
}

/// Sink that keeps every job it receives.
#[derive(Default)]
pub struct CollectingSink {
    jobs: Mutex<Vec<RecordingJob>>,
}

impl CollectingSink {
    pub fn jobs(&self) -> Vec<RecordingJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl ResultSink for CollectingSink {
    fn record_routing_result(&self, job: &RecordingJob) -> Result<(), SinkError> {
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }
}

/// Sink that takes `delay` per job.
pub struct SlowSink {
    pub delay: Duration,
    pub stored: AtomicUsize,
}

impl SlowSink {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            stored: AtomicUsize::new(0),
        }
    }
}

impl ResultSink for SlowSink {
    fn record_routing_result(&self, _job: &RecordingJob) -> Result<(), SinkError> {
        std::thread::sleep(self.delay);
        self.stored.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Router over a fixed set with the default threshold.
pub fn static_router(pairs: &[(&str, &str)]) -> Router {
    Router::new(
        Arc::new(StaticSource::from_pairs(pairs.iter().copied())),
        prompt_router::config::schema::DEFAULT_THRESHOLD,
    )
}

/// Deterministic pseudo-random generator for property-style tests.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    pub fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }

    /// A word over a small alphabet so patterns overlap often.
    pub fn word(&mut self, alphabet: &[char], max_len: usize) -> String {
        let len = 1 + self.below(max_len);
        (0..len).map(|_| alphabet[self.below(alphabet.len())]).collect()
    }
}
