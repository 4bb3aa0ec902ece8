//! Prompt routing and matcher lifecycle.
//!
//! # Responsibilities
//! - Build the matcher from reference items exactly once per generation
//! - Route prompts: normalize, search, pick the best match, score, threshold
//! - Hand every outcome to the recorder without waiting on it
//!
//! # Design Decisions
//! - Initialization phases: Uninitialized → Initializing → Ready, guarded
//!   by a mutex + condvar; only the first caller builds, others wait
//! - The active matcher lives in an `ArcSwapOption`: the hot path is a
//!   lock-free load, replacement is an atomic pointer swap
//! - Build failure selects the fallback scanner until the next
//!   reinitialization; it is not retried per call
//! - A reference source failure leaves no matcher at all: that attempt's
//!   routes report `matcher_unavailable` and the phase falls back to
//!   Uninitialized, so the next caller retries
//! - A reload that cannot load references keeps the previous matcher

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use arc_swap::ArcSwapOption;
use serde::Serialize;

use crate::observability::metrics;
use crate::recording::{Recorder, RecordingJob};
use crate::reference::ReferenceSource;
use crate::routing::automaton;
use crate::routing::fallback::FallbackScanner;
use crate::routing::matcher::{normalize_prompt, PatternMatcher};
use crate::routing::types::{select_best, RouteResponse, RoutingResult};

/// Which strategy the active snapshot uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherMode {
    /// Compiled Aho–Corasick automaton.
    Automaton,
    /// Naive scanner after the automaton failed to build.
    Fallback,
    /// Reference data could not be loaded.
    Unavailable,
}

impl MatcherMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherMode::Automaton => "automaton",
            MatcherMode::Fallback => "fallback",
            MatcherMode::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for MatcherMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitPhase {
    Uninitialized,
    Initializing,
    Ready,
}

/// An immutable matcher plus the facts about how it was built.
#[derive(Debug)]
pub struct MatcherSnapshot {
    pub mode: MatcherMode,
    /// Increases by one per build attempt.
    pub generation: u64,
    /// Patterns the matcher searches for.
    pub patterns: usize,
    matcher: Option<Box<dyn PatternMatcher>>,
}

impl MatcherSnapshot {
    /// Whether routes can be answered from this snapshot.
    pub fn is_available(&self) -> bool {
        self.mode != MatcherMode::Unavailable
    }
}

/// Score `prompt` against `matcher`.
///
/// `score = matched chars / normalized prompt chars`; accepted when
/// `score >= threshold`.
pub fn evaluate(matcher: &dyn PatternMatcher, prompt: &str, threshold: f64) -> RoutingResult {
    let normalized = normalize_prompt(prompt);
    let candidates = matcher.search(&normalized);
    let Some(best) = select_best(&candidates) else {
        return RoutingResult::no_match();
    };

    // A match implies the prompt is at least as long as the pattern.
    let prompt_len = normalized.chars().count();
    let score = best.length as f64 / prompt_len as f64;

    if score < threshold {
        RoutingResult::below_threshold(score, best.pattern)
    } else {
        RoutingResult::routed(best.task, score, best.pattern)
    }
}

/// Routes prompts to task identifiers.
pub struct Router {
    source: Arc<dyn ReferenceSource>,
    threshold: f64,
    recorder: Option<Recorder>,
    active: ArcSwapOption<MatcherSnapshot>,
    phase: Mutex<InitPhase>,
    phase_changed: Condvar,
    generation: AtomicU64,
    builds: AtomicU64,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("threshold", &self.threshold)
            .field("mode", &self.mode())
            .field("builds", &self.build_count())
            .field("recorder", &self.recorder)
            .finish()
    }
}

/// Restores a consistent phase if a build unwinds.
struct InitGuard<'a> {
    router: &'a Router,
    armed: bool,
}

impl InitGuard<'_> {
    /// Publish `snapshot` and return the snapshot routes will now use.
    fn complete(mut self, snapshot: Arc<MatcherSnapshot>) -> Arc<MatcherSnapshot> {
        let router = self.router;
        let mut phase = router.lock_phase();
        let previous = router.active.load_full().filter(|s| s.is_available());

        let published = match previous {
            Some(previous) if !snapshot.is_available() => {
                tracing::warn!(
                    generation = previous.generation,
                    "Reference data unavailable, keeping previous matcher"
                );
                *phase = InitPhase::Ready;
                previous
            }
            _ => {
                *phase = if snapshot.is_available() {
                    InitPhase::Ready
                } else {
                    InitPhase::Uninitialized
                };
                router.active.store(Some(snapshot.clone()));
                snapshot
            }
        };

        router.phase_changed.notify_all();
        self.armed = false;
        published
    }
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut phase = self.router.lock_phase();
        let available = self.router.active.load().as_ref().is_some_and(|s| s.is_available());
        *phase = if available {
            InitPhase::Ready
        } else {
            InitPhase::Uninitialized
        };
        self.router.phase_changed.notify_all();
        tracing::error!("Matcher build aborted");
    }
}

impl Router {
    /// Create an uninitialized router. Nothing is loaded until the first
    /// [`route`](Self::route) or [`init`](Self::init).
    pub fn new(source: Arc<dyn ReferenceSource>, threshold: f64) -> Self {
        Self {
            source,
            threshold,
            recorder: None,
            active: ArcSwapOption::empty(),
            phase: Mutex::new(InitPhase::Uninitialized),
            phase_changed: Condvar::new(),
            generation: AtomicU64::new(0),
            builds: AtomicU64::new(0),
        }
    }

    /// Send every routing outcome to `recorder`.
    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Active mode, or `None` before the first build.
    pub fn mode(&self) -> Option<MatcherMode> {
        self.active.load().as_ref().map(|s| s.mode)
    }

    /// Number of times the automaton builder has been invoked.
    pub fn build_count(&self) -> u64 {
        self.builds.load(Ordering::SeqCst)
    }

    /// The snapshot routes currently use, if any.
    pub fn snapshot(&self) -> Option<Arc<MatcherSnapshot>> {
        self.active.load_full()
    }

    /// Initialize now instead of on first use. Idempotent.
    pub fn init(&self) -> MatcherMode {
        self.ready_snapshot().mode
    }

    /// Route a prompt and record the outcome.
    pub fn route(&self, prompt: &str) -> RoutingResult {
        let snapshot = self.ready_snapshot();
        let result = match &snapshot.matcher {
            Some(matcher) => evaluate(matcher.as_ref(), prompt, self.threshold),
            None => RoutingResult::unavailable(),
        };

        metrics::record_route(result.status.as_str(), snapshot.mode.as_str());
        tracing::debug!(
            status = %result.status,
            task = ?result.task,
            score = ?result.score,
            mode = %snapshot.mode,
            "Prompt routed"
        );

        if let Some(recorder) = &self.recorder {
            recorder.submit(RecordingJob::new(prompt, result.clone()));
        }
        result
    }

    /// Route a prompt and return the `{ task, score, error }` shape.
    pub fn route_prompt(&self, prompt: &str) -> RouteResponse {
        self.route(prompt).into()
    }

    /// Reset to `Uninitialized`; the next route or init rebuilds.
    ///
    /// Waits for an in-progress build first. Searches already running keep
    /// the snapshot they loaded.
    pub fn reinitialize(&self) {
        let mut phase = self.wait_while_initializing();
        *phase = InitPhase::Uninitialized;
        let previous = self.active.swap(None);
        tracing::info!(
            previous_generation = previous.map(|s| s.generation),
            "Router reset, matcher will be rebuilt on next use"
        );
    }

    /// Rebuild and atomically replace the active snapshot. Until the swap,
    /// routes keep using the old snapshot; if references cannot be loaded
    /// the old snapshot stays. Returns the mode now in use.
    pub fn refresh(&self) -> MatcherMode {
        let mut phase = self.wait_while_initializing();
        *phase = InitPhase::Initializing;
        drop(phase);

        let guard = InitGuard {
            router: self,
            armed: true,
        };
        let snapshot = Arc::new(self.build_snapshot());
        guard.complete(snapshot).mode
    }

    fn lock_phase(&self) -> MutexGuard<'_, InitPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_while_initializing(&self) -> MutexGuard<'_, InitPhase> {
        let mut phase = self.lock_phase();
        while *phase == InitPhase::Initializing {
            phase = self
                .phase_changed
                .wait(phase)
                .unwrap_or_else(PoisonError::into_inner);
        }
        phase
    }

    fn ready_snapshot(&self) -> Arc<MatcherSnapshot> {
        let seen = self.active.load_full();
        if let Some(snapshot) = &seen {
            if snapshot.is_available() {
                return snapshot.clone();
            }
        }
        let seen_generation = seen.map(|s| s.generation);

        let mut phase = self.wait_while_initializing();
        if let Some(snapshot) = self.active.load_full() {
            // An attempt that finished while this caller waited counts as
            // this caller's attempt, even if it failed.
            if *phase == InitPhase::Ready || Some(snapshot.generation) != seen_generation {
                return snapshot;
            }
        }

        *phase = InitPhase::Initializing;
        drop(phase);

        let guard = InitGuard {
            router: self,
            armed: true,
        };
        let snapshot = Arc::new(self.build_snapshot());
        guard.complete(snapshot)
    }

    fn build_snapshot(&self) -> MatcherSnapshot {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();

        let items = match self.source.get_reference_items() {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(
                    generation,
                    error = %e,
                    "Failed to load reference items, will retry on next use"
                );
                metrics::record_build(MatcherMode::Unavailable.as_str(), started.elapsed(), 0);
                return MatcherSnapshot {
                    mode: MatcherMode::Unavailable,
                    generation,
                    patterns: 0,
                    matcher: None,
                };
            }
        };

        self.builds.fetch_add(1, Ordering::SeqCst);
        let (mode, matcher): (MatcherMode, Box<dyn PatternMatcher>) = match automaton::build(&items) {
            Ok(automaton) => {
                tracing::info!(
                    generation,
                    patterns = automaton.pattern_count(),
                    tasks = automaton.task_count(),
                    nodes = automaton.node_count(),
                    "Automaton built"
                );
                (MatcherMode::Automaton, Box::new(automaton))
            }
            Err(e) => {
                tracing::warn!(
                    generation,
                    error = %e,
                    items = items.len(),
                    "Automaton build failed, falling back to substring scan"
                );
                (MatcherMode::Fallback, Box::new(FallbackScanner::new(&items)))
            }
        };

        let patterns = matcher.pattern_count();
        metrics::record_build(mode.as_str(), started.elapsed(), patterns);
        MatcherSnapshot {
            mode,
            generation,
            patterns,
            matcher: Some(matcher),
        }
    }
}
