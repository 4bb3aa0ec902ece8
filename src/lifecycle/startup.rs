//! Startup orchestration.
//!
//! # Responsibilities
//! - Assemble sink, recorder, reference source and router from config
//! - Preload the matcher in the foreground or on a background thread
//! - Optionally rebuild the matcher when the labels file changes
//! - Drain the recorder on shutdown
//!
//! # Design Decisions
//! - Fail fast: an unusable sink or recorder is a startup error
//! - A missing or broken labels file is not: the router degrades instead
//! - Reloads build the new matcher before swapping it in

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::watcher::ReferenceWatcher;
use crate::config::RouterConfig;
use crate::recording::{CsvResultSink, LogSink, Recorder, ResultSink, ShutdownReport, SinkError};
use crate::reference::FileReferenceSource;
use crate::routing::{MatcherMode, Router};

/// Coalesce bursts of file events into one rebuild.
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(200);

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to open result sink: {0}")]
    Sink(#[from] SinkError),

    #[error("Failed to spawn recorder workers: {0}")]
    Recorder(#[source] std::io::Error),

    #[error("Failed to watch reference file: {0}")]
    Watch(#[from] notify::Error),
}

/// A fully wired router plus the background machinery it owns.
pub struct RouterRuntime {
    config: RouterConfig,
    router: Arc<Router>,
    recorder: Recorder,
    preload: Option<thread::JoinHandle<MatcherMode>>,
    watcher: Option<RecommendedWatcher>,
}

impl std::fmt::Debug for RouterRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterRuntime")
            .field("router", &self.router)
            .field("watching", &self.watcher.is_some())
            .finish()
    }
}

impl RouterRuntime {
    /// Build every component from a validated config.
    pub fn start(config: RouterConfig) -> Result<Self, StartupError> {
        let sink: Arc<dyn ResultSink> = if config.sink.enabled {
            let sink = CsvResultSink::open(
                &config.sink.verified_path,
                &config.sink.failure_path,
                config.sink.source_tag.clone(),
            )?;
            tracing::info!(
                verified = %config.sink.verified_path.display(),
                failure = %config.sink.failure_path.display(),
                known_verified = sink.verified_count(),
                known_failures = sink.failure_count(),
                "CSV result sink opened"
            );
            Arc::new(sink)
        } else {
            Arc::new(LogSink)
        };

        let recorder = Recorder::start(&config.recorder, sink).map_err(StartupError::Recorder)?;

        let source = FileReferenceSource::new(
            config.reference.labels_path.clone(),
            config.reference.include_builtin,
        );
        let router = Arc::new(
            Router::new(Arc::new(source), config.routing.threshold).with_recorder(recorder.clone()),
        );

        tracing::info!(
            threshold = config.routing.threshold,
            labels = ?config.reference.labels_path,
            include_builtin = config.reference.include_builtin,
            "Router configured"
        );

        let mut preload = None;
        if config.routing.preload {
            if config.routing.background_preload {
                let router = router.clone();
                let spawned = thread::Builder::new()
                    .name("router-preload".into())
                    .spawn(move || router.init());
                match spawned {
                    Ok(handle) => preload = Some(handle),
                    // The first route call will build instead.
                    Err(e) => tracing::warn!(error = %e, "Failed to spawn preload thread"),
                }
            } else {
                router.init();
                log_preloaded(&router);
            }
        }

        Ok(Self {
            config,
            router,
            recorder,
            preload,
            watcher: None,
        })
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Block until a background preload, if any, has finished.
    pub fn wait_for_preload(&mut self) -> Option<MatcherMode> {
        let handle = self.preload.take()?;
        match handle.join() {
            Ok(mode) => {
                log_preloaded(&self.router);
                Some(mode)
            }
            Err(_) => {
                tracing::error!("Preload thread panicked");
                None
            }
        }
    }

    /// Rebuild the matcher whenever the labels file changes, until
    /// `shutdown` fires. Returns `None` when watching is disabled.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn watch_references(
        &mut self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<Option<JoinHandle<()>>, StartupError> {
        let path = match (&self.config.reference.labels_path, self.config.reference.watch) {
            (Some(path), true) => path.clone(),
            _ => return Ok(None),
        };

        let (watcher, mut changes) = ReferenceWatcher::new(&path);
        self.watcher = Some(watcher.run()?);

        let router = self.router.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    change = changes.recv() => {
                        if change.is_none() {
                            break;
                        }
                        tokio::time::sleep(RELOAD_DEBOUNCE).await;
                        while changes.try_recv().is_ok() {}
                        reload(router.clone()).await;
                    }
                }
            }
            tracing::debug!("Reference reload task stopped");
        });
        Ok(Some(task))
    }

    /// Stop watching, then drain the recorder within the configured grace.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.watcher.take();
        self.wait_for_preload();
        self.recorder.shutdown(self.config.recorder.shutdown_grace())
    }
}

fn log_preloaded(router: &Router) {
    if let Some(snapshot) = router.snapshot() {
        tracing::info!(
            mode = %snapshot.mode,
            patterns = snapshot.patterns,
            generation = snapshot.generation,
            "Matcher preloaded"
        );
    }
}

async fn reload(router: Arc<Router>) {
    match tokio::task::spawn_blocking(move || router.refresh()).await {
        Ok(mode) => tracing::info!(mode = %mode, "Reference data reloaded"),
        Err(e) => tracing::error!(error = %e, "Reference reload failed"),
    }
}
