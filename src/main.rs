//! Prompt Router
//!
//! Command-line front end for the prompt routing engine.
//!
//! # Architecture Overview
//!
//! ```text
//! prompt
//!   → Router (lazy single-flight init)
//!       → MatcherSnapshot (automaton, or fallback scanner)
//!       → score = matched chars / prompt chars, threshold
//!   → RoutingResult printed as JSON
//!   → RecordingJob → Recorder (bounded queue + workers) → CSV logs
//!
//! ReferenceSource (labels CSV + builtin table) feeds every build.
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use prompt_router::config::validation::validate_config;
use prompt_router::config::{load_or_default, ConfigError};
use prompt_router::lifecycle::signals::spawn_signal_listener;
use prompt_router::observability::{logging, metrics};
use prompt_router::reference::labels::promote_verified;
use prompt_router::reference::{FileReferenceSource, ReferenceSource};
use prompt_router::routing::automaton;
use prompt_router::routing::PatternMatcher;
use prompt_router::{RouteResponse, Router, RouterConfig, RouterRuntime, Shutdown};

#[derive(Parser)]
#[command(name = "prompt-router")]
#[command(about = "Route free-text prompts to task identifiers", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override routing.threshold.
    #[arg(short, long, global = true)]
    threshold: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route the given prompts and print one JSON object per prompt
    Route {
        #[arg(required = true)]
        prompts: Vec<String>,

        /// Include the matched pattern and status
        #[arg(long)]
        detailed: bool,
    },
    /// Route each line read from stdin until EOF or Ctrl-C
    Stdin {
        #[arg(long)]
        detailed: bool,
    },
    /// Load reference data and compile the automaton
    Check,
    /// Copy verified prompts into the labels file
    Promote {
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    if let Some(threshold) = cli.threshold {
        config.routing.threshold = threshold;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "prompt-router starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match cli.command {
        Commands::Route { prompts, detailed } => route_prompts(config, &prompts, detailed)?,
        Commands::Stdin { detailed } => route_stdin(config, detailed).await?,
        Commands::Check => check(&config)?,
        Commands::Promote { dry_run } => promote(&config, dry_run)?,
    }

    Ok(())
}

fn route_prompts(
    config: RouterConfig,
    prompts: &[String],
    detailed: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = RouterRuntime::start(config)?;
    for prompt in prompts {
        println!("{}", render(runtime.router(), prompt, detailed)?);
    }
    runtime.shutdown();
    Ok(())
}

async fn route_stdin(config: RouterConfig, detailed: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut runtime = RouterRuntime::start(config)?;
    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());
    let reload = runtime.watch_references(shutdown.subscribe())?;

    let router = runtime.router().clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.wait() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let router = router.clone();
        let rendered = tokio::task::spawn_blocking(move || render(&router, &line, detailed)).await??;
        println!("{rendered}");
    }

    shutdown.trigger();
    if let Some(task) = reload {
        let _ = task.await;
    }

    let report = tokio::task::spawn_blocking(move || runtime.shutdown()).await?;
    tracing::info!(
        persisted = report.stats.persisted,
        dropped = report.stats.dropped,
        "Shutdown complete"
    );
    Ok(())
}

fn render(router: &Arc<Router>, prompt: &str, detailed: bool) -> Result<String, serde_json::Error> {
    let result = router.route(prompt);
    if detailed {
        serde_json::to_string(&result)
    } else {
        serde_json::to_string(&RouteResponse::from(result))
    }
}

fn check(config: &RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let source = FileReferenceSource::new(
        config.reference.labels_path.clone(),
        config.reference.include_builtin,
    );
    let items = source.get_reference_items()?;
    let automaton = automaton::build(&items)?;

    let report = serde_json::json!({
        "labels": source.labels_path().map(|p| p.display().to_string()),
        "items": items.len(),
        "patterns": automaton.pattern_count(),
        "tasks": automaton.task_count(),
        "nodes": automaton.node_count(),
    });
    println!("{report}");
    Ok(())
}

fn promote(config: &RouterConfig, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let Some(labels) = &config.reference.labels_path else {
        return Err("reference.labels_path is not configured".into());
    };
    let report = promote_verified(&config.sink.verified_path, labels, dry_run)?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}
