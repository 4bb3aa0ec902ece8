//! Recorder pool behaviour seen through the router.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use prompt_router::config::RecorderConfig;
use prompt_router::recording::Recorder;
use prompt_router::reference::StaticSource;
use prompt_router::routing::RouteStatus;
use prompt_router::Router;

mod common;

use common::{CollectingSink, SlowSink};

fn recorder_config(pool_size: usize, queue_capacity: usize) -> RecorderConfig {
    RecorderConfig {
        pool_size,
        queue_capacity,
        ..RecorderConfig::default()
    }
}

fn greet_source() -> Arc<StaticSource> {
    Arc::new(StaticSource::from_pairs([("hello world", "task.greet")]))
}

#[test]
fn test_every_route_is_recorded() {
    let sink = Arc::new(CollectingSink::default());
    let recorder = Recorder::start(&recorder_config(2, 64), sink.clone()).unwrap();
    let router = Router::new(greet_source(), 0.55).with_recorder(recorder.clone());

    router.route("hello world");
    router.route("what is the weather");

    let report = recorder.shutdown(Duration::from_secs(5));
    assert_eq!(report.abandoned_workers, 0);
    assert_eq!(report.stats.persisted, 2);

    let mut jobs = sink.jobs();
    jobs.sort_by(|a, b| a.prompt.cmp(&b.prompt));
    assert_eq!(jobs[0].prompt, "hello world");
    assert_eq!(jobs[0].result.status, RouteStatus::Routed);
    assert_eq!(jobs[1].result.status, RouteStatus::NoMatch);
}

#[test]
fn test_saturated_queue_does_not_slow_routing() {
    let sink = Arc::new(SlowSink::new(Duration::from_millis(200)));
    let recorder = Recorder::start(&recorder_config(1, 2), sink.clone()).unwrap();
    let router = Router::new(greet_source(), 0.55).with_recorder(recorder.clone());
    router.init();

    let started = Instant::now();
    for _ in 0..200 {
        assert!(router.route("hello world").is_routed());
    }
    // 200 blocking submissions would take 40s.
    assert!(started.elapsed() < Duration::from_secs(2));

    let stats = recorder.stats();
    assert!(stats.dropped >= 190);
    assert_eq!(stats.accepted + stats.dropped, 200);

    recorder.shutdown(Duration::from_millis(50));
}

#[test]
fn test_shutdown_grace_bounds_the_wait() {
    let sink = Arc::new(SlowSink::new(Duration::from_millis(300)));
    let recorder = Recorder::start(&recorder_config(1, 16), sink.clone()).unwrap();
    let router = Router::new(greet_source(), 0.55).with_recorder(recorder.clone());
    for _ in 0..10 {
        router.route("hello world");
    }

    let started = Instant::now();
    let report = recorder.shutdown(Duration::from_millis(100));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.abandoned_workers, 1);
    assert!(sink.stored.load(Ordering::SeqCst) < 10);

    // Submissions after shutdown are dropped, routing still works.
    assert!(router.route("hello world").is_routed());
    assert!(!recorder.is_accepting());
}
