// Cycle-level structured logging.

mod common;

use common::{accounts, limiter, snap, StaticFetcher};
use secmonkey_core::logging_facility::test_capture::init_test_capture;
use secmonkey_core::technology::TechnologyDescriptor;
use secmonkey_core::MemoryRevisionStore;
use secmonkey_core_types::schema::{EVENT_END, EVENT_START};
use secmonkey_core_types::RunContext;
use secmonkey_engine::{NoopReporter, Watcher};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_run_cycle_logs_start_and_end_with_counts() {
    let capture = init_test_capture();
    // Unique technology so parallel tests cannot match these events
    let tech = "logtech_unique_1";
    let mut store = MemoryRevisionStore::new();
    let (mut limiter, _) = limiter(10);
    let fetcher = StaticFetcher::serving(vec![snap(tech, "acctA", "universal", "a", json!({}))]);

    Watcher::new(TechnologyDescriptor::new(tech, "T", "Ts"), Arc::new(fetcher))
        .run_cycle(&RunContext::new(), &mut store, &mut NoopReporter, &accounts(&["acctA"]), &mut limiter)
        .unwrap();

    let events: Vec<_> = capture
        .events_for_op("run_cycle")
        .into_iter()
        .filter(|e| e.fields.get("technology").map(String::as_str) == Some(tech))
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_START));
    assert_eq!(events[1].event.as_deref(), Some(EVENT_END));
    assert_eq!(events[1].fields.get("created_len"), Some(&"1".to_string()));
    assert!(events[1].fields.contains_key("duration_ms"));
}

#[test]
fn test_state_events_emitted() {
    let capture = init_test_capture();
    let tech = "logtech_unique_2";
    let mut store = MemoryRevisionStore::new();
    let (mut limiter, _) = limiter(10);

    Watcher::new(TechnologyDescriptor::new(tech, "T", "Ts"), Arc::new(StaticFetcher::new()))
        .run_cycle(&RunContext::new(), &mut store, &mut NoopReporter, &accounts(&["acctA"]), &mut limiter)
        .unwrap();

    let states: Vec<String> = capture
        .events()
        .into_iter()
        .filter(|e| e.fields.get("technology").map(String::as_str) == Some(tech))
        .filter_map(|e| e.fields.get("state").cloned())
        .collect();
    assert_eq!(
        states,
        vec!["prepping", "fetching", "diffing", "persisting", "reporting", "idle"]
    );
}
