// Single-pass watcher cycles against the in-memory store.

mod common;

use common::{accounts, limiter, snap, FailingReporter, RecordingReporter, StaticFetcher};
use secmonkey_core::errors::FetchError;
use secmonkey_core::model::ExceptionScope;
use secmonkey_core::technology::TechnologyDescriptor;
use secmonkey_core::{ExErrorKind, MemoryRevisionStore, RevisionStore};
use secmonkey_core_types::RunContext;
use secmonkey_engine::{CycleReport, NoopReporter, Watcher, WatcherState};
use serde_json::json;
use std::sync::Arc;

fn sg() -> TechnologyDescriptor {
    TechnologyDescriptor::new("sg", "Security Group", "Security Groups")
        .with_regions(["us-east-1", "us-west-2"])
}

fn cycle(
    descriptor: TechnologyDescriptor,
    fetcher: StaticFetcher,
    store: &mut MemoryRevisionStore,
) -> CycleReport {
    let (mut limiter, _sleeper) = limiter(10);
    Watcher::new(descriptor, Arc::new(fetcher))
        .run_cycle(
            &RunContext::new(),
            store,
            &mut NoopReporter,
            &accounts(&["acctA"]),
            &mut limiter,
        )
        .unwrap()
}

#[test]
fn scenario_created_changed_deleted_over_three_cycles() {
    let mut store = MemoryRevisionStore::new();
    let web = |ports: serde_json::Value| snap("sg", "acctA", "us-east-1", "web-sg", json!({"ports": ports}));

    // GIVEN a new security group
    let first = cycle(sg(), StaticFetcher::serving(vec![web(json!([80]))]), &mut store);
    assert_eq!(first.created.len(), 1);
    assert_eq!(first.revisions_written, 1);

    // WHEN a port is opened
    let second = cycle(sg(), StaticFetcher::serving(vec![web(json!([80, 443]))]), &mut store);

    // THEN exactly one durable change
    assert_eq!(second.changed.len(), 1);
    assert!(second.created.is_empty() && second.deleted.is_empty());
    assert!(second.is_changed());

    // WHEN the group disappears
    let third = cycle(sg(), StaticFetcher::new(), &mut store);

    // THEN it is deleted but its history stays
    assert_eq!(third.deleted.len(), 1);
    let location = web(json!([])).location;
    let revisions = store.list_revisions(&location).unwrap();
    assert_eq!(revisions.len(), 2);
    assert!(revisions.iter().all(|r| !r.active));
    assert!(!store.get_item(&location).unwrap().unwrap().active);
}

#[test]
fn scenario_unchanged_cycle_writes_nothing() {
    let mut store = MemoryRevisionStore::new();
    let items = || vec![snap("sg", "acctA", "us-west-2", "db-sg", json!({"ports": [5432]}))];

    cycle(sg(), StaticFetcher::serving(items()), &mut store);
    let again = cycle(sg(), StaticFetcher::serving(items()), &mut store);

    assert!(!again.is_changed());
    assert!(again.ephemeral.is_empty());
    assert_eq!(again.revisions_written, 0);
}

#[test]
fn scenario_region_failure_suppresses_deletion() {
    let mut store = MemoryRevisionStore::new();
    let i1 = snap("sg", "acctA", "us-east-1", "i-1", json!({"v": 1}));
    cycle(sg(), StaticFetcher::serving(vec![i1.clone()]), &mut store);

    // GIVEN collection fails for the item's region
    let fetcher = StaticFetcher::new().failing(
        "acctA",
        "us-east-1",
        FetchError::AccessDenied("UnauthorizedOperation".into()),
    );

    // WHEN the cycle runs
    let report = cycle(sg(), fetcher, &mut store);

    // THEN nothing is deleted and the failure is recorded at region scope
    assert!(report.deleted.is_empty());
    let scope = ExceptionScope::region("sg", "acctA", "us-east-1");
    let record = report.exceptions.get(&scope).unwrap();
    assert_eq!(record.kind(), Some(ExErrorKind::CollectionFailed));
    assert!(store.get_item(&i1.location).unwrap().unwrap().active);
}

#[test]
fn scenario_failure_in_one_region_does_not_stop_others() {
    let mut store = MemoryRevisionStore::new();
    let fetcher = StaticFetcher::serving(vec![snap("sg", "acctA", "us-west-2", "ok", json!({}))])
        .failing("acctA", "us-east-1", FetchError::Unavailable("503".into()));

    let report = cycle(sg(), fetcher, &mut store);

    assert_eq!(report.created.len(), 1);
    assert_eq!(report.exceptions.len(), 1);
}

#[test]
fn scenario_item_failure_without_data_suppresses_deletion() {
    let mut store = MemoryRevisionStore::new();
    let web = snap("sg", "acctA", "us-east-1", "web", json!({"ports": [80]}));
    let db = snap("sg", "acctA", "us-east-1", "db", json!({"ports": [5432]}));
    cycle(sg(), StaticFetcher::serving(vec![web.clone(), db.clone()]), &mut store);

    // GIVEN the region is read but one item could not be described
    let fetcher = StaticFetcher::serving(vec![db.clone()]).failing_item(web.location.clone());

    // WHEN the cycle runs
    let report = cycle(sg(), fetcher, &mut store);

    // THEN the failed item is neither deleted nor changed
    assert!(report.deleted.is_empty());
    assert!(!report.is_changed());
    assert!(report.exceptions.get(&ExceptionScope::item(&web.location)).is_some());
    assert!(store.get_item(&web.location).unwrap().unwrap().active);
    assert_eq!(store.list_revisions(&web.location).unwrap().len(), 1);
}

#[test]
fn scenario_deleted_item_sighted_again_is_created() {
    let mut store = MemoryRevisionStore::new();
    let web = || snap("sg", "acctA", "us-east-1", "web", json!({"ports": [80]}));
    cycle(sg(), StaticFetcher::serving(vec![web()]), &mut store);
    let gone = cycle(sg(), StaticFetcher::new(), &mut store);
    assert_eq!(gone.deleted.len(), 1);

    // WHEN the same item reappears
    let back = cycle(sg(), StaticFetcher::serving(vec![web()]), &mut store);

    // THEN it is reported as created and reactivated with a fresh revision
    assert_eq!(back.created.len(), 1);
    assert!(back.deleted.is_empty() && back.changed.is_empty());
    let location = web().location;
    assert!(store.get_item(&location).unwrap().unwrap().active);
    let revisions = store.list_revisions(&location).unwrap();
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions.iter().filter(|r| r.active).count(), 1);
}

#[test]
fn scenario_ephemeral_field_change_is_not_durable() {
    let descriptor = TechnologyDescriptor::new("vpn", "VPN", "VPNs")
        .with_ephemeral_paths(&["tunnels.*.last_status_change"])
        .unwrap();
    let vpn = |at: &str| {
        snap(
            "vpn",
            "acctA",
            "universal",
            "vpn-1",
            json!({"tunnels": [{"ip": "1.2.3.4", "last_status_change": at}]}),
        )
    };
    let mut store = MemoryRevisionStore::new();
    cycle(descriptor.clone(), StaticFetcher::serving(vec![vpn("t1")]), &mut store);

    let report = cycle(descriptor, StaticFetcher::serving(vec![vpn("t2")]), &mut store);

    assert_eq!(report.ephemeral.len(), 1);
    assert!(report.changed.is_empty());
    assert!(!report.is_changed());
    assert_eq!(report.revisions_written, 1);
    let revisions = store.list_revisions(&vpn("").location).unwrap();
    assert!(!revisions[0].durable);
    assert!(revisions[1].durable);
}

#[test]
fn test_state_transitions_follow_cycle_order() {
    let mut store = MemoryRevisionStore::new();
    let (mut limiter, _) = limiter(10);
    let mut watcher = Watcher::new(sg(), Arc::new(StaticFetcher::new()));

    watcher
        .run_cycle(
            &RunContext::new(),
            &mut store,
            &mut NoopReporter,
            &accounts(&["acctA"]),
            &mut limiter,
        )
        .unwrap();

    assert_eq!(
        watcher.transitions(),
        &[
            WatcherState::Prepping,
            WatcherState::Fetching,
            WatcherState::Diffing,
            WatcherState::Persisting,
            WatcherState::Reporting,
            WatcherState::Idle,
        ]
    );
    assert_eq!(watcher.state(), WatcherState::Idle);
}

#[test]
fn test_reporter_receives_report_and_failure_is_tolerated() {
    let mut store = MemoryRevisionStore::new();
    let (mut limiter, _) = limiter(10);
    let fetcher = Arc::new(StaticFetcher::serving(vec![snap("sg", "acctA", "us-east-1", "a", json!({}))]));

    let mut recording = RecordingReporter::default();
    Watcher::new(sg(), fetcher.clone())
        .run_cycle(&RunContext::new(), &mut store, &mut recording, &accounts(&["acctA"]), &mut limiter)
        .unwrap();
    assert_eq!(recording.reports.len(), 1);
    assert_eq!(recording.reports[0].created.len(), 1);

    let report = Watcher::new(sg(), fetcher)
        .run_cycle(&RunContext::new(), &mut store, &mut FailingReporter, &accounts(&["acctA"]), &mut limiter);
    assert!(report.is_ok());
}

#[test]
fn test_throttled_fetch_backs_off_then_succeeds() {
    let mut store = MemoryRevisionStore::new();
    let (mut limiter, sleeper) = limiter(10);
    let fetcher = StaticFetcher::serving(vec![snap("sg", "acctA", "us-east-1", "a", json!({}))])
        .throttling(2);

    let report = Watcher::new(sg(), Arc::new(fetcher))
        .run_cycle(&RunContext::new(), &mut store, &mut NoopReporter, &accounts(&["acctA"]), &mut limiter)
        .unwrap();

    assert_eq!(sleeper.secs(), vec![1, 2]);
    assert_eq!(report.created.len(), 1);
    assert!(report.exceptions.is_empty());
}

#[test]
fn test_retry_exhaustion_recorded_as_collection_exception() {
    let mut store = MemoryRevisionStore::new();
    let existing = snap("sg", "acctA", "us-east-1", "a", json!({}));
    cycle(sg(), StaticFetcher::serving(vec![existing.clone()]), &mut store);

    // Throttle more often than the limiter tolerates on the first region
    let (mut limiter, _) = limiter(2);
    let fetcher = StaticFetcher::new().throttling(3);
    let report = Watcher::new(sg(), Arc::new(fetcher))
        .run_cycle(&RunContext::new(), &mut store, &mut NoopReporter, &accounts(&["acctA"]), &mut limiter)
        .unwrap();

    let record = report
        .exceptions
        .get(&ExceptionScope::region("sg", "acctA", "us-east-1"))
        .unwrap();
    assert_eq!(record.kind(), Some(ExErrorKind::RetryExhausted));
    assert!(report.deleted.is_empty());
    assert!(store.get_item(&existing.location).unwrap().unwrap().active);
}

#[test]
fn test_orphan_repaired_during_prepping() {
    let mut store = MemoryRevisionStore::new();
    let item = snap("sg", "acctA", "us-east-1", "web", json!({"v": 1}));
    cycle(sg(), StaticFetcher::serving(vec![item.clone()]), &mut store);
    store.corrupt_latest_pointer(&item.location);

    let report = cycle(sg(), StaticFetcher::serving(vec![item.clone()]), &mut store);

    assert_eq!(report.repair.repaired, vec![item.location.clone()]);
    assert!(report.created.is_empty(), "repaired item is known again");
    assert!(!report.is_changed());
}

#[test]
fn test_items_of_other_technologies_are_dropped() {
    let mut store = MemoryRevisionStore::new();
    let fetcher = StaticFetcher::serving(vec![snap("s3", "acctA", "us-east-1", "bucket", json!({}))]);

    let report = cycle(sg(), fetcher, &mut store);

    assert!(report.created.is_empty());
    assert!(store.get_previous("s3", &accounts(&["acctA"])).unwrap().is_empty());
}
