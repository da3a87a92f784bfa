// Batched watcher: listing, cursor-driven batches, deferred deletions.

mod common;

use common::{accounts, limiter, snap, ListingFetcher, RecordingReporter};
use secmonkey_core::model::{ConfigSnapshot, ExceptionScope};
use secmonkey_core::technology::TechnologyDescriptor;
use secmonkey_core::{ExErrorKind, MemoryRevisionStore, RevisionStore};
use secmonkey_core_types::RunContext;
use secmonkey_engine::{BatchStep, BatchedWatcher, CycleReport, NoopReporter};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn repos(batch_size: usize) -> TechnologyDescriptor {
    TechnologyDescriptor::new("repository", "Repository", "Repositories").with_batch_size(batch_size)
}

fn repo(account: &str, name: &str, v: i64) -> ConfigSnapshot {
    snap("repository", account, "universal", name, json!({"private": true, "v": v}))
}

fn run(fetcher: ListingFetcher, store: &mut MemoryRevisionStore, accts: &[&str]) -> CycleReport {
    let (mut limiter, _) = limiter(10);
    BatchedWatcher::new(repos(2), Arc::new(fetcher))
        .run_to_completion(
            &RunContext::new(),
            store,
            &mut NoopReporter,
            &accounts(accts),
            &mut limiter,
        )
        .unwrap()
}

#[test]
fn scenario_cursor_advances_by_batch_size() {
    let mut store = MemoryRevisionStore::new();
    let items: Vec<_> = (1..=5).map(|n| repo("acctA", &format!("r{n}"), 1)).collect();
    let (mut limiter, _) = limiter(10);
    let mut watcher = BatchedWatcher::new(repos(2), Arc::new(ListingFetcher::serving(items)));
    let mut reporter = RecordingReporter::default();
    let run_ctx = RunContext::new();
    let accts = accounts(&["acctA"]);

    let mut progress = Vec::new();
    let report = loop {
        match watcher
            .step(&run_ctx, &mut store, &mut reporter, &accts, &mut limiter)
            .unwrap()
        {
            BatchStep::InProgress { cursor, total } => progress.push((cursor, total)),
            BatchStep::Finished(report) => break report,
        }
    };

    assert_eq!(progress, vec![(0, 5), (2, 5), (4, 5), (5, 5)]);
    assert_eq!(report.created.len(), 5);
    assert_eq!(report.revisions_written, 5);
    assert_eq!(reporter.reports.len(), 1);
    assert!(watcher.progress().is_none());
}

#[test]
fn scenario_batches_persist_before_cycle_ends() {
    let mut store = MemoryRevisionStore::new();
    let items: Vec<_> = (1..=3).map(|n| repo("acctA", &format!("r{n}"), 1)).collect();
    let (mut limiter, _) = limiter(10);
    let mut watcher = BatchedWatcher::new(repos(2), Arc::new(ListingFetcher::serving(items)));
    let run_ctx = RunContext::new();
    let accts = accounts(&["acctA"]);

    // listing, then first batch
    watcher.step(&run_ctx, &mut store, &mut NoopReporter, &accts, &mut limiter).unwrap();
    watcher.step(&run_ctx, &mut store, &mut NoopReporter, &accts, &mut limiter).unwrap();

    assert_eq!(watcher.progress(), Some((2, 3)));
    assert_eq!(store.get_previous("repository", &accts).unwrap().len(), 2);
}

#[test]
fn scenario_missing_items_deleted_only_at_finish() {
    let mut store = MemoryRevisionStore::new();
    run(
        ListingFetcher::serving(vec![repo("acctA", "keep", 1), repo("acctA", "gone", 1)]),
        &mut store,
        &["acctA"],
    );

    let report = run(
        ListingFetcher::serving(vec![repo("acctA", "keep", 2)]),
        &mut store,
        &["acctA"],
    );

    assert_eq!(report.changed.len(), 1);
    assert_eq!(report.deleted.len(), 1);
    assert_eq!(report.deleted[0].location.name, "gone");
}

#[test]
fn scenario_listing_failure_skips_account() {
    let mut store = MemoryRevisionStore::new();
    run(
        ListingFetcher::serving(vec![repo("acctA", "a1", 1), repo("acctB", "b1", 1)]),
        &mut store,
        &["acctA", "acctB"],
    );

    // GIVEN listing acctB fails
    let fetcher = ListingFetcher::serving(vec![repo("acctA", "a1", 1)]).failing_account("acctB");

    // WHEN
    let report = run(fetcher, &mut store, &["acctA", "acctB"]);

    // THEN acctB is untouched and the failure sits at account scope
    assert!(report.deleted.is_empty());
    let record = report
        .exceptions
        .get(&ExceptionScope::account("repository", "acctB"))
        .unwrap();
    assert_eq!(record.kind(), Some(ExErrorKind::CollectionFailed));
    assert_eq!(store.get_previous("repository", &accounts(&["acctB"])).unwrap().len(), 1);
}

#[test]
fn scenario_item_fetch_failure_is_item_scoped() {
    let mut store = MemoryRevisionStore::new();
    run(
        ListingFetcher::serving(vec![repo("acctA", "flaky", 1), repo("acctA", "fine", 1)]),
        &mut store,
        &["acctA"],
    );

    let fetcher = ListingFetcher::serving(vec![repo("acctA", "flaky", 2), repo("acctA", "fine", 2)])
        .failing_item("flaky");
    let report = run(fetcher, &mut store, &["acctA"]);

    assert_eq!(report.changed.len(), 1);
    assert_eq!(report.changed[0].location.name, "fine");
    assert!(report.deleted.is_empty());
    let flaky = repo("acctA", "flaky", 0).location;
    assert!(report.exceptions.covers(&flaky));
    assert_eq!(report.exceptions.len(), 1);
}

#[test]
fn scenario_item_vanished_after_listing_is_deleted() {
    let mut store = MemoryRevisionStore::new();
    run(ListingFetcher::serving(vec![repo("acctA", "ghost", 1)]), &mut store, &["acctA"]);

    let fetcher = ListingFetcher::serving(vec![repo("acctA", "ghost", 1)]).vanished("ghost");
    let report = run(fetcher, &mut store, &["acctA"]);

    assert_eq!(report.deleted.len(), 1);
    assert!(report.exceptions.is_empty());
}

#[test]
fn scenario_region_missing_from_listing_suppresses_deletion() {
    let mut store = MemoryRevisionStore::new();
    run(ListingFetcher::serving(vec![repo("acctA", "r1", 1)]), &mut store, &["acctA"]);

    // GIVEN a listing that could not cover the item's region
    let fetcher = ListingFetcher::serving(vec![repo("acctA", "r1", 1)]).failing_region("universal");

    // WHEN the cycle runs to completion
    let report = run(fetcher, &mut store, &["acctA"]);

    // THEN the region is recorded and the item survives
    assert!(report.deleted.is_empty());
    let scope = ExceptionScope::region("repository", "acctA", "universal");
    assert!(report.exceptions.get(&scope).is_some());
    assert!(store.get_item(&repo("acctA", "r1", 1).location).unwrap().unwrap().active);
}

#[test]
fn scenario_location_listed_twice_is_processed_once() {
    let mut store = MemoryRevisionStore::new();
    run(ListingFetcher::serving(vec![repo("acctA", "r1", 1)]), &mut store, &["acctA"]);

    // GIVEN a listing that names r1 twice, after r1 changed
    let fetcher = ListingFetcher::serving(vec![repo("acctA", "r1", 2), repo("acctA", "r2", 1)])
        .duplicated("r1");
    let fetcher = Arc::new(fetcher);
    let (mut limiter, _) = limiter(10);
    let report = BatchedWatcher::new(repos(1), fetcher.clone())
        .run_to_completion(
            &RunContext::new(),
            &mut store,
            &mut NoopReporter,
            &accounts(&["acctA"]),
            &mut limiter,
        )
        .unwrap();

    // THEN the change is reported and fetched once
    assert_eq!(report.changed.len(), 1);
    assert_eq!(report.created.len(), 1);
    assert_eq!(fetcher.item_fetches.load(Ordering::SeqCst), 2);
    assert_eq!(store.list_revisions(&repo("acctA", "r1", 1).location).unwrap().len(), 2);
}

#[test]
fn test_empty_listing_finishes() {
    let mut store = MemoryRevisionStore::new();
    let report = run(ListingFetcher::default(), &mut store, &["acctA"]);
    assert!(!report.is_changed());
    assert_eq!(report.revisions_written, 0);
}
