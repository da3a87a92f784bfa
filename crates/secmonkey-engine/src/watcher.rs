//! Single-pass watcher.
//!
//! ## Cycle
//!
//! `Idle → Prepping → Fetching → Diffing → Persisting → Reporting → Idle`
//!
//! - Prepping repairs orphaned items and reads previous state once
//! - Fetching calls the fetcher per account and region; a failure is
//!   recorded at region scope and the cycle goes on
//! - Persistence failures abort the cycle; reporter failures do not
//!
//! ## Logging
//!
//! - `log_op_start!` / `log_op_end!` around the cycle
//! - one `debug` event per state entered (`state` field)
//! - `log_op_error!` when the cycle aborts

#![allow(clippy::result_large_err)]

use crate::fetcher::{FetchContext, Fetcher};
use crate::report::{ChangeReporter, CycleReport};
use secmonkey_core::classify::{classify, ChangeItem, Classification};
use secmonkey_core::errors::Result;
use secmonkey_core::exceptions::ExceptionMap;
use secmonkey_core::hashing::EphemeralPath;
use secmonkey_core::model::{ConfigSnapshot, ExceptionScope};
use secmonkey_core::retry::RateLimiter;
use secmonkey_core::store::RevisionStore;
use secmonkey_core::technology::TechnologyDescriptor;
use secmonkey_core::{log_op_end, log_op_error, log_op_start};
use secmonkey_core_types::RunContext;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Prepping,
    Fetching,
    Diffing,
    Persisting,
    Reporting,
}

impl WatcherState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatcherState::Idle => "idle",
            WatcherState::Prepping => "prepping",
            WatcherState::Fetching => "fetching",
            WatcherState::Diffing => "diffing",
            WatcherState::Persisting => "persisting",
            WatcherState::Reporting => "reporting",
        }
    }
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Watcher {
    descriptor: TechnologyDescriptor,
    fetcher: Arc<dyn Fetcher>,
    state: WatcherState,
    transitions: Vec<WatcherState>,
}

impl Watcher {
    pub fn new(descriptor: TechnologyDescriptor, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            descriptor,
            fetcher,
            state: WatcherState::Idle,
            transitions: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &TechnologyDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// States entered during the last cycle, in order.
    pub fn transitions(&self) -> &[WatcherState] {
        &self.transitions
    }

    fn enter(&mut self, state: WatcherState) {
        self.state = state;
        self.transitions.push(state);
        debug!(technology = %self.descriptor.index, state = state.as_str(), "watcher state");
    }

    /// Run one full cycle over `accounts`.
    ///
    /// # Errors
    ///
    /// Store failures. Collection failures never fail the cycle; they end up
    /// in the report's exception map.
    pub fn run_cycle<S: RevisionStore + ?Sized>(
        &mut self,
        run: &RunContext,
        store: &mut S,
        reporter: &mut dyn ChangeReporter,
        accounts: &[String],
        limiter: &mut RateLimiter,
    ) -> Result<CycleReport> {
        log_op_start!(
            "run_cycle",
            technology = %self.descriptor.index,
            run_id = %run.run_id
        );
        let start = Instant::now();
        self.transitions.clear();

        let result = self.run_cycle_impl(run, store, reporter, accounts, limiter);
        self.enter(WatcherState::Idle);

        match result {
            Ok(report) => {
                log_op_end!(
                    "run_cycle",
                    duration_ms = start.elapsed().as_millis() as u64,
                    technology = %self.descriptor.index,
                    created_len = report.created.len(),
                    changed_len = report.changed.len(),
                    ephemeral_len = report.ephemeral.len(),
                    deleted_len = report.deleted.len(),
                    exceptions_len = report.exceptions.len()
                );
                Ok(report)
            }
            Err(e) => {
                log_op_error!(
                    "run_cycle",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    technology = %self.descriptor.index
                );
                Err(e.with_run_id(run.run_id.clone()))
            }
        }
    }

    fn run_cycle_impl<S: RevisionStore + ?Sized>(
        &mut self,
        run: &RunContext,
        store: &mut S,
        reporter: &mut dyn ChangeReporter,
        accounts: &[String],
        limiter: &mut RateLimiter,
    ) -> Result<CycleReport> {
        let index = self.descriptor.index.clone();
        let mut report = CycleReport::new(run.run_id.clone(), index.clone());

        self.enter(WatcherState::Prepping);
        report.repair =
            store.repair_orphans(&index, accounts, &self.descriptor.ephemeral_paths)?;
        let previous = store.get_previous(&index, accounts)?;

        self.enter(WatcherState::Fetching);
        let (current, exceptions) = self.fetch_all(run, accounts, limiter);

        self.enter(WatcherState::Diffing);
        let classification = classify(
            &previous,
            &current,
            &exceptions,
            &self.descriptor.ephemeral_paths,
        );

        self.enter(WatcherState::Persisting);
        report.revisions_written =
            persist_classification(store, &classification, &self.descriptor.ephemeral_paths)?;
        report.created = classification.created;
        report.changed = classification.changed;
        report.ephemeral = classification.ephemeral;
        report.deleted = classification.deleted;
        report.exceptions = exceptions;

        self.enter(WatcherState::Reporting);
        if let Err(e) = reporter.report(&report) {
            warn!(technology = %index, error = %e, "change reporter failed");
        }

        Ok(report)
    }

    fn fetch_all(
        &self,
        run: &RunContext,
        accounts: &[String],
        limiter: &mut RateLimiter,
    ) -> (Vec<ConfigSnapshot>, ExceptionMap) {
        let index = &self.descriptor.index;
        let mut current = Vec::new();
        let mut exceptions = ExceptionMap::new();

        for account in accounts {
            for region in &self.descriptor.regions {
                let mut ctx = FetchContext::new(&self.descriptor, &run.run_id, limiter);
                match self.fetcher.fetch(&mut ctx, account, region) {
                    Ok(output) => {
                        for snapshot in output.snapshots {
                            if snapshot.location.technology != *index {
                                warn!(
                                    technology = %index,
                                    location = %snapshot.location,
                                    "fetcher returned an item of another technology; dropped"
                                );
                                continue;
                            }
                            current.push(snapshot);
                        }
                        exceptions.merge(output.exceptions);
                    }
                    Err(e) => {
                        exceptions.record(
                            ExceptionScope::region(index, account, region),
                            &e.with_technology(index.clone()),
                        );
                    }
                }
            }
        }
        (current, exceptions)
    }
}

/// Write a classification to the store.
///
/// - created: new or reactivated item, durable
/// - changed: durable revision
/// - ephemeral: non-durable revision
/// - deleted: item deactivated
///
/// Returns the number of revision rows written.
pub(crate) fn persist_classification<S: RevisionStore + ?Sized>(
    store: &mut S,
    classification: &Classification,
    ephemeral_paths: &[EphemeralPath],
) -> Result<usize> {
    let mut written = 0;
    written += persist_items(store, &classification.created, true, true, ephemeral_paths)?;
    written += persist_items(store, &classification.changed, true, false, ephemeral_paths)?;
    written += persist_items(store, &classification.ephemeral, false, false, ephemeral_paths)?;
    for item in &classification.deleted {
        if store.mark_deleted(&item.location)? {
            debug!(location = %item.location, "deleted");
        }
    }
    Ok(written)
}

pub(crate) fn persist_items<S: RevisionStore + ?Sized>(
    store: &mut S,
    items: &[ChangeItem],
    is_durable_change: bool,
    is_new: bool,
    ephemeral_paths: &[EphemeralPath],
) -> Result<usize> {
    let mut written = 0;
    for item in items {
        let Some(snapshot) = item.current_snapshot() else {
            continue;
        };
        let outcome = store
            .store(&snapshot, is_durable_change, is_new, ephemeral_paths)
            .map_err(|e| e.with_location(item.location.to_string()))?;
        if outcome.is_written() {
            written += 1;
            debug!(location = %item.location, class = item.class.as_str(), "revision stored");
        }
    }
    Ok(written)
}
