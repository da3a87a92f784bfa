//! Batched watcher for technologies that list before they fetch.
//!
//! A cycle is `listing → (fetch-batch → diff-batch)* → done`. Each call to
//! [`BatchedWatcher::step`] does one unit of work and returns, so a caller
//! can spread a large technology over several invocations. Previous state
//! is read once when the cycle starts.
//!
//! Deletions are only decided when the listing is exhausted: an item is
//! deleted when it was active before, is absent from every successful
//! listing, and is not covered by an exception. A location listed twice is
//! fetched once.

#![allow(clippy::result_large_err)]

use crate::fetcher::{BatchFetcher, FetchContext, ListEntry};
use crate::report::{ChangeReporter, CycleReport};
use crate::watcher::persist_items;
use secmonkey_core::classify::{classify, ChangeClass, ChangeItem};
use secmonkey_core::errors::Result;
use secmonkey_core::model::{ConfigSnapshot, ExceptionScope, Location};
use secmonkey_core::retry::RateLimiter;
use secmonkey_core::store::RevisionStore;
use secmonkey_core::technology::TechnologyDescriptor;
use secmonkey_core::{log_op_end, log_op_error, log_op_start};
use secmonkey_core_types::RunContext;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Progress after one [`BatchedWatcher::step`].
#[derive(Debug)]
pub enum BatchStep {
    /// `cursor` of `total` listed items processed so far
    InProgress { cursor: usize, total: usize },
    Finished(CycleReport),
}

struct BatchCycle {
    run: RunContext,
    accounts: Vec<String>,
    started: Instant,
    previous: Vec<ConfigSnapshot>,
    listing: Vec<(String, ListEntry)>,
    cursor: usize,
    seen: BTreeSet<Location>,
    report: CycleReport,
}

pub struct BatchedWatcher {
    descriptor: TechnologyDescriptor,
    fetcher: Arc<dyn BatchFetcher>,
    cycle: Option<BatchCycle>,
}

impl BatchedWatcher {
    pub fn new(descriptor: TechnologyDescriptor, fetcher: Arc<dyn BatchFetcher>) -> Self {
        Self {
            descriptor,
            fetcher,
            cycle: None,
        }
    }

    pub fn descriptor(&self) -> &TechnologyDescriptor {
        &self.descriptor
    }

    /// `(cursor, total)` of the cycle in progress, if any.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.cycle.as_ref().map(|c| (c.cursor, c.listing.len()))
    }

    fn batch_size(&self) -> usize {
        self.descriptor.batch_size.unwrap_or(1).max(1)
    }

    /// Advance the cycle by one unit: listing, one batch, or finalisation.
    ///
    /// `run` and `accounts` are only read when a new cycle starts.
    ///
    /// # Errors
    ///
    /// Store failures; the cycle in progress is abandoned and the next call
    /// starts over.
    pub fn step<S: RevisionStore + ?Sized>(
        &mut self,
        run: &RunContext,
        store: &mut S,
        reporter: &mut dyn ChangeReporter,
        accounts: &[String],
        limiter: &mut RateLimiter,
    ) -> Result<BatchStep> {
        let start = Instant::now();
        let result = match self.cycle.take() {
            None => self.begin(run, store, accounts, limiter),
            Some(cycle) if cycle.cursor < cycle.listing.len() => {
                self.next_batch(cycle, store, limiter)
            }
            Some(cycle) => self.finish(cycle, store, reporter).map(BatchStep::Finished),
        };
        if let Err(e) = &result {
            log_op_error!(
                "run_batched_cycle",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                technology = %self.descriptor.index
            );
        }
        result
    }

    /// Step until the cycle finishes.
    ///
    /// # Errors
    ///
    /// As [`step`](Self::step).
    pub fn run_to_completion<S: RevisionStore + ?Sized>(
        &mut self,
        run: &RunContext,
        store: &mut S,
        reporter: &mut dyn ChangeReporter,
        accounts: &[String],
        limiter: &mut RateLimiter,
    ) -> Result<CycleReport> {
        loop {
            if let BatchStep::Finished(report) =
                self.step(run, store, reporter, accounts, limiter)?
            {
                return Ok(report);
            }
        }
    }

    fn begin<S: RevisionStore + ?Sized>(
        &mut self,
        run: &RunContext,
        store: &mut S,
        accounts: &[String],
        limiter: &mut RateLimiter,
    ) -> Result<BatchStep> {
        let index = self.descriptor.index.clone();
        log_op_start!("run_batched_cycle", technology = %index, run_id = %run.run_id);
        debug!(technology = %index, state = "listing", "batched watcher state");

        let mut report = CycleReport::new(run.run_id.clone(), index.clone());
        report.repair = store.repair_orphans(&index, accounts, &self.descriptor.ephemeral_paths)?;
        let previous = store.get_previous(&index, accounts)?;

        let mut listing = Vec::new();
        let mut listed = BTreeSet::new();
        for account in accounts {
            let mut ctx = FetchContext::new(&self.descriptor, &run.run_id, limiter);
            match self.fetcher.list(&mut ctx, account) {
                Ok(output) => {
                    for entry in output.entries {
                        let location = Location::new(&index, account, &entry.region, &entry.name);
                        if !listed.insert(location) {
                            debug!(
                                technology = %index,
                                account = %account,
                                name = %entry.name,
                                "duplicate listing entry skipped"
                            );
                            continue;
                        }
                        listing.push((account.clone(), entry));
                    }
                    report.exceptions.merge(output.exceptions);
                }
                Err(e) => {
                    report.exceptions.record(
                        ExceptionScope::account(&index, account),
                        &e.with_technology(index.clone()),
                    );
                }
            }
        }

        let total = listing.len();
        self.cycle = Some(BatchCycle {
            run: run.clone(),
            accounts: accounts.to_vec(),
            started: Instant::now(),
            previous,
            listing,
            cursor: 0,
            seen: BTreeSet::new(),
            report,
        });
        Ok(BatchStep::InProgress { cursor: 0, total })
    }

    fn next_batch<S: RevisionStore + ?Sized>(
        &mut self,
        mut cycle: BatchCycle,
        store: &mut S,
        limiter: &mut RateLimiter,
    ) -> Result<BatchStep> {
        let index = self.descriptor.index.clone();
        let end = (cycle.cursor + self.batch_size()).min(cycle.listing.len());
        debug!(
            technology = %index,
            state = "fetch_batch",
            cursor = cycle.cursor,
            end,
            "batched watcher state"
        );

        let mut batch_locations = BTreeSet::new();
        let mut current = Vec::new();
        for (account, entry) in &cycle.listing[cycle.cursor..end] {
            let location = Location::new(&index, account, &entry.region, &entry.name);
            batch_locations.insert(location.clone());
            let mut ctx = FetchContext::new(&self.descriptor, &cycle.run.run_id, limiter);
            match self.fetcher.fetch_item(&mut ctx, account, entry) {
                Ok(Some(snapshot)) => {
                    cycle.seen.insert(location);
                    current.push(snapshot);
                }
                Ok(None) => {
                    debug!(location = %location, "listed item vanished before fetch");
                }
                Err(e) => {
                    cycle.seen.insert(location.clone());
                    cycle.report.exceptions.record(
                        ExceptionScope::item(&location),
                        &e.with_technology(index.clone()),
                    );
                }
            }
        }

        debug!(technology = %index, state = "diff_batch", "batched watcher state");
        let previous: Vec<ConfigSnapshot> = cycle
            .previous
            .iter()
            .filter(|s| batch_locations.contains(&s.location))
            .cloned()
            .collect();
        let paths = &self.descriptor.ephemeral_paths;
        // Deletions wait for the full listing
        let classification = classify(&previous, &current, &cycle.report.exceptions, paths);

        let written = persist_items(store, &classification.created, true, true, paths)?
            + persist_items(store, &classification.changed, true, false, paths)?
            + persist_items(store, &classification.ephemeral, false, false, paths)?;
        cycle.report.revisions_written += written;
        cycle.report.created.extend(classification.created);
        cycle.report.changed.extend(classification.changed);
        cycle.report.ephemeral.extend(classification.ephemeral);

        cycle.cursor = end;
        let step = BatchStep::InProgress {
            cursor: cycle.cursor,
            total: cycle.listing.len(),
        };
        self.cycle = Some(cycle);
        Ok(step)
    }

    fn finish<S: RevisionStore + ?Sized>(
        &mut self,
        mut cycle: BatchCycle,
        store: &mut S,
        reporter: &mut dyn ChangeReporter,
    ) -> Result<CycleReport> {
        let index = self.descriptor.index.clone();
        debug!(technology = %index, state = "done", "batched watcher state");

        for prev in &cycle.previous {
            if cycle.seen.contains(&prev.location) || cycle.report.exceptions.covers(&prev.location)
            {
                continue;
            }
            store.mark_deleted(&prev.location)?;
            debug!(location = %prev.location, "deleted");
            cycle.report.deleted.push(ChangeItem {
                location: prev.location.clone(),
                class: ChangeClass::Deleted,
                arn: prev.arn.clone(),
                old_config: Some(prev.config.clone()),
                new_config: None,
            });
        }

        let report = cycle.report;
        if let Err(e) = reporter.report(&report) {
            warn!(technology = %index, error = %e, "change reporter failed");
        }

        log_op_end!(
            "run_batched_cycle",
            duration_ms = cycle.started.elapsed().as_millis() as u64,
            technology = %index,
            accounts_len = cycle.accounts.len(),
            created_len = report.created.len(),
            changed_len = report.changed.len(),
            ephemeral_len = report.ephemeral.len(),
            deleted_len = report.deleted.len(),
            exceptions_len = report.exceptions.len()
        );
        Ok(report)
    }
}
