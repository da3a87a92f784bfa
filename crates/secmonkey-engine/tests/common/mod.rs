// Shared fakes for engine tests.
#![allow(dead_code)]

use secmonkey_core::errors::{ExError, FetchError, Result};
use secmonkey_core::model::{ConfigSnapshot, ConfigValue, ExceptionScope, Location};
use secmonkey_core::retry::{RateLimitPolicy, RateLimiter, Sleeper};
use secmonkey_engine::{
    BatchFetcher, ChangeReporter, CycleReport, FetchContext, FetchOutput, Fetcher, ListEntry,
    ListOutput,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn snap(tech: &str, account: &str, region: &str, name: &str, config: serde_json::Value) -> ConfigSnapshot {
    ConfigSnapshot::new(
        Location::new(tech, account, region, name),
        ConfigValue::from(config),
    )
}

pub fn accounts(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: Mutex<Vec<Duration>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

impl RecordingSleeper {
    pub fn secs(&self) -> Vec<u64> {
        self.sleeps.lock().unwrap().iter().map(Duration::as_secs).collect()
    }
}

pub fn limiter(max_throttle_retries: u32) -> (RateLimiter, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let policy = RateLimitPolicy {
        max_throttle_retries,
        ..RateLimitPolicy::default()
    };
    (RateLimiter::new(policy, sleeper.clone()), sleeper)
}

/// Serves fixed snapshots per (account, region), optionally failing or
/// throttling first.
#[derive(Default)]
pub struct StaticFetcher {
    snapshots: BTreeMap<(String, String), Vec<ConfigSnapshot>>,
    failures: BTreeMap<(String, String), FetchError>,
    item_failures: Vec<Location>,
    throttles_left: AtomicUsize,
    pub calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `snapshots`, keyed by their own account and region.
    pub fn serving(snapshots: Vec<ConfigSnapshot>) -> Self {
        let mut fetcher = Self::new();
        for s in snapshots {
            fetcher
                .snapshots
                .entry((s.location.account.clone(), s.location.region.clone()))
                .or_default()
                .push(s);
        }
        fetcher
    }

    pub fn failing(mut self, account: &str, region: &str, err: FetchError) -> Self {
        self.failures
            .insert((account.to_string(), region.to_string()), err);
        self
    }

    /// Report `location` as an item-scope failure from its region's fetch
    pub fn failing_item(mut self, location: Location) -> Self {
        self.item_failures.push(location);
        self
    }

    pub fn throttling(self, times: usize) -> Self {
        self.throttles_left.store(times, Ordering::SeqCst);
        self
    }
}

impl Fetcher for StaticFetcher {
    fn fetch(&self, ctx: &mut FetchContext<'_>, account: &str, region: &str) -> Result<FetchOutput> {
        let key = (account.to_string(), region.to_string());
        ctx.rate_limited("describe", || {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .throttles_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(FetchError::Throttled("Rate exceeded".into()));
            }
            if let Some(err) = self.failures.get(&key) {
                return Err(err.clone());
            }
            let mut output = FetchOutput::new(self.snapshots.get(&key).cloned().unwrap_or_default());
            for location in &self.item_failures {
                if location.account == account && location.region == region {
                    output.exceptions.record(
                        ExceptionScope::item(location),
                        &ExError::from(FetchError::Unavailable(format!("{} timed out", location.name))),
                    );
                }
            }
            Ok(output)
        })
    }
}

/// Batched fake: lists every snapshot per account, then serves them one by one.
#[derive(Default)]
pub struct ListingFetcher {
    items: BTreeMap<String, Vec<ConfigSnapshot>>,
    failing_accounts: BTreeSet<String>,
    failing_items: BTreeSet<String>,
    vanished: BTreeSet<String>,
    duplicated: BTreeSet<String>,
    unlisted_regions: BTreeSet<String>,
    pub item_fetches: AtomicUsize,
}

impl ListingFetcher {
    pub fn serving(snapshots: Vec<ConfigSnapshot>) -> Self {
        let mut fetcher = Self::default();
        for s in snapshots {
            fetcher
                .items
                .entry(s.location.account.clone())
                .or_default()
                .push(s);
        }
        fetcher
    }

    pub fn failing_account(mut self, account: &str) -> Self {
        self.failing_accounts.insert(account.to_string());
        self
    }

    pub fn failing_item(mut self, name: &str) -> Self {
        self.failing_items.insert(name.to_string());
        self
    }

    /// Listing skips `region` and reports it as a region-scope failure
    pub fn failing_region(mut self, region: &str) -> Self {
        self.unlisted_regions.insert(region.to_string());
        self
    }

    /// Listed twice by every listing
    pub fn duplicated(mut self, name: &str) -> Self {
        self.duplicated.insert(name.to_string());
        self
    }

    /// Listed, but gone by the time it is fetched
    pub fn vanished(mut self, name: &str) -> Self {
        self.vanished.insert(name.to_string());
        self
    }
}

impl BatchFetcher for ListingFetcher {
    fn list(&self, ctx: &mut FetchContext<'_>, account: &str) -> Result<ListOutput> {
        let tech = ctx.technology().index.clone();
        ctx.rate_limited("list", || {
            if self.failing_accounts.contains(account) {
                return Err(FetchError::AccessDenied(format!("cannot list {account}")));
            }
            let mut output = ListOutput::default();
            for region in &self.unlisted_regions {
                output.exceptions.record(
                    ExceptionScope::region(&tech, account, region),
                    &ExError::from(FetchError::Unavailable(format!("cannot list {region}"))),
                );
            }
            let mut entries = Vec::new();
            for s in self.items.get(account).into_iter().flatten() {
                if self.unlisted_regions.contains(&s.location.region) {
                    continue;
                }
                let entry = ListEntry::new(&s.location.name, &s.location.region);
                if self.duplicated.contains(&s.location.name) {
                    entries.push(entry.clone());
                }
                entries.push(entry);
            }
            output.entries = entries;
            Ok(output)
        })
    }

    fn fetch_item(
        &self,
        ctx: &mut FetchContext<'_>,
        account: &str,
        entry: &ListEntry,
    ) -> Result<Option<ConfigSnapshot>> {
        ctx.rate_limited("get_item", || {
            self.item_fetches.fetch_add(1, Ordering::SeqCst);
            if self.failing_items.contains(&entry.name) {
                return Err(FetchError::Unavailable(format!("{} timed out", entry.name)));
            }
            if self.vanished.contains(&entry.name) {
                return Ok(None);
            }
            Ok(self.items.get(account).and_then(|items| {
                items
                    .iter()
                    .find(|s| s.location.name == entry.name)
                    .cloned()
            }))
        })
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Vec<CycleReport>,
}

impl ChangeReporter for RecordingReporter {
    fn report(&mut self, report: &CycleReport) -> Result<()> {
        self.reports.push(report.clone());
        Ok(())
    }
}

pub struct FailingReporter;

impl ChangeReporter for FailingReporter {
    fn report(&mut self, _report: &CycleReport) -> Result<()> {
        Err(ExError::new(secmonkey_core::ExErrorKind::Io).with_message("alert channel down"))
    }
}
