//! Top-level driver for one technology run.

#![allow(clippy::result_large_err)]

use crate::batched::BatchedWatcher;
use crate::registry::{Collector, TechnologyRegistry};
use crate::report::{ChangeReporter, CycleReport};
use crate::watcher::Watcher;
use chrono::Utc;
use secmonkey_core::config::MonkeyConfig;
use secmonkey_core::errors::Result;
use secmonkey_core::exceptions::ExceptionLog;
use secmonkey_core::retry::{RateLimitPolicy, RateLimiter, Sleeper, ThreadSleeper};
use secmonkey_core::store::RevisionStore;
use secmonkey_core_types::RunContext;
use std::sync::Arc;
use tracing::info;

/// Knobs shared by every technology run.
#[derive(Clone)]
pub struct RunSettings {
    pub policy: RateLimitPolicy,
    pub exception_ttl: chrono::Duration,
    pub sleeper: Arc<dyn Sleeper>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            policy: RateLimitPolicy::default(),
            exception_ttl: chrono::Duration::hours(24),
            sleeper: Arc::new(ThreadSleeper),
        }
    }
}

impl RunSettings {
    pub fn from_config(config: &MonkeyConfig) -> Self {
        Self {
            policy: config.rate_limit_policy(),
            exception_ttl: config.exception_ttl(),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }
}

/// Run one complete cycle of the technology registered as `index`.
///
/// Expired exception rows are purged first; the cycle's exceptions are
/// persisted afterwards with the configured time-to-live.
///
/// # Errors
///
/// - `UnknownTechnology` if `index` is not registered
/// - store failures from the cycle or the exception log
pub fn run_technology<S>(
    registry: &TechnologyRegistry,
    index: &str,
    store: &mut S,
    reporter: &mut dyn ChangeReporter,
    accounts: &[String],
    settings: &RunSettings,
) -> Result<CycleReport>
where
    S: RevisionStore + ExceptionLog,
{
    let registered = registry.get(index)?;
    let run = RunContext::new();

    let purged = store.clear_expired_exceptions(Utc::now())?;
    if purged > 0 {
        info!(technology = index, purged, "expired collection exceptions purged");
    }

    let mut limiter = RateLimiter::new(settings.policy, settings.sleeper.clone());
    let descriptor = registered.descriptor.clone();
    let report = match &registered.collector {
        Collector::Single(fetcher) => Watcher::new(descriptor, fetcher.clone())
            .run_cycle(&run, store, reporter, accounts, &mut limiter)?,
        Collector::Batched(fetcher) => BatchedWatcher::new(descriptor, fetcher.clone())
            .run_to_completion(&run, store, reporter, accounts, &mut limiter)?,
    };

    store.store_exceptions(
        &run.run_id,
        &report.exceptions,
        Utc::now(),
        settings.exception_ttl,
    )?;
    Ok(report)
}
