//! Collaborator traits for collecting current state.
//!
//! Implementations wrap a provider SDK. They see only a [`FetchContext`],
//! which routes every outbound call through the run's rate limiter.

use secmonkey_core::errors::{FetchError, Result};
use secmonkey_core::exceptions::ExceptionMap;
use secmonkey_core::model::ConfigSnapshot;
use secmonkey_core::retry::RateLimiter;
use secmonkey_core::technology::TechnologyDescriptor;
use secmonkey_core_types::RunId;

/// Per-call context handed to fetchers.
pub struct FetchContext<'a> {
    descriptor: &'a TechnologyDescriptor,
    run_id: &'a RunId,
    limiter: &'a mut RateLimiter,
}

impl<'a> FetchContext<'a> {
    pub fn new(
        descriptor: &'a TechnologyDescriptor,
        run_id: &'a RunId,
        limiter: &'a mut RateLimiter,
    ) -> Self {
        Self {
            descriptor,
            run_id,
            limiter,
        }
    }

    pub fn technology(&self) -> &TechnologyDescriptor {
        self.descriptor
    }

    pub fn run_id(&self) -> &RunId {
        self.run_id
    }

    /// Run one provider call under the rate-limit retry policy.
    ///
    /// # Errors
    ///
    /// The converted error of a non-throttling failure, or `RetryExhausted`.
    pub fn rate_limited<T, F>(&mut self, op: &str, call: F) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, FetchError>,
    {
        self.limiter.call(op, call)
    }
}

/// What one `fetch` call collected.
#[derive(Debug, Clone, Default)]
pub struct FetchOutput {
    pub snapshots: Vec<ConfigSnapshot>,
    /// Failures at scopes narrower than the whole account/region call
    pub exceptions: ExceptionMap,
}

impl FetchOutput {
    pub fn new(snapshots: Vec<ConfigSnapshot>) -> Self {
        Self {
            snapshots,
            exceptions: ExceptionMap::new(),
        }
    }
}

/// Collects every item of one technology in one account/region.
pub trait Fetcher: Send + Sync {
    /// # Errors
    ///
    /// Any collection failure. The watcher records it at region scope and
    /// skips that region for the cycle.
    fn fetch(&self, ctx: &mut FetchContext<'_>, account: &str, region: &str)
        -> Result<FetchOutput>;
}

/// One item named by a batched listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub region: String,
}

impl ListEntry {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
        }
    }
}

/// What one `list` call found.
#[derive(Debug, Clone, Default)]
pub struct ListOutput {
    pub entries: Vec<ListEntry>,
    /// Regions or items the listing could not cover
    pub exceptions: ExceptionMap,
}

/// Two-phase collector for technologies that must list before fetching.
pub trait BatchFetcher: Send + Sync {
    /// Every item in `account`.
    ///
    /// A listing that misses part of the account (one region, say) returns
    /// what it found and records the rest in [`ListOutput::exceptions`].
    ///
    /// # Errors
    ///
    /// Any collection failure; the whole account is skipped for the cycle.
    fn list(&self, ctx: &mut FetchContext<'_>, account: &str) -> Result<ListOutput>;

    /// Current state of one listed item. `None` when it vanished since listing.
    ///
    /// # Errors
    ///
    /// Any collection failure; recorded at item scope.
    fn fetch_item(
        &self,
        ctx: &mut FetchContext<'_>,
        account: &str,
        entry: &ListEntry,
    ) -> Result<Option<ConfigSnapshot>>;
}
