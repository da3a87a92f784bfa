//! Security Monkey engine: watcher orchestration
//!
//! Drives one technology through a poll cycle: repair and load previous
//! state, collect current state from a [`Fetcher`] or [`BatchFetcher`],
//! classify, persist through a `RevisionStore`, then hand the
//! [`CycleReport`] to a [`ChangeReporter`].

pub mod batched;
pub mod fetcher;
pub mod registry;
pub mod report;
pub mod runner;
pub mod watcher;

pub use batched::{BatchStep, BatchedWatcher};
pub use fetcher::{
    BatchFetcher, FetchContext, FetchOutput, Fetcher, ListEntry, ListOutput,
};
pub use registry::{Collector, RegisteredTechnology, TechnologyRegistry, TechnologyRegistryBuilder};
pub use report::{ChangeReporter, CycleReport, NoopReporter};
pub use runner::{run_technology, RunSettings};
pub use watcher::{Watcher, WatcherState};
