//! Ingest command
//!
//! Usage: secmonkey ingest --config <FILE> --technology <INDEX> --snapshots <FILE> [--json]
//!
//! Runs one watcher cycle for a configured technology, with current state
//! read from a JSON file instead of a provider:
//!
//! ```json
//! {
//!   "items": [
//!     {"account": "acctA", "region": "us-east-1", "name": "web", "config": {"ports": [80]}}
//!   ],
//!   "failures": [
//!     {"account": "acctB", "region": "us-east-1", "message": "AccessDenied"}
//!   ]
//! }
//! ```
//!
//! A failure without `region` or `name` fails the whole account; one with
//! `region` only fails that region; one with `name` fails only that item,
//! whether or not the item appears under `items`. Every `config` must be a
//! JSON object.

use super::{find_technology, CommandResult, StoreArgs};
use clap::Args;
use secmonkey_core::errors::{ExError, ExErrorKind, FetchError, Result};
use secmonkey_core::exceptions::ExceptionMap;
use secmonkey_core::model::{ConfigSnapshot, ConfigValue, ExceptionScope, Location};
use secmonkey_core::technology::UNIVERSAL_REGION;
use secmonkey_engine::{
    run_technology, BatchFetcher, ChangeReporter, CycleReport, FetchContext, FetchOutput,
    Fetcher, ListEntry, ListOutput, RunSettings, TechnologyRegistry,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Technology index to run
    #[arg(long)]
    pub technology: String,

    /// JSON file with the current items
    #[arg(long)]
    pub snapshots: PathBuf,

    /// Print the cycle report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotFile {
    #[serde(default)]
    items: Vec<ItemRecord>,
    #[serde(default)]
    failures: Vec<FailureRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ItemRecord {
    account: String,
    #[serde(default = "universal")]
    region: String,
    name: String,
    #[serde(default)]
    arn: Option<String>,
    config: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FailureRecord {
    account: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    name: Option<String>,
    message: String,
}

impl FailureRecord {
    /// A named failure without a region is for a universal item.
    fn region(&self) -> Option<&str> {
        match (&self.region, &self.name) {
            (Some(region), _) => Some(region.as_str()),
            (None, Some(_)) => Some(UNIVERSAL_REGION),
            (None, None) => None,
        }
    }

    fn to_fetch_error(&self) -> FetchError {
        FetchError::Unavailable(self.message.clone())
    }
}

fn universal() -> String {
    UNIVERSAL_REGION.to_string()
}

/// Serves one technology's items from a snapshot file, as either a
/// single-pass or a batched collector.
struct FileCollector {
    technology: String,
    snapshots: Vec<ConfigSnapshot>,
    failures: Vec<FailureRecord>,
}

impl FileCollector {
    fn load(path: &Path, technology: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("load_snapshots")
                .with_message(format!("{}: {}", path.display(), e))
        })?;
        let file: SnapshotFile = serde_json::from_str(&text)
            .map_err(|e| ExError::from(e).with_op("load_snapshots"))?;

        let snapshots = file
            .items
            .into_iter()
            .map(|item| {
                let location = Location::new(technology, &item.account, &item.region, &item.name);
                let config = ConfigValue::from(item.config);
                if config.as_map().is_none() {
                    return Err(ExError::new(ExErrorKind::TypeMismatch)
                        .with_op("load_snapshots")
                        .with_location(location.to_string())
                        .with_message(format!(
                            "config must be an object, got {}",
                            config.type_name()
                        )));
                }
                Ok(ConfigSnapshot {
                    location,
                    arn: item.arn,
                    config,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            technology: technology.to_string(),
            snapshots,
            failures: file.failures,
        })
    }

    fn failure(&self, account: &str, region: Option<&str>, name: Option<&str>) -> Option<FetchError> {
        self.failures
            .iter()
            .find(|f| f.account == account && f.region() == region && f.name.as_deref() == name)
            .map(FailureRecord::to_fetch_error)
    }

    /// Failures narrower than the call that reads them.
    ///
    /// For one region: its item failures. For a whole-account listing: every
    /// region and item failure of the account. Item failures are recorded
    /// whether or not the item has data in the file.
    fn scoped_failures(&self, account: &str, region: Option<&str>) -> ExceptionMap {
        let mut exceptions = ExceptionMap::new();
        for failure in self.failures.iter().filter(|f| f.account == account) {
            let (Some(failed_region), name) = (failure.region(), failure.name.as_deref()) else {
                continue;
            };
            let scope = match (name, region) {
                (Some(_), Some(r)) if r != failed_region => continue,
                (Some(name), _) => ExceptionScope::item(&Location::new(
                    &self.technology,
                    account,
                    failed_region,
                    name,
                )),
                (None, None) => ExceptionScope::region(&self.technology, account, failed_region),
                (None, Some(_)) => continue,
            };
            exceptions.record(scope, &ExError::from(failure.to_fetch_error()));
        }
        exceptions
    }

    fn account_failure(&self, account: &str) -> Option<FetchError> {
        self.failure(account, None, None)
    }
}

impl Fetcher for FileCollector {
    fn fetch(&self, ctx: &mut FetchContext<'_>, account: &str, region: &str) -> Result<FetchOutput> {
        ctx.rate_limited("read_snapshots", || {
            if let Some(err) = self
                .account_failure(account)
                .or_else(|| self.failure(account, Some(region), None))
            {
                return Err(err);
            }
            let mut output = FetchOutput {
                exceptions: self.scoped_failures(account, Some(region)),
                ..FetchOutput::default()
            };
            output.snapshots = self
                .snapshots
                .iter()
                .filter(|s| s.location.account == account && s.location.region == region)
                .filter(|s| !output.exceptions.covers(&s.location))
                .cloned()
                .collect();
            Ok(output)
        })
    }
}

impl BatchFetcher for FileCollector {
    fn list(&self, ctx: &mut FetchContext<'_>, account: &str) -> Result<ListOutput> {
        ctx.rate_limited("list_snapshots", || {
            if let Some(err) = self.account_failure(account) {
                return Err(err);
            }
            let mut output = ListOutput {
                exceptions: self.scoped_failures(account, None),
                ..ListOutput::default()
            };
            output.entries = self
                .snapshots
                .iter()
                .filter(|s| s.location.account == account)
                .filter(|s| !output.exceptions.covers(&s.location))
                .map(|s| ListEntry::new(&s.location.name, &s.location.region))
                .collect();
            Ok(output)
        })
    }

    fn fetch_item(
        &self,
        ctx: &mut FetchContext<'_>,
        account: &str,
        entry: &ListEntry,
    ) -> Result<Option<ConfigSnapshot>> {
        ctx.rate_limited("read_snapshot", || {
            if let Some(err) = self.failure(account, Some(&entry.region), Some(&entry.name)) {
                return Err(err);
            }
            Ok(self
                .snapshots
                .iter()
                .find(|s| {
                    s.location.account == account
                        && s.location.region == entry.region
                        && s.location.name == entry.name
                })
                .cloned())
        })
    }
}

/// Prints each finished cycle to stdout.
struct StdoutReporter {
    json: bool,
}

impl ChangeReporter for StdoutReporter {
    fn report(&mut self, report: &CycleReport) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(report)?);
        } else {
            print!("{}", report.render_change_summary());
        }
        Ok(())
    }
}

pub fn execute(args: IngestArgs) -> CommandResult {
    let setup = args.store.setup()?;
    let config = setup.require_config("ingest")?;
    let descriptor = find_technology(config, &args.technology)?;
    let collector = Arc::new(FileCollector::load(&args.snapshots, &descriptor.index)?);

    let mut builder = TechnologyRegistry::builder();
    if descriptor.is_batched() {
        builder.register_batched(descriptor, collector)?;
    } else {
        builder.register(descriptor, collector)?;
    }
    let registry = builder.build();

    let mut store = setup.open_store()?;
    let mut reporter = StdoutReporter { json: args.json };
    run_technology(
        &registry,
        &args.technology,
        &mut store,
        &mut reporter,
        &config.active_accounts(),
        &RunSettings::from_config(config),
    )?;
    Ok(())
}
