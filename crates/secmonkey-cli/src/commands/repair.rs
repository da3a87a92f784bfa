//! Repair command
//!
//! Usage: secmonkey repair --config <FILE> --technology <INDEX>
//!
//! Runs the same orphan repair a watcher performs before each cycle.

use super::{find_technology, CommandResult, StoreArgs};
use clap::Args;
use secmonkey_core::store::RevisionStore;

#[derive(Debug, Args)]
pub struct RepairArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub technology: String,
}

pub fn execute(args: RepairArgs) -> CommandResult {
    let setup = args.store.setup()?;
    let config = setup.require_config("repair")?;
    let descriptor = find_technology(config, &args.technology)?;
    let mut store = setup.open_store()?;

    let report = store.repair_orphans(
        &descriptor.index,
        &config.active_accounts(),
        &descriptor.ephemeral_paths,
    )?;

    if report.is_empty() {
        println!("No orphaned items.");
        return Ok(());
    }
    for location in &report.repaired {
        println!("repaired: {location}");
    }
    for location in &report.deleted {
        println!("deleted: {location}");
    }
    Ok(())
}
