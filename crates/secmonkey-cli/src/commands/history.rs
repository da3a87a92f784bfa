//! History command
//!
//! Usage: secmonkey history --technology <T> --account <A> [--region <R>] --name <N>

use super::{CommandResult, StoreArgs};
use clap::Args;
use secmonkey_core::errors::{ExError, ExErrorKind};
use secmonkey_core::model::Location;
use secmonkey_core::store::RevisionStore;
use secmonkey_core::technology::UNIVERSAL_REGION;

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub technology: String,

    #[arg(long)]
    pub account: String,

    #[arg(long, default_value = UNIVERSAL_REGION)]
    pub region: String,

    #[arg(long)]
    pub name: String,

    /// Print revisions as JSON, configs included
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: HistoryArgs) -> CommandResult {
    let setup = args.store.setup()?;
    let store = setup.open_store()?;
    let location = Location::new(&args.technology, &args.account, &args.region, &args.name);

    let item = store.get_item(&location)?.ok_or_else(|| {
        ExError::new(ExErrorKind::NotFound)
            .with_op("history")
            .with_location(location.to_string())
            .with_message("no such item")
    })?;
    let revisions = store.list_revisions(&location)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&revisions)?);
        return Ok(());
    }

    println!(
        "{} ({}, {} revisions)",
        location,
        if item.active { "active" } else { "deleted" },
        revisions.len()
    );
    for rev in &revisions {
        println!(
            "  #{:<5} {}  {:<9} {:<8} {}",
            rev.id,
            rev.created_at.to_rfc3339(),
            if rev.durable { "durable" } else { "ephemeral" },
            if rev.active { "active" } else { "" },
            rev.complete_hash
        );
    }
    Ok(())
}
