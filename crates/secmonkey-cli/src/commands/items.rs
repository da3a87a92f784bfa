//! Items command
//!
//! Usage: secmonkey items --technology <T> [--json]

use super::{CommandResult, StoreArgs};
use clap::Args;

#[derive(Debug, Args)]
pub struct ItemsArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub technology: String,

    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: ItemsArgs) -> CommandResult {
    let setup = args.store.setup()?;
    let store = setup.open_store()?;
    let items = store.list_items(&args.technology)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("No {} items.", args.technology);
        return Ok(());
    }
    for item in &items {
        println!(
            "{:<8} {}  {}",
            if item.active { "active" } else { "deleted" },
            item.location,
            item.latest_durable_hash
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}
