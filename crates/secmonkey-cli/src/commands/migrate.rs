//! Migrate command
//!
//! Usage: secmonkey migrate [--config <FILE>] [--db <PATH>]

use super::{CommandResult, StoreArgs};
use clap::Args;
use secmonkey_store::migrations::applied_migrations;

#[derive(Debug, Args)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

pub fn execute(args: MigrateArgs) -> CommandResult {
    let setup = args.store.setup()?;
    // Opening applies pending migrations
    let store = setup.open_store()?;

    println!("Store ready: {}", setup.db.display());
    for id in applied_migrations(store.connection())? {
        println!("  applied: {id}");
    }
    Ok(())
}
