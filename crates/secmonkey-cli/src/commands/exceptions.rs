//! Exceptions command
//!
//! Usage: secmonkey exceptions [--purge] [--json]

use super::{CommandResult, StoreArgs};
use chrono::Utc;
use clap::Args;
use secmonkey_core::exceptions::ExceptionLog;

#[derive(Debug, Args)]
pub struct ExceptionsArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Remove expired exceptions before listing
    #[arg(long)]
    pub purge: bool,

    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: ExceptionsArgs) -> CommandResult {
    let setup = args.store.setup()?;
    let mut store = setup.open_store()?;

    if args.purge {
        let purged = store.clear_expired_exceptions(Utc::now())?;
        tracing::info!(purged, "expired collection exceptions purged");
    }
    let exceptions = store.list_exceptions()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&exceptions)?);
        return Ok(());
    }
    if exceptions.is_empty() {
        println!("No collection exceptions.");
        return Ok(());
    }
    for e in &exceptions {
        println!(
            "{}  {}  {}: {} (run {}, expires {})",
            e.recorded_at.to_rfc3339(),
            e.record.scope,
            e.record.code,
            e.record.message,
            e.run_id,
            e.expires_at.to_rfc3339()
        );
    }
    Ok(())
}
