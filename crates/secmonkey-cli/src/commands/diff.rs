//! Diff command
//!
//! Usage: secmonkey diff <OLD> <NEW> [--json]

use super::CommandResult;
use clap::Args;
use secmonkey_core::diff::{field_changes, render_field_changes};
use secmonkey_core::errors::{ExError, ExErrorKind};
use secmonkey_core::logging_facility::{init, Profile};
use secmonkey_core::model::ConfigValue;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Previous configuration (JSON)
    pub old: PathBuf,

    /// Current configuration (JSON)
    pub new: PathBuf,

    /// Print field changes as JSON
    #[arg(long)]
    pub json: bool,
}

fn read_config(path: &Path) -> Result<ConfigValue, ExError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ExError::new(ExErrorKind::Io)
            .with_op("read_config")
            .with_message(format!("{}: {}", path.display(), e))
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| ExError::from(e).with_op("read_config"))?;
    Ok(ConfigValue::from(value))
}

pub fn execute(args: DiffArgs) -> CommandResult {
    init(Profile::Development);
    let old = read_config(&args.old)?;
    let new = read_config(&args.new)?;
    let changes = field_changes(&old, &new)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
    } else if changes.is_empty() {
        println!("No differences.");
    } else {
        print!("{}", render_field_changes(&changes));
    }
    Ok(())
}
