pub mod diff;
pub mod exceptions;
pub mod history;
pub mod ingest;
pub mod items;
pub mod migrate;
pub mod repair;

use clap::Args;
use secmonkey_core::config::{MonkeyConfig, DEFAULT_STORE_PATH};
use secmonkey_core::errors::{ExError, ExErrorKind};
use secmonkey_core::logging_facility::{init, Profile};
use secmonkey_core::technology::TechnologyDescriptor;
use secmonkey_store::SqliteStore;
use std::path::PathBuf;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Where the store lives: `--db` wins over the config file's `[store] path`.
#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long)]
    pub db: Option<PathBuf>,
}

pub struct Setup {
    pub config: Option<MonkeyConfig>,
    pub db: PathBuf,
}

impl StoreArgs {
    /// Load the config (if any), start logging with its profile and resolve
    /// the database path.
    pub fn setup(&self) -> Result<Setup, ExError> {
        let config = self.config.as_deref().map(MonkeyConfig::load).transpose()?;
        init(
            config
                .as_ref()
                .map(|c| c.logging.profile)
                .unwrap_or(Profile::Development),
        );
        let db = self
            .db
            .clone()
            .or_else(|| config.as_ref().map(|c| c.store.path.clone()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));
        Ok(Setup { config, db })
    }
}

impl Setup {
    pub fn open_store(&self) -> Result<SqliteStore, ExError> {
        SqliteStore::open(&self.db)
    }

    /// The config, for commands that cannot run without one.
    pub fn require_config(&self, command: &str) -> Result<&MonkeyConfig, ExError> {
        self.config.as_ref().ok_or_else(|| {
            ExError::new(ExErrorKind::InvalidInput)
                .with_op(command)
                .with_message("--config is required")
        })
    }
}

pub fn find_technology(config: &MonkeyConfig, index: &str) -> Result<TechnologyDescriptor, ExError> {
    config
        .technology_descriptors()?
        .into_iter()
        .find(|d| d.index == index)
        .ok_or_else(|| {
            ExError::new(ExErrorKind::UnknownTechnology)
                .with_technology(index)
                .with_message(format!("{index} is not configured"))
        })
}
