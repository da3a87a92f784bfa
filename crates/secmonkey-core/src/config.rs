//! TOML configuration.
//!
//! Parsing is two-phase: `toml` + `serde` produce the raw structure, then
//! [`MonkeyConfig::validate`] checks cross-field rules and reports the first
//! problem as `InvalidConfig`.

use crate::errors::{ExError, ExErrorKind, Result};
use crate::logging_facility::Profile;
use crate::retry::RateLimitPolicy;
use crate::technology::{TechnologyDescriptor, UNIVERSAL_REGION};
use secmonkey_core_types::Sensitive;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_STORE_PATH: &str = ".secmonkey/store.db";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonkeyConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub exceptions: ExceptionsSection,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub technologies: Vec<TechnologyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    #[serde(default)]
    pub profile: Profile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    #[serde(default = "default_max_throttle_retries")]
    pub max_throttle_retries: u32,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_delay_secs: default_max_delay_secs(),
            max_throttle_retries: default_max_throttle_retries(),
        }
    }
}

fn default_max_delay_secs() -> u64 {
    4
}

fn default_max_throttle_retries() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExceptionsSection {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
}

impl Default for ExceptionsSection {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
        }
    }
}

fn default_ttl_hours() -> i64 {
    24
}

/// Longest accepted exception time-to-live: ten years.
pub const MAX_EXCEPTION_TTL_HOURS: i64 = 24 * 366 * 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    pub name: String,
    /// Provider account number; never logged
    pub identifier: Sensitive<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TechnologyConfig {
    pub index: String,
    pub singular: String,
    pub plural: String,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub ephemeral_paths: Vec<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

impl TechnologyConfig {
    /// # Errors
    ///
    /// `InvalidPath` for a malformed ephemeral path.
    pub fn to_descriptor(&self) -> Result<TechnologyDescriptor> {
        let regions = if self.regions.is_empty() {
            vec![UNIVERSAL_REGION.to_string()]
        } else {
            self.regions.clone()
        };
        let mut descriptor =
            TechnologyDescriptor::new(&self.index, &self.singular, &self.plural)
                .with_regions(regions)
                .with_ephemeral_paths(&self.ephemeral_paths)?;
        descriptor.batch_size = self.batch_size;
        Ok(descriptor)
    }
}

impl MonkeyConfig {
    /// Parse and validate TOML text.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for syntax errors, unknown keys or failed validation.
    pub fn parse(text: &str) -> Result<Self> {
        let config: MonkeyConfig = toml::from_str(text).map_err(|e| {
            ExError::new(ExErrorKind::InvalidConfig)
                .with_op("parse_config")
                .with_message(e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, otherwise as [`parse`](Self::parse).
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("load_config")
                .with_message(format!("{}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// # Errors
    ///
    /// `InvalidConfig` (or `InvalidPath`) describing the first rule broken.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| {
            ExError::new(ExErrorKind::InvalidConfig)
                .with_op("validate_config")
                .with_message(msg)
        };

        let mut seen = BTreeSet::new();
        for account in &self.accounts {
            if account.name.trim().is_empty() {
                return Err(invalid("account name must not be empty".into()));
            }
            if !seen.insert(account.name.as_str()) {
                return Err(invalid(format!("duplicate account name: {}", account.name)));
            }
        }

        let mut seen = BTreeSet::new();
        for tech in &self.technologies {
            if !seen.insert(tech.index.as_str()) {
                return Err(invalid(format!("duplicate technology index: {}", tech.index)));
            }
            tech.to_descriptor()?.validate()?;
        }

        if self.retry.max_delay_secs == 0 {
            return Err(invalid("retry.max_delay_secs must be at least 1".into()));
        }
        if self.exceptions.ttl_hours <= 0 {
            return Err(invalid("exceptions.ttl_hours must be positive".into()));
        }
        if self.exceptions.ttl_hours > MAX_EXCEPTION_TTL_HOURS {
            return Err(invalid(format!(
                "exceptions.ttl_hours must be at most {MAX_EXCEPTION_TTL_HOURS}"
            )));
        }
        Ok(())
    }

    /// Descriptors for every configured technology, in file order.
    ///
    /// # Errors
    ///
    /// `InvalidPath` for a malformed ephemeral path.
    pub fn technology_descriptors(&self) -> Result<Vec<TechnologyDescriptor>> {
        self.technologies
            .iter()
            .map(TechnologyConfig::to_descriptor)
            .collect()
    }

    /// Names of accounts that take part in runs.
    pub fn active_accounts(&self) -> Vec<String> {
        self.accounts
            .iter()
            .filter(|a| a.active)
            .map(|a| a.name.clone())
            .collect()
    }

    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            max_delay: Duration::from_secs(self.retry.max_delay_secs),
            max_throttle_retries: self.retry.max_throttle_retries,
        }
    }

    pub fn exception_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.exceptions.ttl_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[store]
path = "/tmp/monkey.db"

[logging]
profile = "production"

[retry]
max_delay_secs = 8
max_throttle_retries = 0

[[accounts]]
name = "acctA"
identifier = "012345678910"

[[accounts]]
name = "acctB"
identifier = "109876543210"
active = false

[[technologies]]
index = "securitygroup"
singular = "Security Group"
plural = "Security Groups"
regions = ["us-east-1", "us-west-2"]
ephemeral_paths = ["assigned_to"]

[[technologies]]
index = "repository"
singular = "Repository"
plural = "Repositories"
batch_size = 50
"#;

    #[test]
    fn test_parse_full_sample() {
        let cfg = MonkeyConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.store.path, PathBuf::from("/tmp/monkey.db"));
        assert_eq!(cfg.logging.profile, Profile::Production);
        assert_eq!(cfg.active_accounts(), vec!["acctA".to_string()]);
        assert_eq!(cfg.rate_limit_policy().max_delay, Duration::from_secs(8));
        assert_eq!(cfg.exceptions.ttl_hours, 24);

        let techs = cfg.technology_descriptors().unwrap();
        assert_eq!(techs[0].ephemeral_paths.len(), 1);
        assert_eq!(techs[1].regions, vec!["universal".to_string()]);
        assert_eq!(techs[1].batch_size, Some(50));
    }

    #[test]
    fn test_identifier_is_redacted_in_debug() {
        let cfg = MonkeyConfig::parse(SAMPLE).unwrap();
        let rendered = format!("{:?}", cfg.accounts[0]);
        assert!(!rendered.contains("012345678910"));
        assert_eq!(cfg.accounts[0].identifier.expose(), "012345678910");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = MonkeyConfig::parse("").unwrap();
        assert_eq!(cfg.store.path, PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(cfg.rate_limit_policy(), RateLimitPolicy::default());
        assert!(cfg.technologies.is_empty());
    }

    #[test]
    fn test_duplicate_technology_rejected() {
        let text = r#"
[[technologies]]
index = "s3"
singular = "Bucket"
plural = "Buckets"

[[technologies]]
index = "s3"
singular = "Bucket"
plural = "Buckets"
"#;
        let err = MonkeyConfig::parse(text).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidConfig);
        assert!(err.message().contains("duplicate technology"));
    }

    #[test]
    fn test_bad_ephemeral_path_rejected() {
        let text = r#"
[[technologies]]
index = "vpn"
singular = "VPN"
plural = "VPNs"
ephemeral_paths = ["tunnels..status"]
"#;
        let err = MonkeyConfig::parse(text).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidPath);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = MonkeyConfig::parse("[store]\nfile = \"x\"\n").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidConfig);
    }

    #[test]
    fn test_huge_ttl_rejected() {
        let err = MonkeyConfig::parse("[exceptions]\nttl_hours = 10000000000\n").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidConfig);
    }

    #[test]
    fn test_longest_ttl_accepted() {
        let text = format!("[exceptions]\nttl_hours = {MAX_EXCEPTION_TTL_HOURS}\n");
        let cfg = MonkeyConfig::parse(&text).unwrap();
        assert!(chrono::Utc::now()
            .checked_add_signed(cfg.exception_ttl())
            .is_some());
    }

    #[test]
    fn test_zero_max_delay_rejected() {
        let err = MonkeyConfig::parse("[retry]\nmax_delay_secs = 0\nmax_throttle_retries = 0\n")
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidConfig);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let text = r#"
[[technologies]]
index = "repo"
singular = "Repo"
plural = "Repos"
batch_size = 0
"#;
        assert_eq!(
            MonkeyConfig::parse(text).unwrap_err().kind(),
            ExErrorKind::InvalidConfig
        );
    }
}
