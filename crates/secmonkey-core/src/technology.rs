//! Technology descriptors.

use crate::errors::{ExError, ExErrorKind, Result};
use crate::hashing::EphemeralPath;
use serde::Serialize;

pub const UNIVERSAL_REGION: &str = "universal";

/// Static description of one tracked resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechnologyDescriptor {
    /// Stable key, e.g. `securitygroup`
    pub index: String,
    pub singular: String,
    pub plural: String,
    /// Regions polled each cycle; global services use `universal`
    pub regions: Vec<String>,
    pub ephemeral_paths: Vec<EphemeralPath>,
    /// Items per batch; `Some` selects the batched watcher
    pub batch_size: Option<usize>,
}

impl TechnologyDescriptor {
    pub fn new(
        index: impl Into<String>,
        singular: impl Into<String>,
        plural: impl Into<String>,
    ) -> Self {
        Self {
            index: index.into(),
            singular: singular.into(),
            plural: plural.into(),
            regions: vec![UNIVERSAL_REGION.to_string()],
            ephemeral_paths: Vec::new(),
            batch_size: None,
        }
    }

    pub fn with_regions<S: Into<String>>(mut self, regions: impl IntoIterator<Item = S>) -> Self {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    /// # Errors
    ///
    /// `InvalidPath` if any path is malformed.
    pub fn with_ephemeral_paths<S: AsRef<str>>(mut self, paths: &[S]) -> Result<Self> {
        self.ephemeral_paths = EphemeralPath::parse_all(paths)?;
        Ok(self)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn is_batched(&self) -> bool {
        self.batch_size.is_some()
    }

    /// # Errors
    ///
    /// `InvalidConfig` for an empty index or region list, or a zero batch size.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| {
            Err(ExError::new(ExErrorKind::InvalidConfig)
                .with_op("validate_technology")
                .with_technology(self.index.clone())
                .with_message(msg))
        };
        if self.index.trim().is_empty() {
            return fail("technology index must not be empty".into());
        }
        if self.regions.is_empty() {
            return fail(format!("{} declares no regions", self.index));
        }
        if self.batch_size == Some(0) {
            return fail(format!("{} has batch_size 0", self.index));
        }
        Ok(())
    }
}
