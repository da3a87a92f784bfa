use crate::model::location::Location;
use crate::model::value::ConfigValue;
use serde::{Deserialize, Serialize};

/// One collector observation of a resource. Transient: produced by a
/// fetch, consumed by the classifier, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(flatten)]
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    pub config: ConfigValue,
}

impl ConfigSnapshot {
    pub fn new(location: Location, config: ConfigValue) -> Self {
        Self {
            location,
            arn: None,
            config,
        }
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }
}
