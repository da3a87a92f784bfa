//! Location and exception-scope keys.

use crate::errors::{ExError, ExErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where in the fleet a resource lives: `(technology, account, region, name)`.
///
/// Ordering is lexicographic over the four parts, which is what every
/// classifier output is sorted by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub technology: String,
    pub account: String,
    pub region: String,
    pub name: String,
}

impl Location {
    pub fn new(
        technology: impl Into<String>,
        account: impl Into<String>,
        region: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            technology: technology.into(),
            account: account.into(),
            region: region.into(),
            name: name.into(),
        }
    }

    /// Scopes that cover this location, broadest first:
    /// `(tech)`, `(tech, account)`, `(tech, account, region)`, full location.
    pub fn scopes(&self) -> [ExceptionScope; 4] {
        [
            ExceptionScope::technology(&self.technology),
            ExceptionScope::account(&self.technology, &self.account),
            ExceptionScope::region(&self.technology, &self.account, &self.region),
            ExceptionScope::item(self),
        ]
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.technology, self.account, self.region, self.name
        )
    }
}

/// A location prefix of length 1 to 4 at which data collection failed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ExceptionScope(Vec<String>);

impl ExceptionScope {
    pub fn technology(technology: &str) -> Self {
        Self(vec![technology.to_string()])
    }

    pub fn account(technology: &str, account: &str) -> Self {
        Self(vec![technology.to_string(), account.to_string()])
    }

    pub fn region(technology: &str, account: &str, region: &str) -> Self {
        Self(vec![
            technology.to_string(),
            account.to_string(),
            region.to_string(),
        ])
    }

    pub fn item(location: &Location) -> Self {
        Self(vec![
            location.technology.clone(),
            location.account.clone(),
            location.region.clone(),
            location.name.clone(),
        ])
    }

    /// Build a scope from raw parts.
    ///
    /// # Errors
    ///
    /// `InvalidInput` unless there are between one and four parts.
    pub fn from_parts(parts: Vec<String>) -> Result<Self> {
        if parts.is_empty() || parts.len() > 4 {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("exception_scope")
                .with_message(format!(
                    "scope must have 1 to 4 parts, got {}",
                    parts.len()
                )));
        }
        Ok(Self(parts))
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true for a scope built through the constructors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn technology_part(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    /// True when this scope is a prefix of (or equal to) `location`.
    pub fn covers(&self, location: &Location) -> bool {
        let full = [
            location.technology.as_str(),
            location.account.as_str(),
            location.region.as_str(),
            location.name.as_str(),
        ];
        self.0.iter().zip(full.iter()).all(|(a, b)| a == b)
    }

    /// True when this scope is a prefix of (or equal to) `other`.
    pub fn contains(&self, other: &ExceptionScope) -> bool {
        self.len() <= other.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }
}

impl TryFrom<Vec<String>> for ExceptionScope {
    type Error = ExError;

    fn try_from(parts: Vec<String>) -> Result<Self> {
        Self::from_parts(parts)
    }
}

impl From<ExceptionScope> for Vec<String> {
    fn from(scope: ExceptionScope) -> Self {
        scope.0
    }
}

impl fmt::Display for ExceptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}
