//! Explicit technology registry.
//!
//! Built once at startup from descriptors and their collectors, then
//! read-only. Nothing registers itself.

use crate::fetcher::{BatchFetcher, Fetcher};
use secmonkey_core::errors::{ExError, ExErrorKind, Result};
use secmonkey_core::technology::TechnologyDescriptor;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How a technology's current state is collected.
#[derive(Clone)]
pub enum Collector {
    Single(Arc<dyn Fetcher>),
    Batched(Arc<dyn BatchFetcher>),
}

#[derive(Clone)]
pub struct RegisteredTechnology {
    pub descriptor: TechnologyDescriptor,
    pub collector: Collector,
}

#[derive(Default)]
pub struct TechnologyRegistryBuilder {
    entries: BTreeMap<String, RegisteredTechnology>,
}

impl TechnologyRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a technology collected in one pass per account/region.
    ///
    /// # Errors
    ///
    /// - `DuplicateTechnology` if the index is already registered
    /// - `InvalidConfig` if the descriptor is invalid or declares a batch size
    pub fn register(
        &mut self,
        descriptor: TechnologyDescriptor,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<&mut Self> {
        if descriptor.is_batched() {
            return Err(ExError::new(ExErrorKind::InvalidConfig)
                .with_op("register_technology")
                .with_technology(descriptor.index.clone())
                .with_message("batched technology needs a batch fetcher"));
        }
        self.insert(descriptor, Collector::Single(fetcher))
    }

    /// Register a technology collected by listing, then fetching in batches.
    ///
    /// # Errors
    ///
    /// - `DuplicateTechnology` if the index is already registered
    /// - `InvalidConfig` if the descriptor is invalid or has no batch size
    pub fn register_batched(
        &mut self,
        descriptor: TechnologyDescriptor,
        fetcher: Arc<dyn BatchFetcher>,
    ) -> Result<&mut Self> {
        if !descriptor.is_batched() {
            return Err(ExError::new(ExErrorKind::InvalidConfig)
                .with_op("register_technology")
                .with_technology(descriptor.index.clone())
                .with_message("batch fetcher registered without a batch size"));
        }
        self.insert(descriptor, Collector::Batched(fetcher))
    }

    fn insert(
        &mut self,
        descriptor: TechnologyDescriptor,
        collector: Collector,
    ) -> Result<&mut Self> {
        descriptor.validate()?;
        if self.entries.contains_key(&descriptor.index) {
            return Err(ExError::new(ExErrorKind::DuplicateTechnology)
                .with_op("register_technology")
                .with_technology(descriptor.index.clone())
                .with_message(format!("technology already registered: {}", descriptor.index)));
        }
        self.entries.insert(
            descriptor.index.clone(),
            RegisteredTechnology {
                descriptor,
                collector,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> TechnologyRegistry {
        TechnologyRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable map from technology index to descriptor and collector.
#[derive(Clone, Default)]
pub struct TechnologyRegistry {
    entries: BTreeMap<String, RegisteredTechnology>,
}

impl TechnologyRegistry {
    pub fn builder() -> TechnologyRegistryBuilder {
        TechnologyRegistryBuilder::new()
    }

    /// # Errors
    ///
    /// `UnknownTechnology` if nothing is registered under `index`.
    pub fn get(&self, index: &str) -> Result<&RegisteredTechnology> {
        self.entries.get(index).ok_or_else(|| {
            ExError::new(ExErrorKind::UnknownTechnology)
                .with_op("lookup_technology")
                .with_technology(index)
                .with_message(format!("no technology registered as {index}"))
        })
    }

    /// Registered indexes, sorted.
    pub fn indexes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{FetchContext, FetchOutput, ListEntry, ListOutput};
    use secmonkey_core::model::ConfigSnapshot;

    struct Empty;

    impl Fetcher for Empty {
        fn fetch(&self, _: &mut FetchContext<'_>, _: &str, _: &str) -> Result<FetchOutput> {
            Ok(FetchOutput::default())
        }
    }

    impl BatchFetcher for Empty {
        fn list(&self, _: &mut FetchContext<'_>, _: &str) -> Result<ListOutput> {
            Ok(ListOutput::default())
        }

        fn fetch_item(
            &self,
            _: &mut FetchContext<'_>,
            _: &str,
            _: &ListEntry,
        ) -> Result<Option<ConfigSnapshot>> {
            Ok(None)
        }
    }

    fn sg() -> TechnologyDescriptor {
        TechnologyDescriptor::new("securitygroup", "Security Group", "Security Groups")
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut builder = TechnologyRegistry::builder();
        builder.register(sg(), Arc::new(Empty)).unwrap();
        let err = builder.register(sg(), Arc::new(Empty)).err().unwrap();
        assert_eq!(err.kind(), ExErrorKind::DuplicateTechnology);
    }

    #[test]
    fn test_unknown_lookup() {
        let registry = TechnologyRegistry::builder().build();
        let err = registry.get("s3").err().unwrap();
        assert_eq!(err.kind(), ExErrorKind::UnknownTechnology);
    }

    #[test]
    fn test_batched_requires_batch_size() {
        let mut builder = TechnologyRegistry::builder();
        let err = builder.register_batched(sg(), Arc::new(Empty)).err().unwrap();
        assert_eq!(err.kind(), ExErrorKind::InvalidConfig);

        let err = builder
            .register(sg().with_batch_size(10), Arc::new(Empty))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ExErrorKind::InvalidConfig);
    }

    #[test]
    fn test_indexes_sorted() {
        let mut builder = TechnologyRegistry::builder();
        builder
            .register(TechnologyDescriptor::new("s3", "Bucket", "Buckets"), Arc::new(Empty))
            .unwrap();
        builder.register(sg(), Arc::new(Empty)).unwrap();
        builder
            .register_batched(
                TechnologyDescriptor::new("repository", "Repo", "Repos").with_batch_size(2),
                Arc::new(Empty),
            )
            .unwrap();
        let registry = builder.build();
        assert_eq!(
            registry.indexes().collect::<Vec<_>>(),
            vec!["repository", "s3", "securitygroup"]
        );
        assert!(matches!(
            registry.get("repository").unwrap().collector,
            Collector::Batched(_)
        ));
    }
}
