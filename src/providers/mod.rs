//! Provider interfaces for external data sources.
//!
//! A provider is one concrete data source serving a stage. Providers are
//! stateless, safe to retry with identical input, and may be invoked
//! concurrently. Concrete scraping or parsing logic lives behind this
//! trait; the pipeline core only sees classified results.

pub mod http;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{FetchError, Payload, StageDef};

// Re-export the HTTP provider
pub use http::HttpJsonProvider;

/// Query passed to every provider call within a run.
#[derive(Debug, Clone)]
pub struct FetchQuery {
    /// The stage this call serves
    pub stage: String,

    /// Lookback window for time-bounded sources
    pub hours_back: u32,
}

impl FetchQuery {
    pub fn new(stage: impl Into<String>, hours_back: u32) -> Self {
        Self {
            stage: stage.into(),
            hours_back,
        }
    }
}

/// Trait for external data sources.
///
/// `fetch` must tolerate being invoked multiple times per run with
/// identical input and must not produce inconsistent side effects across
/// repeated calls.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider id, referenced by stage definitions
    fn id(&self) -> &str;

    /// Fetch data for a query, classifying any failure
    async fn fetch(&self, query: &FetchQuery) -> Result<Payload, FetchError>;
}

/// Registry binding provider ids in stage definitions to implementations.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own id. Later registrations replace
    /// earlier ones.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(id).cloned()
    }

    /// Resolve a stage's provider ids into implementations, preserving
    /// priority order. Fails on the first unknown id.
    pub fn bind(&self, stage: &StageDef) -> Result<Vec<Arc<dyn Provider>>> {
        stage
            .providers
            .iter()
            .map(|id| {
                self.get(id).ok_or_else(|| {
                    anyhow::anyhow!("Stage '{}' references unknown provider '{}'", stage.name, id)
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CombinationMode, Criticality, Item};

    struct FixedProvider {
        id: String,
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn fetch(&self, _query: &FetchQuery) -> Result<Payload, FetchError> {
            Ok(Payload::Items(vec![Item::new("headline", self.id())]))
        }
    }

    #[test]
    fn test_bind_preserves_priority_order() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FixedProvider { id: "b".into() }));
        registry.register(Arc::new(FixedProvider { id: "a".into() }));

        let stage = StageDef {
            name: "news".to_string(),
            criticality: Criticality::NonCritical,
            mode: CombinationMode::MergeDedup,
            providers: vec!["a".to_string(), "b".to_string()],
        };

        let bound = registry.bind(&stage).unwrap();
        assert_eq!(bound[0].id(), "a");
        assert_eq!(bound[1].id(), "b");
    }

    #[test]
    fn test_bind_unknown_provider_fails() {
        let registry = ProviderRegistry::new();
        let stage = StageDef {
            name: "news".to_string(),
            criticality: Criticality::NonCritical,
            mode: CombinationMode::FirstSuccess,
            providers: vec!["missing".to_string()],
        };

        assert!(registry.bind(&stage).is_err());
    }
}
