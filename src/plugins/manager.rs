use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::error;

use super::sources::{EncryptedApiStrategy, HtmlSelectorStrategy, PayloadDecryptor};
use super::traits::SourceStrategy;
use crate::fetch::HttpFetcher;
use crate::models::{SourceKind, Target};
use crate::scheduler::ScanJob;

pub type SourceStrategyRef = Arc<dyn SourceStrategy>;

/// Registry of source strategies keyed by [`SourceKind`].
#[derive(Clone)]
pub struct PluginManager {
    sources: Arc<RwLock<HashMap<SourceKind, SourceStrategyRef>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            sources: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Manager with the HTML and encrypted API strategies sharing one fetcher.
    pub async fn with_default_sources(
        fetcher: HttpFetcher,
        decryptor: Arc<dyn PayloadDecryptor>,
    ) -> Self {
        let manager = Self::new();
        manager
            .register_source(Arc::new(HtmlSelectorStrategy::new(fetcher.clone())))
            .await;
        manager
            .register_source(Arc::new(EncryptedApiStrategy::new(fetcher, decryptor)))
            .await;
        manager
    }

    /// Register a strategy, replacing any earlier one of the same kind
    pub async fn register_source(&self, strategy: SourceStrategyRef) {
        let mut sources = self.sources.write().await;
        sources.insert(strategy.kind(), strategy);
    }

    pub async fn has_source(&self, kind: SourceKind) -> bool {
        let sources = self.sources.read().await;
        sources.contains_key(&kind)
    }

    pub async fn strategy_for(&self, kind: SourceKind) -> Option<SourceStrategyRef> {
        let sources = self.sources.read().await;
        sources.get(&kind).cloned()
    }

    /// List all registered source kinds
    pub async fn list_source_kinds(&self) -> Vec<SourceKind> {
        let sources = self.sources.read().await;
        sources.keys().copied().collect()
    }

    /// Pair each target with its strategy. Targets of an unregistered kind
    /// are logged and returned separately.
    pub async fn resolve(&self, targets: Vec<Target>) -> (Vec<ScanJob>, Vec<Target>) {
        let sources = self.sources.read().await;
        let mut jobs = Vec::with_capacity(targets.len());
        let mut unresolved = Vec::new();

        for target in targets {
            match sources.get(&target.kind()) {
                Some(strategy) => jobs.push(ScanJob {
                    target,
                    strategy: strategy.clone(),
                }),
                None => {
                    error!(url = %target.url, kind = %target.kind(), "no source strategy registered");
                    unresolved.push(target);
                }
            }
        }

        (jobs, unresolved)
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}
