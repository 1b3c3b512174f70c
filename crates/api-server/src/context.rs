//! Serving context: everything a request needs, built once per training run
//! and swapped in whole.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use streamline_core::config::AppConfig;
use streamline_core::dataset::load_interactions;
use streamline_core::{Catalog, Interaction, RecoResult};
use streamline_models::{Recommender, RecommenderModel};
use tracing::{info, warn};

/// A trained model together with the data it was trained on. Never mutated
/// after construction.
#[derive(Debug)]
pub struct ServingContext {
    pub model: RecommenderModel,
    pub interactions: Vec<Interaction>,
    pub catalog: Catalog,
    pub default_k: usize,
    pub trained_at: DateTime<Utc>,
}

impl ServingContext {
    /// Train the configured strategy on `interactions`.
    pub fn train(
        interactions: Vec<Interaction>,
        catalog: Catalog,
        config: &AppConfig,
    ) -> RecoResult<Self> {
        let start = Instant::now();
        let model = RecommenderModel::train(&interactions, &config.model)?;
        info!(
            strategy = %model.strategy(),
            interactions = interactions.len(),
            catalog_items = catalog.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Serving context built"
        );
        Ok(Self {
            model,
            interactions,
            catalog,
            default_k: config.evaluation.k,
            trained_at: Utc::now(),
        })
    }

    /// Read the configured data files and train. A missing or unreadable
    /// metadata file only costs display fields.
    pub fn load(config: &AppConfig) -> RecoResult<Self> {
        let interactions = load_interactions(&config.data.interactions_path)?;
        let catalog = match Catalog::load(&config.data.movies_path) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(
                    path = %config.data.movies_path,
                    error = %e,
                    "Metadata unavailable, responses will carry ids only"
                );
                Catalog::new()
            }
        };
        Self::train(interactions, catalog, config)
    }
}

/// Shared slot holding the active context. Readers clone the inner `Arc`, so
/// a request keeps its snapshot even if a new context is installed while it
/// runs.
#[derive(Clone, Default)]
pub struct ContextHandle {
    slot: Arc<RwLock<Option<Arc<ServingContext>>>>,
}

impl ContextHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<ServingContext>> {
        self.slot.read().clone()
    }

    /// Replace the active context, returning the previous one.
    pub fn install(&self, context: ServingContext) -> Option<Arc<ServingContext>> {
        let context = Arc::new(context);
        info!(
            strategy = %context.model.strategy(),
            trained_at = %context.trained_at,
            "Installing serving context"
        );
        self.slot.write().replace(context)
    }

    pub fn is_ready(&self) -> bool {
        self.slot.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamline_core::config::Strategy;

    fn context(strategy: Strategy) -> ServingContext {
        let mut config = AppConfig::default();
        config.model.strategy = strategy;
        let interactions = vec![
            Interaction::new(1, 10, 5.0),
            Interaction::new(1, 20, 3.0),
            Interaction::new(2, 10, 4.0),
        ];
        ServingContext::train(interactions, Catalog::new(), &config).unwrap()
    }

    #[test]
    fn test_handle_starts_empty() {
        let handle = ContextHandle::new();
        assert!(!handle.is_ready());
        assert!(handle.current().is_none());
    }

    #[test]
    fn test_install_swaps_without_touching_snapshots() {
        let handle = ContextHandle::new();
        assert!(handle.install(context(Strategy::ItemKnn)).is_none());
        assert!(handle.is_ready());

        let snapshot = handle.current().unwrap();
        let previous = handle.install(context(Strategy::Popularity)).unwrap();

        assert_eq!(snapshot.model.strategy(), Strategy::ItemKnn);
        assert!(Arc::ptr_eq(&snapshot, &previous));
        assert_eq!(handle.current().unwrap().model.strategy(), Strategy::Popularity);
    }

    #[test]
    fn test_clones_share_the_slot() {
        let handle = ContextHandle::new();
        let other = handle.clone();
        handle.install(context(Strategy::Popularity));
        assert!(other.is_ready());
    }

    #[test]
    fn test_default_k_comes_from_evaluation_config() {
        let ctx = context(Strategy::Popularity);
        assert_eq!(ctx.default_k, AppConfig::default().evaluation.k);
    }
}
