//! Common recommend interface over the three model families.
//!
//! Every trained model implements [`Recommender`], so the serving layer and
//! the evaluator can hold any of them behind one type. The output is a
//! [`Recommendations`] value that records whether it carries catalog ids
//! (popularity, item KNN) or dense matrix indices with scores
//! (factorization); [`Recommender::resolve_items`] performs the index → id
//! translation where one is needed.

use crate::factorization::FactorizationModel;
use crate::knn::ItemKnnModel;
use crate::popularity::PopularityModel;
use serde::Serialize;
use streamline_core::config::{ModelConfig, Strategy};
use streamline_core::{Interaction, ItemId, RecoError, RecoResult, UserId};

/// A dense item index with the raw score that ranked it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredIndex {
    pub index: usize,
    pub score: f64,
}

/// Ranked output of a recommender, best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Recommendations {
    /// External catalog ids.
    Items(Vec<ItemId>),
    /// Dense matrix indices; not catalog ids until resolved.
    Indices(Vec<ScoredIndex>),
}

impl Recommendations {
    pub fn len(&self) -> usize {
        match self {
            Recommendations::Items(items) => items.len(),
            Recommendations::Indices(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw scores, when the model produces them.
    pub fn scores(&self) -> Option<Vec<f64>> {
        match self {
            Recommendations::Items(_) => None,
            Recommendations::Indices(indices) => Some(indices.iter().map(|i| i.score).collect()),
        }
    }
}

/// A trained, read-only model that can answer top-k queries.
pub trait Recommender: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Top-`k` recommendations for `user_id`. `history` is the interaction
    /// log the model consults for per-user state it does not keep itself.
    fn recommend(
        &self,
        user_id: UserId,
        history: &[Interaction],
        k: usize,
    ) -> RecoResult<Recommendations>;

    /// Catalog id behind a dense index, for models that return indices.
    fn item_id_for_index(&self, _index: usize) -> Option<ItemId> {
        None
    }

    /// Translate recommendations to catalog ids, dropping indices that have
    /// no id.
    fn resolve_items(&self, recommendations: &Recommendations) -> Vec<ItemId> {
        match recommendations {
            Recommendations::Items(items) => items.clone(),
            Recommendations::Indices(indices) => indices
                .iter()
                .filter_map(|scored| self.item_id_for_index(scored.index))
                .collect(),
        }
    }
}

fn check_cutoff(k: usize) -> RecoResult<()> {
    if k == 0 {
        return Err(RecoError::InvalidCutoff(k));
    }
    Ok(())
}

impl Recommender for PopularityModel {
    fn strategy(&self) -> Strategy {
        Strategy::Popularity
    }

    fn recommend(&self, _user_id: UserId, _history: &[Interaction], k: usize) -> RecoResult<Recommendations> {
        check_cutoff(k)?;
        Ok(Recommendations::Items(PopularityModel::recommend(self, k)))
    }
}

impl Recommender for ItemKnnModel {
    fn strategy(&self) -> Strategy {
        Strategy::ItemKnn
    }

    fn recommend(&self, user_id: UserId, history: &[Interaction], k: usize) -> RecoResult<Recommendations> {
        check_cutoff(k)?;
        Ok(Recommendations::Items(ItemKnnModel::recommend(
            self, user_id, history, k,
        )))
    }
}

impl Recommender for FactorizationModel {
    fn strategy(&self) -> Strategy {
        Strategy::MatrixFactorization
    }

    fn recommend(&self, user_id: UserId, _history: &[Interaction], k: usize) -> RecoResult<Recommendations> {
        check_cutoff(k)?;
        Ok(Recommendations::Indices(FactorizationModel::recommend(
            self, user_id, k,
        )?))
    }

    fn item_id_for_index(&self, index: usize) -> Option<ItemId> {
        self.item_id(index)
    }
}

/// One trained model of any family.
#[derive(Debug, Clone)]
pub enum RecommenderModel {
    Popularity(PopularityModel),
    ItemKnn(ItemKnnModel),
    Factorization(FactorizationModel),
}

impl RecommenderModel {
    /// Train the family selected by `config.strategy`. Invalid options for
    /// that family fail here, before any fitting starts.
    pub fn train(interactions: &[Interaction], config: &ModelConfig) -> RecoResult<Self> {
        config.validate()?;
        let model = match config.strategy {
            Strategy::Popularity => RecommenderModel::Popularity(PopularityModel::train(interactions)),
            Strategy::ItemKnn => {
                RecommenderModel::ItemKnn(ItemKnnModel::train(interactions, &config.knn)?)
            }
            Strategy::MatrixFactorization => RecommenderModel::Factorization(
                FactorizationModel::train(interactions, &config.factorization)?,
            ),
        };
        Ok(model)
    }

    fn inner(&self) -> &dyn Recommender {
        match self {
            RecommenderModel::Popularity(model) => model,
            RecommenderModel::ItemKnn(model) => model,
            RecommenderModel::Factorization(model) => model,
        }
    }
}

impl Recommender for RecommenderModel {
    fn strategy(&self) -> Strategy {
        self.inner().strategy()
    }

    fn recommend(&self, user_id: UserId, history: &[Interaction], k: usize) -> RecoResult<Recommendations> {
        self.inner().recommend(user_id, history, k)
    }

    fn item_id_for_index(&self, index: usize) -> Option<ItemId> {
        self.inner().item_id_for_index(index)
    }
}
