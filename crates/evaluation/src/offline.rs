//! Offline evaluation: sample users, ask a recommender for each of them and
//! average the ranking metrics against everything the user interacted with.

use crate::metrics::{ndcg_at_k, precision_at_k, recall_at_k};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use streamline_core::config::EvaluationConfig;
use streamline_core::{Interaction, ItemId, RecoError, RecoResult, UserId};
use streamline_models::Recommender;
use tracing::{debug, info};

/// Every item each user interacted with. Users keep first-seen order so a
/// seeded sample is reproducible.
#[derive(Debug, Clone, Default)]
pub struct GroundTruth {
    users: Vec<UserId>,
    items: HashMap<UserId, HashSet<ItemId>>,
}

impl GroundTruth {
    pub fn from_interactions(interactions: &[Interaction]) -> Self {
        let mut users = Vec::new();
        let mut items: HashMap<UserId, HashSet<ItemId>> = HashMap::new();
        for interaction in interactions {
            let seen = items.entry(interaction.user_id).or_default();
            if seen.is_empty() {
                users.push(interaction.user_id);
            }
            seen.insert(interaction.item_id);
        }
        Self { users, items }
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn items(&self, user_id: UserId) -> Option<&HashSet<ItemId>> {
        self.items.get(&user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Mean metrics over the users that received at least one recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub precision: f64,
    pub recall: f64,
    pub ndcg: f64,
    /// Users that contributed to the means.
    pub evaluated_users: usize,
    /// Users drawn by the sampler, including skipped ones.
    pub sampled_users: usize,
}

impl EvaluationResult {
    /// Metric name to value.
    pub fn as_map(&self) -> HashMap<&'static str, f64> {
        HashMap::from([
            ("precision", self.precision),
            ("recall", self.recall),
            ("ndcg", self.ndcg),
        ])
    }
}

pub struct Evaluator {
    sample_size: usize,
    rng: StdRng,
}

impl Evaluator {
    pub fn new(sample_size: usize) -> RecoResult<Self> {
        Self::build(sample_size, StdRng::from_entropy())
    }

    pub fn with_seed(sample_size: usize, seed: u64) -> RecoResult<Self> {
        Self::build(sample_size, StdRng::seed_from_u64(seed))
    }

    pub fn from_config(config: &EvaluationConfig) -> RecoResult<Self> {
        match config.seed {
            Some(seed) => Self::with_seed(config.sample_size, seed),
            None => Self::new(config.sample_size),
        }
    }

    fn build(sample_size: usize, rng: StdRng) -> RecoResult<Self> {
        if sample_size == 0 {
            return Err(RecoError::Config(
                "evaluation.sample_size must be at least 1".to_string(),
            ));
        }
        Ok(Self { sample_size, rng })
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Up to `sample_size` distinct users drawn uniformly without
    /// replacement. When there are not enough users, all of them are
    /// returned once each.
    pub fn sample_users(&mut self, truth: &GroundTruth) -> Vec<UserId> {
        let users = truth.users();
        if users.len() <= self.sample_size {
            return users.to_vec();
        }
        rand::seq::index::sample(&mut self.rng, users.len(), self.sample_size)
            .into_iter()
            .map(|position| users[position])
            .collect()
    }

    /// Score `recommend` over a sample of the users in `interactions`.
    ///
    /// Users for whom `recommend` returns an empty list are skipped rather
    /// than counted as zero. If nobody contributes, every metric is zero.
    pub fn evaluate<F>(
        &mut self,
        interactions: &[Interaction],
        k: usize,
        mut recommend: F,
    ) -> RecoResult<EvaluationResult>
    where
        F: FnMut(UserId, usize) -> RecoResult<Vec<ItemId>>,
    {
        if k == 0 {
            return Err(RecoError::InvalidCutoff(k));
        }
        let start = Instant::now();
        let truth = GroundTruth::from_interactions(interactions);
        let sampled = self.sample_users(&truth);

        let (mut precision, mut recall, mut ndcg) = (0.0, 0.0, 0.0);
        let mut evaluated = 0usize;

        for &user_id in &sampled {
            let Some(relevant) = truth.items(user_id) else {
                continue;
            };
            let recommended = recommend(user_id, k)?;
            if recommended.is_empty() {
                debug!(user_id, "No recommendations, user skipped");
                continue;
            }
            precision += precision_at_k(&recommended, relevant, k)?;
            recall += recall_at_k(&recommended, relevant, k)?;
            ndcg += ndcg_at_k(&recommended, relevant, k);
            evaluated += 1;
        }

        let result = if evaluated == 0 {
            EvaluationResult {
                precision: 0.0,
                recall: 0.0,
                ndcg: 0.0,
                evaluated_users: 0,
                sampled_users: sampled.len(),
            }
        } else {
            let n = evaluated as f64;
            EvaluationResult {
                precision: precision / n,
                recall: recall / n,
                ndcg: ndcg / n,
                evaluated_users: evaluated,
                sampled_users: sampled.len(),
            }
        };

        info!(
            k,
            sampled_users = result.sampled_users,
            evaluated_users = result.evaluated_users,
            precision = result.precision,
            recall = result.recall,
            ndcg = result.ndcg,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Offline evaluation finished"
        );
        Ok(result)
    }

    /// [`Evaluator::evaluate`] over a trained model. Dense indices returned
    /// by the model are resolved to catalog ids before scoring.
    pub fn evaluate_model<R>(
        &mut self,
        model: &R,
        interactions: &[Interaction],
        k: usize,
    ) -> RecoResult<EvaluationResult>
    where
        R: Recommender + ?Sized,
    {
        self.evaluate(interactions, k, |user_id, k| {
            let recommendations = model.recommend(user_id, interactions, k)?;
            Ok(model.resolve_items(&recommendations))
        })
    }
}
