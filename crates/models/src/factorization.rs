//! Latent-factor recommender: truncated SVD of the implicit-feedback
//! user × item presence matrix.
//!
//! Unlike the neighbor recommender, results are dense item *indices* with
//! their raw scores, not catalog ids. Callers translate them with
//! [`FactorizationModel::item_id`] at the boundary. A user that was not seen
//! during training is a caller error ([`RecoError::UnknownUser`]), not an
//! empty result.

use crate::matrix::{CsrMatrix, IdMapper, InteractionMatrixBuilder};
use crate::recommender::ScoredIndex;
use crate::svd::TruncatedSvd;
use ndarray::Array1;
use std::time::Instant;
use streamline_core::config::FactorizationConfig;
use streamline_core::{Interaction, ItemId, RecoError, RecoResult, UserId};
use tracing::info;

#[derive(Debug, Clone)]
pub struct FactorizationModel {
    decomposition: TruncatedSvd,
    matrix: CsrMatrix,
    users: IdMapper,
    items: IdMapper,
}

impl FactorizationModel {
    pub fn train(interactions: &[Interaction], config: &FactorizationConfig) -> RecoResult<Self> {
        config.validate()?;
        let start = Instant::now();

        let built = InteractionMatrixBuilder::user_presence(interactions);
        let n_items = built.matrix.n_cols();
        if n_items == 0 {
            return Err(RecoError::Dataset(
                "cannot factorize an empty interaction matrix".to_string(),
            ));
        }
        if config.factors > n_items {
            return Err(RecoError::Config(format!(
                "factorization.factors ({}) exceeds the number of items ({n_items})",
                config.factors
            )));
        }

        let decomposition = TruncatedSvd::fit(&built.matrix, config.factors, config.iterations);

        info!(
            users = built.matrix.n_rows(),
            items = n_items,
            nnz = built.matrix.nnz(),
            factors = config.factors,
            iterations = config.iterations,
            top_singular_value = decomposition.singular_values().iter().next().copied().unwrap_or(0.0),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Matrix factorization model trained"
        );

        Ok(Self {
            decomposition,
            matrix: built.matrix,
            users: built.users,
            items: built.items,
        })
    }

    /// Affinity of every item for the user: the user's row projected into
    /// latent space and multiplied back out by the item factors.
    pub fn scores(&self, user_id: UserId) -> RecoResult<Array1<f64>> {
        let row = self.user_row(user_id)?;
        Ok(self.row_scores(row))
    }

    /// Up to `k` unseen items by descending score, as dense item indices.
    ///
    /// Items already in the user's row are masked out and never returned, so
    /// the result is shorter than `k` when fewer unseen items exist. Equal
    /// scores rank the higher index first.
    pub fn recommend(&self, user_id: UserId, k: usize) -> RecoResult<Vec<ScoredIndex>> {
        let row = self.user_row(user_id)?;
        let mut scores = self.row_scores(row);
        for (seen, _) in self.matrix.row(row).iter() {
            scores[seen] = f64::NEG_INFINITY;
        }

        let mut ranked: Vec<ScoredIndex> = scores
            .iter()
            .enumerate()
            .filter(|(_, score)| score.is_finite())
            .map(|(index, &score)| ScoredIndex { index, score })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.index.cmp(&a.index))
        });
        ranked.truncate(k);
        Ok(ranked)
    }

    /// Catalog id for a dense item index.
    pub fn item_id(&self, index: usize) -> Option<ItemId> {
        self.items.id(index)
    }

    /// Dense item index for a catalog id.
    pub fn item_index(&self, item_id: ItemId) -> Option<usize> {
        self.items.index(item_id)
    }

    pub fn n_users(&self) -> usize {
        self.matrix.n_rows()
    }

    pub fn n_items(&self) -> usize {
        self.matrix.n_cols()
    }

    pub fn decomposition(&self) -> &TruncatedSvd {
        &self.decomposition
    }

    pub fn matrix(&self) -> &CsrMatrix {
        &self.matrix
    }

    fn row_scores(&self, row: usize) -> Array1<f64> {
        let latent = self.decomposition.transform(&self.matrix.row(row));
        self.decomposition.inverse_transform(&latent)
    }

    fn user_row(&self, user_id: UserId) -> RecoResult<usize> {
        self.users.index(user_id).ok_or(RecoError::UnknownUser {
            user_id,
            trained_users: self.matrix.n_rows(),
        })
    }
}
