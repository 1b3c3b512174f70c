//! Item-based nearest-neighbor collaborative filtering.
//!
//! Recommendations are anchored on a single pivot: the user's highest-rated
//! item. The neighbors of that item in the item × user rating space are
//! returned, nearest first. Users with several unrelated tastes still only
//! get neighbors of their favorite.

use crate::matrix::{CsrMatrix, IdMapper, InteractionMatrixBuilder};
use crate::neighbors::NearestNeighbors;
use std::sync::Arc;
use std::time::Instant;
use streamline_core::config::KnnConfig;
use streamline_core::{Interaction, ItemId, RecoResult, UserId};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ItemKnnModel {
    index: NearestNeighbors,
    matrix: Arc<CsrMatrix>,
    items: IdMapper,
    users: IdMapper,
}

impl ItemKnnModel {
    pub fn train(interactions: &[Interaction], config: &KnnConfig) -> RecoResult<Self> {
        config.validate()?;
        let start = Instant::now();

        let built = InteractionMatrixBuilder::item_ratings(interactions);
        let matrix = Arc::new(built.matrix);
        let index = NearestNeighbors::fit(
            matrix.clone(),
            config.k_neighbors,
            config.metric,
            config.algorithm,
        );

        info!(
            items = matrix.n_rows(),
            users = matrix.n_cols(),
            nnz = matrix.nnz(),
            metric = ?config.metric,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Item KNN model trained"
        );

        Ok(Self {
            index,
            matrix,
            items: built.items,
            users: built.users,
        })
    }

    /// Up to `k` items similar to the user's favorite, nearest first.
    ///
    /// `interactions` supplies the user's history. Returns an empty list when
    /// the user has no history or the favorite item was not seen at training
    /// time.
    pub fn recommend(&self, user_id: UserId, interactions: &[Interaction], k: usize) -> Vec<ItemId> {
        let Some(favorite) = favorite_item(user_id, interactions) else {
            debug!(user_id, "No history for user");
            return Vec::new();
        };
        self.similar_items(favorite, k)
            .into_iter()
            .map(|(item_id, _)| item_id)
            .collect()
    }

    /// Up to `k` neighbors of `item_id` with their distances.
    ///
    /// The index is asked for `k + 1` neighbors and the first hit is always
    /// dropped: it is the query item itself, which ranks ahead of any other
    /// item at distance zero.
    pub fn similar_items(&self, item_id: ItemId, k: usize) -> Vec<(ItemId, f64)> {
        let Some(row) = self.items.index(item_id) else {
            debug!(item_id, "Anchor item absent from trained catalog");
            return Vec::new();
        };

        self.index
            .kneighbors_of_row(row, Some(k.saturating_add(1)))
            .into_iter()
            .skip(1)
            .filter_map(|hit| self.items.id(hit.index).map(|id| (id, hit.distance)))
            .collect()
    }

    pub fn items(&self) -> &IdMapper {
        &self.items
    }

    pub fn users(&self) -> &IdMapper {
        &self.users
    }

    pub fn matrix(&self) -> &CsrMatrix {
        &self.matrix
    }

    pub fn index(&self) -> &NearestNeighbors {
        &self.index
    }
}

/// The user's highest-rated item. Ties go to the earliest row in
/// `interactions`.
pub fn favorite_item(user_id: UserId, interactions: &[Interaction]) -> Option<ItemId> {
    let mut history: Vec<&Interaction> = interactions
        .iter()
        .filter(|interaction| interaction.user_id == user_id)
        .collect();
    // Stable sort keeps input order among equal ratings.
    history.sort_by(|a, b| b.rating.total_cmp(&a.rating));
    history.first().map(|interaction| interaction.item_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use streamline_core::config::{DistanceMetric, SearchAlgorithm};

    fn config() -> KnnConfig {
        KnnConfig {
            k_neighbors: 5,
            metric: DistanceMetric::Cosine,
            algorithm: SearchAlgorithm::Brute,
        }
    }

    fn scenario() -> Vec<Interaction> {
        vec![
            Interaction::new(1, 10, 5.0),
            Interaction::new(1, 20, 3.0),
            Interaction::new(2, 10, 4.0),
        ]
    }

    fn catalog() -> Vec<Interaction> {
        vec![
            Interaction::new(1, 100, 5.0),
            Interaction::new(1, 101, 4.0),
            Interaction::new(1, 102, 1.0),
            Interaction::new(2, 100, 4.0),
            Interaction::new(2, 101, 5.0),
            Interaction::new(2, 103, 2.0),
            Interaction::new(3, 102, 5.0),
            Interaction::new(3, 103, 4.0),
            Interaction::new(3, 104, 3.0),
            Interaction::new(4, 104, 5.0),
            Interaction::new(4, 100, 1.0),
        ]
    }

    #[test]
    fn test_scenario_anchors_on_top_rated_item() {
        let data = scenario();
        let model = ItemKnnModel::train(&data, &config()).unwrap();
        assert_eq!(favorite_item(1, &data), Some(10));
        assert_eq!(model.recommend(1, &data, 1), vec![20]);
    }

    #[test]
    fn test_unknown_user_gets_empty_list() {
        let data = scenario();
        let model = ItemKnnModel::train(&data, &config()).unwrap();
        assert!(model.recommend(99, &data, 5).is_empty());
    }

    #[test]
    fn test_anchor_missing_from_training_gets_empty_list() {
        let model = ItemKnnModel::train(&scenario(), &config()).unwrap();
        let history = vec![Interaction::new(7, 555, 5.0)];
        assert!(model.recommend(7, &history, 3).is_empty());
    }

    #[test]
    fn test_favorite_tie_goes_to_first_row() {
        let data = vec![
            Interaction::new(1, 30, 4.0),
            Interaction::new(1, 40, 5.0),
            Interaction::new(1, 50, 5.0),
        ];
        assert_eq!(favorite_item(1, &data), Some(40));
        assert_eq!(favorite_item(2, &data), None);
    }

    #[test]
    fn test_excludes_anchor_and_has_no_duplicates() {
        let data = catalog();
        let model = ItemKnnModel::train(&data, &config()).unwrap();
        for user in 1..=4 {
            let favorite = favorite_item(user, &data).unwrap();
            let recs = model.recommend(user, &data, 3);
            assert_eq!(recs.len(), 3);
            assert!(!recs.contains(&favorite));
            let unique: HashSet<_> = recs.iter().collect();
            assert_eq!(unique.len(), recs.len());
        }
    }

    #[test]
    fn test_anchor_excluded_when_twin_item_ties() {
        // Both items rated only by user 1, so their vectors are proportional.
        // The anchor (10) gets the higher dense index.
        let data = vec![Interaction::new(1, 20, 3.0), Interaction::new(1, 10, 5.0)];
        let model = ItemKnnModel::train(&data, &config()).unwrap();
        let anchor = favorite_item(1, &data).unwrap();
        assert_eq!(anchor, 10);
        assert_eq!(model.items().index(10), Some(1));

        let recs = model.recommend(1, &data, 1);
        assert_eq!(recs, vec![20]);
        assert!(!recs.contains(&anchor));
        assert_eq!(model.similar_items(20, 5), vec![(10, 0.0)]);
    }

    #[test]
    fn test_huge_k_does_not_overflow() {
        let data = catalog();
        let model = ItemKnnModel::train(&data, &config()).unwrap();
        assert_eq!(model.recommend(1, &data, usize::MAX).len(), 4);
    }

    #[test]
    fn test_k_larger_than_catalog() {
        let data = catalog();
        let model = ItemKnnModel::train(&data, &config()).unwrap();
        // Five items in total, one of them is the anchor.
        assert_eq!(model.recommend(1, &data, 50).len(), 4);
    }

    #[test]
    fn test_similar_items_nearest_first() {
        let model = ItemKnnModel::train(&catalog(), &config()).unwrap();
        let similar = model.similar_items(100, 4);
        assert!(similar
            .windows(2)
            .all(|pair| pair[0].1 <= pair[1].1));
        // 100 and 101 share two high ratings from users 1 and 2.
        assert_eq!(similar[0].0, 101);
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let bad = KnnConfig {
            k_neighbors: 0,
            ..config()
        };
        assert!(ItemKnnModel::train(&scenario(), &bad).is_err());
    }
}
