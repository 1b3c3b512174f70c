//! Non-personalized baseline: items ranked by raw interaction count.

use serde::Serialize;
use std::collections::HashMap;
use streamline_core::{Interaction, ItemId};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemCount {
    pub item_id: ItemId,
    pub count: usize,
}

/// Items sorted by descending interaction count. Equal counts keep the order
/// in which the items were first seen.
#[derive(Debug, Clone, Default)]
pub struct PopularityModel {
    ranking: Vec<ItemCount>,
}

impl PopularityModel {
    pub fn train(interactions: &[Interaction]) -> Self {
        let mut positions: HashMap<ItemId, usize> = HashMap::new();
        let mut ranking: Vec<ItemCount> = Vec::new();

        for interaction in interactions {
            let position = *positions.entry(interaction.item_id).or_insert_with(|| {
                ranking.push(ItemCount {
                    item_id: interaction.item_id,
                    count: 0,
                });
                ranking.len() - 1
            });
            ranking[position].count += 1;
        }

        // Stable, so ties stay in first-seen order.
        ranking.sort_by(|a, b| b.count.cmp(&a.count));

        info!(items = ranking.len(), "Popularity ranking trained");
        Self { ranking }
    }

    /// The top `k` items. Returns fewer when the catalog is smaller than `k`.
    pub fn recommend(&self, k: usize) -> Vec<ItemId> {
        self.ranking
            .iter()
            .take(k)
            .map(|entry| entry.item_id)
            .collect()
    }

    pub fn ranking(&self) -> &[ItemCount] {
        &self.ranking
    }

    pub fn count(&self, item_id: ItemId) -> Option<usize> {
        self.ranking
            .iter()
            .find(|entry| entry.item_id == item_id)
            .map(|entry| entry.count)
    }
}
