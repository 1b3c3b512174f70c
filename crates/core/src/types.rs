use serde::{Deserialize, Serialize};

/// External user identifier as it appears in the ratings file.
pub type UserId = i64;

/// External catalog identifier (MovieLens `movieId`).
pub type ItemId = i64;

/// One recorded rating event. The collection is an unordered multiset; the
/// same (user, item) pair may appear more than once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(alias = "userId")]
    pub user_id: UserId,
    #[serde(alias = "movieId")]
    pub item_id: ItemId,
    pub rating: f64,
}

impl Interaction {
    pub fn new(user_id: UserId, item_id: ItemId, rating: f64) -> Self {
        Self {
            user_id,
            item_id,
            rating,
        }
    }
}

/// Display metadata for a catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(alias = "movieId")]
    pub item_id: ItemId,
    pub title: String,
    #[serde(default)]
    pub genres: Option<String>,
}
