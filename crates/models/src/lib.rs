//! Recommendation models over a shared sparse interaction representation:
//! a popularity ranking, item-based nearest-neighbor collaborative filtering
//! and truncated-SVD matrix factorization.

pub mod factorization;
pub mod knn;
pub mod matrix;
pub mod neighbors;
pub mod popularity;
pub mod recommender;
pub mod svd;

pub use factorization::FactorizationModel;
pub use knn::{favorite_item, ItemKnnModel};
pub use matrix::{
    CsrMatrix, Duplicates, IdMapper, InteractionMatrix, InteractionMatrixBuilder, SparseRow,
};
pub use neighbors::{Neighbor, NearestNeighbors};
pub use popularity::{ItemCount, PopularityModel};
pub use recommender::{Recommendations, Recommender, RecommenderModel, ScoredIndex};
pub use svd::TruncatedSvd;
