pub mod config;
pub mod dataset;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use dataset::{load_interactions, Catalog};
pub use error::{RecoError, RecoResult};
pub use types::{Interaction, ItemId, Movie, UserId};
