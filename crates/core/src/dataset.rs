//! CSV ingestion for rating interactions and movie metadata.
//!
//! Header names are canonicalized on read: MovieLens files (`userId`,
//! `movieId`) and already-canonical files (`user_id`, `item_id`) load into the
//! same [`Interaction`] rows. Unrecognized columns such as `timestamp` are
//! ignored.

use crate::error::{RecoError, RecoResult};
use crate::types::{Interaction, ItemId, Movie};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Load every interaction row from a ratings CSV file.
pub fn load_interactions(path: impl AsRef<Path>) -> RecoResult<Vec<Interaction>> {
    let path = path.as_ref();
    let reader = csv::Reader::from_path(path)?;
    let interactions = read_interactions(reader)?;

    info!(
        path = %path.display(),
        rows = interactions.len(),
        "Interactions loaded"
    );
    Ok(interactions)
}

/// Parse interaction rows from any CSV reader with a header line.
pub fn read_interactions<R: Read>(mut reader: csv::Reader<R>) -> RecoResult<Vec<Interaction>> {
    let interactions = reader
        .deserialize()
        .collect::<Result<Vec<Interaction>, csv::Error>>()?;

    if interactions.is_empty() {
        return Err(RecoError::Dataset(
            "interaction file contains no rows".to_string(),
        ));
    }
    Ok(interactions)
}

/// Item metadata store used to shape responses. Lookups never fail; a missing
/// item is reported as `None`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    movies: HashMap<ItemId, Movie>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a `movieId,title,genres` CSV file.
    pub fn load(path: impl AsRef<Path>) -> RecoResult<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let mut catalog = Self::new();
        for row in reader.deserialize() {
            let movie: Movie = row?;
            catalog.insert(movie);
        }

        info!(path = %path.display(), items = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    /// Insert metadata for an item. The first row seen for an id wins.
    pub fn insert(&mut self, movie: Movie) {
        self.movies.entry(movie.item_id).or_insert(movie);
    }

    pub fn lookup(&self, item_id: ItemId) -> Option<&Movie> {
        self.movies.get(&item_id)
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }
}

impl FromIterator<Movie> for Catalog {
    fn from_iter<I: IntoIterator<Item = Movie>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for movie in iter {
            catalog.insert(movie);
        }
        catalog
    }
}
