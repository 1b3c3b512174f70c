//! Exact nearest-neighbor search over the rows of a sparse matrix.

use crate::matrix::{CsrMatrix, SparseRow};
use serde::Serialize;
use std::sync::Arc;
use streamline_core::config::{DistanceMetric, SearchAlgorithm};
use tracing::{debug, warn};

/// One search hit: a row of the fitted matrix and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

/// Neighbor index over the rows of a shared sparse matrix.
#[derive(Debug, Clone)]
pub struct NearestNeighbors {
    n_neighbors: usize,
    metric: DistanceMetric,
    algorithm: SearchAlgorithm,
    samples: Arc<CsrMatrix>,
    norms: Vec<f64>,
}

impl NearestNeighbors {
    pub fn fit(
        samples: Arc<CsrMatrix>,
        n_neighbors: usize,
        metric: DistanceMetric,
        algorithm: SearchAlgorithm,
    ) -> Self {
        match algorithm {
            SearchAlgorithm::BallTree | SearchAlgorithm::KdTree => warn!(
                ?algorithm,
                "Tree search is not available for sparse input, using brute force"
            ),
            SearchAlgorithm::Auto | SearchAlgorithm::Brute => {
                debug!(?algorithm, "Using brute force neighbor search")
            }
        }

        let norms = (0..samples.n_rows())
            .map(|row| samples.row(row).norm())
            .collect();

        Self {
            n_neighbors,
            metric,
            algorithm,
            samples,
            norms,
        }
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn algorithm(&self) -> SearchAlgorithm {
        self.algorithm
    }

    pub fn n_samples(&self) -> usize {
        self.samples.n_rows()
    }

    /// Return up to `n_neighbors` rows closest to `query`, nearest first.
    /// Falls back to the fitted default when `n_neighbors` is `None`. Rows at
    /// equal distance keep their index order.
    pub fn kneighbors(&self, query: &SparseRow<'_>, n_neighbors: Option<usize>) -> Vec<Neighbor> {
        let wanted = n_neighbors
            .unwrap_or(self.n_neighbors)
            .min(self.samples.n_rows());
        let query_norm = query.norm();

        let mut hits: Vec<Neighbor> = (0..self.samples.n_rows())
            .map(|index| Neighbor {
                index,
                distance: self.distance(query, query_norm, index),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(wanted);
        hits
    }

    /// Neighbors of fitted row `row`, nearest first. The row itself is at
    /// distance zero and comes before any other row at that distance, so it
    /// is always the first hit.
    pub fn kneighbors_of_row(&self, row: usize, n_neighbors: Option<usize>) -> Vec<Neighbor> {
        let wanted = n_neighbors
            .unwrap_or(self.n_neighbors)
            .min(self.samples.n_rows());
        let query = self.samples.row(row);
        let query_norm = self.norms[row];

        let mut hits: Vec<Neighbor> = (0..self.samples.n_rows())
            .map(|index| Neighbor {
                index,
                distance: if index == row {
                    0.0
                } else {
                    self.distance(&query, query_norm, index)
                },
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| (a.index != row).cmp(&(b.index != row)))
                .then_with(|| a.index.cmp(&b.index))
        });
        hits.truncate(wanted);
        hits
    }

    fn distance(&self, query: &SparseRow<'_>, query_norm: f64, index: usize) -> f64 {
        let row = self.samples.row(index);
        match self.metric {
            DistanceMetric::Cosine => {
                let denominator = query_norm * self.norms[index];
                if denominator == 0.0 {
                    return 1.0;
                }
                (1.0 - query.dot(&row) / denominator).clamp(0.0, 2.0)
            }
            DistanceMetric::Euclidean => {
                let mut sum = 0.0;
                query.for_each_difference(&row, |d| sum += d * d);
                f64::sqrt(sum)
            }
            DistanceMetric::Manhattan => {
                let mut sum = 0.0;
                query.for_each_difference(&row, |d| sum += d.abs());
                sum
            }
        }
    }
}
