//! Sparse interaction matrices and id ↔ index mappers.
//!
//! Two orientations are produced from the same interaction list:
//! - item-major ratings (rows = items, columns = users, cell = rating) for
//!   the nearest-neighbor recommender;
//! - user-major presence (rows = users, columns = items, cell = 1.0) for the
//!   implicit-feedback factorization recommender.
//!
//! Dense indices are assigned in first-seen order of the interaction slice.

use ndarray::Array2;
use std::collections::HashMap;
use streamline_core::Interaction;

/// Insertion-ordered bijection between external ids and dense indices.
#[derive(Debug, Clone, Default)]
pub struct IdMapper {
    forward: HashMap<i64, usize>,
    inverse: Vec<i64>,
}

impl IdMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index for `id`, assigning the next free index if unseen.
    pub fn get_or_insert(&mut self, id: i64) -> usize {
        if let Some(&index) = self.forward.get(&id) {
            return index;
        }
        let index = self.inverse.len();
        self.forward.insert(id, index);
        self.inverse.push(id);
        index
    }

    /// External id → dense index.
    pub fn index(&self, id: i64) -> Option<usize> {
        self.forward.get(&id).copied()
    }

    /// Dense index → external id.
    pub fn id(&self, index: usize) -> Option<i64> {
        self.inverse.get(index).copied()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.forward.contains_key(&id)
    }

    /// External ids in index order.
    pub fn ids(&self) -> &[i64] {
        &self.inverse
    }

    pub fn len(&self) -> usize {
        self.inverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inverse.is_empty()
    }
}

impl FromIterator<i64> for IdMapper {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        let mut mapper = IdMapper::new();
        for id in iter {
            mapper.get_or_insert(id);
        }
        mapper
    }
}

/// How repeated (row, column) coordinates are folded into one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplicates {
    /// Add the values together.
    Sum,
    /// Store 1.0 regardless of value or multiplicity.
    Presence,
}

/// Compressed sparse row matrix with sorted column indices per row.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    n_rows: usize,
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

/// Borrowed view of one matrix row.
#[derive(Debug, Clone, Copy)]
pub struct SparseRow<'a> {
    pub indices: &'a [usize],
    pub values: &'a [f64],
}

impl CsrMatrix {
    /// Build from (row, column, value) coordinates. Coordinates must lie
    /// inside the given shape.
    pub fn from_triplets(
        n_rows: usize,
        n_cols: usize,
        mut triplets: Vec<(usize, usize, f64)>,
        duplicates: Duplicates,
    ) -> Self {
        triplets.sort_by_key(|&(row, col, _)| (row, col));

        let mut indptr = vec![0usize; n_rows + 1];
        let mut indices = Vec::with_capacity(triplets.len());
        let mut data = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, value) in triplets {
            debug_assert!(row < n_rows && col < n_cols, "coordinate outside matrix shape");
            let value = match duplicates {
                Duplicates::Sum => value,
                Duplicates::Presence => 1.0,
            };
            if last == Some((row, col)) {
                if duplicates == Duplicates::Sum {
                    if let Some(cell) = data.last_mut() {
                        *cell += value;
                    }
                }
                continue;
            }
            indices.push(col);
            data.push(value);
            indptr[row + 1] += 1;
            last = Some((row, col));
        }

        for row in 0..n_rows {
            indptr[row + 1] += indptr[row];
        }

        Self {
            n_rows,
            n_cols,
            indptr,
            indices,
            data,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Row view. Panics if `row >= n_rows`; callers resolve indices through
    /// an [`IdMapper`] first.
    pub fn row(&self, row: usize) -> SparseRow<'_> {
        let start = self.indptr[row];
        let end = self.indptr[row + 1];
        SparseRow {
            indices: &self.indices[start..end],
            values: &self.data[start..end],
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.row(row).get(col)
    }

    /// `self · rhs` where `rhs` has `n_cols` rows.
    pub fn mul_dense(&self, rhs: &Array2<f64>) -> Array2<f64> {
        debug_assert_eq!(rhs.nrows(), self.n_cols);
        let mut out = Array2::<f64>::zeros((self.n_rows, rhs.ncols()));
        for row in 0..self.n_rows {
            let view = self.row(row);
            let mut target = out.row_mut(row);
            for (&col, &value) in view.indices.iter().zip(view.values) {
                target.scaled_add(value, &rhs.row(col));
            }
        }
        out
    }

    /// `selfᵀ · rhs` where `rhs` has `n_rows` rows.
    pub fn transpose_mul_dense(&self, rhs: &Array2<f64>) -> Array2<f64> {
        debug_assert_eq!(rhs.nrows(), self.n_rows);
        let mut out = Array2::<f64>::zeros((self.n_cols, rhs.ncols()));
        for row in 0..self.n_rows {
            let view = self.row(row);
            let source = rhs.row(row);
            for (&col, &value) in view.indices.iter().zip(view.values) {
                out.row_mut(col).scaled_add(value, &source);
            }
        }
        out
    }
}

impl<'a> SparseRow<'a> {
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn get(&self, col: usize) -> f64 {
        match self.indices.binary_search(&col) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    pub fn contains(&self, col: usize) -> bool {
        self.indices.binary_search(&col).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + 'a {
        self.indices
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    pub fn dot(&self, other: &SparseRow<'_>) -> f64 {
        let mut sum = 0.0;
        let (mut i, mut j) = (0, 0);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Visit `self[c] - other[c]` for every column stored in either row.
    pub fn for_each_difference(&self, other: &SparseRow<'_>, mut f: impl FnMut(f64)) {
        let (mut i, mut j) = (0, 0);
        while i < self.indices.len() || j < other.indices.len() {
            let left = self.indices.get(i);
            let right = other.indices.get(j);
            match (left, right) {
                (Some(a), Some(b)) if a == b => {
                    f(self.values[i] - other.values[j]);
                    i += 1;
                    j += 1;
                }
                (Some(a), Some(b)) if a < b => {
                    f(self.values[i]);
                    i += 1;
                }
                (Some(_), None) => {
                    f(self.values[i]);
                    i += 1;
                }
                _ => {
                    f(-other.values[j]);
                    j += 1;
                }
            }
        }
    }
}

/// A sparse matrix together with the mappers that produced its axes.
#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    pub matrix: CsrMatrix,
    pub users: IdMapper,
    pub items: IdMapper,
}

pub struct InteractionMatrixBuilder;

impl InteractionMatrixBuilder {
    /// Rows = items, columns = users, cell = rating. Repeated ratings for the
    /// same pair are summed.
    pub fn item_ratings(interactions: &[Interaction]) -> InteractionMatrix {
        let (users, items, coords) = Self::index(interactions);
        let triplets = coords
            .into_iter()
            .map(|(user, item, rating)| (item, user, rating))
            .collect();
        let matrix = CsrMatrix::from_triplets(items.len(), users.len(), triplets, Duplicates::Sum);
        InteractionMatrix {
            matrix,
            users,
            items,
        }
    }

    /// Rows = users, columns = items, cell = 1.0 for any observed interaction.
    pub fn user_presence(interactions: &[Interaction]) -> InteractionMatrix {
        let (users, items, coords) = Self::index(interactions);
        let matrix =
            CsrMatrix::from_triplets(users.len(), items.len(), coords, Duplicates::Presence);
        InteractionMatrix {
            matrix,
            users,
            items,
        }
    }

    fn index(interactions: &[Interaction]) -> (IdMapper, IdMapper, Vec<(usize, usize, f64)>) {
        let mut users = IdMapper::new();
        let mut items = IdMapper::new();
        let coords = interactions
            .iter()
            .map(|interaction| {
                (
                    users.get_or_insert(interaction.user_id),
                    items.get_or_insert(interaction.item_id),
                    interaction.rating,
                )
            })
            .collect();
        (users, items, coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Vec<Interaction> {
        vec![
            Interaction::new(1, 10, 5.0),
            Interaction::new(1, 20, 3.0),
            Interaction::new(2, 10, 4.0),
        ]
    }

    #[test]
    fn test_mapper_first_seen_order() {
        let mapper: IdMapper = vec![42, 7, 42, 99].into_iter().collect();
        assert_eq!(mapper.len(), 3);
        assert_eq!(mapper.index(42), Some(0));
        assert_eq!(mapper.index(7), Some(1));
        assert_eq!(mapper.id(2), Some(99));
        assert_eq!(mapper.index(5), None);
        assert_eq!(mapper.id(3), None);
        assert_eq!(mapper.ids(), &[42, 7, 99]);
    }

    #[test]
    fn test_item_ratings_orientation() {
        let built = InteractionMatrixBuilder::item_ratings(&sample());
        assert_eq!(built.matrix.shape(), (2, 2));
        let item10 = built.items.index(10).unwrap();
        let item20 = built.items.index(20).unwrap();
        let user1 = built.users.index(1).unwrap();
        let user2 = built.users.index(2).unwrap();
        assert_eq!(built.matrix.get(item10, user1), 5.0);
        assert_eq!(built.matrix.get(item10, user2), 4.0);
        assert_eq!(built.matrix.get(item20, user1), 3.0);
        assert_eq!(built.matrix.get(item20, user2), 0.0);
    }

    #[test]
    fn test_user_presence_orientation() {
        let built = InteractionMatrixBuilder::user_presence(&sample());
        assert_eq!(built.matrix.shape(), (2, 2));
        let user1 = built.users.index(1).unwrap();
        assert_eq!(built.matrix.row(user1).values, &[1.0, 1.0]);
        assert_eq!(built.matrix.nnz(), 3);
    }

    #[test]
    fn test_duplicates_sum_or_presence() {
        let triplets = vec![(0, 1, 2.0), (0, 1, 3.0), (1, 0, 4.0)];
        let summed = CsrMatrix::from_triplets(2, 2, triplets.clone(), Duplicates::Sum);
        assert_eq!(summed.get(0, 1), 5.0);
        assert_eq!(summed.nnz(), 2);

        let presence = CsrMatrix::from_triplets(2, 2, triplets, Duplicates::Presence);
        assert_eq!(presence.get(0, 1), 1.0);
        assert_eq!(presence.get(1, 0), 1.0);
    }

    #[test]
    fn test_rows_sorted_and_empty_rows() {
        let matrix = CsrMatrix::from_triplets(3, 4, vec![(2, 3, 1.0), (0, 2, 1.0), (0, 0, 1.0)], Duplicates::Sum);
        assert_eq!(matrix.row(0).indices, &[0, 2]);
        assert!(matrix.row(1).is_empty());
        assert_eq!(matrix.row(2).indices, &[3]);
    }

    #[test]
    fn test_sparse_dense_products() {
        // [[1, 0, 2],
        //  [0, 3, 0]]
        let matrix = CsrMatrix::from_triplets(
            2,
            3,
            vec![(0, 0, 1.0), (0, 2, 2.0), (1, 1, 3.0)],
            Duplicates::Sum,
        );
        let rhs = array![[1.0], [1.0], [1.0]];
        assert_eq!(matrix.mul_dense(&rhs), array![[3.0], [3.0]]);

        let rhs = array![[1.0], [2.0]];
        assert_eq!(matrix.transpose_mul_dense(&rhs), array![[1.0], [6.0], [2.0]]);
    }

    #[test]
    fn test_row_dot_and_difference() {
        let matrix = CsrMatrix::from_triplets(
            2,
            3,
            vec![(0, 0, 1.0), (0, 2, 2.0), (1, 1, 3.0), (1, 2, 1.0)],
            Duplicates::Sum,
        );
        let (a, b) = (matrix.row(0), matrix.row(1));
        assert_eq!(a.dot(&b), 2.0);

        let mut diffs = Vec::new();
        a.for_each_difference(&b, |d| diffs.push(d));
        assert_eq!(diffs, vec![1.0, -3.0, 1.0]);
    }
}
