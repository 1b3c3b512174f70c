//! Randomized truncated SVD over a sparse matrix.
//!
//! Follows the Halko–Martinsson–Tropp range finder: a random test matrix is
//! pushed through `iterations` rounds of power iteration with
//! re-orthonormalization, the matrix is projected onto the resulting basis,
//! and the small projected problem is solved exactly with cyclic Jacobi
//! rotations. Only the right singular vectors (`components`) and singular
//! values are kept, which is all `transform` and scoring need.
//!
//! The test matrix is drawn from a fixed seed so repeated fits on the same
//! input produce identical factors.

use crate::matrix::{CsrMatrix, SparseRow};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed for the random range finder.
pub const SVD_SEED: u64 = 123;

/// Extra basis vectors sampled beyond the requested rank.
const OVERSAMPLES: usize = 10;

const MAX_JACOBI_SWEEPS: usize = 100;

/// Columns whose residual norm falls below this fraction of their original
/// norm are treated as linearly dependent and zeroed.
const DEPENDENCE_TOLERANCE: f64 = 1e-10;

/// Fitted low-rank decomposition `X ≈ U Σ Vᵀ`, storing `Vᵀ` as `components`.
#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    components: Array2<f64>,
    singular_values: Array1<f64>,
}

impl TruncatedSvd {
    /// Fit `n_components` factors with `iterations` power iterations.
    /// `n_components` must not exceed the number of columns.
    pub fn fit(matrix: &CsrMatrix, n_components: usize, iterations: usize) -> Self {
        let n_features = matrix.n_cols();
        let n_random = (n_components + OVERSAMPLES).min(n_features);

        let mut rng = StdRng::seed_from_u64(SVD_SEED);
        let omega = Array2::from_shape_fn((n_features, n_random), |_| rng.gen_range(-1.0..1.0));

        // Range of X via power iteration.
        let mut q = matrix.mul_dense(&omega);
        orthonormalize_columns(&mut q);
        for _ in 0..iterations {
            let mut z = matrix.transpose_mul_dense(&q);
            orthonormalize_columns(&mut z);
            q = matrix.mul_dense(&z);
            orthonormalize_columns(&mut q);
        }

        // Bᵀ = Xᵀ Q, shape (n_features, n_random).
        let b_t = matrix.transpose_mul_dense(&q);
        let gram = b_t.t().dot(&b_t);
        let (eigenvalues, eigenvectors) = symmetric_eigen(&gram);

        let mut order: Vec<usize> = (0..eigenvalues.len()).collect();
        order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

        let rank = n_components.min(order.len());
        let mut components = Array2::<f64>::zeros((n_components, n_features));
        let mut singular_values = Array1::<f64>::zeros(n_components);
        for (slot, &which) in order.iter().take(rank).enumerate() {
            let sigma = eigenvalues[which].max(0.0).sqrt();
            if sigma <= f64::EPSILON {
                continue;
            }
            // vᵢ = Bᵀ wᵢ / σᵢ
            let direction = b_t.dot(&eigenvectors.column(which)) / sigma;
            components.row_mut(slot).assign(&direction);
            singular_values[slot] = sigma;
        }

        Self {
            components,
            singular_values,
        }
    }

    /// `Vᵀ`, shape (n_components, n_features).
    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn singular_values(&self) -> &Array1<f64> {
        &self.singular_values
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    /// Project one sparse row into latent space: `row · V`.
    pub fn transform(&self, row: &SparseRow<'_>) -> Array1<f64> {
        let mut latent = Array1::<f64>::zeros(self.n_components());
        for (col, value) in row.iter() {
            latent.scaled_add(value, &self.components.column(col));
        }
        latent
    }

    /// Map a latent vector back to feature space: `latent · Vᵀ`.
    pub fn inverse_transform(&self, latent: &Array1<f64>) -> Array1<f64> {
        latent.dot(&self.components)
    }
}

/// Modified Gram-Schmidt with one re-orthogonalization pass.
fn orthonormalize_columns(m: &mut Array2<f64>) {
    for j in 0..m.ncols() {
        let original = m.column(j).dot(&m.column(j)).sqrt();
        for _ in 0..2 {
            for i in 0..j {
                let basis = m.column(i).to_owned();
                let projection = basis.dot(&m.column(j));
                m.column_mut(j).scaled_add(-projection, &basis);
            }
        }
        let norm = m.column(j).dot(&m.column(j)).sqrt();
        if original > 0.0 && norm > DEPENDENCE_TOLERANCE * original {
            m.column_mut(j).mapv_inplace(|x| x / norm);
        } else {
            m.column_mut(j).fill(0.0);
        }
    }
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
/// Returns eigenvalues and the matrix whose columns are the eigenvectors.
fn symmetric_eigen(matrix: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);
    let scale = a.iter().map(|x| x * x).sum::<f64>().sqrt();

    for _ in 0..MAX_JACOBI_SWEEPS {
        let mut off = 0.0f64;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off.sqrt() <= 1e-14 * scale.max(f64::MIN_POSITIVE) {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}
