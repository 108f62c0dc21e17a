//! Covariance estimation across bootstrap replicas.
//!
//! The covariance of a fit target (a correlator window, or a concatenation of
//! windows for simultaneous fits) is estimated once from its B replicas and
//! factorised with Cholesky. Fits then minimise `|L⁻¹ r|²`, which equals
//! `rᵀ C⁻¹ r` without ever forming the inverse.

use log::warn;
use nalgebra::{Cholesky, DMatrix, DVector};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{AnalysisError, Result};
use crate::thread_pool;

/// Replicas per Welford chunk in the parallel path.
#[cfg(feature = "parallel")]
const CHUNK_SIZE: usize = 64;

/// Result of covariance estimation including the matrix and diagnostics.
#[derive(Debug, Clone)]
pub struct CovarianceEstimate {
    /// The estimated covariance matrix (M x M).
    pub matrix: DMatrix<f64>,

    /// Lower Cholesky factor, `L·Lᵀ = matrix`.
    pub cholesky_l: DMatrix<f64>,

    /// Number of replicas the matrix was estimated from.
    pub replicas: usize,

    /// Smallest eigenvalue of `matrix`.
    pub min_eigenvalue: f64,

    /// Ratio of the largest to the smallest eigenvalue.
    pub condition_number: f64,
}

impl CovarianceEstimate {
    /// Dimension M of the covariance matrix.
    pub fn dimension(&self) -> usize {
        self.matrix.nrows()
    }

    /// Check if the covariance matrix is numerically stable.
    pub fn is_stable(&self) -> bool {
        self.min_eigenvalue > 1e-300 && self.condition_number < 1e14
    }

    /// Decorrelated residual `L⁻¹ r`.
    pub fn whiten(&self, residual: &DVector<f64>) -> Result<DVector<f64>> {
        if residual.len() != self.dimension() {
            return Err(AnalysisError::shape(
                "residual whitening",
                self.dimension(),
                residual.len(),
            ));
        }
        self.cholesky_l
            .solve_lower_triangular(residual)
            .ok_or_else(|| AnalysisError::SingularMatrix {
                context: "Cholesky factor".to_string(),
            })
    }

    /// Correlated chi-square `rᵀ C⁻¹ r`.
    pub fn chi_square(&self, residual: &DVector<f64>) -> Result<f64> {
        Ok(self.whiten(residual)?.norm_squared())
    }
}

/// Online covariance accumulator using Welford's algorithm.
///
/// Accumulates the running mean and the sum of outer products M2 in a single
/// pass; the covariance is M2/(n-1).
#[derive(Debug, Clone)]
pub struct WelfordCovariance {
    n: usize,
    mean: DVector<f64>,
    m2: DMatrix<f64>,
}

impl WelfordCovariance {
    /// Create an empty accumulator for vectors of length `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            n: 0,
            mean: DVector::zeros(dimension),
            m2: DMatrix::zeros(dimension, dimension),
        }
    }

    /// Update the accumulator with a new vector.
    ///
    /// ```text
    /// δ = x - μₙ₋₁
    /// μₙ = μₙ₋₁ + δ/n
    /// M2ₙ = M2ₙ₋₁ + δ·(x - μₙ)ᵀ
    /// ```
    pub fn update(&mut self, x: &DVector<f64>) {
        self.n += 1;
        let n = self.n as f64;

        let delta = x - &self.mean;
        self.mean += &delta / n;
        let delta2 = x - &self.mean;

        self.m2 += delta * delta2.transpose();
    }

    /// Merge another accumulator into this one (Chan et al.).
    ///
    /// ```text
    /// δ = μ_B - μ_A
    /// μ_AB = (n_A·μ_A + n_B·μ_B) / n_AB
    /// M2_AB = M2_A + M2_B + (n_A·n_B/n_AB)·δ·δᵀ
    /// ```
    pub fn merge(&mut self, other: &Self) {
        if other.n == 0 {
            return;
        }
        if self.n == 0 {
            *self = other.clone();
            return;
        }

        let n_a = self.n as f64;
        let n_b = other.n as f64;
        let n_ab = n_a + n_b;

        let delta = &other.mean - &self.mean;
        self.mean = (&self.mean * n_a + &other.mean * n_b) / n_ab;

        let correction = &delta * delta.transpose() * (n_a * n_b / n_ab);
        self.m2 = &self.m2 + &other.m2 + correction;

        self.n += other.n;
    }

    /// Unbiased sample covariance, or `None` with fewer than two vectors.
    pub fn finalize(&self) -> Option<DMatrix<f64>> {
        if self.n < 2 {
            return None;
        }
        let mut cov = &self.m2 / (self.n - 1) as f64;
        // Welford's update is symmetric only up to rounding.
        cov = (&cov + cov.transpose()) * 0.5;
        Some(cov)
    }

    /// Number of vectors accumulated so far.
    pub fn count(&self) -> usize {
        self.n
    }
}

fn accumulate(replicas: &[DVector<f64>], dimension: usize) -> WelfordCovariance {
    let mut acc = WelfordCovariance::new(dimension);
    for replica in replicas {
        acc.update(replica);
    }
    acc
}

/// Unbiased (n-1) sample covariance of a set of replica vectors.
///
/// # Errors
///
/// `InsufficientData` with fewer than two replicas, `ShapeMismatch` if the
/// replicas differ in length.
pub fn sample_covariance(replicas: &[DVector<f64>]) -> Result<DMatrix<f64>> {
    let dimension = replicas.first().map_or(0, DVector::len);
    if let Some(bad) = replicas.iter().find(|r| r.len() != dimension) {
        return Err(AnalysisError::shape("covariance input", dimension, bad.len()));
    }

    // Fixed chunking and an in-order merge keep the result independent of
    // scheduling.
    #[cfg(feature = "parallel")]
    let acc = thread_pool::install(|| {
        replicas
            .par_chunks(CHUNK_SIZE)
            .map(|chunk| accumulate(chunk, dimension))
            .collect::<Vec<_>>()
            .into_iter()
            .fold(WelfordCovariance::new(dimension), |mut a, b| {
                a.merge(&b);
                a
            })
    });

    #[cfg(not(feature = "parallel"))]
    let acc = thread_pool::install(|| accumulate(replicas, dimension));

    acc.finalize().ok_or_else(|| AnalysisError::InsufficientData {
        context: "covariance estimation".to_string(),
        available: replicas.len(),
        required: 2,
    })
}

/// Estimate the covariance of `replicas` and its Cholesky factor.
///
/// No regularisation is applied: a matrix that is not positive definite is
/// reported as `CovarianceSingular`. With B <= M replicas the estimate is
/// rank deficient; a warning is logged and the Cholesky step will usually
/// fail.
pub fn estimate_covariance(replicas: &[DVector<f64>]) -> Result<CovarianceEstimate> {
    let matrix = sample_covariance(replicas)?;
    let dimension = matrix.nrows();

    if replicas.len() <= dimension {
        warn!(
            "covariance of dimension {} estimated from only {} replicas",
            dimension,
            replicas.len()
        );
    }

    let cholesky = Cholesky::new(matrix.clone()).ok_or(AnalysisError::CovarianceSingular {
        dimension,
        replicas: replicas.len(),
    })?;

    let eigenvalues = matrix.clone().symmetric_eigen().eigenvalues;
    let min_eigenvalue = eigenvalues.min();
    let max_eigenvalue = eigenvalues.max();
    let condition_number = if min_eigenvalue > 0.0 {
        max_eigenvalue / min_eigenvalue
    } else {
        f64::INFINITY
    };

    let estimate = CovarianceEstimate {
        cholesky_l: cholesky.l(),
        matrix,
        replicas: replicas.len(),
        min_eigenvalue,
        condition_number,
    };

    if !estimate.is_stable() {
        warn!(
            "ill-conditioned covariance (dimension {}, condition number {:.3e})",
            dimension, condition_number
        );
    }

    Ok(estimate)
}
