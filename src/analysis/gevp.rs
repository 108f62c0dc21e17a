//! Generalised eigenvalue problem on correlator matrices.
//!
//! For every time slice t after the reference slice t0 the problem
//! `C(t) v = λ C(t0) v` is solved independently for the mean and each
//! replica. Eigenvalues are ranked in descending order at each slice and
//! the n-th ranked eigenvalue across slices forms the n-th principal
//! correlator.
//!
//! Level identity is by rank only: if two levels cross between adjacent
//! slices, the n-th principal correlator silently switches state. The
//! optional continuity check detects (but does not undo) such swaps by
//! comparing eigenvectors of the mean between neighbouring slices.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Dyn, Schur, LU};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{AnalysisError, Result};
use crate::statistics::BootstrapSampleSet;
use crate::thread_pool;
use crate::types::{Correlator, CorrelatorMatrix, Matrix};

/// GEVP settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GevpOptions {
    /// Reference time slice.
    pub t0: usize,
    /// Run the eigenvector-overlap continuity check on the mean.
    pub check_continuity: bool,
}

impl GevpOptions {
    /// Rank-ordered GEVP at reference slice `t0`.
    pub fn new(t0: usize) -> Self {
        Self {
            t0,
            check_continuity: false,
        }
    }
}

/// A slice where the ranked levels of the mean appear to have swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCrossing {
    /// Time slice at which the swap is seen.
    pub t: usize,
    /// Rank of the level at `t`.
    pub level: usize,
    /// Rank at `t - 1` whose eigenvector overlaps most with it.
    pub matched: usize,
}

/// Principal correlators from a GEVP sweep.
#[derive(Debug, Clone)]
pub struct GevpSpectrum {
    /// Reference slice used.
    pub t0: usize,
    /// One principal correlator per level, ranked by decreasing eigenvalue.
    /// Slices `t <= t0` are NaN.
    pub levels: Vec<Correlator>,
    /// Swaps reported by the continuity check (empty if it was not run).
    pub crossings: Vec<LevelCrossing>,
}

impl GevpSpectrum {
    /// Number of levels (the matrix dimension).
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// The n-th principal correlator.
    pub fn level(&self, n: usize) -> Option<&Correlator> {
        self.levels.get(n)
    }
}

/// Cap on QR sweeps in the Schur decomposition of one slice.
const SCHUR_MAX_ITERATIONS: usize = 10_000;

/// Real parts of the generalised eigenvalues, sorted descending.
///
/// `None` if the reduced matrix is not finite or the Schur iteration does
/// not converge.
fn ranked_eigenvalues(a: &Matrix, reference: &LU<f64, Dyn, Dyn>) -> Option<Vec<f64>> {
    let reduced = reference.solve(a)?;
    if !reduced.iter().all(|v| v.is_finite()) {
        return None;
    }
    let schur = Schur::try_new(reduced, f64::EPSILON, SCHUR_MAX_ITERATIONS)?;
    let mut values: Vec<f64> = schur.complex_eigenvalues().iter().map(|z| z.re).collect();
    values.sort_by(|x, y| y.total_cmp(x));
    Some(values)
}

/// Eigenvalues of one estimate (mean or replica): `nt` rows of `n` values.
///
/// A slice whose eigenvalues cannot be computed yields a NaN row.
fn sweep(slices: &[Matrix], t0: usize) -> Result<Vec<Vec<f64>>> {
    let n = slices[t0].nrows();
    let lu = slices[t0].clone().lu();
    if !lu.is_invertible() {
        return Err(AnalysisError::SingularMatrix {
            context: format!("GEVP reference matrix C({t0})"),
        });
    }
    Ok(slices
        .iter()
        .enumerate()
        .map(|(t, a)| {
            if t <= t0 {
                return vec![f64::NAN; n];
            }
            ranked_eigenvalues(a, &lu).unwrap_or_else(|| {
                debug!("GEVP eigenvalues at t = {t} not computable; NaN row");
                vec![f64::NAN; n]
            })
        })
        .collect())
}

/// Replica sweep; a replica whose reference matrix is singular becomes
/// all NaN instead of failing the whole spectrum.
fn replica_sweep(index: usize, slices: &[Matrix], t0: usize) -> Vec<Vec<f64>> {
    let n = slices[t0].nrows();
    sweep(slices, t0).unwrap_or_else(|err| {
        warn!("GEVP replica {index}: {err}; NaN rows");
        vec![vec![f64::NAN; n]; slices.len()]
    })
}

fn level_series(rows: &[Vec<f64>], level: usize) -> DVector<f64> {
    DVector::from_iterator(rows.len(), rows.iter().map(|row| row[level]))
}

/// Solve the GEVP at every slice after `options.t0`.
///
/// # Errors
///
/// `InvalidConfig` if `t0` leaves no slice to solve, `ShapeMismatch` for
/// non-square or inconsistent matrices, `SingularMatrix` if `C(t0)` of the
/// mean is singular. Replicas with a singular reference matrix, or slices
/// with non-finite entries, give NaN eigenvalues for that replica only.
pub fn solve_gevp(matrix: &CorrelatorMatrix, options: &GevpOptions) -> Result<GevpSpectrum> {
    let nt = matrix.mean().len();
    let t0 = options.t0;
    if t0 + 1 >= nt {
        return Err(AnalysisError::InvalidConfig(format!(
            "GEVP reference slice t0 = {t0} leaves no slices to solve (T = {nt})"
        )));
    }
    let n = matrix.mean()[0].nrows();
    let well_formed = |slices: &Vec<Matrix>| {
        slices.len() == nt && slices.iter().all(|m| m.nrows() == n && m.ncols() == n)
    };
    if n == 0 || !well_formed(matrix.mean()) || !matrix.samples().iter().all(well_formed) {
        return Err(AnalysisError::shape(
            "GEVP correlator matrix",
            format!("{nt} slices of {n}x{n}"),
            "inconsistent or non-square slices",
        ));
    }

    let mean_rows = sweep(matrix.mean(), t0)?;

    #[cfg(feature = "parallel")]
    let sample_rows: Vec<Vec<Vec<f64>>> = thread_pool::install(|| {
        matrix
            .samples()
            .par_iter()
            .enumerate()
            .map(|(b, slices)| replica_sweep(b, slices, t0))
            .collect()
    });

    #[cfg(not(feature = "parallel"))]
    let sample_rows: Vec<Vec<Vec<f64>>> = thread_pool::install(|| {
        matrix
            .samples()
            .iter()
            .enumerate()
            .map(|(b, slices)| replica_sweep(b, slices, t0))
            .collect()
    });

    let failed = sample_rows
        .iter()
        .filter(|rows| rows.iter().skip(t0 + 1).any(|row| row.iter().any(|v| v.is_nan())))
        .count();
    if failed > 0 {
        warn!(
            "GEVP: {} of {} replicas have slices without eigenvalues",
            failed,
            sample_rows.len()
        );
    }

    let levels = (0..n)
        .map(|level| {
            BootstrapSampleSet::new(
                level_series(&mean_rows, level),
                sample_rows
                    .iter()
                    .map(|rows| level_series(rows, level))
                    .collect(),
            )
        })
        .collect();

    let crossings = if options.check_continuity {
        continuity_check(matrix.mean(), t0)
    } else {
        Vec::new()
    };

    Ok(GevpSpectrum {
        t0,
        levels,
        crossings,
    })
}

/// Eigenvectors of the symmetrised problem in the basis orthonormalised by
/// `C(t0)`, columns ranked by decreasing eigenvalue.
fn reduced_eigenvectors(a: &Matrix, l_inv: &Matrix) -> DMatrix<f64> {
    let symmetric = (a + a.transpose()) * 0.5;
    let reduced = l_inv * symmetric * l_inv.transpose();
    let eigen = reduced.symmetric_eigen();
    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));
    eigen.eigenvectors.select_columns(order.iter())
}

/// Compare eigenvectors of the mean between neighbouring slices.
fn continuity_check(slices: &[Matrix], t0: usize) -> Vec<LevelCrossing> {
    let b = (&slices[t0] + slices[t0].transpose()) * 0.5;
    let n = b.nrows();
    let Some(cholesky) = b.cholesky() else {
        warn!("continuity check skipped: C({t0}) is not positive definite");
        return Vec::new();
    };
    let Some(l_inv) = cholesky.l().solve_lower_triangular(&DMatrix::identity(n, n)) else {
        return Vec::new();
    };

    let mut crossings = Vec::new();
    let mut previous: Option<DMatrix<f64>> = None;
    for (t, a) in slices.iter().enumerate().skip(t0 + 1) {
        let vectors = reduced_eigenvectors(a, &l_inv);
        if let Some(prev) = &previous {
            for level in 0..n {
                let current = vectors.column(level);
                let matched = (0..n)
                    .max_by(|&i, &j| {
                        prev.column(i)
                            .dot(&current)
                            .abs()
                            .total_cmp(&prev.column(j).dot(&current).abs())
                    })
                    .unwrap_or(level);
                if matched != level {
                    warn!(
                        "GEVP level {} at t = {} overlaps most with level {} at t = {}",
                        level,
                        t,
                        matched,
                        t - 1
                    );
                    crossings.push(LevelCrossing { t, level, matched });
                }
            }
        }
        previous = Some(vectors);
    }
    crossings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagonal_matrix(nt: usize, energies: &[f64]) -> Vec<Matrix> {
        (0..nt)
            .map(|t| DMatrix::from_diagonal(&DVector::from_iterator(
                energies.len(),
                energies.iter().map(|e| (-e * t as f64).exp()),
            )))
            .collect()
    }

    #[test]
    fn test_diagonal_problem() {
        let slices = diagonal_matrix(8, &[0.9, 0.3]);
        let matrix = BootstrapSampleSet::new(slices.clone(), vec![slices]);
        let spectrum = solve_gevp(&matrix, &GevpOptions::new(1)).unwrap();

        assert_eq!(spectrum.level_count(), 2);
        let ground = spectrum.level(0).unwrap();
        let excited = spectrum.level(1).unwrap();
        assert!(ground.mean()[0].is_nan());
        assert!(ground.mean()[1].is_nan());
        for t in 2..8 {
            let dt = (t - 1) as f64;
            assert!((ground.mean()[t] - (-0.3 * dt).exp()).abs() < 1e-12);
            assert!((excited.mean()[t] - (-0.9 * dt).exp()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bad_t0() {
        let slices = diagonal_matrix(4, &[0.5]);
        let matrix = BootstrapSampleSet::new(slices.clone(), vec![slices]);
        assert!(matches!(
            solve_gevp(&matrix, &GevpOptions::new(3)),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_singular_reference() {
        let mut slices = diagonal_matrix(6, &[0.5, 0.7]);
        slices[1] = DMatrix::zeros(2, 2);
        let matrix = BootstrapSampleSet::new(slices.clone(), vec![slices]);
        assert!(matches!(
            solve_gevp(&matrix, &GevpOptions::new(1)),
            Err(AnalysisError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn test_non_finite_replica_gives_nan_rows() {
        let slices = diagonal_matrix(8, &[0.3, 0.6, 0.9]);
        let mut broken = slices.clone();
        broken[4][(2, 0)] = f64::NAN;
        let matrix = BootstrapSampleSet::new(slices.clone(), vec![slices.clone(), broken, slices]);
        let spectrum = solve_gevp(&matrix, &GevpOptions::new(1)).unwrap();

        for level in &spectrum.levels {
            assert!(level.samples()[1][4].is_nan());
            assert!(level.samples()[1][5].is_finite());
            assert!(level.samples()[0][4].is_finite());
            assert!(level.samples()[2][4].is_finite());
            assert!(level.mean()[4].is_finite());
        }
    }

    #[test]
    fn test_singular_replica_reference_is_local() {
        let slices = diagonal_matrix(6, &[0.5, 0.7]);
        let mut singular = slices.clone();
        singular[1] = DMatrix::zeros(2, 2);
        let matrix = BootstrapSampleSet::new(slices.clone(), vec![slices, singular]);
        let spectrum = solve_gevp(&matrix, &GevpOptions::new(1)).unwrap();
        let ground = spectrum.level(0).unwrap();
        assert!(ground.samples()[1].iter().all(|v| v.is_nan()));
        assert!((ground.samples()[0][3] - (-1.0_f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_continuity_flags_crossing() {
        // The two diagonal states swap dominance between t = 3 and t = 4.
        let nt = 7;
        let slices: Vec<Matrix> = (0..nt)
            .map(|t| {
                let (x, y) = match t {
                    0 => (1.0, 1.0),
                    1..=3 => (2.0, 1.0),
                    _ => (1.0, 2.0),
                };
                DMatrix::from_diagonal(&DVector::from_row_slice(&[x, y]))
            })
            .collect();
        let matrix = BootstrapSampleSet::new(slices.clone(), vec![slices]);
        let options = GevpOptions {
            t0: 0,
            check_continuity: true,
        };
        let spectrum = solve_gevp(&matrix, &options).unwrap();
        assert!(spectrum
            .crossings
            .iter()
            .any(|c| c.t == 4 && c.level == 0 && c.matched == 1));
    }
}
