//! Time-reversal folding.
//!
//! On a lattice of temporal extent T the slices t and T-t carry the same
//! (or, for cross correlators, opposite) information. Folding averages each
//! slice with its partner and keeps only the first half plus the midpoint.

use nalgebra::{DMatrix, DVector};

use crate::types::Correlator;

/// Length of a folded series: `⌈T/2⌉ + 1`, capped at T.
pub fn folded_len(nt: usize) -> usize {
    (nt.div_ceil(2) + 1).min(nt)
}

#[inline]
fn partner(t: usize, nt: usize) -> usize {
    (nt - t) % nt
}

/// Fold a periodic correlator: `f[t] = (c[t] + c[T-t]) / 2`.
pub fn fold_periodic(series: &DVector<f64>) -> DVector<f64> {
    let nt = series.len();
    DVector::from_fn(folded_len(nt), |t, _| {
        (series[t] + series[partner(t, nt)]) / 2.0
    })
}

/// Fold an antisymmetric (cross) correlator: `f[t] = (c[t] - c[T-t]) / 2`,
/// with the source slice `f[0] = c[0]` left untouched.
pub fn fold_cross(series: &DVector<f64>) -> DVector<f64> {
    let nt = series.len();
    DVector::from_fn(folded_len(nt), |t, _| {
        if t == 0 {
            series[0]
        } else {
            (series[t] - series[partner(t, nt)]) / 2.0
        }
    })
}

fn fold_rows(data: &DMatrix<f64>, fold: fn(&DVector<f64>) -> DVector<f64>) -> DMatrix<f64> {
    let nt = data.ncols();
    let mut out = DMatrix::zeros(data.nrows(), folded_len(nt));
    for (r, row) in data.row_iter().enumerate() {
        let folded = fold(&row.transpose());
        out.row_mut(r).copy_from(&folded.transpose());
    }
    out
}

/// [`fold_periodic`] applied to every configuration of a raw correlator.
pub fn fold_periodic_raw(data: &DMatrix<f64>) -> DMatrix<f64> {
    fold_rows(data, fold_periodic)
}

/// [`fold_cross`] applied to every configuration of a raw correlator.
pub fn fold_cross_raw(data: &DMatrix<f64>) -> DMatrix<f64> {
    fold_rows(data, fold_cross)
}

/// [`fold_periodic`] on the mean and every replica.
pub fn fold_periodic_set(corr: &Correlator) -> Correlator {
    corr.map(fold_periodic)
}

/// [`fold_cross`] on the mean and every replica.
pub fn fold_cross_set(corr: &Correlator) -> Correlator {
    corr.map(fold_cross)
}
