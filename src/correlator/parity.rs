//! Parity projection of baryon correlators.
//!
//! With antiperiodic temporal boundaries for fermions, the backward-moving
//! state of one parity shows up in the other parity's correlator, reflected
//! in time and with its sign flipped. Combining each parity with the
//! reflected partner doubles the statistics of both channels.

use nalgebra::DVector;

use crate::error::{AnalysisError, Result};
use crate::types::Correlator;

/// Time reflection with the antiperiodic sign flip.
///
/// `S(x)[0] = x[0]` (the source slice needs no flip) and
/// `S(x)[t] = -x[T-t]` for `t > 0`.
pub fn reflect_antiperiodic(series: &DVector<f64>) -> DVector<f64> {
    let nt = series.len();
    DVector::from_fn(nt, |t, _| if t == 0 { series[0] } else { -series[nt - t] })
}

/// Project even and odd baryon correlators onto definite parity.
///
/// Returns `(even_bin, odd_bin)` with
/// `even_bin = (even + S(odd)) / 2` and `odd_bin = (odd + S(even)) / 2`,
/// applied to the mean and every replica.
///
/// # Errors
///
/// `ShapeMismatch` if the two inputs differ in replica count or length.
pub fn bin_projection_baryon(even: &Correlator, odd: &Correlator) -> Result<(Correlator, Correlator)> {
    if even.len() != odd.len() {
        return Err(AnalysisError::shape(
            "baryon parity projection",
            even.len(),
            odd.len(),
        ));
    }
    let even_bin = even.try_zip_with(odd, |e, o| (e + reflect_antiperiodic(o)) / 2.0)?;
    let odd_bin = odd.try_zip_with(even, |o, e| (o + reflect_antiperiodic(e)) / 2.0)?;
    Ok((even_bin, odd_bin))
}
