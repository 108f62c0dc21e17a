//! Binning of consecutive configurations.

use nalgebra::DMatrix;

use crate::error::{AnalysisError, Result};

/// Average groups of `bin_size` consecutive configurations.
///
/// A trailing partial bin is dropped. `bin_size == 1` returns the input.
///
/// # Errors
///
/// `InvalidConfig` for a zero bin size, `InsufficientData` if not even one
/// full bin fits.
pub fn bin_configurations(data: &DMatrix<f64>, bin_size: usize) -> Result<DMatrix<f64>> {
    if bin_size == 0 {
        return Err(AnalysisError::InvalidConfig(
            "bin size must be at least 1".to_string(),
        ));
    }
    let bins = data.nrows() / bin_size;
    if bins == 0 {
        return Err(AnalysisError::InsufficientData {
            context: "configuration binning".to_string(),
            available: data.nrows(),
            required: bin_size,
        });
    }
    if bin_size == 1 {
        return Ok(data.clone());
    }

    let mut out = DMatrix::zeros(bins, data.ncols());
    for b in 0..bins {
        let block = data.rows(b * bin_size, bin_size);
        for (t, column) in block.column_iter().enumerate() {
            out[(b, t)] = column.mean();
        }
    }
    Ok(out)
}
