//! Error types for the analysis pipeline.
//!
//! Errors fall into five families (see [`ErrorKind`]). Per-replica
//! convergence failures never surface as errors from the fitter; they are
//! recorded as NaN rows in the fit result. Everything else propagates to the
//! observable boundary, where the pipeline turns it into a failed outcome.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Coarse classification of an [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing, empty or malformed input data.
    Data,
    /// Singular or non-positive-definite matrices.
    Numerical,
    /// Minimiser failed to converge.
    Convergence,
    /// Fitted parameter ended on a constraint boundary.
    Constraint,
    /// Invalid configuration.
    Config,
}

/// Canonical error type for the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum AnalysisError {
    /// Fewer usable configurations (or points) than an operation requires.
    #[error("insufficient data for {context}: got {available}, need at least {required}")]
    InsufficientData {
        /// What was being computed.
        context: String,
        /// Number of items available.
        available: usize,
        /// Minimum number of items required.
        required: usize,
    },

    /// A correlator key is not present in the ensemble.
    #[error("missing channel `{key}`")]
    MissingChannel {
        /// The key that was looked up.
        key: String,
    },

    /// A correlator key is present but holds no measurements.
    #[error("channel `{key}` is empty")]
    EmptyChannel {
        /// The empty key.
        key: String,
    },

    /// Two arrays that must agree in shape do not.
    #[error("shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Operation in which the mismatch was detected.
        context: String,
        /// Expected shape description.
        expected: String,
        /// Shape actually found.
        found: String,
    },

    /// Covariance matrix is not positive definite; Cholesky failed.
    #[error("covariance matrix ({dimension}x{dimension} from {replicas} replicas) is not positive definite")]
    CovarianceSingular {
        /// Dimension of the covariance matrix.
        dimension: usize,
        /// Number of replicas it was estimated from.
        replicas: usize,
    },

    /// A matrix that must be invertible is singular.
    #[error("singular matrix in {context}")]
    SingularMatrix {
        /// Where the singular matrix was encountered.
        context: String,
    },

    /// The minimiser did not converge.
    #[error("minimiser did not converge after {iterations} iterations (chi2 = {chi2})")]
    Convergence {
        /// Iterations performed.
        iterations: usize,
        /// Chi-square at the last accepted point.
        chi2: f64,
    },

    /// A fitted parameter ended on one of its bounds.
    #[error("parameter `{parameter}` = {value} hit its bound {bound}")]
    Constraint {
        /// Parameter name.
        parameter: String,
        /// Fitted value.
        value: f64,
        /// The bound that was hit.
        bound: f64,
    },

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnalysisError {
    /// Returns the error family.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InsufficientData { .. }
            | AnalysisError::MissingChannel { .. }
            | AnalysisError::EmptyChannel { .. }
            | AnalysisError::ShapeMismatch { .. } => ErrorKind::Data,
            AnalysisError::CovarianceSingular { .. } | AnalysisError::SingularMatrix { .. } => {
                ErrorKind::Numerical
            }
            AnalysisError::Convergence { .. } => ErrorKind::Convergence,
            AnalysisError::Constraint { .. } => ErrorKind::Constraint,
            AnalysisError::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn shape(
        context: impl Into<String>,
        expected: impl std::fmt::Display,
        found: impl std::fmt::Display,
    ) -> Self {
        AnalysisError::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
