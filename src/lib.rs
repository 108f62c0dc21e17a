//! # lattice-plateaus
//!
//! Extract hadron masses, decay matrix elements and excited-state spectra
//! from lattice correlation functions.
//!
//! The crate takes an in-memory [`Ensemble`] of raw correlator measurements
//! and produces bootstrap estimates:
//! - Meson masses from cosh plateau fits of folded correlators
//! - Decay matrix elements from simultaneous smeared/point fits
//! - Baryon masses of definite parity
//! - Energy levels from a generalised eigenvalue problem over smearing levels
//! - Peak energies and couplings from smeared spectral densities
//!
//! Every estimate is a [`BootstrapSampleSet`](statistics::BootstrapSampleSet):
//! a central value plus one value per bootstrap replica. Replicas are drawn
//! with a seed derived from the ensemble name, so every correlator of an
//! ensemble shares the same resampling and results are reproducible across
//! runs and thread counts.
//!
//! ## Quick Start
//!
//! ```ignore
//! use lattice_plateaus::{Analysis, ObservableRequest};
//! use lattice_plateaus::correlator::{MesonChannel, Representation};
//! use lattice_plateaus::output::{format_report, RenderOptions, SampleDump};
//!
//! let report = Analysis::new()
//!     .plateau(0, 12, 22)
//!     .request(ObservableRequest::DecayConstant(Representation::Fundamental, MesonChannel::Ps))
//!     .run(&ensemble)?;
//!
//! println!("{}", format_report(&report, &RenderOptions::default()));
//! let json = lattice_plateaus::output::to_json(&SampleDump::from_report(&report))?;
//! ```
//!
//! The library logs through the `log` facade and installs no logger.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod error;
mod pipeline;
mod result;
mod thread_pool;
pub mod constants;
pub mod ensemble;
pub mod types;

// Functional modules
pub mod analysis;
pub mod correlator;
pub mod fit;
pub mod output;
pub mod statistics;
pub mod synthetic;

// Re-exports for public API
pub use config::{Config, GevpConfig, SmearingLevels};
pub use constants::{BOOTSTRAP_SAMPLE_COUNT, DEFAULT_PEAK_WIDTH};
pub use ensemble::{select_ensemble, Ensemble, EnsembleParams, EnsembleQuery, TrajectoryFilter};
pub use error::{AnalysisError, ErrorKind, Result};
pub use pipeline::{Analysis, ObservableRequest};
pub use result::{AnalysisReport, ObservableOutcome, ObservableValue};
pub use types::{Correlator, CorrelatorMatrix, ScalarSamples};
