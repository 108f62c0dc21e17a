//! Correlator preprocessing.
//!
//! - Time-reversal folding (periodic and cross)
//! - Baryon parity projection
//! - Channel names, storage keys and symmetry-equivalent averaging
//! - Configuration binning and effective masses

mod assemble;
mod binning;
mod channels;
mod effective_mass;
mod fold;
mod parity;

pub use assemble::{correlator_matrix, CorrelatorSource};
pub use binning::bin_configurations;
pub use channels::{
    baryon_key, meson_key, smearing_prefix, BaryonOperator, Channel, MesonChannel, Parity,
    Representation,
};
pub use effective_mass::{effective_mass, effective_mass_series, energy_guess};
pub use fold::{
    fold_cross, fold_cross_raw, fold_cross_set, fold_periodic, fold_periodic_raw,
    fold_periodic_set, folded_len,
};
pub use parity::{bin_projection_baryon, reflect_antiperiodic};
