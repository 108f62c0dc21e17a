//! Observable extraction.
//!
//! 1. **GEVP** ([`solve_gevp`]): principal correlators from a smearing basis
//! 2. **Plateau fits** ([`extract_meson_mass`], [`meson_decay_constant`], [`extract_energy_states`])
//! 3. **Spectral densities** ([`fit_spectral_density`]): two-stage peak and coupling fit

mod gevp;
mod plateau;
mod spectral;

pub use gevp::{solve_gevp, GevpOptions, GevpSpectrum, LevelCrossing};
pub use plateau::{
    extract_energy_states, extract_exp_mass, extract_meson_mass, meson_decay_constant,
    DecayConstantFit, MassFit, PlateauWindow, SimultaneousForm, StateEnergy,
};
pub use spectral::{fit_spectral_density, SpectralDensitySet, SpectralFit, SpectralFitConfig};
