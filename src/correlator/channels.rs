//! Measurement channels and the keys under which their correlators are stored.
//!
//! Channels are named on the command line and in configuration files with
//! short strings such as `f_ps`, `as_v` or `lambda_even`. Each maps to one
//! or more stored measurements: meson channels list the gamma structures of
//! all symmetry-equivalent polarisations, baryon channels an operator name
//! and a parity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Fermion representation of a meson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Representation {
    /// Fundamental representation (`f`).
    Fundamental,
    /// Two-index antisymmetric representation (`as`).
    Antisymmetric,
}

impl Representation {
    /// Short name used in channel strings.
    pub fn short_name(self) -> &'static str {
        match self {
            Representation::Fundamental => "f",
            Representation::Antisymmetric => "as",
        }
    }

    /// Group name used in stored measurement keys.
    pub fn storage_tag(self) -> &'static str {
        match self {
            Representation::Fundamental => "TRIPLET",
            Representation::Antisymmetric => "DIQUARK",
        }
    }
}

/// Meson channel (spin/parity structure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MesonChannel {
    /// Pseudoscalar.
    Ps,
    /// Vector.
    V,
    /// Tensor.
    T,
    /// Axial vector.
    Av,
    /// Axial tensor.
    At,
    /// Scalar.
    S,
    /// Pseudoscalar / temporal axial-vector cross correlator.
    PsAv,
}

impl MesonChannel {
    /// Every meson channel, in canonical order.
    pub const ALL: [MesonChannel; 7] = [
        MesonChannel::Ps,
        MesonChannel::V,
        MesonChannel::T,
        MesonChannel::Av,
        MesonChannel::At,
        MesonChannel::S,
        MesonChannel::PsAv,
    ];

    /// Short name used in channel strings.
    pub fn short_name(self) -> &'static str {
        match self {
            MesonChannel::Ps => "ps",
            MesonChannel::V => "v",
            MesonChannel::T => "t",
            MesonChannel::Av => "av",
            MesonChannel::At => "at",
            MesonChannel::S => "s",
            MesonChannel::PsAv => "ps-av",
        }
    }

    /// Gamma structures averaged into this channel.
    pub fn gamma_tags(self) -> &'static [&'static str] {
        match self {
            MesonChannel::Ps => &["g5"],
            MesonChannel::V => &["g1", "g2", "g3"],
            MesonChannel::T => &["g0g1", "g0g2", "g0g3"],
            MesonChannel::Av => &["g5g1", "g5g2", "g5g3"],
            MesonChannel::At => &["g0g5g1", "g0g5g2", "g0g5g3"],
            MesonChannel::S => &["id"],
            MesonChannel::PsAv => &["g5_g0g5_re"],
        }
    }

    /// Whether the channel is odd under time reversal (cross-folded).
    pub fn is_cross(self) -> bool {
        matches!(self, MesonChannel::PsAv)
    }
}

/// Baryon interpolating operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaryonOperator {
    /// Spin-1/2 chimera with antisymmetric fundamental pair.
    Lambda,
    /// Spin-1/2 chimera with symmetric fundamental pair.
    Sigma,
    /// Spin-3/2 chimera.
    SigmaStar,
}

impl BaryonOperator {
    /// Short name used in channel strings.
    pub fn short_name(self) -> &'static str {
        match self {
            BaryonOperator::Lambda => "lambda",
            BaryonOperator::Sigma => "sigma",
            BaryonOperator::SigmaStar => "sigmastar",
        }
    }

    /// Operator name used in stored measurement keys.
    pub fn storage_tag(self) -> &'static str {
        match self {
            BaryonOperator::Lambda => "Chimera_OC",
            BaryonOperator::Sigma => "Chimera_OV12",
            BaryonOperator::SigmaStar => "Chimera_OV32",
        }
    }
}

/// Parity of a baryon correlator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parity {
    /// Positive parity.
    Even,
    /// Negative parity.
    Odd,
}

impl Parity {
    /// Name used in channel strings and keys.
    pub fn short_name(self) -> &'static str {
        match self {
            Parity::Even => "even",
            Parity::Odd => "odd",
        }
    }
}

/// A measurement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Channel {
    /// A meson channel in a given representation.
    Meson(Representation, MesonChannel),
    /// A baryon operator projected to a given parity.
    Baryon(BaryonOperator, Parity),
}

/// Prefix selecting the source and sink smearing levels.
pub fn smearing_prefix(source: usize, sink: usize) -> String {
    format!("source_N{source}_sink_N{sink}")
}

/// Stored key of one gamma structure of a meson correlator.
pub fn meson_key(rep: Representation, gamma: &str, source: usize, sink: usize) -> String {
    format!("{}/{} {}", smearing_prefix(source, sink), rep.storage_tag(), gamma)
}

/// Stored key of a baryon correlator of definite (unprojected) parity.
pub fn baryon_key(op: BaryonOperator, parity: Parity, source: usize, sink: usize) -> String {
    format!(
        "{}/{}_{}_re",
        smearing_prefix(source, sink),
        op.storage_tag(),
        parity.short_name()
    )
}

impl Channel {
    /// Stored keys whose correlators make up this channel.
    ///
    /// Baryon channels need both parities for the projection.
    pub fn storage_keys(&self, source: usize, sink: usize) -> Vec<String> {
        match *self {
            Channel::Meson(rep, channel) => channel
                .gamma_tags()
                .iter()
                .map(|gamma| meson_key(rep, gamma, source, sink))
                .collect(),
            Channel::Baryon(op, _) => vec![
                baryon_key(op, Parity::Even, source, sink),
                baryon_key(op, Parity::Odd, source, sink),
            ],
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Meson(rep, channel) => {
                write!(f, "{}_{}", rep.short_name(), channel.short_name())
            }
            Channel::Baryon(op, parity) => {
                write!(f, "{}_{}", op.short_name(), parity.short_name())
            }
        }
    }
}

impl FromStr for Channel {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || AnalysisError::InvalidConfig(format!("unknown channel `{s}`"));
        let (head, tail) = s.split_once('_').ok_or_else(unknown)?;

        let rep = match head {
            "f" => Some(Representation::Fundamental),
            "as" => Some(Representation::Antisymmetric),
            _ => None,
        };
        if let Some(rep) = rep {
            let channel = MesonChannel::ALL
                .into_iter()
                .find(|c| c.short_name() == tail)
                .ok_or_else(unknown)?;
            return Ok(Channel::Meson(rep, channel));
        }

        let op = match head {
            "lambda" => BaryonOperator::Lambda,
            "sigma" => BaryonOperator::Sigma,
            "sigmastar" => BaryonOperator::SigmaStar,
            _ => return Err(unknown()),
        };
        let parity = match tail {
            "even" => Parity::Even,
            "odd" => Parity::Odd,
            _ => return Err(unknown()),
        };
        Ok(Channel::Baryon(op, parity))
    }
}

impl TryFrom<String> for Channel {
    type Error = AnalysisError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.to_string()
    }
}
