use serde::{Deserialize, Serialize};

/// Names of all distortion terms in coefficient-vector order.
///
/// A model of order `k` uses the first `k` entries.
pub const DISTORTION_TERM_NAMES: [&str; 14] = [
    "k1", "k2", "p1", "p2", "k3", "k4", "k5", "k6", "s1", "s2", "s3", "s4", "tau_x", "tau_y",
];

/// Supported distortion-model complexities.
///
/// Each order is a strict superset of the previous one:
/// - `Five`: radial `k1,k2,k3` + tangential `p1,p2`.
/// - `Eight`: adds the rational radial denominator `k4,k5,k6`.
/// - `Twelve`: adds thin-prism terms `s1..s4`.
/// - `Fourteen`: adds sensor tilt `tau_x,tau_y`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub enum DistortionOrder {
    #[default]
    Five,
    Eight,
    Twelve,
    Fourteen,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unsupported distortion order {0} (expected one of 5, 8, 12, 14)")]
pub struct UnsupportedDistortionOrder(pub u32);

impl DistortionOrder {
    pub const ALL: [DistortionOrder; 4] = [
        DistortionOrder::Five,
        DistortionOrder::Eight,
        DistortionOrder::Twelve,
        DistortionOrder::Fourteen,
    ];

    /// Length of the coefficient vector.
    #[inline]
    pub fn coefficient_count(self) -> usize {
        match self {
            DistortionOrder::Five => 5,
            DistortionOrder::Eight => 8,
            DistortionOrder::Twelve => 12,
            DistortionOrder::Fourteen => 14,
        }
    }

    pub fn term_names(self) -> &'static [&'static str] {
        &DISTORTION_TERM_NAMES[..self.coefficient_count()]
    }

    #[inline]
    pub fn has_rational(self) -> bool {
        self >= DistortionOrder::Eight
    }

    #[inline]
    pub fn has_thin_prism(self) -> bool {
        self >= DistortionOrder::Twelve
    }

    #[inline]
    pub fn has_tilt(self) -> bool {
        self == DistortionOrder::Fourteen
    }
}

impl TryFrom<u32> for DistortionOrder {
    type Error = UnsupportedDistortionOrder;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(DistortionOrder::Five),
            8 => Ok(DistortionOrder::Eight),
            12 => Ok(DistortionOrder::Twelve),
            14 => Ok(DistortionOrder::Fourteen),
            other => Err(UnsupportedDistortionOrder(other)),
        }
    }
}

impl From<DistortionOrder> for u32 {
    fn from(order: DistortionOrder) -> Self {
        order.coefficient_count() as u32
    }
}

impl std::fmt::Display for DistortionOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.coefficient_count())
    }
}
