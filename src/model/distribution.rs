use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid or unsupported distribution kind: '{0}'")]
pub struct ParseDistributionKindError(String);

impl ParseDistributionKindError {
    /// The text that failed to parse.
    pub fn input(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionKind {
    Flat,
    Gaussian,
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionKind::Flat => write!(f, "flat"),
            DistributionKind::Gaussian => write!(f, "gaussian"),
        }
    }
}

impl FromStr for DistributionKind {
    type Err = ParseDistributionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flat" | "uniform" => Ok(DistributionKind::Flat),
            "gaussian" | "gauss" => Ok(DistributionKind::Gaussian),
            _ => Err(ParseDistributionKindError(s.to_string())),
        }
    }
}

/// Half-width interval `[mean - width, mean + width]` for one coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatAxis {
    pub mean: f64,
    pub width: f64,
}

impl FlatAxis {
    pub const fn new(mean: f64, width: f64) -> Self {
        Self { mean, width }
    }

    #[inline]
    pub fn lower(&self) -> f64 {
        self.mean - self.width
    }

    #[inline]
    pub fn upper(&self) -> f64 {
        self.mean + self.width
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower() && value <= self.upper()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatParams {
    pub x: FlatAxis,
    pub px: FlatAxis,
    pub y: FlatAxis,
    pub py: FlatAxis,
    pub t: FlatAxis,
    pub pt: FlatAxis,
}

impl Default for FlatParams {
    fn default() -> Self {
        Self {
            x: FlatAxis::new(0.0, 1e-5),
            px: FlatAxis::new(0.0, 1e-5),
            y: FlatAxis::new(0.0, 1e-3),
            py: FlatAxis::new(0.0, 1e-3),
            t: FlatAxis::new(0.0, 0.0),
            pt: FlatAxis::new(0.0, 0.0),
        }
    }
}

/// Twiss description of one transverse phase-space ellipse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwissPlane {
    /// Geometric emittance in m·rad.
    pub emittance: f64,
    /// Beta function in m.
    pub beta: f64,
    pub alpha: f64,
}

impl Default for TwissPlane {
    fn default() -> Self {
        Self {
            emittance: 1e-10,
            beta: 0.1,
            alpha: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianParams {
    pub x: TwissPlane,
    pub y: TwissPlane,
    pub sigma_t: f64,
    pub sigma_pt: f64,
}

impl Default for GaussianParams {
    fn default() -> Self {
        Self {
            x: TwissPlane::default(),
            y: TwissPlane::default(),
            sigma_t: 1e-12,
            sigma_pt: 1e-12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    Flat(FlatParams),
    Gaussian(GaussianParams),
}

impl Distribution {
    pub fn kind(&self) -> DistributionKind {
        match self {
            Distribution::Flat(_) => DistributionKind::Flat,
            Distribution::Gaussian(_) => DistributionKind::Gaussian,
        }
    }
}

impl Default for Distribution {
    fn default() -> Self {
        Distribution::Flat(FlatParams::default())
    }
}

pub const DEFAULT_SEED: u64 = 1729;

/// Everything needed to sample the initial particles deterministically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributionSpec {
    pub distribution: Distribution,
    pub particle_count: usize,
    pub seed: u64,
}

impl Default for DistributionSpec {
    fn default() -> Self {
        Self {
            distribution: Distribution::default(),
            particle_count: 10,
            seed: DEFAULT_SEED,
        }
    }
}

/// Initial coordinates of one particle in MAD-X conventions (m, rad).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InitialCoordinates {
    pub x: f64,
    pub px: f64,
    pub y: f64,
    pub py: f64,
    pub t: f64,
    pub pt: f64,
}

/// The one particle set every backend tracks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParticleDistribution {
    pub rows: Vec<InitialCoordinates>,
}

impl ParticleDistribution {
    pub fn new(rows: Vec<InitialCoordinates>) -> Self {
        Self { rows }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InitialCoordinates> {
        self.rows.iter()
    }
}
