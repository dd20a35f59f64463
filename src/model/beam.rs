use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid or unsupported particle species: '{0}'")]
pub struct ParseParticleError(String);

impl ParseParticleError {
    /// The text that failed to parse.
    pub fn input(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Particle {
    Electron,
    Positron,
    Proton,
    Antiproton,
    MuonMinus,
    MuonPlus,
}

impl Particle {
    /// Species name understood by BDSIM's `beam` command.
    pub fn gmad_name(self) -> &'static str {
        match self {
            Particle::Electron => "e-",
            Particle::Positron => "e+",
            Particle::Proton => "proton",
            Particle::Antiproton => "antiproton",
            Particle::MuonMinus => "mu-",
            Particle::MuonPlus => "mu+",
        }
    }

    /// Species name understood by MAD-X's `beam` command.
    pub fn madx_name(self) -> &'static str {
        match self {
            Particle::Electron => "electron",
            Particle::Positron => "positron",
            Particle::Proton => "proton",
            Particle::Antiproton => "antiproton",
            Particle::MuonMinus => "negmuon",
            Particle::MuonPlus => "posmuon",
        }
    }
}

impl fmt::Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.gmad_name())
    }
}

impl FromStr for Particle {
    type Err = ParseParticleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "e-" | "electron" => Ok(Particle::Electron),
            "e+" | "positron" => Ok(Particle::Positron),
            "proton" | "p" => Ok(Particle::Proton),
            "antiproton" | "pbar" => Ok(Particle::Antiproton),
            "mu-" | "negmuon" => Ok(Particle::MuonMinus),
            "mu+" | "posmuon" => Ok(Particle::MuonPlus),
            _ => Err(ParseParticleError(s.to_string())),
        }
    }
}

/// Reference beam shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Beam {
    pub particle: Particle,
    /// Total energy in GeV.
    pub energy: f64,
}

impl Beam {
    pub fn new(particle: Particle, energy: f64) -> Self {
        Self { particle, energy }
    }
}

impl Default for Beam {
    fn default() -> Self {
        Self {
            particle: Particle::Electron,
            energy: 1.0,
        }
    }
}
