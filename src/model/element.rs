use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid or unsupported element kind: '{0}'")]
pub struct ParseElementKindError(String);

impl ParseElementKindError {
    /// The text that failed to parse.
    pub fn input(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Drift,
    Quadrupole,
    Sextupole,
    Sbend,
    Rbend,
}

impl ElementKind {
    pub const ALL: [ElementKind; 5] = [
        ElementKind::Drift,
        ElementKind::Quadrupole,
        ElementKind::Sextupole,
        ElementKind::Sbend,
        ElementKind::Rbend,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Drift => "drift",
            ElementKind::Quadrupole => "quadrupole",
            ElementKind::Sextupole => "sextupole",
            ElementKind::Sbend => "sbend",
            ElementKind::Rbend => "rbend",
        }
    }

    /// Deterministic lattice name of the single element under test.
    pub fn element_name(self) -> &'static str {
        match self {
            ElementKind::Drift => "d1",
            ElementKind::Quadrupole => "q1",
            ElementKind::Sextupole => "s1",
            ElementKind::Sbend => "sb1",
            ElementKind::Rbend => "rb1",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = ParseElementKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drift" => Ok(ElementKind::Drift),
            "quadrupole" | "quad" => Ok(ElementKind::Quadrupole),
            "sextupole" => Ok(ElementKind::Sextupole),
            "sbend" => Ok(ElementKind::Sbend),
            "rbend" => Ok(ElementKind::Rbend),
            _ => Err(ParseElementKindError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DipoleCategory {
    Sbend,
    Rbend,
}

/// The single optical element under test.
///
/// Each variant carries exactly the strengths its kind needs; anything else a
/// backend may accept travels separately as opaque keyword parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Element {
    Drift {
        length: f64,
    },
    Dipole {
        length: f64,
        angle: f64,
        category: DipoleCategory,
    },
    Quadrupole {
        length: f64,
        k1: f64,
    },
    Sextupole {
        length: f64,
        k2: f64,
    },
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Drift { .. } => ElementKind::Drift,
            Element::Dipole {
                category: DipoleCategory::Sbend,
                ..
            } => ElementKind::Sbend,
            Element::Dipole {
                category: DipoleCategory::Rbend,
                ..
            } => ElementKind::Rbend,
            Element::Quadrupole { .. } => ElementKind::Quadrupole,
            Element::Sextupole { .. } => ElementKind::Sextupole,
        }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        match *self {
            Element::Drift { length }
            | Element::Dipole { length, .. }
            | Element::Quadrupole { length, .. }
            | Element::Sextupole { length, .. } => length,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.kind().element_name()
    }

    /// Canonical strength parameters, in the order backends expect them.
    pub fn strengths(&self) -> Vec<(&'static str, f64)> {
        match *self {
            Element::Drift { .. } => Vec::new(),
            Element::Dipole { angle, .. } => vec![("angle", angle)],
            Element::Quadrupole { k1, .. } => vec![("k1", k1)],
            Element::Sextupole { k2, .. } => vec![("k2", k2)],
        }
    }
}
