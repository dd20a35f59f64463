use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    Horizontal,
    Vertical,
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plane::Horizontal => write!(f, "x"),
            Plane::Vertical => write!(f, "y"),
        }
    }
}

/// RMS emittance (m·rad) at the entrance and exit of the element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmittancePair {
    pub before: f64,
    pub after: f64,
}

impl EmittancePair {
    /// `after / before`; `None` when the entrance emittance is zero.
    pub fn ratio(&self) -> Option<f64> {
        let ratio = self.after / self.before;
        ratio.is_finite().then_some(ratio)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Optics {
    pub horizontal: EmittancePair,
    pub vertical: EmittancePair,
}

impl Optics {
    pub fn plane(&self, plane: Plane) -> EmittancePair {
        match plane {
            Plane::Horizontal => self.horizontal,
            Plane::Vertical => self.vertical,
        }
    }
}
