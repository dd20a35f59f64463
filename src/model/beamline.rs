use super::beam::Beam;
use super::element::Element;
use std::collections::BTreeMap;

/// Name of the marker placed directly after the element under test.
pub const END_MARKER: &str = "theend";

/// Where a backend records particle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerPlacement {
    /// Explicit sampler at the named marker.
    Marker(String),
    /// The backend samples after every element by default.
    All,
}

/// Backend-neutral single-element beamline.
///
/// Every lattice writer serialises the same structure: the beam and its
/// distribution file, one element, one trailing marker and one sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct Beamline {
    pub beam: Beam,
    pub distribution_file: String,
    pub element: Element,
    /// Opaque keyword parameters forwarded to the element definition.
    pub parameters: BTreeMap<String, f64>,
    pub marker: String,
    pub sampler: SamplerPlacement,
}

impl Beamline {
    #[inline]
    pub fn element_name(&self) -> &'static str {
        self.element.name()
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.element.length()
    }
}
