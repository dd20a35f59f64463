//! Validated description of one regression test.

use super::error::ConfigError;
use crate::model::beam::Beam;
use crate::model::beamline::{Beamline, END_MARKER, SamplerPlacement};
use crate::model::distribution::{
    Distribution, DistributionKind, DistributionSpec, FlatAxis, FlatParams, GaussianParams,
};
use crate::model::element::{DipoleCategory, Element, ElementKind};
use rand::distr::Uniform;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const STRENGTHS: [&str; 3] = ["angle", "k1", "k2"];
const LENGTH_KEYS: [&str; 2] = ["l", "length"];

/// A single-element beamline, its beam and its initial distribution.
///
/// Construction validates the element/parameter combination, so a `TestCase`
/// always describes something every backend can be asked to track.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    element: Element,
    parameters: BTreeMap<String, f64>,
    beam: Beam,
    distribution: DistributionSpec,
    working_dir: Option<PathBuf>,
}

impl TestCase {
    /// Builds a test case for one element.
    ///
    /// # Arguments
    ///
    /// * `kind` - Element kind (`drift`, `quadrupole`, `sextupole`, `sbend`, `rbend`)
    /// * `length` - Element length in metres
    /// * `parameters` - Strengths (`angle`, `k1`, `k2`) and opaque extras
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown kind, a missing or misplaced
    /// strength, a non-positive length or any non-finite value.
    pub fn new(kind: &str, length: f64, parameters: &[(&str, f64)]) -> Result<Self, ConfigError> {
        let kind: ElementKind = kind.parse()?;
        if !length.is_finite() || length <= 0.0 {
            return Err(ConfigError::invalid_parameter(
                "length",
                format!("must be a positive finite number, got {length}"),
            ));
        }

        let mut extras = BTreeMap::new();
        for &(name, value) in parameters {
            let name = name.trim().to_lowercase();
            if LENGTH_KEYS.contains(&name.as_str()) {
                return Err(ConfigError::UnexpectedParameter {
                    element: kind.to_string(),
                    parameter: name,
                });
            }
            if !value.is_finite() {
                return Err(ConfigError::invalid_parameter(
                    name,
                    format!("must be finite, got {value}"),
                ));
            }
            extras.insert(name, value);
        }

        let element = build_element(kind, length, &mut extras)?;

        Ok(Self {
            element,
            parameters: extras,
            beam: Beam::default(),
            distribution: DistributionSpec::default(),
            working_dir: None,
        })
    }

    pub fn with_beam(mut self, beam: Beam) -> Self {
        self.beam = beam;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.distribution.seed = seed;
        self
    }

    pub fn with_distribution(
        mut self,
        kind: &str,
        particle_count: usize,
        parameters: &[(&str, f64)],
    ) -> Result<Self, ConfigError> {
        self.change_distribution(kind, particle_count, parameters)?;
        Ok(self)
    }

    /// Rebinds the initial distribution. The seed is kept.
    ///
    /// Nothing on disk changes; the pipeline is responsible for invalidating
    /// artifacts generated from the previous distribution.
    pub fn change_distribution(
        &mut self,
        kind: &str,
        particle_count: usize,
        parameters: &[(&str, f64)],
    ) -> Result<(), ConfigError> {
        let kind: DistributionKind = kind.parse()?;
        if particle_count == 0 {
            return Err(ConfigError::InvalidParticleCount);
        }
        let distribution = match kind {
            DistributionKind::Flat => Distribution::Flat(flat_params(parameters)?),
            DistributionKind::Gaussian => Distribution::Gaussian(gaussian_params(parameters)?),
        };
        self.distribution = DistributionSpec {
            distribution,
            particle_count,
            seed: self.distribution.seed,
        };
        Ok(())
    }

    /// The backend-neutral lattice for this case.
    pub fn beamline(&self, distribution_file: &str, sampler: SamplerPlacement) -> Beamline {
        Beamline {
            beam: self.beam,
            distribution_file: distribution_file.to_string(),
            element: self.element,
            parameters: self.parameters.clone(),
            marker: END_MARKER.to_string(),
            sampler,
        }
    }

    #[inline]
    pub fn element(&self) -> &Element {
        &self.element
    }

    #[inline]
    pub fn kind(&self) -> ElementKind {
        self.element.kind()
    }

    /// Opaque keyword parameters forwarded to the lattice.
    pub fn parameters(&self) -> &BTreeMap<String, f64> {
        &self.parameters
    }

    #[inline]
    pub fn beam(&self) -> &Beam {
        &self.beam
    }

    #[inline]
    pub fn distribution(&self) -> &DistributionSpec {
        &self.distribution
    }

    #[inline]
    pub fn particle_count(&self) -> usize {
        self.distribution.particle_count
    }

    /// Directory all artifacts live in; the current directory when unset.
    pub fn working_dir(&self) -> &Path {
        self.working_dir.as_deref().unwrap_or_else(|| Path::new("."))
    }
}

fn build_element(
    kind: ElementKind,
    length: f64,
    extras: &mut BTreeMap<String, f64>,
) -> Result<Element, ConfigError> {
    let (required, rejected): (Option<&'static str>, &[&str]) = match kind {
        ElementKind::Drift => (None, &STRENGTHS),
        ElementKind::Sbend | ElementKind::Rbend => (Some("angle"), &[]),
        ElementKind::Quadrupole => (Some("k1"), &["angle", "k2"]),
        ElementKind::Sextupole => (Some("k2"), &["angle", "k1"]),
    };

    if let Some(parameter) = rejected.iter().find(|p| extras.contains_key(**p)) {
        return Err(ConfigError::UnexpectedParameter {
            element: kind.to_string(),
            parameter: parameter.to_string(),
        });
    }

    let strength = match required {
        Some(parameter) => extras
            .remove(parameter)
            .ok_or_else(|| ConfigError::MissingParameter {
                element: kind.to_string(),
                parameter,
            })?,
        None => 0.0,
    };

    Ok(match kind {
        ElementKind::Drift => Element::Drift { length },
        ElementKind::Sbend => Element::Dipole {
            length,
            angle: strength,
            category: DipoleCategory::Sbend,
        },
        ElementKind::Rbend => Element::Dipole {
            length,
            angle: strength,
            category: DipoleCategory::Rbend,
        },
        ElementKind::Quadrupole => Element::Quadrupole { length, k1: strength },
        ElementKind::Sextupole => Element::Sextupole { length, k2: strength },
    })
}

fn finite(name: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::invalid_parameter(
            name,
            format!("must be finite, got {value}"),
        ))
    }
}

fn non_negative(name: &str, value: f64) -> Result<f64, ConfigError> {
    if finite(name, value)? < 0.0 {
        return Err(ConfigError::invalid_parameter(
            name,
            format!("must not be negative, got {value}"),
        ));
    }
    Ok(value)
}

fn positive(name: &str, value: f64) -> Result<f64, ConfigError> {
    if finite(name, value)? <= 0.0 {
        return Err(ConfigError::invalid_parameter(
            name,
            format!("must be positive, got {value}"),
        ));
    }
    Ok(value)
}

fn unknown(kind: DistributionKind, name: &str) -> ConfigError {
    ConfigError::UnknownParameter {
        distribution: kind.to_string(),
        parameter: name.to_string(),
    }
}

fn flat_params(parameters: &[(&str, f64)]) -> Result<FlatParams, ConfigError> {
    let mut params = FlatParams::default();
    for &(name, value) in parameters {
        let key = name.trim().to_lowercase();
        let (is_mean, coordinate) = if let Some(rest) = key.strip_prefix("mu") {
            (true, rest)
        } else if let Some(rest) = key.strip_prefix("width") {
            (false, rest)
        } else {
            return Err(unknown(DistributionKind::Flat, name));
        };
        let axis: &mut FlatAxis = match coordinate {
            "x" => &mut params.x,
            "px" => &mut params.px,
            "y" => &mut params.y,
            "py" => &mut params.py,
            "t" => &mut params.t,
            "pt" => &mut params.pt,
            _ => return Err(unknown(DistributionKind::Flat, name)),
        };
        if is_mean {
            axis.mean = finite(&key, value)?;
        } else {
            axis.width = non_negative(&key, value)?;
        }
    }

    for (coordinate, axis) in [
        ("x", &params.x),
        ("px", &params.px),
        ("y", &params.y),
        ("py", &params.py),
        ("t", &params.t),
        ("pt", &params.pt),
    ] {
        if let Err(e) = Uniform::<f64>::new_inclusive(axis.lower(), axis.upper()) {
            return Err(ConfigError::invalid_parameter(
                format!("width{coordinate}"),
                format!(
                    "interval [{}, {}] cannot be sampled: {e}",
                    axis.lower(),
                    axis.upper()
                ),
            ));
        }
    }
    Ok(params)
}

fn gaussian_params(parameters: &[(&str, f64)]) -> Result<GaussianParams, ConfigError> {
    let mut params = GaussianParams::default();
    for &(name, value) in parameters {
        let key = name.trim().to_lowercase();
        match key.as_str() {
            "emitx" | "gemx" => params.x.emittance = positive(&key, value)?,
            "betax" => params.x.beta = positive(&key, value)?,
            "alfx" => params.x.alpha = finite(&key, value)?,
            "emity" | "gemy" => params.y.emittance = positive(&key, value)?,
            "betay" => params.y.beta = positive(&key, value)?,
            "alfy" => params.y.alpha = finite(&key, value)?,
            "sigmat" => params.sigma_t = non_negative(&key, value)?,
            "sigmapt" => params.sigma_pt = non_negative(&key, value)?,
            _ => return Err(unknown(DistributionKind::Gaussian, name)),
        }
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_needs_no_strength() {
        let case = TestCase::new("drift", 1.0, &[]).unwrap();
        assert_eq!(case.kind(), ElementKind::Drift);
        assert_eq!(case.element().name(), "d1");
        assert!(case.parameters().is_empty());
        assert_eq!(case.working_dir(), Path::new("."));
    }

    #[test]
    fn unknown_kind_is_unsupported() {
        let err = TestCase::new("octupole", 1.0, &[]).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedElement(kind) if kind == "octupole"));
    }

    #[test]
    fn bend_requires_angle() {
        let err = TestCase::new("sbend", 1.0, &[]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingParameter {
                parameter: "angle",
                ..
            }
        ));

        let case = TestCase::new("rbend", 2.0, &[("angle", 0.1), ("k1", 0.3)]).unwrap();
        assert_eq!(
            *case.element(),
            Element::Dipole {
                length: 2.0,
                angle: 0.1,
                category: DipoleCategory::Rbend
            }
        );
        assert_eq!(case.parameters().get("k1"), Some(&0.3));
    }

    #[test]
    fn quadrupole_and_sextupole_need_their_strength() {
        assert!(matches!(
            TestCase::new("quadrupole", 1.0, &[("k2", 1.0)]).unwrap_err(),
            ConfigError::UnexpectedParameter { .. }
        ));
        assert!(matches!(
            TestCase::new("sextupole", 1.0, &[]).unwrap_err(),
            ConfigError::MissingParameter { parameter: "k2", .. }
        ));
        let quad = TestCase::new("quad", 0.5, &[("K1", 0.2)]).unwrap();
        assert_eq!(*quad.element(), Element::Quadrupole { length: 0.5, k1: 0.2 });
    }

    #[test]
    fn drift_rejects_strengths() {
        let err = TestCase::new("drift", 1.0, &[("k1", 0.1)]).unwrap_err();
        assert!(matches!(err, ConfigError::UnexpectedParameter { parameter, .. } if parameter == "k1"));
    }

    #[test]
    fn extras_pass_through() {
        let case = TestCase::new("drift", 1.0, &[("aperture", 0.02)]).unwrap();
        assert_eq!(case.parameters().get("aperture"), Some(&0.02));
        let line = case.beamline("inrays.madx", SamplerPlacement::All);
        assert_eq!(line.parameters.len(), 1);
        assert_eq!(line.marker, END_MARKER);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert!(matches!(
            TestCase::new("drift", 0.0, &[]).unwrap_err(),
            ConfigError::InvalidParameter { .. }
        ));
        assert!(matches!(
            TestCase::new("drift", 1.0, &[("aperture", f64::NAN)]).unwrap_err(),
            ConfigError::InvalidParameter { .. }
        ));
    }

    #[test]
    fn distribution_can_be_rebound() {
        let mut case = TestCase::new("drift", 1.0, &[]).unwrap().with_seed(7);
        case.change_distribution("gauss", 50, &[("gemx", 2e-10), ("betay", 3.0)])
            .unwrap();

        let spec = case.distribution();
        assert_eq!(spec.particle_count, 50);
        assert_eq!(spec.seed, 7);
        match spec.distribution {
            Distribution::Gaussian(params) => {
                assert_eq!(params.x.emittance, 2e-10);
                assert_eq!(params.y.beta, 3.0);
                assert_eq!(params.x.beta, 0.1);
            }
            other => panic!("expected gaussian, got {other:?}"),
        }
    }

    #[test]
    fn flat_parameters_map_to_axes() {
        let case = TestCase::new("drift", 1.0, &[])
            .unwrap()
            .with_distribution("flat", 5, &[("mux", 1e-3), ("widthpt", 1e-4)])
            .unwrap();
        match case.distribution().distribution {
            Distribution::Flat(params) => {
                assert_eq!(params.x, FlatAxis::new(1e-3, 1e-5));
                assert_eq!(params.pt, FlatAxis::new(0.0, 1e-4));
            }
            other => panic!("expected flat, got {other:?}"),
        }
    }

    #[test]
    fn distribution_errors_are_typed() {
        let mut case = TestCase::new("drift", 1.0, &[]).unwrap();
        assert!(matches!(
            case.change_distribution("poisson", 10, &[]).unwrap_err(),
            ConfigError::UnsupportedDistribution(_)
        ));
        assert!(matches!(
            case.change_distribution("flat", 0, &[]).unwrap_err(),
            ConfigError::InvalidParticleCount
        ));
        assert!(matches!(
            case.change_distribution("flat", 10, &[("emitx", 1e-9)]).unwrap_err(),
            ConfigError::UnknownParameter { .. }
        ));
        assert!(matches!(
            case.change_distribution("flat", 10, &[("widthx", -1.0)]).unwrap_err(),
            ConfigError::InvalidParameter { .. }
        ));
        assert!(matches!(
            case.change_distribution("gaussian", 10, &[("betax", 0.0)]).unwrap_err(),
            ConfigError::InvalidParameter { .. }
        ));
        assert_eq!(case.distribution(), &DistributionSpec::default());
    }

    #[test]
    fn flat_interval_must_be_sampleable() {
        let mut case = TestCase::new("drift", 1.0, &[]).unwrap();
        let parameter = |err: ConfigError| match err {
            ConfigError::InvalidParameter { parameter, .. } => parameter,
            other => panic!("expected invalid parameter, got {other:?}"),
        };

        let err = case
            .change_distribution("flat", 3, &[("widthx", 1e308)])
            .unwrap_err();
        assert_eq!(parameter(err), "widthx");

        let err = case
            .change_distribution("flat", 3, &[("mupx", 1.7e308), ("widthpx", 1e308)])
            .unwrap_err();
        assert_eq!(parameter(err), "widthpx");

        case.change_distribution("flat", 3, &[("widthx", 1e3)]).unwrap();
        assert_eq!(crate::harness::sampling::generate(case.distribution()).len(), 3);
    }
}
