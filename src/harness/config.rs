//! Run options and TOML case files.
//!
//! A case file describes one test case plus how to run it:
//!
//! ```toml
//! [element]
//! kind = "quadrupole"
//! length = 0.5
//! k1 = 0.2
//!
//! [beam]
//! particle = "e-"
//! energy = 1.0
//!
//! [distribution]
//! kind = "gaussian"
//! particles = 100
//! emitx = 1e-10
//!
//! [run]
//! backends = ["bdsim", "bdsim-tracking"]
//! timeout_secs = 300
//!
//! [programs]
//! bdsim = "/opt/bdsim/bin/bdsim"
//! ```

use super::backend::{Backend, backend_by_id, default_backends};
use super::case::TestCase;
use super::error::{ConfigError, Error};
use super::pipeline::Pipeline;
use crate::model::beam::Beam;
use crate::model::distribution::DEFAULT_SEED;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Per-process wall-clock limit.
    pub timeout: Duration,
    /// Run the backends concurrently.
    pub parallel: bool,
    /// Backend id used as the residual denominator; the last backend when unset.
    pub reference: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            parallel: false,
            reference: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseFile {
    pub element: ElementSection,
    #[serde(default)]
    pub beam: BeamSection,
    #[serde(default)]
    pub distribution: DistributionSection,
    #[serde(default)]
    pub run: RunSection,
    /// Program path per backend id.
    #[serde(default)]
    pub programs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElementSection {
    pub kind: String,
    pub length: f64,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BeamSection {
    #[serde(default = "default_particle")]
    pub particle: String,
    #[serde(default = "default_energy")]
    pub energy: f64,
}

fn default_particle() -> String {
    "e-".to_string()
}
fn default_energy() -> f64 {
    1.0
}

impl Default for BeamSection {
    fn default() -> Self {
        Self {
            particle: default_particle(),
            energy: default_energy(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistributionSection {
    #[serde(default = "default_distribution")]
    pub kind: String,
    #[serde(default = "default_particles")]
    pub particles: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, f64>,
}

fn default_distribution() -> String {
    "flat".to_string()
}
fn default_particles() -> usize {
    10
}

impl Default for DistributionSection {
    fn default() -> Self {
        Self {
            kind: default_distribution(),
            particles: default_particles(),
            seed: None,
            parameters: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: Option<f64>,
    #[serde(default)]
    pub parallel: bool,
    pub reference: Option<String>,
    pub backends: Option<Vec<String>>,
}

/// A parsed case file turned into the objects a pipeline is built from.
pub struct CaseDefinition {
    pub case: TestCase,
    pub backends: Vec<Box<dyn Backend>>,
    pub options: RunOptions,
}

impl CaseDefinition {
    pub fn into_pipeline(self) -> Result<Pipeline, Error> {
        Pipeline::new(self.case, self.backends, self.options)
    }
}

fn as_pairs(parameters: &BTreeMap<String, f64>) -> Vec<(&str, f64)> {
    parameters.iter().map(|(k, v)| (k.as_str(), *v)).collect()
}

impl CaseFile {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Validates every section and builds the case, backends and options.
    pub fn build(&self) -> Result<CaseDefinition, ConfigError> {
        let energy = self.beam.energy;
        if !energy.is_finite() || energy <= 0.0 {
            return Err(ConfigError::invalid_parameter(
                "energy",
                format!("must be a positive finite number, got {energy}"),
            ));
        }
        let beam = Beam::new(self.beam.particle.parse()?, energy);

        let mut case = TestCase::new(
            &self.element.kind,
            self.element.length,
            &as_pairs(&self.element.parameters),
        )?
        .with_beam(beam)
        .with_seed(self.distribution.seed.unwrap_or(DEFAULT_SEED))
        .with_distribution(
            &self.distribution.kind,
            self.distribution.particles,
            &as_pairs(&self.distribution.parameters),
        )?;
        if let Some(dir) = &self.run.working_dir {
            case = case.with_working_dir(dir);
        }

        // Keyed by canonical id so `madx` and `ptc` name the same program.
        let mut programs = BTreeMap::new();
        for (id, program) in &self.programs {
            let canonical = backend_by_id(id, None)?.id().to_string();
            if programs.insert(canonical, program.as_str()).is_some() {
                return Err(ConfigError::DuplicateBackend(id.clone()));
            }
        }
        let with_program = |id: &str| -> Result<Box<dyn Backend>, ConfigError> {
            let canonical = backend_by_id(id, None)?;
            backend_by_id(id, programs.get(canonical.id()).copied())
        };

        let backends = match &self.run.backends {
            Some(ids) => ids
                .iter()
                .map(|id| with_program(id))
                .collect::<Result<Vec<_>, _>>()?,
            None => default_backends()
                .iter()
                .map(|b| with_program(b.id()))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let timeout = match self.run.timeout_secs {
            Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs).map_err(|e| {
                ConfigError::invalid_parameter("timeout_secs", format!("{secs}: {e}"))
            })?,
            Some(secs) => {
                return Err(ConfigError::invalid_parameter(
                    "timeout_secs",
                    format!("must be a positive number of seconds, got {secs}"),
                ));
            }
            None => DEFAULT_TIMEOUT,
        };

        Ok(CaseDefinition {
            case,
            backends,
            options: RunOptions {
                timeout,
                parallel: self.run.parallel,
                reference: self.run.reference.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::beam::Particle;
    use crate::model::distribution::{Distribution, DistributionKind};
    use crate::model::element::Element;
    use std::path::Path;

    const QUADRUPOLE: &str = r#"
[element]
kind = "quadrupole"
length = 0.5
k1 = 0.2
aperture = 0.05

[beam]
particle = "proton"
energy = 7000

[distribution]
kind = "gaussian"
particles = 100
seed = 99
emitx = 2e-10

[run]
working_dir = "work/quad"
timeout_secs = 30
parallel = true
reference = "bdsim"
backends = ["ptc", "bdsim"]

[programs]
bdsim = "/opt/bdsim/bin/bdsim"
"#;

    #[test]
    fn full_case_file_builds() {
        let definition = CaseFile::parse(QUADRUPOLE).unwrap().build().unwrap();
        let case = &definition.case;

        assert_eq!(*case.element(), Element::Quadrupole { length: 0.5, k1: 0.2 });
        assert_eq!(case.parameters().get("aperture"), Some(&0.05));
        assert_eq!(case.beam().particle, Particle::Proton);
        assert_eq!(case.beam().energy, 7000.0);
        assert_eq!(case.distribution().distribution.kind(), DistributionKind::Gaussian);
        assert_eq!(case.distribution().seed, 99);
        assert_eq!(case.particle_count(), 100);
        assert_eq!(case.working_dir(), Path::new("work/quad"));

        let ids: Vec<_> = definition.backends.iter().map(|b| b.id()).collect();
        assert_eq!(ids, ["ptc", "bdsim"]);
        let bdsim = definition.backends[1].invocation(Path::new("q.gmad"));
        assert_eq!(bdsim.program, "/opt/bdsim/bin/bdsim");

        assert_eq!(definition.options.timeout, Duration::from_secs(30));
        assert!(definition.options.parallel);
        assert_eq!(definition.options.reference.as_deref(), Some("bdsim"));
    }

    #[test]
    fn minimal_case_file_uses_defaults() {
        let definition = CaseFile::parse("[element]\nkind = \"drift\"\nlength = 1\n")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(definition.case.beam().particle, Particle::Electron);
        assert_eq!(definition.case.particle_count(), 10);
        assert_eq!(definition.case.distribution().seed, DEFAULT_SEED);
        assert!(matches!(
            definition.case.distribution().distribution,
            Distribution::Flat(_)
        ));
        let ids: Vec<_> = definition.backends.iter().map(|b| b.id()).collect();
        assert_eq!(ids, ["bdsim", "bdsim-tracking"]);
        assert_eq!(definition.options, RunOptions::default());
    }

    #[test]
    fn program_overrides_apply_to_default_backends() {
        let text = "[element]\nkind = \"drift\"\nlength = 1\n[programs]\nbdsim-tracking = \"/tmp/trk\"\n";
        let definition = CaseFile::parse(text).unwrap().build().unwrap();
        let invocation = definition.backends[1].invocation(Path::new("d.gmad"));
        assert_eq!(invocation.program, "/tmp/trk");
    }

    #[test]
    fn program_overrides_follow_backend_aliases() {
        let text = "[element]\nkind = \"drift\"\nlength = 1\n\
                    [run]\nbackends = [\"ptc\", \"bdsim\"]\n\
                    [programs]\nmadx = \"/opt/madx/bin/madx\"\n";
        let definition = CaseFile::parse(text).unwrap().build().unwrap();
        let invocation = definition.backends[0].invocation(Path::new("d.madx"));
        assert_eq!(invocation.program, "/opt/madx/bin/madx");

        let both = "[element]\nkind = \"drift\"\nlength = 1\n\
                    [programs]\nmadx = \"/a\"\nptc = \"/b\"\n";
        assert!(matches!(
            CaseFile::parse(both).unwrap().build().err(),
            Some(ConfigError::DuplicateBackend(_))
        ));
    }

    #[test]
    fn unrepresentable_timeout_is_rejected() {
        let build = |secs: &str| {
            let text =
                format!("[element]\nkind = \"drift\"\nlength = 1\n[run]\ntimeout_secs = {secs}\n");
            CaseFile::parse(&text).unwrap().build().err()
        };

        for secs in ["1e30", "0", "-5", "nan", "inf"] {
            assert!(
                matches!(
                    build(secs),
                    Some(ConfigError::InvalidParameter { ref parameter, .. }) if parameter == "timeout_secs"
                ),
                "timeout_secs = {secs}"
            );
        }
        assert!(build("0.25").is_none());
    }

    #[test]
    fn invalid_documents_are_config_errors() {
        assert!(matches!(
            CaseFile::parse("[element]\nkind = \"drift\"\n").unwrap_err(),
            ConfigError::Parse(_)
        ));
        assert!(matches!(
            CaseFile::parse("[element]\nkind = \"drift\"\nlength = 1\n[extra]\n").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn semantic_errors_surface_from_build() {
        let build = |text: &str| CaseFile::parse(text).unwrap().build().err();

        assert!(matches!(
            build("[element]\nkind = \"wiggler\"\nlength = 1\n"),
            Some(ConfigError::UnsupportedElement(_))
        ));
        assert!(matches!(
            build("[element]\nkind = \"drift\"\nlength = 1\n[beam]\nparticle = \"photon\"\n"),
            Some(ConfigError::UnsupportedParticle(_))
        ));
        assert!(matches!(
            build("[element]\nkind = \"drift\"\nlength = 1\n[run]\nbackends = [\"elegant\", \"ptc\"]\n"),
            Some(ConfigError::UnsupportedBackend(_))
        ));
        assert!(matches!(
            build("[element]\nkind = \"drift\"\nlength = 1\n[programs]\nelegant = \"x\"\n"),
            Some(ConfigError::UnsupportedBackend(_))
        ));
        assert!(matches!(
            build("[element]\nkind = \"drift\"\nlength = 1\n[distribution]\nwidthq = 1\n"),
            Some(ConfigError::UnknownParameter { .. })
        ));
    }
}
