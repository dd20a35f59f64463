use super::{Backend, Invocation, load};
use crate::harness::case::TestCase;
use crate::harness::error::ExecutionFailure;
use crate::io::{bdsim, gmad};
use crate::model::beamline::{END_MARKER, SamplerPlacement};
use crate::model::table::SimulationOutput;
use std::io::Write;
use std::path::{Path, PathBuf};

const OPTICS_FILE: &str = "optics.dat";

/// BDSIM driven through a GMAD lattice, writing combined ASCII output.
///
/// The same adapter covers the full Geant4 build and the tracking-only build;
/// they differ in program, output stem and log name.
#[derive(Debug, Clone)]
pub struct BdsimBackend {
    id: &'static str,
    label: &'static str,
    program: String,
    outfile: &'static str,
    log: &'static str,
    optics: bool,
}

impl BdsimBackend {
    pub fn full() -> Self {
        Self {
            id: "bdsim",
            label: "BDSIM",
            program: "bdsim".to_string(),
            outfile: "testBDS",
            log: "test_bds.log",
            optics: true,
        }
    }

    pub fn tracking() -> Self {
        Self {
            id: "bdsim-tracking",
            label: "BDSTRK",
            program: "bdsim-tracking".to_string(),
            outfile: "testTRK",
            log: "test_trk.log",
            optics: false,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Directory BDSIM creates for `--outfile`.
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(self.outfile)
    }

    fn tracked_file(&self) -> PathBuf {
        self.output_dir().join(format!("{}.txt", self.outfile))
    }

    fn primaries_file(&self) -> PathBuf {
        self.output_dir().join(format!("{}.primaries.txt", self.outfile))
    }
}

impl Backend for BdsimBackend {
    fn id(&self) -> &str {
        self.id
    }

    fn label(&self) -> &str {
        self.label
    }

    fn lattice_extension(&self) -> &str {
        "gmad"
    }

    fn write_lattice(
        &self,
        case: &TestCase,
        distribution_file: &str,
        writer: &mut dyn Write,
    ) -> Result<(), crate::io::Error> {
        let beamline = case.beamline(
            distribution_file,
            SamplerPlacement::Marker(END_MARKER.to_string()),
        );
        gmad::write(writer, &beamline)
    }

    fn invocation(&self, lattice: &Path) -> Invocation {
        Invocation {
            program: self.program.clone(),
            args: vec![
                format!("--file={}", lattice.display()),
                "--batch".to_string(),
                format!("--outfile={}", self.outfile),
                "--output=combined".to_string(),
            ],
            stdin: None,
            log: PathBuf::from(self.log),
        }
    }

    fn load_output(&self, working_dir: &Path) -> Result<SimulationOutput, ExecutionFailure> {
        let tracked = load(working_dir, &self.tracked_file(), bdsim::read)?;

        let primaries = self.primaries_file();
        let primary = if working_dir.join(&primaries).is_file() {
            Some(load(working_dir, &primaries, bdsim::read)?)
        } else {
            None
        };

        Ok(SimulationOutput::new(self.id, self.label, tracked).with_primary(primary))
    }

    fn artifacts(&self) -> Vec<PathBuf> {
        vec![self.output_dir(), PathBuf::from(self.log)]
    }

    fn optics_path(&self) -> Option<PathBuf> {
        self.optics.then(|| self.output_dir().join(OPTICS_FILE))
    }
}
