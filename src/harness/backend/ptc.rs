use super::{Backend, Invocation, load};
use crate::harness::case::TestCase;
use crate::harness::error::ExecutionFailure;
use crate::io::{madx, ptc};
use crate::model::beamline::SamplerPlacement;
use crate::model::table::{PhaseSpaceTable, SimulationOutput};
use std::io::Write;
use std::path::{Path, PathBuf};

const TRACK_TABLE: &str = "trackone";
const LOG: &str = "madx.log";
/// Written by PTC whenever a bend is tracked.
const BEND_SCRATCH: &str = "Maxwellian_bend_for_ptc.txt";

/// MAD-X running PTC thick tracking; reads its lattice from stdin.
#[derive(Debug, Clone)]
pub struct PtcBackend {
    program: String,
}

impl PtcBackend {
    pub fn new() -> Self {
        Self {
            program: "madx".to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl Default for PtcBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for PtcBackend {
    fn id(&self) -> &str {
        "ptc"
    }

    fn label(&self) -> &str {
        "PTC"
    }

    fn lattice_extension(&self) -> &str {
        "madx"
    }

    fn write_lattice(
        &self,
        case: &TestCase,
        distribution_file: &str,
        writer: &mut dyn Write,
    ) -> Result<(), crate::io::Error> {
        let beamline = case.beamline(distribution_file, SamplerPlacement::All);
        madx::write(writer, &beamline)
    }

    fn invocation(&self, lattice: &Path) -> Invocation {
        Invocation {
            program: self.program.clone(),
            args: Vec::new(),
            stdin: Some(lattice.to_path_buf()),
            log: PathBuf::from(LOG),
        }
    }

    /// The last observation segment is the tracked state; the first one is
    /// the initial state when PTC recorded more than one.
    fn load_output(&self, working_dir: &Path) -> Result<SimulationOutput, ExecutionFailure> {
        let table = load(working_dir, Path::new(TRACK_TABLE), ptc::read_trackone)?;
        let path = working_dir.join(TRACK_TABLE);

        let tracked = table
            .last()
            .map(|segment| PhaseSpaceTable::new(segment.rows.clone()))
            .ok_or_else(|| ExecutionFailure::invalid_output(&path, "table has no tracking data"))?;
        let primary = match table.segments.as_slice() {
            [first, _, ..] => Some(PhaseSpaceTable::new(first.rows.clone())),
            _ => None,
        };

        Ok(SimulationOutput::new(self.id(), self.label(), tracked).with_primary(primary))
    }

    fn artifacts(&self) -> Vec<PathBuf> {
        vec![
            PathBuf::from(TRACK_TABLE),
            PathBuf::from(LOG),
            PathBuf::from(BEND_SCRATCH),
        ]
    }
}
