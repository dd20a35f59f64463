//! Adapters for the external tracking codes under comparison.
//!
//! Each [`Backend`] knows how to describe the test case in its own lattice
//! dialect, how it is invoked, which files a run leaves behind and how to
//! read its sampler output back into the canonical [`SimulationOutput`].

mod bdsim;
mod ptc;

pub use bdsim::BdsimBackend;
pub use ptc::PtcBackend;

use super::case::TestCase;
use super::error::{ConfigError, ExecutionFailure};
use crate::model::element::ElementKind;
use crate::model::table::SimulationOutput;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

/// How to launch one backend run. Paths are relative to the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// File fed to the process on stdin, if the program reads its input there.
    pub stdin: Option<PathBuf>,
    /// Receives both stdout and stderr.
    pub log: PathBuf,
}

pub trait Backend: Send + Sync {
    /// Stable identifier used in file names, reports and configuration.
    fn id(&self) -> &str;

    /// Short display name for tables and figure legends.
    fn label(&self) -> &str;

    fn lattice_extension(&self) -> &str;

    fn lattice_file_name(&self, kind: ElementKind) -> String {
        format!("{}.{}.{}", kind, self.id(), self.lattice_extension())
    }

    /// Writes the case as a lattice in this backend's dialect.
    fn write_lattice(
        &self,
        case: &TestCase,
        distribution_file: &str,
        writer: &mut dyn Write,
    ) -> Result<(), crate::io::Error>;

    fn invocation(&self, lattice: &Path) -> Invocation;

    /// Reads the run's output from `working_dir` into canonical units.
    fn load_output(&self, working_dir: &Path) -> Result<SimulationOutput, ExecutionFailure>;

    /// Files and directories a run may create, relative to the working directory.
    fn artifacts(&self) -> Vec<PathBuf>;

    /// Where the derived emittance summary goes, for backends that produce one.
    fn optics_path(&self) -> Option<PathBuf> {
        None
    }

    fn derives_optics(&self) -> bool {
        self.optics_path().is_some()
    }
}

/// Backend ids understood by [`backend_by_id`].
pub const BACKEND_IDS: [&str; 3] = ["bdsim", "bdsim-tracking", "ptc"];

/// Looks up a backend by id, optionally overriding the program it runs.
pub fn backend_by_id(id: &str, program: Option<&str>) -> Result<Box<dyn Backend>, ConfigError> {
    let backend: Box<dyn Backend> = match (id, program) {
        ("bdsim", None) => Box::new(BdsimBackend::full()),
        ("bdsim", Some(p)) => Box::new(BdsimBackend::full().with_program(p)),
        ("bdsim-tracking", None) => Box::new(BdsimBackend::tracking()),
        ("bdsim-tracking", Some(p)) => Box::new(BdsimBackend::tracking().with_program(p)),
        ("ptc" | "madx", None) => Box::new(PtcBackend::new()),
        ("ptc" | "madx", Some(p)) => Box::new(PtcBackend::new().with_program(p)),
        _ => return Err(ConfigError::UnsupportedBackend(id.to_string())),
    };
    Ok(backend)
}

/// Full BDSIM against its tracking-only build, the comparison the harness
/// runs when nothing else is configured.
pub fn default_backends() -> Vec<Box<dyn Backend>> {
    vec![
        Box::new(BdsimBackend::full()),
        Box::new(BdsimBackend::tracking()),
    ]
}

/// Opens `relative` under `working_dir` and decodes it with `read`.
fn load<T, F>(working_dir: &Path, relative: &Path, read: F) -> Result<T, ExecutionFailure>
where
    F: FnOnce(BufReader<File>) -> Result<T, crate::io::Error>,
{
    let path = working_dir.join(relative);
    let file = File::open(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ExecutionFailure::MissingOutput {
            path: path.clone(),
        },
        _ => ExecutionFailure::invalid_output(&path, e.to_string()),
    })?;
    read(BufReader::new(file)).map_err(|e| ExecutionFailure::from_codec(&path, e))
}
