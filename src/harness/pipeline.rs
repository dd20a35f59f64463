//! The Clean → Make → Execute → Compare state machine.

use super::backend::{Backend, default_backends};
use super::case::TestCase;
use super::compare::{ResidualSet, fractional_residuals};
use super::config::RunOptions;
use super::error::{ConfigError, Error, ExecutionFailure};
use super::execute::{self, ProcessRecord};
use super::manifest::{DISTRIBUTION_FILE, Manifest};
use super::optics;
use super::report::{BackendFailure, BackendOptics, Report};
use super::sampling;
use crate::io;
use crate::model::distribution::ParticleDistribution;
use crate::model::table::SimulationOutput;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Progress of a pipeline. Stages are ordered; an operation requires a
/// minimum stage and moves the pipeline to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Uninitialized,
    Cleaned,
    Generated,
    Executed,
    Compared,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Uninitialized => write!(f, "uninitialized"),
            Stage::Cleaned => write!(f, "cleaned"),
            Stage::Generated => write!(f, "generated"),
            Stage::Executed => write!(f, "executed"),
            Stage::Compared => write!(f, "compared"),
        }
    }
}

/// Drives one [`TestCase`] through every backend and compares the results.
///
/// # Examples
///
/// ```no_run
/// use trackcheck::{Pipeline, RunOptions, TestCase};
///
/// let case = TestCase::new("quadrupole", 0.5, &[("k1", 0.2)])?
///     .with_working_dir("work/quadrupole")
///     .with_distribution("gaussian", 100, &[("emitx", 1e-10)])?;
///
/// let mut pipeline = Pipeline::with_default_backends(case, RunOptions::default())?;
/// let report = pipeline.clean_make_run()?;
/// println!("{}", report.to_json()?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Pipeline {
    case: TestCase,
    backends: Vec<Box<dyn Backend>>,
    options: RunOptions,
    reference: usize,
    manifest: Manifest,
    stage: Stage,
    /// Artifacts on disk no longer match the case.
    stale: bool,
    distribution: Option<ParticleDistribution>,
    executions: Vec<ProcessRecord>,
    completed: Vec<usize>,
    failures: Vec<BackendFailure>,
    outputs: Vec<SimulationOutput>,
    report: Option<Report>,
}

impl Pipeline {
    /// Creates a pipeline over `backends`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] (wrapped in [`Error::Configuration`]) when fewer
    /// than two backends are given, an id repeats, or the configured reference
    /// is not among them.
    pub fn new(
        case: TestCase,
        backends: Vec<Box<dyn Backend>>,
        options: RunOptions,
    ) -> Result<Self, Error> {
        if backends.len() < 2 {
            return Err(ConfigError::TooFewBackends(backends.len()).into());
        }
        let mut seen = HashSet::new();
        if let Some(dup) = backends.iter().find(|b| !seen.insert(b.id().to_string())) {
            return Err(ConfigError::DuplicateBackend(dup.id().to_string()).into());
        }
        let reference = match &options.reference {
            Some(id) => backends
                .iter()
                .position(|b| b.id() == id)
                .ok_or_else(|| ConfigError::UnknownReference(id.clone()))?,
            None => backends.len() - 1,
        };
        let manifest = Manifest::for_run(&case, &backends);

        Ok(Self {
            case,
            backends,
            options,
            reference,
            manifest,
            stage: Stage::Uninitialized,
            stale: false,
            distribution: None,
            executions: Vec::new(),
            completed: Vec::new(),
            failures: Vec::new(),
            outputs: Vec::new(),
            report: None,
        })
    }

    /// Full BDSIM compared against its tracking-only build.
    pub fn with_default_backends(case: TestCase, options: RunOptions) -> Result<Self, Error> {
        Self::new(case, default_backends(), options)
    }

    /// Removes every artifact a run of this case can leave behind.
    ///
    /// Allowed from any stage. Absent files are skipped, so cleaning twice
    /// is harmless.
    pub fn clean(&mut self) -> Result<(), Error> {
        let removed = self.manifest.remove_all()?;
        debug!(removed, dir = %self.manifest.root().display(), "cleaned working directory");
        self.reset();
        self.stale = false;
        self.transition(Stage::Cleaned);
        Ok(())
    }

    /// Samples the particles once and writes the shared distribution file
    /// plus one lattice per backend.
    pub fn make(&mut self) -> Result<(), Error> {
        self.require(Stage::Cleaned, "make")?;
        if self.stage > Stage::Generated || self.stale {
            self.clean()?;
        }

        let dir = self.case.working_dir().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::generation(&dir, e))?;

        let distribution = sampling::generate(self.case.distribution());
        write_artifact(&dir.join(DISTRIBUTION_FILE), |w| {
            io::ptc::write_inrays(w, &distribution)
        })?;

        for backend in &self.backends {
            let path = dir.join(backend.lattice_file_name(self.case.kind()));
            write_artifact(&path, |w| {
                backend.write_lattice(&self.case, DISTRIBUTION_FILE, w)
            })?;
        }

        self.reset();
        self.distribution = Some(distribution);
        self.transition(Stage::Generated);
        Ok(())
    }

    /// Runs every backend, in parallel when configured.
    ///
    /// Failing backends are recorded and the others still run; the step
    /// fails only when no backend succeeded.
    pub fn execute(&mut self) -> Result<(), Error> {
        self.require(Stage::Generated, "execute")?;
        self.remove_previous_outputs()?;

        let dir = self.case.working_dir();
        let kind = self.case.kind();
        let timeout = self.options.timeout;
        let run_one = |backend: &dyn Backend| {
            let lattice = PathBuf::from(backend.lattice_file_name(kind));
            execute::run(backend.id(), &backend.invocation(&lattice), dir, timeout)
        };
        let results: Vec<Result<ProcessRecord, Error>> = if self.options.parallel {
            self.backends.par_iter().map(|b| run_one(b.as_ref())).collect()
        } else {
            self.backends.iter().map(|b| run_one(b.as_ref())).collect()
        };

        self.executions.clear();
        self.completed.clear();
        self.failures.clear();
        self.outputs.clear();
        self.report = None;

        let mut first_error = None;
        for (index, result) in results.into_iter().enumerate() {
            let id = self.backends[index].id();
            let outcome = match result {
                Ok(record) => {
                    let checked = record.ensure_success();
                    self.executions.push(record);
                    checked
                }
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => self.completed.push(index),
                Err(e) => {
                    warn!(backend = id, error = %e, "backend run failed");
                    self.failures.push(BackendFailure::from_error(id, &e));
                    first_error.get_or_insert(e);
                }
            }
        }

        if self.completed.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        self.transition(Stage::Executed);
        Ok(())
    }

    /// Loads every successful backend's output, derives optics and computes
    /// residuals against the reference.
    ///
    /// # Errors
    ///
    /// Returns the first load error when no output could be loaded, or
    /// [`Error::Comparison`] when tables disagree in size. In the latter case
    /// the loaded outputs stay available through [`outputs`](Self::outputs).
    pub fn compare(&mut self) -> Result<&Report, Error> {
        self.require(Stage::Executed, "compare")?;
        self.outputs.clear();
        self.report = None;

        let dir = self.case.working_dir().to_path_buf();
        let mut failures = self.failures.clone();
        let mut first_error = None;
        for &index in &self.completed {
            let backend = self.backends[index].as_ref();
            match self.load(backend, &dir) {
                Ok(output) => {
                    debug!(backend = backend.id(), rows = output.tracked.len(), "loaded output");
                    self.outputs.push(output);
                }
                Err(e) => {
                    warn!(backend = backend.id(), error = %e, "backend output rejected");
                    failures.push(BackendFailure::from_error(backend.id(), &e));
                    first_error.get_or_insert(e);
                }
            }
        }
        if self.outputs.is_empty() {
            return Err(first_error.unwrap_or_else(|| {
                Error::comparison(self.reference_id(), "", "no backend produced an output")
            }));
        }

        let optics = self.derive_optics(&dir)?;
        let residuals = self.residuals()?;
        let report = Report::new(
            self.case.kind().as_str(),
            self.reference_id(),
            self.outputs.clone(),
            residuals,
            optics,
            failures,
        );
        if report.partial {
            warn!(title = %report.title, "report is partial");
        }

        self.transition(Stage::Compared);
        Ok(&*self.report.insert(report))
    }

    /// Clean, make, execute and compare in one go.
    pub fn clean_make_run(&mut self) -> Result<&Report, Error> {
        self.clean()?;
        self.make()?;
        self.execute()?;
        self.compare()
    }

    /// Rebinds the case's distribution.
    ///
    /// Anything generated from the previous distribution is invalidated: the
    /// pipeline drops back to [`Stage::Cleaned`] and the next
    /// [`make`](Self::make) removes the stale artifacts first.
    pub fn change_distribution(
        &mut self,
        kind: &str,
        particle_count: usize,
        parameters: &[(&str, f64)],
    ) -> Result<(), Error> {
        self.case.change_distribution(kind, particle_count, parameters)?;
        if self.stage > Stage::Cleaned {
            self.reset();
            self.stale = true;
            self.transition(Stage::Cleaned);
        }
        Ok(())
    }

    pub fn case(&self) -> &TestCase {
        &self.case
    }

    pub fn backends(&self) -> &[Box<dyn Backend>] {
        &self.backends
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Id of the backend used as the residual denominator.
    pub fn reference_id(&self) -> &str {
        self.backends[self.reference].id()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Particles written by the last [`make`](Self::make).
    pub fn distribution(&self) -> Option<&ParticleDistribution> {
        self.distribution.as_ref()
    }

    pub fn executions(&self) -> &[ProcessRecord] {
        &self.executions
    }

    /// Backends that failed during the last execute.
    pub fn failures(&self) -> &[BackendFailure] {
        &self.failures
    }

    pub fn outputs(&self) -> &[SimulationOutput] {
        &self.outputs
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn require(&self, minimum: Stage, operation: &'static str) -> Result<(), Error> {
        if self.stage < minimum {
            return Err(Error::InvalidTransition {
                operation,
                stage: self.stage,
            });
        }
        Ok(())
    }

    fn transition(&mut self, stage: Stage) {
        info!(from = %self.stage, to = %stage, case = %self.case.kind(), "pipeline stage");
        self.stage = stage;
    }

    /// Deletes what earlier runs wrote, logs aside, so a backend that exits
    /// cleanly without writing cannot be compared on an old table.
    fn remove_previous_outputs(&self) -> Result<(), Error> {
        let kind = self.case.kind();
        let mut previous = Manifest::new(self.case.working_dir());
        for backend in &self.backends {
            let log = backend.invocation(Path::new(&backend.lattice_file_name(kind))).log;
            for artifact in backend.artifacts() {
                if artifact != log {
                    previous.record(artifact);
                }
            }
        }
        let removed = previous.remove_all()?;
        if removed > 0 {
            debug!(removed, "removed outputs of the previous run");
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.distribution = None;
        self.executions.clear();
        self.completed.clear();
        self.failures.clear();
        self.outputs.clear();
        self.report = None;
    }

    fn log_path(&self, backend: &dyn Backend, dir: &Path) -> PathBuf {
        self.executions
            .iter()
            .find(|r| r.backend == backend.id())
            .map(|r| r.log.clone())
            .unwrap_or_else(|| dir.to_path_buf())
    }

    fn load(&self, backend: &dyn Backend, dir: &Path) -> Result<SimulationOutput, Error> {
        let expected = self.case.particle_count();
        backend
            .load_output(dir)
            .and_then(|output| {
                if output.tracked.len() == expected {
                    Ok(output)
                } else {
                    Err(ExecutionFailure::invalid_output(
                        dir,
                        format!(
                            "expected {} tracked particles, found {}",
                            expected,
                            output.tracked.len()
                        ),
                    ))
                }
            })
            .map_err(|failure| Error::execution(backend.id(), self.log_path(backend, dir), failure))
    }

    fn derive_optics(&self, dir: &Path) -> Result<Vec<BackendOptics>, Error> {
        let mut results = Vec::new();
        for backend in self.backends.iter().filter(|b| b.derives_optics()) {
            let Some(output) = self.outputs.iter().find(|o| o.backend == backend.id()) else {
                continue;
            };
            let Some(derived) = optics::derive(output) else {
                debug!(backend = backend.id(), "no primaries, optics skipped");
                continue;
            };
            if let Some(relative) = backend.optics_path() {
                let path = dir.join(relative);
                write_artifact(&path, |w| io::optics::write(w, backend.id(), &derived))?;
            }
            results.push(BackendOptics {
                backend: backend.id().to_string(),
                optics: derived,
            });
        }
        Ok(results)
    }

    fn residuals(&self) -> Result<Vec<ResidualSet>, Error> {
        let reference_id = self.reference_id();
        let Some(reference) = self.outputs.iter().find(|o| o.backend == reference_id) else {
            warn!(reference = reference_id, "reference backend has no output, residuals skipped");
            return Ok(Vec::new());
        };
        self.outputs
            .iter()
            .filter(|o| o.backend != reference_id)
            .map(|candidate| fractional_residuals(candidate, reference))
            .collect()
    }
}

/// Creates `path` and fills it through `write`, reporting failures against the path.
fn write_artifact<F>(path: &Path, write: F) -> Result<(), Error>
where
    F: FnOnce(&mut dyn Write) -> Result<(), io::Error>,
{
    let file = File::create(path).map_err(|e| Error::generation(path, e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer).map_err(|e| Error::generation(path, e.into()))?;
    writer.flush().map_err(|e| Error::generation(path, e))?;
    debug!(path = %path.display(), "wrote artifact");
    Ok(())
}
