use std::io::{self, Write};

use anyhow::Error;

use trackcheck::{ConfigError, Error as HarnessError, ExecutionFailure};

use crate::util::text::wrap;

#[rustfmt::skip]
pub fn print_error(err: &Error) {
    let mut stderr = io::stderr().lock();

    let _ = writeln!(stderr);
    let _ = writeln!(stderr, "   ╔══════════════════════════════════════════════════════════════╗");
    let _ = writeln!(stderr, "   ║  ✗ Error                                                     ║");
    let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");

    let msg = err.to_string();
    for line in wrap(&msg, 59) {
        let _ = writeln!(stderr, "   ║  {:<59} ║", line);
    }

    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Caused by:                                                  ║");
        for line in wrap(&cause.to_string(), 59) {
            let _ = writeln!(stderr, "   ║    {:<57} ║", line);
        }
        source = cause.source();
    }

    if let Some(hints) = HintCollector::collect(err) {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Hints:                                                      ║");
        for hint in hints {
            let wrapped = wrap(&hint, 55);
            if let Some((first, rest)) = wrapped.split_first() {
                let _ = writeln!(stderr, "   ║    • {:<55} ║", first);
                for line in rest {
                    let _ = writeln!(stderr, "   ║      {:<55} ║", line);
                }
            }
        }
    }

    let _ = writeln!(stderr, "   ╚══════════════════════════════════════════════════════════════╝");
    let _ = writeln!(stderr);
}

struct HintCollector {
    hints: Vec<String>,
    has_typed_hints: bool,
}

impl HintCollector {
    fn new() -> Self {
        Self {
            hints: Vec::new(),
            has_typed_hints: false,
        }
    }

    fn collect(err: &Error) -> Option<Vec<String>> {
        let mut collector = Self::new();

        collector.collect_harness_hints(err);
        collector.collect_config_hints(err);
        collector.collect_io_hints(err);

        if !collector.has_typed_hints {
            collector.collect_fallback_hints(err);
        }

        if collector.hints.is_empty() {
            None
        } else {
            Some(collector.hints)
        }
    }

    fn add(&mut self, hint: impl Into<String>) {
        self.hints.push(hint.into());
    }

    fn mark_typed(&mut self) {
        self.has_typed_hints = true;
    }

    fn collect_harness_hints(&mut self, err: &Error) {
        let Some(harness_err) = err.downcast_ref::<HarnessError>() else {
            return;
        };

        self.mark_typed();

        match harness_err {
            HarnessError::Configuration(config) => self.add_config_hints(config),

            HarnessError::Generation { artifact, source } => {
                self.add(format!(
                    "Could not write generated input '{}'",
                    artifact.display()
                ));
                self.collect_std_io_hints(source);
            }

            HarnessError::Cleanup { path, source } => {
                self.add(format!("Could not remove '{}'", path.display()));
                self.collect_std_io_hints(source);
            }

            HarnessError::Execution {
                backend,
                log,
                failure,
            } => {
                self.add(format!("See {} for the output of '{}'", log.display(), backend));
                self.add_execution_hints(failure);
            }

            HarnessError::Comparison { .. } => {
                self.add("Both backends must report the same particles in the same order");
                self.add("Check that the sampler sits at the end of the element in both lattices");
            }

            HarnessError::InvalidTransition { .. } => {
                self.add("Stages run in order: clean, make, execute, compare");
                self.add("Use 'trackcheck run' to chain all four");
            }
        }
    }

    fn add_execution_hints(&mut self, failure: &ExecutionFailure) {
        match failure {
            ExecutionFailure::ProgramNotFound { program } => {
                self.add(format!("'{}' is not on PATH", program));
                self.add("Set its location in the [programs] table of the case file");
                self.add("Or drop the backend with --backend");
            }

            ExecutionFailure::Spawn { .. } | ExecutionFailure::Wait(_) => {
                self.add("The operating system refused to run the simulator");
                self.add("Check that the program is executable");
            }

            ExecutionFailure::NonZeroExit { .. } => {
                self.add("The simulator rejected its input or crashed");
                self.add("Inspect the generated lattice next to the log");
            }

            ExecutionFailure::Timeout { .. } => {
                self.add("Raise the limit with --timeout or [run].timeout_secs");
                self.add("Or reduce the particle count of the distribution");
            }

            ExecutionFailure::MissingOutput { path } => {
                self.add(format!(
                    "The simulator finished but did not write '{}'",
                    path.display()
                ));
                self.add("Check the log for warnings about the output options");
            }

            ExecutionFailure::InvalidOutput { .. } => {
                self.add("The simulator output could not be read in the expected layout");
                self.add("A version mismatch may have changed the column names");
            }
        }
    }

    fn collect_config_hints(&mut self, err: &Error) {
        let Some(config) = err.downcast_ref::<ConfigError>() else {
            return;
        };

        self.mark_typed();
        self.add_config_hints(config);
    }

    fn add_config_hints(&mut self, config: &ConfigError) {
        match config {
            ConfigError::UnsupportedElement(_) => {
                self.add("Supported elements: drift, quadrupole, sextupole, sbend, rbend");
            }

            ConfigError::UnsupportedDistribution(_) => {
                self.add("Supported distributions: flat, gaussian");
            }

            ConfigError::UnsupportedParticle(_) => {
                self.add("Supported particles: e-, e+, proton, antiproton, mu-, mu+");
            }

            ConfigError::UnsupportedBackend(_) => {
                self.add("Supported backends: bdsim, bdsim-tracking, ptc");
            }

            ConfigError::MissingParameter { parameter, .. } => {
                self.add(format!("Add '{}' to the [element] table", parameter));
            }

            ConfigError::UnexpectedParameter { .. } => {
                self.add("Each element accepts only its own strength (angle, k1 or k2)");
                self.add("The length belongs in the 'length' key");
            }

            ConfigError::UnknownParameter { distribution, .. } => {
                if distribution == "flat" {
                    self.add("Flat parameters: mu<axis> and width<axis> for x, px, y, py, t, pt");
                } else {
                    self.add("Gaussian parameters: emitx, betax, alfx, emity, betay, alfy, sigmat, sigmapt");
                }
            }

            ConfigError::InvalidParameter { .. } => {
                self.add("Parameters must be finite; emittances and beta functions must be positive");
            }

            ConfigError::InvalidParticleCount => {
                self.add("Set [distribution].particles to at least 1");
            }

            ConfigError::DuplicateBackend(_) | ConfigError::TooFewBackends(_) => {
                self.add("A comparison needs at least two distinct backends");
                self.add("Example: --backend bdsim,bdsim-tracking");
            }

            ConfigError::UnknownReference(_) => {
                self.add("The reference must be one of the selected backends");
            }

            ConfigError::Parse(_) => {
                self.add("The case file needs an [element] table with 'kind' and 'length'");
                self.add("Check for misspelled keys; unknown keys are rejected");
            }
        }
    }

    fn collect_io_hints(&mut self, err: &Error) {
        let Some(io_err) = err.downcast_ref::<io::Error>() else {
            return;
        };

        self.mark_typed();
        self.collect_std_io_hints(io_err);
    }

    fn collect_std_io_hints(&mut self, source: &io::Error) {
        use std::io::ErrorKind;

        match source.kind() {
            ErrorKind::NotFound => {
                self.add("File or directory not found");
                self.add("Check the path spelling and ensure the file exists");
            }

            ErrorKind::PermissionDenied => {
                self.add("Permission denied accessing the file");
                self.add("Check the permissions of the working directory");
            }

            ErrorKind::InvalidData => {
                self.add("File contains invalid or non-UTF-8 data");
            }

            ErrorKind::WriteZero => {
                self.add("Failed to write data (disk full?)");
                self.add("Check available disk space");
            }

            _ => {
                self.add("I/O operation failed");
                self.add("Check file path, permissions, and disk space");
            }
        }
    }

    fn collect_fallback_hints(&mut self, err: &Error) {
        let msg = error_chain_text(err);

        if msg.contains("no such file") || msg.contains("not found") {
            self.add("Check that the file path is correct");
            self.add("Verify the file exists and is readable");
            return;
        }

        if msg.contains("permission denied") {
            self.add("Check file permissions with `ls -la`");
            self.add("Ensure you have the required access rights");
        }
    }
}

fn error_chain_text(err: &Error) -> String {
    let mut text = String::new();

    text.push_str(&err.to_string());

    let mut source = err.source();
    while let Some(cause) = source {
        text.push('\n');
        text.push_str(&cause.to_string());
        source = cause.source();
    }

    text.to_lowercase()
}
