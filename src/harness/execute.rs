//! Runs one backend program to completion.
//!
//! The child gets the working directory through `Command::current_dir`, so
//! the harness process never changes its own directory. stdout and stderr
//! share one log file; programs that read their input from stdin get the
//! lattice file there.

use super::backend::Invocation;
use super::error::{Error, ExecutionFailure};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Outcome of one finished process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    pub backend: String,
    pub program: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub log: PathBuf,
}

impl ProcessRecord {
    #[inline]
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turns a failed exit into an [`Error::Execution`].
    pub fn ensure_success(&self) -> Result<(), Error> {
        if self.succeeded() {
            Ok(())
        } else {
            Err(Error::execution(
                &self.backend,
                &self.log,
                ExecutionFailure::NonZeroExit {
                    code: self.exit_code,
                },
            ))
        }
    }
}

/// Starts `invocation` inside `working_dir` and waits for it, at most `timeout`.
///
/// A process that outlives the timeout is killed and reaped before the
/// [`ExecutionFailure::Timeout`] error is returned.
pub fn run(
    backend: &str,
    invocation: &Invocation,
    working_dir: &Path,
    timeout: Duration,
) -> Result<ProcessRecord, Error> {
    let log = working_dir.join(&invocation.log);
    let fail = |failure| Error::execution(backend, &log, failure);
    let spawn_failure = |source| ExecutionFailure::Spawn {
        program: invocation.program.clone(),
        source,
    };

    let stdout = File::create(&log).map_err(|e| fail(spawn_failure(e)))?;
    let stderr = stdout.try_clone().map_err(|e| fail(spawn_failure(e)))?;
    let stdin = match &invocation.stdin {
        Some(input) => Stdio::from(
            File::open(working_dir.join(input)).map_err(|e| fail(spawn_failure(e)))?,
        ),
        None => Stdio::null(),
    };

    debug!(
        backend,
        program = %invocation.program,
        args = ?invocation.args,
        dir = %working_dir.display(),
        "starting process"
    );

    let started = Instant::now();
    let mut child = Command::new(&invocation.program)
        .args(&invocation.args)
        .current_dir(working_dir)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                fail(ExecutionFailure::ProgramNotFound {
                    program: invocation.program.clone(),
                })
            } else {
                fail(spawn_failure(e))
            }
        })?;

    let status = wait_with_timeout(&mut child, started, timeout).map_err(fail)?;
    let duration = started.elapsed();

    debug!(
        backend,
        code = ?status.code(),
        elapsed = ?duration,
        "process finished"
    );

    Ok(ProcessRecord {
        backend: backend.to_string(),
        program: invocation.program.clone(),
        exit_code: status.code(),
        duration,
        log,
    })
}

fn wait_with_timeout(
    child: &mut Child,
    started: Instant,
    timeout: Duration,
) -> Result<ExitStatus, ExecutionFailure> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => {
                terminate_and_reap(child);
                return Err(ExecutionFailure::Wait(e));
            }
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            terminate_and_reap(child);
            return Err(ExecutionFailure::Timeout { timeout });
        }
        thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
    }
}

fn terminate_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
