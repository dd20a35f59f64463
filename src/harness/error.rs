//! Error types for the regression harness.
//!
//! Configuration problems are reported as [`ConfigError`] before any file is
//! touched. Everything that can go wrong once the pipeline is running is an
//! [`Error`], which carries the backend, artifact or path it concerns.

use super::pipeline::Stage;
use crate::model::beam::ParseParticleError;
use crate::model::distribution::ParseDistributionKindError;
use crate::model::element::ParseElementKindError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid test-case or run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The element kind is not one of the supported single elements.
    #[error("unsupported element kind '{0}' (expected drift, quadrupole, sextupole, sbend or rbend)")]
    UnsupportedElement(String),

    #[error("unsupported distribution kind '{0}' (expected flat or gaussian)")]
    UnsupportedDistribution(String),

    #[error("unsupported particle species '{0}'")]
    UnsupportedParticle(String),

    #[error("unknown backend '{0}'")]
    UnsupportedBackend(String),

    /// A strength the element kind requires was not given.
    #[error("{element} requires parameter '{parameter}'")]
    MissingParameter {
        element: String,
        parameter: &'static str,
    },

    /// A strength was given that the element kind does not accept.
    #[error("{element} does not accept parameter '{parameter}'")]
    UnexpectedParameter { element: String, parameter: String },

    #[error("{distribution} distribution has no parameter '{parameter}'")]
    UnknownParameter {
        distribution: String,
        parameter: String,
    },

    #[error("invalid value for '{parameter}': {detail}")]
    InvalidParameter { parameter: String, detail: String },

    #[error("particle count must be greater than zero")]
    InvalidParticleCount,

    #[error("backend '{0}' is listed more than once")]
    DuplicateBackend(String),

    #[error("at least two backends are required for a comparison, got {0}")]
    TooFewBackends(usize),

    #[error("reference backend '{0}' is not part of the run")]
    UnknownReference(String),

    /// The case file is not valid TOML or does not match the schema.
    #[error("failed to parse case file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    /// Creates an [`InvalidParameter`](ConfigError::InvalidParameter) error.
    pub fn invalid_parameter(parameter: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            detail: detail.into(),
        }
    }
}

impl From<ParseElementKindError> for ConfigError {
    fn from(e: ParseElementKindError) -> Self {
        ConfigError::UnsupportedElement(e.input().to_string())
    }
}

impl From<ParseDistributionKindError> for ConfigError {
    fn from(e: ParseDistributionKindError) -> Self {
        ConfigError::UnsupportedDistribution(e.input().to_string())
    }
}

impl From<ParseParticleError> for ConfigError {
    fn from(e: ParseParticleError) -> Self {
        ConfigError::UnsupportedParticle(e.input().to_string())
    }
}

/// Why a single backend run did not produce a usable output.
#[derive(Debug, Error)]
pub enum ExecutionFailure {
    #[error("program '{program}' was not found")]
    ProgramNotFound { program: String },

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process exited with {}", exit_description(.code))]
    NonZeroExit { code: Option<i32> },

    #[error("process exceeded the {}s timeout and was killed", .timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    #[error("expected output '{}' was not produced", .path.display())]
    MissingOutput { path: PathBuf },

    #[error("output '{}' is invalid: {detail}", .path.display())]
    InvalidOutput { path: PathBuf, detail: String },

    #[error("failed to wait for the process: {0}")]
    Wait(#[source] std::io::Error),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl ExecutionFailure {
    pub fn invalid_output(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::InvalidOutput {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Maps a codec error on `path` onto the execution failure it represents.
    pub fn from_codec(path: impl Into<PathBuf>, error: crate::io::Error) -> Self {
        let path = path.into();
        match error {
            crate::io::Error::Io { source } if source.kind() == std::io::ErrorKind::NotFound => {
                Self::MissingOutput { path }
            }
            other => Self::invalid_output(path, other.to_string()),
        }
    }
}

/// Errors raised while driving the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// A generated input file could not be written.
    #[error("failed to write '{}': {source}", .artifact.display())]
    Generation {
        artifact: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove '{}': {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A backend failed to run or to produce a usable output.
    ///
    /// `log` points at the captured stdout/stderr of the process.
    #[error("backend '{backend}' failed: {failure} (log: {})", .log.display())]
    Execution {
        backend: String,
        log: PathBuf,
        failure: ExecutionFailure,
    },

    #[error("cannot compare '{candidate}' against '{reference}': {detail}")]
    Comparison {
        reference: String,
        candidate: String,
        detail: String,
    },

    #[error("cannot {operation} while the pipeline is {stage}")]
    InvalidTransition {
        operation: &'static str,
        stage: Stage,
    },
}

impl Error {
    /// Creates a [`Generation`](Error::Generation) error.
    pub fn generation(artifact: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Generation {
            artifact: artifact.into(),
            source,
        }
    }

    pub fn cleanup(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Cleanup {
            path: path.into(),
            source,
        }
    }

    /// Creates an [`Execution`](Error::Execution) error.
    ///
    /// # Arguments
    ///
    /// * `backend` - Identifier of the failing backend
    /// * `log` - Path of the backend's captured output
    /// * `failure` - What went wrong
    pub fn execution(
        backend: impl Into<String>,
        log: impl Into<PathBuf>,
        failure: ExecutionFailure,
    ) -> Self {
        Self::Execution {
            backend: backend.into(),
            log: log.into(),
            failure,
        }
    }

    pub fn comparison(
        reference: impl Into<String>,
        candidate: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Comparison {
            reference: reference.into(),
            candidate: candidate.into(),
            detail: detail.into(),
        }
    }

    /// The execution failure, if this error came from a backend run.
    pub fn execution_failure(&self) -> Option<&ExecutionFailure> {
        match self {
            Error::Execution { failure, .. } => Some(failure),
            _ => None,
        }
    }
}
