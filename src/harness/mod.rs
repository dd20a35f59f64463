mod backend;
mod case;
mod compare;
mod config;
mod error;
mod execute;
mod manifest;
mod optics;
mod pipeline;
mod report;
mod sampling;

pub use backend::{
    BACKEND_IDS, Backend, BdsimBackend, Invocation, PtcBackend, backend_by_id, default_backends,
};
pub use case::TestCase;
pub use compare::{ResidualSet, ResidualSummary, fractional_residual, fractional_residuals};
pub use config::{
    BeamSection, CaseDefinition, CaseFile, DEFAULT_TIMEOUT, DistributionSection, ElementSection,
    RunOptions, RunSection,
};
pub use error::{ConfigError, Error, ExecutionFailure};
pub use execute::{ProcessRecord, run as run_process};
pub use manifest::{DISTRIBUTION_FILE, Manifest};
pub use optics::{derive as derive_optics, rms_emittance};
pub use pipeline::{Pipeline, Stage};
pub use report::{
    BackendFailure, BackendOptics, Figure, FigureKind, RESIDUAL_BINS, Report, Series, SeriesSource,
};
pub use sampling::generate as generate_distribution;
