//! A regression harness for particle-accelerator tracking codes.
//! It tracks one shared particle distribution through a single-element
//! beamline in several independent simulators and compares what comes out.
//!
//! # Features
//!
//! - **Bit-identical inputs** - Particles are sampled once per run and written
//!   to a single `ptc_start` file that every backend's lattice references
//! - **Backend adapters** - BDSIM (full and tracking-only builds) and MAD-X/PTC,
//!   each with its own lattice dialect, invocation and output reader
//! - **Safe process handling** - Per-process timeouts, captured logs and a
//!   working directory that is set on the child, never on the harness
//! - **Canonical comparison** - Heterogeneous outputs are normalised to
//!   (X [µm], Y [µm], Xp [rad], Yp [rad]) and compared with NaN-free
//!   fractional residuals
//! - **Report hand-off** - Outputs, residuals, emittance and named figure
//!   specifications serialise to JSON for an external plotter
//!
//! # Quick Start
//!
//! A [`Pipeline`] moves a [`TestCase`] through Clean → Make → Execute →
//! Compare:
//!
//! ```no_run
//! use trackcheck::{Pipeline, RunOptions, TestCase, Variable};
//!
//! let case = TestCase::new("sbend", 1.0, &[("angle", 0.01)])?
//!     .with_working_dir("work/sbend")
//!     .with_distribution("flat", 10, &[("widthx", 1e-5)])?;
//!
//! let mut pipeline = Pipeline::with_default_backends(case, RunOptions::default())?;
//! let report = pipeline.clean_make_run()?;
//!
//! for residuals in &report.residuals {
//!     let x = residuals.summary(Variable::X);
//!     println!("{} vs {}: rms {:e}", residuals.candidate, residuals.reference, x.rms);
//! }
//! # Ok::<(), trackcheck::Error>(())
//! ```
//!
//! Failing backends do not abort the run: they are listed in
//! [`Report::failures`] and the report is marked partial.

mod harness;
mod model;

pub mod io;

pub use model::beam::{Beam, ParseParticleError, Particle};
pub use model::beamline::{Beamline, END_MARKER, SamplerPlacement};
pub use model::distribution::{
    DEFAULT_SEED, Distribution, DistributionKind, DistributionSpec, FlatAxis, FlatParams,
    GaussianParams, InitialCoordinates, ParseDistributionKindError, ParticleDistribution,
    TwissPlane,
};
pub use model::element::{DipoleCategory, Element, ElementKind, ParseElementKindError};
pub use model::optics::{EmittancePair, Optics, Plane};
pub use model::table::{PhaseSpaceRow, PhaseSpaceTable, SimulationOutput, Variable};

pub use harness::{
    BACKEND_IDS, Backend, BackendFailure, BackendOptics, BdsimBackend, BeamSection,
    CaseDefinition, CaseFile, ConfigError, DEFAULT_TIMEOUT, DISTRIBUTION_FILE,
    DistributionSection, ElementSection, Error, ExecutionFailure, Figure, FigureKind, Invocation,
    Manifest, Pipeline, ProcessRecord, PtcBackend, RESIDUAL_BINS, Report, ResidualSet,
    ResidualSummary, RunOptions, RunSection, Series, SeriesSource, Stage, TestCase,
    backend_by_id, default_backends, derive_optics, fractional_residual, fractional_residuals,
    generate_distribution, rms_emittance, run_process,
};
