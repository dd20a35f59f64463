//! Serializable result of a comparison run, handed to an external plotter.
//!
//! Figures are addressed by name (`<title>_xy`, `<title>_residuals`, ...)
//! and list the data series they draw; rendering is not done here.

use super::compare::ResidualSet;
use super::error::Error;
use crate::model::optics::Optics;
use crate::model::table::{SimulationOutput, Variable};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Bin count of the residual histogram.
pub const RESIDUAL_BINS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FigureKind {
    Scatter { x: Variable, y: Variable },
    Histogram { variable: Variable },
    /// Residuals of every variable, weighted so each candidate integrates to one.
    ResidualHistogram { bins: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesSource {
    Tracked,
    Primary,
    Residual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Series {
    pub backend: String,
    pub label: String,
    pub source: SeriesSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Figure {
    pub name: String,
    pub kind: FigureKind,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendOptics {
    pub backend: String,
    pub optics: Optics,
}

/// A backend that did not contribute an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendFailure {
    pub backend: String,
    pub message: String,
    pub log: Option<PathBuf>,
}

impl BackendFailure {
    pub fn from_error(backend: impl Into<String>, error: &Error) -> Self {
        let log = match error {
            Error::Execution { log, .. } => Some(log.clone()),
            _ => None,
        };
        Self {
            backend: backend.into(),
            message: error.to_string(),
            log,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub title: String,
    pub reference: String,
    pub outputs: Vec<SimulationOutput>,
    pub residuals: Vec<ResidualSet>,
    pub optics: Vec<BackendOptics>,
    pub failures: Vec<BackendFailure>,
    /// Set when a backend failed or the reference produced no output.
    pub partial: bool,
    pub figures: Vec<Figure>,
}

impl Report {
    pub fn new(
        title: impl Into<String>,
        reference: impl Into<String>,
        outputs: Vec<SimulationOutput>,
        residuals: Vec<ResidualSet>,
        optics: Vec<BackendOptics>,
        failures: Vec<BackendFailure>,
    ) -> Self {
        let title = title.into();
        let reference = reference.into();
        let partial = !failures.is_empty() || !outputs.iter().any(|o| o.backend == reference);
        let figures = figures(&title, &reference, &outputs, &residuals);
        Self {
            title,
            reference,
            outputs,
            residuals,
            optics,
            failures,
            partial,
            figures,
        }
    }

    pub fn figure(&self, name: &str) -> Option<&Figure> {
        self.figures.iter().find(|f| f.name == name)
    }

    pub fn output(&self, backend: &str) -> Option<&SimulationOutput> {
        self.outputs.iter().find(|o| o.backend == backend)
    }

    pub fn residuals_for(&self, candidate: &str) -> Option<&ResidualSet> {
        self.residuals.iter().find(|r| r.candidate == candidate)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Writes the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), Error> {
        let write = || -> std::io::Result<()> {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writeln!(writer)?;
            writer.flush()
        };
        write().map_err(|e| Error::generation(path, e))
    }
}

fn figures(
    title: &str,
    reference: &str,
    outputs: &[SimulationOutput],
    residuals: &[ResidualSet],
) -> Vec<Figure> {
    let mut series: Vec<Series> = outputs
        .iter()
        .map(|o| Series {
            backend: o.backend.clone(),
            label: o.label.clone(),
            source: SeriesSource::Tracked,
        })
        .collect();

    let primaries = outputs
        .iter()
        .find(|o| o.backend == reference && o.has_primary())
        .or_else(|| outputs.iter().find(|o| o.has_primary()));
    if let Some(o) = primaries {
        series.push(Series {
            backend: o.backend.clone(),
            label: format!("{} primaries", o.label),
            source: SeriesSource::Primary,
        });
    }

    let scatter = [
        ("xy", Variable::X, Variable::Y),
        ("xpyp", Variable::Xp, Variable::Yp),
        ("xxp", Variable::X, Variable::Xp),
        ("yyp", Variable::Y, Variable::Yp),
    ];

    let mut figures: Vec<Figure> = scatter
        .into_iter()
        .map(|(suffix, x, y)| Figure {
            name: format!("{title}_{suffix}"),
            kind: FigureKind::Scatter { x, y },
            series: series.clone(),
        })
        .collect();

    figures.extend(Variable::ALL.into_iter().map(|variable| Figure {
        name: format!("{title}_{variable}"),
        kind: FigureKind::Histogram { variable },
        series: series.clone(),
    }));

    figures.push(Figure {
        name: format!("{title}_residuals"),
        kind: FigureKind::ResidualHistogram {
            bins: RESIDUAL_BINS,
        },
        series: residuals
            .iter()
            .map(|r| Series {
                backend: r.candidate.clone(),
                label: format!("{} vs {}", r.candidate, r.reference),
                source: SeriesSource::Residual,
            })
            .collect(),
    });

    figures
}
