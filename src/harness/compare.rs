//! Fractional residuals between two backends' tracked outputs.
//!
//! The reference backend is the denominator: `(reference - candidate) /
//! reference`. Swapping the two changes the result, so callers must pick the
//! reference deliberately.

use super::error::Error;
use crate::model::table::{SimulationOutput, Variable};
use serde::Serialize;

/// `(reference - candidate) / reference`, with every non-finite result mapped to `0.0`.
#[inline]
pub fn fractional_residual(candidate: f64, reference: f64) -> f64 {
    let residual = (reference - candidate) / reference;
    if residual.is_finite() { residual } else { 0.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResidualSummary {
    pub mean: f64,
    pub rms: f64,
    pub max_abs: f64,
}

impl ResidualSummary {
    fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                max_abs: 0.0,
            };
        }
        let n = values.len() as f64;
        Self {
            mean: values.iter().sum::<f64>() / n,
            rms: (values.iter().map(|v| v * v).sum::<f64>() / n).sqrt(),
            max_abs: values.iter().fold(0.0, |acc: f64, v| acc.max(v.abs())),
        }
    }
}

/// Per-particle residuals of one candidate against the reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResidualSet {
    pub reference: String,
    pub candidate: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub xp: Vec<f64>,
    pub yp: Vec<f64>,
}

impl ResidualSet {
    pub fn get(&self, variable: Variable) -> &[f64] {
        match variable {
            Variable::X => &self.x,
            Variable::Y => &self.y,
            Variable::Xp => &self.xp,
            Variable::Yp => &self.yp,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn summary(&self, variable: Variable) -> ResidualSummary {
        ResidualSummary::of(self.get(variable))
    }
}

/// Compares the tracked tables of `candidate` and `reference` row by row.
///
/// # Errors
///
/// Returns [`Error::Comparison`] when the tables have different row counts.
pub fn fractional_residuals(
    candidate: &SimulationOutput,
    reference: &SimulationOutput,
) -> Result<ResidualSet, Error> {
    let (c, r) = (&candidate.tracked, &reference.tracked);
    if c.len() != r.len() {
        return Err(Error::comparison(
            &reference.backend,
            &candidate.backend,
            format!(
                "row count mismatch: {} has {} rows, {} has {}",
                candidate.backend,
                c.len(),
                reference.backend,
                r.len()
            ),
        ));
    }

    let column = |variable: Variable| -> Vec<f64> {
        c.rows
            .iter()
            .zip(&r.rows)
            .map(|(cr, rr)| fractional_residual(cr.get(variable), rr.get(variable)))
            .collect()
    };

    Ok(ResidualSet {
        reference: reference.backend.clone(),
        candidate: candidate.backend.clone(),
        x: column(Variable::X),
        y: column(Variable::Y),
        xp: column(Variable::Xp),
        yp: column(Variable::Yp),
    })
}
