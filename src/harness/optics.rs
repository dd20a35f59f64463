use crate::model::optics::{EmittancePair, Optics, Plane};
use crate::model::table::{PhaseSpaceTable, SimulationOutput, Variable};

const MICRONS_TO_METRES: f64 = 1e-6;

/// Statistical rms emittance (m·rad) of one transverse plane.
///
/// Uses population central moments; `None` for an empty table.
pub fn rms_emittance(table: &PhaseSpaceTable, plane: Plane) -> Option<f64> {
    if table.is_empty() {
        return None;
    }
    let (position, angle) = match plane {
        Plane::Horizontal => (Variable::X, Variable::Xp),
        Plane::Vertical => (Variable::Y, Variable::Yp),
    };
    let u: Vec<f64> = table
        .column(position)
        .into_iter()
        .map(|v| v * MICRONS_TO_METRES)
        .collect();
    let up = table.column(angle);

    let n = u.len() as f64;
    let mean_u = u.iter().sum::<f64>() / n;
    let mean_up = up.iter().sum::<f64>() / n;

    let (mut uu, mut pp, mut up_cross) = (0.0, 0.0, 0.0);
    for (a, b) in u.iter().zip(&up) {
        let du = a - mean_u;
        let dp = b - mean_up;
        uu += du * du;
        pp += dp * dp;
        up_cross += du * dp;
    }
    let determinant = (uu / n) * (pp / n) - (up_cross / n).powi(2);
    Some(determinant.max(0.0).sqrt())
}

/// Emittance before and after the element, from an output that carries primaries.
pub fn derive(output: &SimulationOutput) -> Option<Optics> {
    let primary = output.primary.as_ref()?;
    let pair = |plane| -> Option<EmittancePair> {
        Some(EmittancePair {
            before: rms_emittance(primary, plane)?,
            after: rms_emittance(&output.tracked, plane)?,
        })
    };
    Some(Optics {
        horizontal: pair(Plane::Horizontal)?,
        vertical: pair(Plane::Vertical)?,
    })
}
