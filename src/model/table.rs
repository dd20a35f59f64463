use serde::Serialize;
use std::fmt;

/// Canonical comparison variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variable {
    X,
    Y,
    Xp,
    Yp,
}

impl Variable {
    pub const ALL: [Variable; 4] = [Variable::X, Variable::Y, Variable::Xp, Variable::Yp];

    pub fn as_str(self) -> &'static str {
        match self {
            Variable::X => "x",
            Variable::Y => "y",
            Variable::Xp => "xp",
            Variable::Yp => "yp",
        }
    }

    /// Unit of the canonical column.
    pub fn unit(self) -> &'static str {
        match self {
            Variable::X | Variable::Y => "um",
            Variable::Xp | Variable::Yp => "rad",
        }
    }

    #[inline]
    pub fn is_position(self) -> bool {
        matches!(self, Variable::X | Variable::Y)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One particle in canonical units: positions in µm, angles in rad.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PhaseSpaceRow {
    pub x: f64,
    pub y: f64,
    pub xp: f64,
    pub yp: f64,
}

impl PhaseSpaceRow {
    pub fn new(x: f64, y: f64, xp: f64, yp: f64) -> Self {
        Self { x, y, xp, yp }
    }

    #[inline]
    pub fn get(&self, variable: Variable) -> f64 {
        match variable {
            Variable::X => self.x,
            Variable::Y => self.y,
            Variable::Xp => self.xp,
            Variable::Yp => self.yp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct PhaseSpaceTable {
    pub rows: Vec<PhaseSpaceRow>,
}

impl PhaseSpaceTable {
    pub fn new(rows: Vec<PhaseSpaceRow>) -> Self {
        Self { rows }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, variable: Variable) -> Vec<f64> {
        self.rows.iter().map(|row| row.get(variable)).collect()
    }
}

/// Post-run state of one backend, normalised to the canonical schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationOutput {
    pub backend: String,
    pub label: String,
    pub primary: Option<PhaseSpaceTable>,
    pub tracked: PhaseSpaceTable,
}

impl SimulationOutput {
    pub fn new(
        backend: impl Into<String>,
        label: impl Into<String>,
        tracked: PhaseSpaceTable,
    ) -> Self {
        Self {
            backend: backend.into(),
            label: label.into(),
            primary: None,
            tracked,
        }
    }

    pub fn with_primary(mut self, primary: Option<PhaseSpaceTable>) -> Self {
        self.primary = primary;
        self
    }

    #[inline]
    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_extracts_values_in_row_order() {
        let table = PhaseSpaceTable::new(vec![
            PhaseSpaceRow::new(1.0, 2.0, 3.0, 4.0),
            PhaseSpaceRow::new(5.0, 6.0, 7.0, 8.0),
        ]);
        assert_eq!(table.column(Variable::X), vec![1.0, 5.0]);
        assert_eq!(table.column(Variable::Yp), vec![4.0, 8.0]);
    }

    #[test]
    fn output_without_primary_reports_it() {
        let output = SimulationOutput::new("ptc", "PTC", PhaseSpaceTable::default());
        assert!(!output.has_primary());
    }
}
